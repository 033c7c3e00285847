use std::collections::BTreeMap;

use regex::Regex;
use tracing::warn;

use crate::cli::AnswerMatch;
use crate::model::{QuestionOutcome, RankCount, RankedResult};

#[derive(Debug)]
pub enum AnswerMatcher {
    Pattern(Regex),
    Literal(String),
}

impl AnswerMatcher {
    pub fn new(answer: &str, mode: AnswerMatch) -> Self {
        let expected = answer.trim().to_lowercase();
        match mode {
            AnswerMatch::Literal => Self::Literal(expected),
            AnswerMatch::Pattern => {
                match Regex::new(&expected)
                    .and_then(|_| Regex::new(&format!("^(?:{expected})$")))
                {
                    Ok(pattern) => Self::Pattern(pattern),
                    Err(err) => {
                        warn!(answer = %answer, error = %err, "answer is not a valid pattern; comparing literally");
                        Self::Literal(expected)
                    }
                }
            }
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = normalize_title(title);
        match self {
            Self::Pattern(pattern) => pattern.is_match(&title),
            Self::Literal(expected) => &title == expected,
        }
    }
}

pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|ch| !matches!(ch, '[' | ']'))
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug)]
pub struct EvaluationState {
    top_k: usize,
    total_questions: usize,
    matches_at_any_rank: usize,
    matches_at_rank_one: usize,
    hits_by_rank: BTreeMap<usize, usize>,
    outcomes: Vec<QuestionOutcome>,
}

#[derive(Debug, Clone)]
pub struct EvaluationSummary {
    pub total_questions: usize,
    pub matches_at_any_rank: usize,
    pub matches_at_rank_one: usize,
    pub precision_at_one: f64,
    pub hits_by_rank: Vec<RankCount>,
    pub questions: Vec<QuestionOutcome>,
}

impl EvaluationState {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            total_questions: 0,
            matches_at_any_rank: 0,
            matches_at_rank_one: 0,
            hits_by_rank: BTreeMap::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        answer: &str,
        results: &[RankedResult],
        matcher: &AnswerMatcher,
    ) -> Option<usize> {
        self.total_questions += 1;

        let first_hit_rank = results
            .iter()
            .find(|result| matcher.matches(&result.title))
            .map(|result| result.rank);

        if let Some(rank) = first_hit_rank {
            self.matches_at_any_rank += 1;
            *self.hits_by_rank.entry(rank).or_insert(0) += 1;
            if rank == 1 {
                self.matches_at_rank_one += 1;
            }
        }

        self.outcomes.push(QuestionOutcome {
            index: self.total_questions,
            answer: answer.to_string(),
            first_hit_rank,
            titles: results.iter().map(|result| result.title.clone()).collect(),
        });

        first_hit_rank
    }

    pub fn finish(self, expected_questions: usize) -> EvaluationSummary {
        let precision_at_one = if expected_questions == 0 {
            0.0
        } else {
            self.matches_at_rank_one as f64 / expected_questions as f64
        };

        let hits_by_rank = (1..=self.top_k)
            .map(|rank| RankCount {
                rank,
                count: self.hits_by_rank.get(&rank).copied().unwrap_or(0),
            })
            .collect();

        EvaluationSummary {
            total_questions: self.total_questions,
            matches_at_any_rank: self.matches_at_any_rank,
            matches_at_rank_one: self.matches_at_rank_one,
            precision_at_one,
            hits_by_rank,
            questions: self.outcomes,
        }
    }
}
