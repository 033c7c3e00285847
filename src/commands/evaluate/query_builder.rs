use crate::cli::{AnalyzerMode, ResultMode, SearchOptions, Similarity};
use crate::model::QuestionRecord;
use crate::search::analyzer::analyze;
use crate::search::{Clause, ClauseKind, CompositeQuery, Field};

pub const PHRASE_BOOST: f64 = 2.5;

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub analyzer: AnalyzerMode,
    pub similarity: Similarity,
    pub result_mode: ResultMode,
    pub top_k: usize,
    pub hits_per_page: usize,
    pub category_clause: bool,
}

impl QueryOptions {
    pub fn new(search: &SearchOptions, analyzer: AnalyzerMode) -> Self {
        Self {
            analyzer,
            similarity: search.similarity,
            result_mode: search.result_mode,
            top_k: search.top_k,
            hits_per_page: search.hits_per_page,
            category_clause: search.category_clause,
        }
    }

    pub fn requested_hits(&self) -> usize {
        match self.result_mode {
            ResultMode::Raw => self.top_k,
            ResultMode::Dedup => self.hits_per_page.max(self.top_k),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub query: CompositeQuery,
    pub hits_per_page: usize,
}

pub fn build_query(question: &QuestionRecord, options: &QueryOptions) -> BuiltQuery {
    let clue = strip_control(&question.clue);
    let category = strip_control(&question.category);
    let mut clauses = Vec::new();

    let base_terms = analyze(&format!("{clue} {category}"), options.analyzer);
    if !base_terms.is_empty() {
        clauses.push(Clause {
            field: Field::Body,
            kind: ClauseKind::AnyTerm,
            terms: base_terms,
            boost: 1.0,
        });
    }

    let phrase_kind = if options.analyzer.supports_phrases() {
        ClauseKind::Phrase
    } else {
        ClauseKind::AllTerms
    };
    for segment in quoted_segments(&clue) {
        let terms = analyze(segment, options.analyzer);
        if terms.is_empty() {
            continue;
        }
        clauses.push(Clause {
            field: Field::Body,
            kind: phrase_kind,
            terms,
            boost: PHRASE_BOOST,
        });
    }

    if options.category_clause {
        let terms = analyze(&category, options.analyzer);
        if !terms.is_empty() {
            clauses.push(Clause {
                field: Field::Categories,
                kind: ClauseKind::AnyTerm,
                terms,
                boost: 1.0,
            });
        }
    }

    BuiltQuery {
        query: CompositeQuery { clauses },
        hits_per_page: options.requested_hits(),
    }
}

fn strip_control(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_ascii_control()).collect()
}

fn quoted_segments(clue: &str) -> Vec<&str> {
    if !clue.contains('"') {
        return Vec::new();
    }
    clue.split('"').skip(1).step_by(2).collect()
}
