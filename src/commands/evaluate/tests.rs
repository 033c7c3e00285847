use anyhow::{Result, bail};
use rusqlite::Connection;

use super::accumulator::{AnswerMatcher, EvaluationState, normalize_title};
use super::dedup::{dedup_by_title, rank_hits};
use super::query_builder::{PHRASE_BOOST, QueryOptions, build_query};
use super::questions::read_questions;
use super::run::{evaluate_questions, search_question};
use crate::cli::{AnalyzerMode, AnswerMatch, ResultMode, Similarity};
use crate::commands::index::DocumentParser;
use crate::model::{QuestionRecord, RankedResult};
use crate::search::{ClauseKind, CompositeQuery, FtsIndex, SearchBackend, SearchHit};

fn options(analyzer: AnalyzerMode) -> QueryOptions {
    QueryOptions {
        analyzer,
        similarity: Similarity::Bm25,
        result_mode: ResultMode::Dedup,
        top_k: 10,
        hits_per_page: 20,
        category_clause: false,
    }
}

fn question(category: &str, clue: &str, answer: &str) -> QuestionRecord {
    QuestionRecord {
        category: category.to_string(),
        clue: clue.to_string(),
        answer: answer.to_string(),
    }
}

fn ranked(titles: &[&str]) -> Vec<RankedResult> {
    titles
        .iter()
        .enumerate()
        .map(|(index, title)| RankedResult {
            rank: index + 1,
            doc_id: index as i64,
            title: title.to_string(),
            score: 1.0,
        })
        .collect()
}

fn build_index(corpus: &str, analyzer: AnalyzerMode) -> FtsIndex {
    let connection = Connection::open_in_memory().expect("in-memory db");
    let mut index = FtsIndex::new(connection, analyzer);
    {
        let mut writer = index.begin_rebuild().expect("bulk writer");
        for record in DocumentParser::new(corpus.as_bytes()) {
            writer
                .add(&record.expect("corpus parses"), "corpus.txt")
                .expect("document indexes");
        }
        writer.commit().expect("commit");
    }
    index
}

struct FixedBackend {
    titles: Vec<&'static str>,
}

impl SearchBackend for FixedBackend {
    fn search(
        &self,
        _query: &CompositeQuery,
        top_k: usize,
        _similarity: Similarity,
    ) -> Result<Vec<SearchHit>> {
        Ok((0..self.titles.len().min(top_k))
            .map(|index| SearchHit {
                doc_id: index as i64,
                score: (self.titles.len() - index) as f64,
            })
            .collect())
    }

    fn title(&self, doc_id: i64) -> Result<String> {
        match self.titles.get(doc_id as usize) {
            Some(title) => Ok(title.to_string()),
            None => bail!("unknown document {doc_id}"),
        }
    }
}

#[test]
fn read_questions_consumes_four_line_groups() {
    let input = "ANIMALS\nMan's best friend\nDog\n\nFRUIT\nKeeps the doctor away\nApple\n\n";
    let questions = read_questions(input.as_bytes()).expect("questions parse");

    assert_eq!(
        questions,
        vec![
            question("ANIMALS", "Man's best friend", "Dog"),
            question("FRUIT", "Keeps the doctor away", "Apple"),
        ]
    );
}

#[test]
fn read_questions_accepts_missing_final_separator_and_drops_fragments() {
    let questions = read_questions("A\nclue\nanswer".as_bytes()).expect("parses");
    assert_eq!(questions, vec![question("A", "clue", "answer")]);

    let questions = read_questions("A\nclue\nanswer\n\nB\nclue".as_bytes()).expect("parses");
    assert_eq!(questions.len(), 1);

    assert!(read_questions("".as_bytes()).expect("parses").is_empty());
}

#[test]
fn base_clause_covers_clue_and_category() {
    let built = build_query(
        &question("U.S. STATES", "Its capital is Boise\t", "Idaho"),
        &options(AnalyzerMode::Standard),
    );

    assert_eq!(built.query.clauses.len(), 1);
    let base = &built.query.clauses[0];
    assert_eq!(base.kind, ClauseKind::AnyTerm);
    assert_eq!(base.boost, 1.0);
    assert_eq!(
        base.terms,
        vec!["its", "capital", "is", "boise", "u", "s", "states"]
    );
    assert_eq!(built.hits_per_page, 20);
}

#[test]
fn quoted_segments_become_boosted_phrase_clauses() {
    let built = build_query(
        &question("MOVIES", r#"He said "Rosebud" in "Citizen Kane""#, "Orson Welles"),
        &options(AnalyzerMode::Positional),
    );

    let phrases = built
        .query
        .clauses
        .iter()
        .filter(|clause| clause.kind == ClauseKind::Phrase)
        .collect::<Vec<_>>();
    assert_eq!(phrases.len(), 2);
    assert_eq!(phrases[0].terms, vec!["rosebud"]);
    assert_eq!(phrases[1].terms, vec!["citizen", "kane"]);
    assert!(phrases.iter().all(|clause| clause.boost == PHRASE_BOOST));
    assert_eq!(
        phrases[1].to_fts_match().as_deref(),
        Some("body : \"citizen kane\"")
    );
}

#[test]
fn quoted_segments_degrade_to_term_groups_without_positions() {
    let built = build_query(
        &question("MOVIES", r#"Set in "Citizen Kane""#, "x"),
        &options(AnalyzerMode::Porter),
    );

    let group = built
        .query
        .clauses
        .iter()
        .find(|clause| clause.boost == PHRASE_BOOST)
        .expect("quoted clause present");
    assert_eq!(group.kind, ClauseKind::AllTerms);
    assert_eq!(
        group.to_fts_match().as_deref(),
        Some("body : \"citizen\" AND body : \"kane\"")
    );
}

#[test]
fn category_clause_is_optional() {
    let mut opts = options(AnalyzerMode::Standard);
    let plain = build_query(&question("Animals", "barks", "dog"), &opts);
    assert_eq!(plain.query.clauses.len(), 1);

    opts.category_clause = true;
    let with_category = build_query(&question("Animals", "barks", "dog"), &opts);
    assert_eq!(with_category.query.clauses.len(), 2);
    assert_eq!(
        with_category.query.clauses[1].to_fts_match().as_deref(),
        Some("categories : \"animals\"")
    );
}

#[test]
fn raw_mode_requests_only_top_k() {
    let mut opts = options(AnalyzerMode::Standard);
    opts.result_mode = ResultMode::Raw;
    let built = build_query(&question("A", "b", "c"), &opts);
    assert_eq!(built.hits_per_page, 10);
}

#[test]
fn dedup_keeps_first_occurrence_of_each_title() {
    let backend = FixedBackend {
        titles: vec!["A", "B", "A", "C", "B", "D"],
    };
    let hits = backend
        .search(&CompositeQuery::default(), 6, Similarity::Bm25)
        .expect("hits");

    let results = dedup_by_title(&hits, 3, |doc_id| backend.title(doc_id)).expect("dedup");
    let titles = results
        .iter()
        .map(|result| (result.rank, result.title.as_str(), result.doc_id))
        .collect::<Vec<_>>();
    assert_eq!(titles, vec![(1, "A", 0), (2, "B", 1), (3, "C", 3)]);
}

#[test]
fn dedup_stops_at_end_of_dense_duplicates() {
    let backend = FixedBackend {
        titles: vec!["A", "A", "B", "A", "B"],
    };
    let hits = backend
        .search(&CompositeQuery::default(), 5, Similarity::Bm25)
        .expect("hits");

    let results = dedup_by_title(&hits, 10, |doc_id| backend.title(doc_id)).expect("dedup");
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].rank, 2);
    assert_eq!(results[1].title, "B");
}

#[test]
fn dedup_propagates_title_lookup_failures() {
    let hits = vec![SearchHit {
        doc_id: 42,
        score: 1.0,
    }];
    let backend = FixedBackend { titles: vec![] };
    assert!(dedup_by_title(&hits, 1, |doc_id| backend.title(doc_id)).is_err());
    assert!(rank_hits(&hits, |doc_id| backend.title(doc_id)).is_err());
}

#[test]
fn normalize_title_strips_brackets_and_case() {
    assert_eq!(normalize_title("[[Orson Welles]]"), "orson welles");
}

#[test]
fn pattern_matching_is_a_full_match() {
    let matcher = AnswerMatcher::new("Dog", AnswerMatch::Pattern);
    assert!(matcher.matches("[[DOG]]"));
    assert!(!matcher.matches("Hot dog"));

    let matcher = AnswerMatcher::new("Gr(a|e)y", AnswerMatch::Pattern);
    assert!(matcher.matches("Grey"));

    let matcher = AnswerMatcher::new("Gr(a|e)y", AnswerMatch::Literal);
    assert!(!matcher.matches("Grey"));
    assert!(matcher.matches("gr(a|e)y"));
}

#[test]
fn invalid_pattern_falls_back_to_literal_comparison() {
    let matcher = AnswerMatcher::new("C++ (", AnswerMatch::Pattern);
    assert!(matches!(matcher, AnswerMatcher::Literal(_)));
    assert!(matcher.matches("c++ ("));
}

#[test]
fn unbalanced_answer_cannot_escape_full_match_anchors() {
    let matcher = AnswerMatcher::new("a)|(b", AnswerMatch::Pattern);
    assert!(matches!(matcher, AnswerMatcher::Literal(_)));
    assert!(!matcher.matches("apple"));
    assert!(!matcher.matches("Crab"));
    assert!(matcher.matches("[[A)|(B]]"));
}

#[test]
fn accumulator_counts_first_hit_per_question() {
    let mut state = EvaluationState::new(10);

    let first = AnswerMatcher::new("dog", AnswerMatch::Pattern);
    assert_eq!(
        state.record("dog", &ranked(&["Dog", "Cat", "Dog"]), &first),
        Some(1)
    );

    let second = AnswerMatcher::new("emu", AnswerMatch::Pattern);
    assert_eq!(
        state.record("emu", &ranked(&["Ostrich", "Kiwi", "Emu"]), &second),
        Some(3)
    );

    let third = AnswerMatcher::new("yak", AnswerMatch::Pattern);
    assert_eq!(state.record("yak", &ranked(&["Ox"]), &third), None);

    let summary = state.finish(100);
    assert_eq!(summary.total_questions, 3);
    assert_eq!(summary.matches_at_any_rank, 2);
    assert_eq!(summary.matches_at_rank_one, 1);
    assert_eq!(summary.precision_at_one, 0.01);
    assert_eq!(summary.hits_by_rank.len(), 10);
    assert_eq!(summary.hits_by_rank[0].count, 1);
    assert_eq!(summary.hits_by_rank[1].count, 0);
    assert_eq!(summary.hits_by_rank[2].count, 1);
    assert_eq!(summary.questions[2].first_hit_rank, None);
}

#[test]
fn precision_uses_the_expected_denominator() {
    let mut state = EvaluationState::new(10);
    let matcher = AnswerMatcher::new("a", AnswerMatch::Pattern);
    state.record("a", &ranked(&["A"]), &matcher);

    assert_eq!(state.finish(4).precision_at_one, 0.25);

    let state = EvaluationState::new(10);
    assert_eq!(state.finish(0).precision_at_one, 0.0);
}

#[test]
fn evaluate_questions_runs_in_question_order() {
    let backend = FixedBackend {
        titles: vec!["Paris", "Lyon", "Paris", "Nice"],
    };
    let questions = vec![
        question("CITIES", "capital", "Paris"),
        question("CITIES", "riviera", "Nice"),
        question("CITIES", "nowhere", "Oslo"),
    ];

    let summary = evaluate_questions(
        &backend,
        &questions,
        &options(AnalyzerMode::Standard),
        AnswerMatch::Pattern,
        3,
    )
    .expect("evaluation runs");

    assert_eq!(summary.matches_at_any_rank, 2);
    assert_eq!(summary.matches_at_rank_one, 1);
    assert_eq!(summary.questions[0].first_hit_rank, Some(1));
    assert_eq!(summary.questions[1].first_hit_rank, Some(3));
    assert_eq!(summary.questions[1].titles, vec!["Paris", "Lyon", "Nice"]);
}

#[test]
fn two_document_corpus_end_to_end() {
    let index = build_index(
        "[[Dog]]\nDogs are mammals.\n[[Cat]]\nCats are mammals.\n",
        AnalyzerMode::Positional,
    );
    let mut opts = options(AnalyzerMode::Positional);
    opts.top_k = 2;

    let quiz = vec![question("Animals", "\"mammals\"", "dog")];
    let results = search_question(&index, &quiz[0], &opts).expect("search runs");

    let mut titles = results
        .iter()
        .map(|result| result.title.as_str())
        .collect::<Vec<_>>();
    titles.sort();
    assert_eq!(titles, vec!["Cat", "Dog"]);

    let dog_rank = results
        .iter()
        .find(|result| result.title == "Dog")
        .map(|result| result.rank);

    let summary =
        evaluate_questions(&index, &quiz, &opts, AnswerMatch::Pattern, 1).expect("evaluates");
    assert_eq!(summary.matches_at_any_rank, 1);
    assert_eq!(summary.questions[0].first_hit_rank, dog_rank);
}

#[test]
fn exact_phrase_outranks_scattered_terms() {
    let index = build_index(
        "\
[[Wine]]
red wine and a fox
[[Fox]]
the red fox jumps
[[Whale]]
blue whale
[[Sea]]
deep sea
[[Sky]]
open sky
",
        AnalyzerMode::Positional,
    );

    let results = search_question(
        &index,
        &question("", "The \"red fox\"", "fox"),
        &options(AnalyzerMode::Positional),
    )
    .expect("search runs");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Fox");
    assert_eq!(results[1].title, "Wine");
}

#[test]
fn category_clause_reaches_category_field() {
    let index = build_index(
        "[[Dog]]\nCATEGORIES: Animals\nBarks loudly.\n[[Rock]]\nSits still.\n",
        AnalyzerMode::Standard,
    );
    let mut opts = options(AnalyzerMode::Standard);

    let quiz = question("Animals", "zebra", "dog");
    assert!(
        search_question(&index, &quiz, &opts)
            .expect("search runs")
            .is_empty()
    );

    opts.category_clause = true;
    let results = search_question(&index, &quiz, &opts).expect("search runs");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Dog");
}

#[test]
fn query_syntax_in_clues_never_reaches_the_backend() {
    let index = build_index("[[Dog]]\nDogs are mammals.\n", AnalyzerMode::Positional);

    let quiz = question(
        "NEAR(\"x\" y)",
        "title:foo AND (bar* OR \"baz\") NEAR^2 -x {body}: '",
        "dog",
    );
    let results = search_question(&index, &quiz, &options(AnalyzerMode::Positional));
    assert!(results.is_ok());
}

#[test]
fn duplicate_titles_in_the_index_are_collapsed() {
    let index = build_index(
        "[[Dog]]\nloyal dog\n[[Dog]]\nloyal dog again\n[[Cat]]\nloyal cat\n",
        AnalyzerMode::Standard,
    );
    let mut opts = options(AnalyzerMode::Standard);
    opts.top_k = 2;

    let results = search_question(&index, &question("", "loyal", "dog"), &opts)
        .expect("search runs");
    let mut titles = results
        .iter()
        .map(|result| result.title.as_str())
        .collect::<Vec<_>>();
    titles.sort();
    assert_eq!(titles, vec!["Cat", "Dog"]);
    assert_eq!(
        results.iter().map(|result| result.rank).collect::<Vec<_>>(),
        vec![1, 2]
    );
}
