use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub categories: Option<String>,
    pub file_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub category: String,
    pub clue: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    pub rank: usize,
    pub doc_id: i64,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusFileEntry {
    pub filename: String,
    pub sha256: String,
    pub document_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexPaths {
    pub cache_root: String,
    pub corpus_dir: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub analyzer: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub paths: IndexPaths,
    pub file_count: usize,
    pub documents_total: i64,
    pub untitled_documents: usize,
    pub files: Vec<CorpusFileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionOutcome {
    pub index: usize,
    pub answer: String,
    pub first_hit_rank: Option<usize>,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankCount {
    pub rank: usize,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub report_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub completed_at: String,
    pub db_path: String,
    pub questions_path: String,
    pub analyzer: String,
    pub similarity: String,
    pub result_mode: String,
    pub answer_match: String,
    pub top_k: usize,
    pub hits_per_page: usize,
    pub expected_questions: usize,
    pub total_questions: usize,
    pub matches_at_any_rank: usize,
    pub matches_at_rank_one: usize,
    pub precision_at_one: f64,
    pub hits_by_rank: Vec<RankCount>,
    pub questions: Vec<QuestionOutcome>,
}
