use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "wikiqa",
    version,
    about = "Wiki dump indexing and trivia retrieval evaluation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Index(IndexArgs),
    Evaluate(EvaluateArgs),
    Query(QueryArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AnalyzerMode {
    Standard,
    Custom,
    Porter,
    Positional,
}

impl AnalyzerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Custom => "custom",
            Self::Porter => "porter",
            Self::Positional => "positional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "standard" => Some(Self::Standard),
            "custom" => Some(Self::Custom),
            "porter" => Some(Self::Porter),
            "positional" => Some(Self::Positional),
            _ => None,
        }
    }

    pub fn fts_tokenizer(self) -> &'static str {
        match self {
            Self::Standard | Self::Custom => "unicode61 remove_diacritics 2",
            Self::Porter | Self::Positional => "porter unicode61 remove_diacritics 2",
        }
    }

    pub fn removes_stopwords(self) -> bool {
        !matches!(self, Self::Standard)
    }

    pub fn supports_phrases(self) -> bool {
        matches!(self, Self::Positional)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Similarity {
    Bm25,
    Tfidf,
}

impl Similarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bm25 => "bm25",
            Self::Tfidf => "tfidf",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResultMode {
    Raw,
    Dedup,
}

impl ResultMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Dedup => "dedup",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum AnswerMatch {
    Pattern,
    Literal,
}

impl AnswerMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Literal => "literal",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[arg(long, default_value = ".cache/wikiqa")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub corpus_dir: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub index_manifest_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = AnalyzerMode::Positional)]
    pub analyzer: AnalyzerMode,
}

#[derive(Args, Debug, Clone)]
pub struct SearchOptions {
    #[arg(long, value_enum, default_value_t = Similarity::Bm25)]
    pub similarity: Similarity,

    #[arg(long, value_enum, default_value_t = ResultMode::Dedup)]
    pub result_mode: ResultMode,

    #[arg(long, default_value_t = 10, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub top_k: usize,

    #[arg(long, default_value_t = 20)]
    pub hits_per_page: usize,

    #[arg(long, default_value_t = false)]
    pub category_clause: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long, default_value = ".cache/wikiqa")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = AnalyzerMode::Positional)]
    pub analyzer: AnalyzerMode,

    #[arg(long)]
    pub questions: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[command(flatten)]
    pub search: SearchOptions,

    #[arg(long, value_enum, default_value_t = AnswerMatch::Pattern)]
    pub answer_match: AnswerMatch,

    #[arg(long, default_value_t = 100)]
    pub expected_questions: usize,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = ".cache/wikiqa")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = AnalyzerMode::Positional)]
    pub analyzer: AnalyzerMode,

    #[arg(long)]
    pub clue: String,

    #[arg(long, default_value = "")]
    pub category: String,

    #[command(flatten)]
    pub search: SearchOptions,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/wikiqa")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = AnalyzerMode::Positional)]
    pub analyzer: AnalyzerMode,
}

pub fn default_db_path(cache_root: &std::path::Path, analyzer: AnalyzerMode) -> PathBuf {
    cache_root.join(format!("{}-index.sqlite", analyzer.as_str()))
}
