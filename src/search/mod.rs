
use anyhow::Result;

use crate::cli::Similarity;

pub mod analyzer;
mod fts;
pub mod similarity;

pub use fts::{BulkWriter, DB_SCHEMA_VERSION, FtsIndex, configure_connection};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Body,
    Categories,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Categories => "categories",
        }
    }

    fn bm25_weights(self) -> &'static str {
        match self {
            Self::Body => "1.0, 0.0",
            Self::Categories => "0.0, 1.0",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClauseKind {
    AnyTerm,
    AllTerms,
    Phrase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: Field,
    pub kind: ClauseKind,
    pub terms: Vec<String>,
    pub boost: f64,
}

impl Clause {
    pub fn to_fts_match(&self) -> Option<String> {
        if self.terms.is_empty() {
            return None;
        }

        let column = self.field.column();
        let expression = match self.kind {
            ClauseKind::AnyTerm | ClauseKind::AllTerms => {
                let operator = if self.kind == ClauseKind::AnyTerm {
                    " OR "
                } else {
                    " AND "
                };
                self.terms
                    .iter()
                    .map(|term| format!("{column} : {}", analyzer::fts_string(term)))
                    .collect::<Vec<String>>()
                    .join(operator)
            }
            ClauseKind::Phrase => {
                format!("{column} : {}", analyzer::fts_string(&self.terms.join(" ")))
            }
        };

        Some(expression)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeQuery {
    pub clauses: Vec<Clause>,
}

impl CompositeQuery {
    pub fn is_empty(&self) -> bool {
        self.clauses.iter().all(|clause| clause.terms.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_id: i64,
    pub score: f64,
}

pub trait SearchBackend {
    fn search(
        &self,
        query: &CompositeQuery,
        top_k: usize,
        similarity: Similarity,
    ) -> Result<Vec<SearchHit>>;

    fn title(&self, doc_id: i64) -> Result<String>;
}
