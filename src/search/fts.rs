use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use super::analyzer::index_text;
use super::similarity::log_tf_idf;
use super::{Clause, CompositeQuery, SearchBackend, SearchHit};
use crate::cli::{AnalyzerMode, Similarity};
use crate::model::DocumentRecord;
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

const MAX_CLAUSE_CANDIDATES: usize = 1000;

pub struct FtsIndex {
    connection: Connection,
    analyzer: AnalyzerMode,
}

impl FtsIndex {
    pub fn new(connection: Connection, analyzer: AnalyzerMode) -> Self {
        Self {
            connection,
            analyzer,
        }
    }

    pub fn open(connection: Connection) -> Result<Self> {
        let raw_mode = read_metadata(&connection, "analyzer")?
            .context("index metadata has no analyzer entry; rebuild the index")?;
        let Some(analyzer) = AnalyzerMode::parse(&raw_mode) else {
            bail!("index was built with unrecognized analyzer mode: {raw_mode}");
        };

        Ok(Self {
            connection,
            analyzer,
        })
    }

    pub fn analyzer(&self) -> AnalyzerMode {
        self.analyzer
    }

    pub fn schema_version(&self) -> Result<Option<String>> {
        read_metadata(&self.connection, "db_schema_version")
    }

    pub fn document_count(&self) -> Result<i64> {
        let count = self
            .connection
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn begin_rebuild(&mut self) -> Result<BulkWriter<'_>> {
        let tx = self
            .connection
            .transaction()
            .context("failed to open bulk indexing transaction")?;
        reset_schema(&tx, self.analyzer)?;
        Ok(BulkWriter {
            tx,
            analyzer: self.analyzer,
            inserted: 0,
        })
    }

    fn clause_scores(&self, clause: &Clause, similarity: Similarity) -> Result<Vec<(i64, f64)>> {
        let Some(expression) = clause.to_fts_match() else {
            return Ok(Vec::new());
        };

        match similarity {
            Similarity::Bm25 => self.bm25_clause_scores(clause, &expression),
            Similarity::Tfidf => self.tfidf_clause_scores(clause, &expression),
        }
    }

    fn bm25_clause_scores(&self, clause: &Clause, expression: &str) -> Result<Vec<(i64, f64)>> {
        let weights = clause.field.bm25_weights();
        let sql = format!(
            "
            SELECT rowid, bm25(documents_fts, {weights})
            FROM documents_fts
            WHERE documents_fts MATCH ?1
            ORDER BY bm25(documents_fts, {weights}) ASC, rowid ASC
            LIMIT ?2
            "
        );

        let mut statement = self.connection.prepare_cached(&sql)?;
        let mut rows = statement
            .query(params![expression, MAX_CLAUSE_CANDIDATES as i64])
            .with_context(|| format!("FTS query failed: {expression}"))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let doc_id: i64 = row.get(0)?;
            let rank: f64 = row.get(1)?;
            // bm25() is negated: lower is better.
            out.push((doc_id, -rank));
        }

        Ok(out)
    }

    fn tfidf_clause_scores(&self, clause: &Clause, expression: &str) -> Result<Vec<(i64, f64)>> {
        let mut statement = self
            .connection
            .prepare_cached("SELECT rowid FROM documents_fts WHERE documents_fts MATCH ?1")?;
        let mut rows = statement
            .query(params![expression])
            .with_context(|| format!("FTS query failed: {expression}"))?;

        let mut matched = HashSet::<i64>::new();
        while let Some(row) = rows.next()? {
            matched.insert(row.get(0)?);
        }
        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let total_documents = self.document_count()?.max(0) as u64;
        let column = clause.field.column();
        let mut scores = HashMap::<i64, f64>::new();

        for term in self.indexed_terms(&clause.terms)? {
            let document_frequency = self.document_frequency(&term, column)?;
            for (doc_id, term_frequency) in self.term_frequencies(&term, column)? {
                if !matched.contains(&doc_id) {
                    continue;
                }
                *scores.entry(doc_id).or_insert(0.0) +=
                    log_tf_idf(document_frequency, total_documents, term_frequency);
            }
        }

        Ok(matched
            .into_iter()
            .map(|doc_id| (doc_id, scores.get(&doc_id).copied().unwrap_or(0.0)))
            .collect())
    }

    fn indexed_terms(&self, terms: &[String]) -> Result<Vec<String>> {
        self.connection
            .execute_batch(&format!(
                "
                CREATE VIRTUAL TABLE IF NOT EXISTS temp.term_probe
                USING fts5(text, tokenize = '{}');

                CREATE VIRTUAL TABLE IF NOT EXISTS temp.term_probe_vocab
                USING fts5vocab(temp, term_probe, 'row');

                DELETE FROM temp.term_probe;
                ",
                self.analyzer.fts_tokenizer()
            ))
            .context("failed to prepare term probe table")?;

        self.connection.execute(
            "INSERT INTO temp.term_probe(text) VALUES(?1)",
            params![terms.join(" ")],
        )?;

        let mut statement = self
            .connection
            .prepare_cached("SELECT term FROM temp.term_probe_vocab ORDER BY term")?;
        let mut rows = statement.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get(0)?);
        }

        Ok(out)
    }

    fn document_frequency(&self, term: &str, column: &str) -> Result<u64> {
        let frequency = self
            .connection
            .query_row(
                "SELECT doc FROM documents_vocab_col WHERE term = ?1 AND col = ?2",
                params![term, column],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(frequency.unwrap_or(0).max(0) as u64)
    }

    fn term_frequencies(&self, term: &str, column: &str) -> Result<Vec<(i64, u64)>> {
        let mut statement = self.connection.prepare_cached(
            "
            SELECT doc, COUNT(*)
            FROM documents_vocab_instance
            WHERE term = ?1 AND col = ?2
            GROUP BY doc
            ",
        )?;
        let mut rows = statement.query(params![term, column])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let doc_id: i64 = row.get(0)?;
            let count: i64 = row.get(1)?;
            out.push((doc_id, count.max(0) as u64));
        }

        Ok(out)
    }
}

impl SearchBackend for FtsIndex {
    fn search(
        &self,
        query: &CompositeQuery,
        top_k: usize,
        similarity: Similarity,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let mut combined = HashMap::<i64, f64>::new();
        for clause in &query.clauses {
            let scores = self.clause_scores(clause, similarity)?;
            debug!(
                field = clause.field.column(),
                kind = ?clause.kind,
                matches = scores.len(),
                "scored clause"
            );
            for (doc_id, score) in scores {
                *combined.entry(doc_id).or_insert(0.0) += clause.boost * score;
            }
        }

        let mut hits = combined
            .into_iter()
            .map(|(doc_id, score)| SearchHit { doc_id, score })
            .collect::<Vec<SearchHit>>();
        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then(left.doc_id.cmp(&right.doc_id))
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    fn title(&self, doc_id: i64) -> Result<String> {
        self.connection
            .query_row(
                "SELECT title FROM documents WHERE doc_id = ?1",
                params![doc_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .with_context(|| format!("document {doc_id} missing from index"))
    }
}

pub struct BulkWriter<'conn> {
    tx: Transaction<'conn>,
    analyzer: AnalyzerMode,
    inserted: usize,
}

impl BulkWriter<'_> {
    pub fn add(&mut self, record: &DocumentRecord, source_file: &str) -> Result<()> {
        let file_refs = serde_json::to_string(&record.file_refs)
            .context("failed to serialize file references")?;

        self.tx
            .prepare_cached(
                "
                INSERT INTO documents(doc_id, title, body, categories, file_refs, source_file)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?
            .execute(params![
                record.id,
                &record.title,
                &record.body,
                &record.categories,
                file_refs,
                source_file,
            ])
            .with_context(|| format!("failed to store document {}", record.id))?;

        self.tx
            .prepare_cached(
                "INSERT INTO documents_fts(rowid, body, categories) VALUES(?1, ?2, ?3)",
            )?
            .execute(params![
                record.id,
                index_text(&record.body, self.analyzer),
                record
                    .categories
                    .as_deref()
                    .map(|value| index_text(value, self.analyzer)),
            ])
            .with_context(|| format!("failed to index document {}", record.id))?;

        self.inserted += 1;
        Ok(())
    }

    pub fn commit(self) -> Result<usize> {
        self.tx
            .commit()
            .context("failed to commit bulk indexing transaction")?;
        Ok(self.inserted)
    }
}

fn reset_schema(connection: &Connection, analyzer: AnalyzerMode) -> Result<()> {
    connection
        .execute_batch(
            "
            DROP TABLE IF EXISTS documents_vocab_col;
            DROP TABLE IF EXISTS documents_vocab_instance;
            DROP TABLE IF EXISTS documents_fts;
            DROP TABLE IF EXISTS documents;
            DROP TABLE IF EXISTS metadata;

            CREATE TABLE metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE documents (
              doc_id INTEGER PRIMARY KEY,
              title TEXT NOT NULL,
              body TEXT NOT NULL,
              categories TEXT,
              file_refs TEXT NOT NULL,
              source_file TEXT NOT NULL
            );
            ",
        )
        .context("failed to reset index schema")?;

    connection
        .execute_batch(&format!(
            "
            CREATE VIRTUAL TABLE documents_fts
            USING fts5(body, categories, tokenize = '{}');

            CREATE VIRTUAL TABLE documents_vocab_col
            USING fts5vocab(documents_fts, 'col');

            CREATE VIRTUAL TABLE documents_vocab_instance
            USING fts5vocab(documents_fts, 'instance');
            ",
            analyzer.fts_tokenizer()
        ))
        .context("failed to initialize FTS5 table documents_fts")?;

    for (key, value) in [
        ("db_schema_version", DB_SCHEMA_VERSION.to_string()),
        ("analyzer", analyzer.as_str().to_string()),
        ("created_at", now_utc_string()),
    ] {
        connection.execute(
            "INSERT INTO metadata(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
    }

    Ok(())
}

fn read_metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    let value = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read index metadata key {key}"))?;
    Ok(value)
}

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}
