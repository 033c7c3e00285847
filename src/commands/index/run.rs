use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::parser::DocumentParser;
use crate::cli::{IndexArgs, default_db_path};
use crate::model::{CorpusFileEntry, IndexPaths, IndexRunManifest};
use crate::search::{BulkWriter, DB_SCHEMA_VERSION, FtsIndex, configure_connection};
use crate::util::{
    ensure_directory, list_regular_files, now_utc_string, sha256_hex, utc_compact_string,
    write_json_pretty,
};

pub fn run(args: IndexArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("index-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let corpus_dir = args
        .corpus_dir
        .clone()
        .unwrap_or_else(|| cache_root.join("wiki-data"));
    let manifest_path = args.index_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("index_run_{}.json", utc_compact_string(started_ts)))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&cache_root, args.analyzer));

    let files = list_regular_files(&corpus_dir)?;
    if files.is_empty() {
        bail!("no corpus files found in {}", corpus_dir.display());
    }

    info!(
        run_id = %run_id,
        corpus_dir = %corpus_dir.display(),
        analyzer = args.analyzer.as_str(),
        files = files.len(),
        "starting index build"
    );

    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }
    let connection = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;

    let mut index = FtsIndex::new(connection, args.analyzer);
    let corpus = index_corpus_files(&mut index, &files)?;
    let documents_total = index.document_count()?;

    let manifest = IndexRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        analyzer: args.analyzer.as_str().to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        paths: IndexPaths {
            cache_root: cache_root.display().to_string(),
            corpus_dir: corpus_dir.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        file_count: corpus.files.len(),
        documents_total,
        untitled_documents: corpus.untitled_documents,
        files: corpus.files,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote index run manifest");
    info!(documents = documents_total, db = %db_path.display(), "index build completed");

    Ok(())
}

#[derive(Debug, Default)]
pub(super) struct CorpusStats {
    pub files: Vec<CorpusFileEntry>,
    pub untitled_documents: usize,
}

pub(super) fn index_corpus_files(index: &mut FtsIndex, files: &[PathBuf]) -> Result<CorpusStats> {
    let mut writer = index.begin_rebuild()?;
    let mut stats = CorpusStats::default();
    let mut next_id = 0_i64;

    for path in files {
        let filename = file_name(path)?;
        info!(file = %filename, "indexing corpus file");

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let sha256 = sha256_hex(&raw);

        let (document_count, untitled, following_id) =
            index_source(&mut writer, raw.as_slice(), &filename, next_id)
                .with_context(|| format!("failed to index {}", path.display()))?;
        next_id = following_id;
        stats.untitled_documents += untitled;
        stats.files.push(CorpusFileEntry {
            filename,
            sha256,
            document_count,
        });
    }

    let inserted = writer.commit()?;
    debug!(inserted, "bulk load committed");
    Ok(stats)
}

pub(super) fn index_source<R: BufRead>(
    writer: &mut BulkWriter<'_>,
    reader: R,
    source_file: &str,
    first_id: i64,
) -> Result<(usize, usize, i64)> {
    let mut parser = DocumentParser::with_first_id(reader, first_id);
    let mut document_count = 0;
    let mut untitled = 0;

    for record in parser.by_ref() {
        let record = record.context("failed to read corpus line")?;
        if record.title.is_empty() {
            warn!(source = source_file, doc_id = record.id, "document without a title");
            untitled += 1;
        }
        debug!(doc_id = record.id, title = %record.title, "parsed document");
        writer.add(&record, source_file)?;
        document_count += 1;
    }

    Ok((document_count, untitled, parser.next_id()))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}
