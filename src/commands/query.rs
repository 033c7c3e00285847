use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::cli::{QueryArgs, default_db_path};
use crate::commands::evaluate::{QueryOptions, search_question};
use crate::commands::open_index;
use crate::model::{QuestionRecord, RankedResult};

#[derive(Debug, Serialize)]
struct QueryResponse {
    clue: String,
    category: String,
    analyzer: String,
    similarity: String,
    result_mode: String,
    requested_hits: usize,
    query_duration_ms: f64,
    results: Vec<RankedResult>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let query_started = Instant::now();
    if args.clue.trim().is_empty() && args.category.trim().is_empty() {
        bail!("clue and category must not both be empty");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root, args.analyzer));
    let index = open_index(&db_path, args.analyzer)?;
    let options = QueryOptions::new(&args.search, index.analyzer());

    let question = QuestionRecord {
        category: args.category.clone(),
        clue: args.clue.clone(),
        answer: String::new(),
    };
    let results = search_question(&index, &question, &options)?;

    let response = QueryResponse {
        clue: args.clue,
        category: args.category,
        analyzer: options.analyzer.as_str().to_string(),
        similarity: options.similarity.as_str().to_string(),
        result_mode: options.result_mode.as_str().to_string(),
        requested_hits: options.requested_hits(),
        query_duration_ms: query_started.elapsed().as_secs_f64() * 1000.0,
        results,
    };
    info!(
        returned = response.results.len(),
        duration_ms = response.query_duration_ms,
        "query completed"
    );

    if args.json {
        write_json_response(&response)
    } else {
        write_text_response(&response)
    }
}

fn write_json_response(response: &QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, response)
        .context("failed to serialize query json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_response(response: &QueryResponse) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Clue: {}", response.clue)?;
    if !response.category.is_empty() {
        writeln!(output, "Category: {}", response.category)?;
    }
    writeln!(
        output,
        "Retrieval: analyzer={} similarity={} result_mode={} requested={} duration_ms={:.3}",
        response.analyzer,
        response.similarity,
        response.result_mode,
        response.requested_hits,
        response.query_duration_ms,
    )?;
    writeln!(output, "Results: {}", response.results.len())?;

    for result in &response.results {
        let title = if result.title.is_empty() {
            "(untitled)"
        } else {
            &result.title
        };
        writeln!(
            output,
            "{}.\t{}\tscore={:.6}\tdoc_id={}",
            result.rank, title, result.score, result.doc_id
        )?;
    }

    output.flush()?;
    Ok(())
}
