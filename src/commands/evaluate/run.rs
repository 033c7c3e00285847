use std::fs::File;
use std::io::{self, BufReader, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use super::accumulator::{AnswerMatcher, EvaluationState, EvaluationSummary};
use super::dedup::{dedup_by_title, rank_hits};
use super::query_builder::{QueryOptions, build_query};
use super::questions::read_questions;
use crate::cli::{AnswerMatch, EvaluateArgs, ResultMode, default_db_path};
use crate::commands::open_index;
use crate::model::{EvaluationReport, QuestionRecord, RankedResult};
use crate::search::SearchBackend;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

pub fn run(args: EvaluateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("eval-{}", utc_compact_string(started_ts));

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root, args.analyzer));
    let questions_path = args
        .questions
        .clone()
        .unwrap_or_else(|| args.cache_root.join("questions.txt"));
    let report_path = args.report_path.clone().unwrap_or_else(|| {
        args.cache_root.join("reports").join(format!(
            "evaluation_{}.json",
            utc_compact_string(started_ts)
        ))
    });

    let index = open_index(&db_path, args.analyzer)?;

    let file = File::open(&questions_path)
        .with_context(|| format!("failed to open {}", questions_path.display()))?;
    let questions = read_questions(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", questions_path.display()))?;

    let options = QueryOptions::new(&args.search, index.analyzer());
    info!(
        run_id = %run_id,
        questions = questions.len(),
        analyzer = options.analyzer.as_str(),
        similarity = options.similarity.as_str(),
        result_mode = options.result_mode.as_str(),
        "starting evaluation"
    );

    let summary = evaluate_questions(
        &index,
        &questions,
        &options,
        args.answer_match,
        args.expected_questions,
    )?;

    let report = EvaluationReport {
        report_version: 1,
        run_id,
        started_at,
        completed_at: now_utc_string(),
        db_path: db_path.display().to_string(),
        questions_path: questions_path.display().to_string(),
        analyzer: options.analyzer.as_str().to_string(),
        similarity: options.similarity.as_str().to_string(),
        result_mode: options.result_mode.as_str().to_string(),
        answer_match: args.answer_match.as_str().to_string(),
        top_k: options.top_k,
        hits_per_page: options.requested_hits(),
        expected_questions: args.expected_questions,
        total_questions: summary.total_questions,
        matches_at_any_rank: summary.matches_at_any_rank,
        matches_at_rank_one: summary.matches_at_rank_one,
        precision_at_one: summary.precision_at_one,
        hits_by_rank: summary.hits_by_rank,
        questions: summary.questions,
    };

    if args.json {
        write_json_report(&report)?;
    } else {
        write_text_report(&report)?;
    }

    write_json_pretty(&report_path, &report)?;
    info!(path = %report_path.display(), "wrote evaluation report");

    Ok(())
}

pub(super) fn evaluate_questions<B: SearchBackend>(
    backend: &B,
    questions: &[QuestionRecord],
    options: &QueryOptions,
    answer_match: AnswerMatch,
    expected_questions: usize,
) -> Result<EvaluationSummary> {
    let mut state = EvaluationState::new(options.top_k);

    for (index, question) in questions.iter().enumerate() {
        let number = index + 1;
        let results = search_question(backend, question, options)
            .with_context(|| format!("search failed for question {number}"))?;

        let matcher = AnswerMatcher::new(&question.answer, answer_match);
        let answer = question.answer.to_lowercase();
        info!(question = number, answer = %answer, returned = results.len(), "evaluated question");

        if let Some(rank) = state.record(&question.answer, &results, &matcher) {
            info!(question = number, answer = %answer, rank, "document hit");
        }
    }

    Ok(state.finish(expected_questions))
}

pub(crate) fn search_question<B: SearchBackend>(
    backend: &B,
    question: &QuestionRecord,
    options: &QueryOptions,
) -> Result<Vec<RankedResult>> {
    let built = build_query(question, options);
    let hits = backend.search(&built.query, built.hits_per_page, options.similarity)?;

    match options.result_mode {
        ResultMode::Dedup => dedup_by_title(&hits, options.top_k, |doc_id| backend.title(doc_id)),
        ResultMode::Raw => rank_hits(&hits, |doc_id| backend.title(doc_id)),
    }
}

fn write_json_report(report: &EvaluationReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, report)
        .context("failed to serialize evaluation json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_report(report: &EvaluationReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Evaluation: analyzer={} similarity={} result_mode={} answer_match={}",
        report.analyzer, report.similarity, report.result_mode, report.answer_match
    )?;
    writeln!(
        output,
        "Questions: processed={} expected={}",
        report.total_questions, report.expected_questions
    )?;
    writeln!(
        output,
        "Total hits in top {} docs: {}",
        report.top_k, report.matches_at_any_rank
    )?;
    writeln!(output, "P@1: {:.4}", report.precision_at_one)?;
    for bucket in &report.hits_by_rank {
        writeln!(output, "Docs in position {}: {}", bucket.rank, bucket.count)?;
    }

    output.flush()?;
    Ok(())
}
