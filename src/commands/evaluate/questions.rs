use std::io::BufRead;

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::QuestionRecord;

const LINES_PER_QUESTION: usize = 4;

pub fn read_questions<R: BufRead>(reader: R) -> Result<Vec<QuestionRecord>> {
    let mut lines = reader.lines();
    let mut questions = Vec::new();

    loop {
        let mut group = Vec::with_capacity(LINES_PER_QUESTION);
        while group.len() < LINES_PER_QUESTION {
            let Some(line) = lines.next() else {
                break;
            };
            group.push(line.with_context(|| {
                format!("failed to read question {}", questions.len() + 1)
            })?);
        }

        if group.len() < LINES_PER_QUESTION - 1 {
            if !group.is_empty() {
                warn!(
                    question = questions.len() + 1,
                    lines = group.len(),
                    "discarding incomplete trailing question"
                );
            }
            break;
        }

        let complete = group.len() == LINES_PER_QUESTION;
        let mut fields = group.into_iter();
        questions.push(QuestionRecord {
            category: fields.next().unwrap_or_default(),
            clue: fields.next().unwrap_or_default(),
            answer: fields.next().unwrap_or_default(),
        });

        if !complete {
            break;
        }
    }

    Ok(questions)
}
