use std::borrow::Cow;
use std::io::{self, BufRead};

use tracing::warn;

use crate::model::DocumentRecord;

const TITLE_OPEN: &str = "[[";
const TITLE_CLOSE: &str = "]]";
const FILE_REF_MARKER: &str = "[[File:";
const CATEGORY_MARKER: &str = "CATEGORIES:";

#[derive(Debug, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Title(&'a str),
    FileRef(&'a str),
    Category(&'a str),
    Content(Cow<'a, str>),
}

fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return LineKind::Blank;
    }

    if line.starts_with(FILE_REF_MARKER) {
        return LineKind::FileRef(line);
    }

    if line.starts_with(TITLE_OPEN) && line.ends_with(TITLE_CLOSE) {
        return LineKind::Title(&line[TITLE_OPEN.len()..line.len() - TITLE_CLOSE.len()]);
    }

    if let Some(rest) = line.strip_prefix(CATEGORY_MARKER)
        && (rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        return LineKind::Category(rest.trim());
    }

    if line.starts_with('=') && line.ends_with('=') {
        return LineKind::Content(Cow::Owned(line.replace('=', "")));
    }

    LineKind::Content(Cow::Borrowed(line))
}

pub struct DocumentParser<R> {
    reader: R,
    line_number: usize,
    next_id: i64,
    current: DocumentRecord,
    titled: bool,
    finished: bool,
}

impl<R: BufRead> DocumentParser<R> {
    pub fn new(reader: R) -> Self {
        Self::with_first_id(reader, 0)
    }

    pub fn with_first_id(reader: R, first_id: i64) -> Self {
        Self {
            reader,
            line_number: 0,
            next_id: first_id,
            current: DocumentRecord::default(),
            titled: false,
            finished: false,
        }
    }

    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        match String::from_utf8(buf) {
            Ok(line) => Ok(Some(line)),
            Err(err) => {
                warn!(
                    line = self.line_number,
                    "corpus line is not valid UTF-8; replacing undecodable bytes"
                );
                Ok(Some(String::from_utf8_lossy(err.as_bytes()).into_owned()))
            }
        }
    }

    fn consume_line(&mut self, line: &str) -> Option<DocumentRecord> {
        match classify(line) {
            LineKind::Blank => None,
            LineKind::Title(title) => {
                let finished = if self.titled || has_content(&self.current) {
                    Some(self.take_current())
                } else {
                    None
                };
                self.current.title = title.to_string();
                self.titled = true;
                finished
            }
            LineKind::FileRef(reference) => {
                self.current.file_refs.push(reference.to_string());
                None
            }
            LineKind::Category(categories) => {
                self.current.categories = Some(categories.to_string());
                None
            }
            LineKind::Content(text) => {
                if self.current.body.is_empty() {
                    self.current.body = text.into_owned();
                } else {
                    self.current.body.push('\n');
                    self.current.body.push_str(&text);
                }
                None
            }
        }
    }

    fn take_current(&mut self) -> DocumentRecord {
        let mut record = std::mem::take(&mut self.current);
        record.id = self.next_id;
        self.next_id += 1;
        self.titled = false;
        record
    }
}

fn has_content(record: &DocumentRecord) -> bool {
    !record.body.is_empty() || record.categories.is_some() || !record.file_refs.is_empty()
}

impl<R: BufRead> Iterator for DocumentParser<R> {
    type Item = io::Result<DocumentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.read_line() {
                Ok(Some(line)) => {
                    if let Some(record) = self.consume_line(&line) {
                        return Some(Ok(record));
                    }
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                Ok(None) => {
                    self.finished = true;
                    return Some(Ok(self.take_current()));
                }
            }
        }
    }
}
