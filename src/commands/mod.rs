use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use crate::cli::AnalyzerMode;
use crate::search::FtsIndex;

pub mod evaluate;
pub mod index;
pub mod query;
pub mod status;

pub(crate) fn open_index(db_path: &Path, requested: AnalyzerMode) -> Result<FtsIndex> {
    if !db_path.exists() {
        bail!(
            "index not found: {} (build it with `wikiqa index`)",
            db_path.display()
        );
    }

    let connection = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open index: {}", db_path.display()))?;

    let index = FtsIndex::open(connection)
        .with_context(|| format!("failed to load index: {}", db_path.display()))?;

    if index.analyzer() != requested {
        warn!(
            requested = requested.as_str(),
            indexed = index.analyzer().as_str(),
            "index was built with a different analyzer; using the index's analyzer"
        );
    }

    Ok(index)
}
