use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{StatusArgs, default_db_path};
use crate::commands::open_index;

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root, args.analyzer));
    let questions_path = args.cache_root.join("questions.txt");

    info!(cache_root = %args.cache_root.display(), "status requested");

    if db_path.exists() {
        let index = open_index(&db_path, args.analyzer)?;
        info!(
            path = %db_path.display(),
            analyzer = index.analyzer().as_str(),
            schema_version = %index.schema_version()?.unwrap_or_default(),
            documents = index.document_count()?,
            "index status"
        );
    } else {
        warn!(path = %db_path.display(), "index database missing");
    }

    if questions_path.exists() {
        info!(path = %questions_path.display(), "question file present");
    } else {
        warn!(path = %questions_path.display(), "question file missing");
    }

    Ok(())
}
