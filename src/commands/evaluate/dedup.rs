use std::collections::HashSet;

use anyhow::Result;

use crate::model::RankedResult;
use crate::search::SearchHit;

pub fn dedup_by_title<F>(hits: &[SearchHit], k: usize, mut title_of: F) -> Result<Vec<RankedResult>>
where
    F: FnMut(i64) -> Result<String>,
{
    let mut seen = HashSet::<String>::new();
    let mut out = Vec::with_capacity(k.min(hits.len()));

    for hit in hits {
        if out.len() == k {
            break;
        }

        let title = title_of(hit.doc_id)?;
        if !seen.insert(title.clone()) {
            continue;
        }

        out.push(RankedResult {
            rank: out.len() + 1,
            doc_id: hit.doc_id,
            title,
            score: hit.score,
        });
    }

    Ok(out)
}

pub fn rank_hits<F>(hits: &[SearchHit], mut title_of: F) -> Result<Vec<RankedResult>>
where
    F: FnMut(i64) -> Result<String>,
{
    hits.iter()
        .enumerate()
        .map(|(index, hit)| {
            Ok(RankedResult {
                rank: index + 1,
                doc_id: hit.doc_id,
                title: title_of(hit.doc_id)?,
                score: hit.score,
            })
        })
        .collect()
}
