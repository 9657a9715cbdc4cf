//! Ground truth & observable reporting (C11): brute-force furthest-`MAXK`
//! computation, the text ground-truth file format (§6), and the
//! recall/ratio metrics a benchmark run reports (§4.11). Grounded in
//! `original_source/util.cc`'s `ground_truth`/`read_ground_truth`/
//! `calc_recall`.

use std::fs;
use std::path::Path;

use crate::consts::MAXK;
use crate::context::QueryContext;
use crate::error::{AfnError, Result};
use crate::heap::{FnResult, TopKHeap};
use crate::linear_scan::linear_scan;

/// Brute-force furthest-`MAXK` neighbors for every query, largest key
/// first.
#[must_use]
pub fn ground_truth(vectors: &[&[f32]], queries: &[&[f32]]) -> Vec<Vec<FnResult>> {
    queries
        .iter()
        .map(|q| {
            let mut ctx = QueryContext::new(MAXK);
            linear_scan(vectors, q, &mut ctx);
            ctx.heap.as_slice().to_vec()
        })
        .collect()
}

/// Writes the text ground-truth format: header `"<qn> <MAXK>\n"`, then one
/// line per query, `"id0 key0 id1 key1 ... \n"`. Always writes exactly
/// `MAXK` pairs per row, padding any slot beyond `row.len()` with
/// `id = -1, key = -inf` (matching `original_source/util.cc`'s
/// `ith_id`/`ith_key` padding for an underfull `MaxK_List`) so the row
/// width is fixed regardless of how few candidates a query's heap held.
pub fn write_ground_truth(path: impl AsRef<Path>, truth: &[Vec<FnResult>]) -> Result<()> {
    let path = path.as_ref();
    let mut out = format!("{} {}\n", truth.len(), MAXK);
    for row in truth {
        for j in 0..MAXK {
            match row.get(j) {
                Some(r) => out.push_str(&format!("{} {} ", r.id, r.key)),
                None => out.push_str(&format!("{} {} ", -1, f32::NEG_INFINITY)),
            }
        }
        out.push('\n');
    }
    fs::write(path, out).map_err(|e| AfnError::io("write", path, e))
}

/// Reads the text ground-truth format back, validating the declared query
/// count and `MAXK`.
pub fn read_ground_truth(path: impl AsRef<Path>) -> Result<Vec<Vec<FnResult>>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| AfnError::io("read", path, e))?;
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| AfnError::Invariant("ground-truth file is empty".to_string()))?;
    let mut header_fields = header.split_whitespace();
    let qn: usize = header_fields
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AfnError::Invariant("malformed ground-truth header".to_string()))?;
    let maxk: usize = header_fields
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AfnError::Invariant("malformed ground-truth header".to_string()))?;
    if maxk != MAXK {
        return Err(AfnError::Invariant(format!(
            "ground-truth file declares MAXK={maxk}, expected {MAXK}"
        )));
    }

    let mut truth = Vec::with_capacity(qn);
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 * maxk {
            return Err(AfnError::Invariant(format!(
                "ground-truth row has {} fields, expected {}",
                fields.len(),
                2 * maxk
            )));
        }
        let mut row = Vec::with_capacity(maxk);
        for pair in fields.chunks(2) {
            let id: i32 = pair[0]
                .parse()
                .map_err(|_| AfnError::Invariant("malformed ground-truth id".to_string()))?;
            let key: f32 = pair[1]
                .parse()
                .map_err(|_| AfnError::Invariant("malformed ground-truth key".to_string()))?;
            row.push(FnResult::new(key, id));
        }
        truth.push(row);
    }
    if truth.len() != qn {
        return Err(AfnError::Invariant(format!(
            "ground-truth file declares {qn} queries, found {}",
            truth.len()
        )));
    }
    Ok(truth)
}

/// `100 * |{j : heap.ith_key(j) >= truth[k-1].key}| / k` (§4.11).
#[must_use]
pub fn calc_recall(k: usize, truth: &[FnResult], heap: &TopKHeap) -> f32 {
    let last = truth[k - 1].key;
    let mut i = k as isize - 1;
    while i >= 0 && heap.ith_key(i as usize) < last {
        i -= 1;
    }
    (i + 1) as f32 * 100.0 / k as f32
}

/// `(sum_j truth[j].key / heap.ith_key(j)) / k`, or `0.0` (per the design
/// note on the reference's `-inf` division artifact) if the heap hasn't
/// been filled to `k` entries.
#[must_use]
pub fn calc_ratio(k: usize, truth: &[FnResult], heap: &TopKHeap) -> f32 {
    if heap.len() < k {
        return 0.0;
    }
    let sum: f32 = (0..k).map(|j| truth[j].key / heap.ith_key(j)).sum();
    sum / k as f32
}
