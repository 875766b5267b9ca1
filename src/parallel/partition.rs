//! Contiguous row-range assignment shared by every parallel backend.
//!
//! All backends split rows the same way so that a given worker count maps rows
//! to workers identically everywhere.

use std::ops::Range;

/// Split `[0, rows)` into contiguous half-open ranges of `ceil(rows / workers)`
/// rows each, the last possibly shorter. Ranges that would start at or past
/// `rows` are dropped, so `workers > rows` yields `rows` single-row ranges.
pub fn partition(rows: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = rows.div_ceil(workers);

    (0..workers)
        .map(|i| {
            let start = i * chunk;
            start..(start + chunk).min(rows)
        })
        .filter(|r| r.start < r.end)
        .collect()
}

/// Cut a row-major buffer into one mutable slice per range.
///
/// `ranges` must be contiguous from row 0, as produced by [`partition`]. Each
/// slice is exclusively owned by one worker for the duration of a phase; the
/// disjointness comes from `split_at_mut`, not from any lock.
pub fn split_rows_mut<'a, T>(
    buf: &'a mut [T],
    row_len: usize,
    ranges: &[Range<usize>],
) -> Vec<&'a mut [T]> {
    let mut out = Vec::with_capacity(ranges.len());
    let mut rest = buf;

    for range in ranges {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len() * row_len);
        out.push(head);
        rest = tail;
    }

    out
}
