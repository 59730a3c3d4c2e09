//! Row slicing over in-memory newline-delimited buffers

/// Split a buffer into rows. A trailing segment without `\n` still counts as a row.
pub fn split_rows(bytes: &[u8]) -> Vec<&[u8]> {
    let mut rows: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    // split yields one empty tail after a terminating newline
    if rows.last().map_or(false, |tail| tail.is_empty()) {
        rows.pop();
    }
    rows
}

/// Join rows back into a buffer, each terminated by `\n`
pub fn join_rows<'a, I>(rows: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut out = Vec::new();
    for row in rows {
        out.extend_from_slice(row);
        out.push(b'\n');
    }
    out
}

/// The last `n` rows of `bytes`
pub fn last_rows(bytes: &[u8], n: usize) -> Vec<u8> {
    let rows = split_rows(bytes);
    let skip = rows.len().saturating_sub(n);
    join_rows(rows.into_iter().skip(skip))
}

/// Rows `[start, end)` of `bytes`, clipped to what exists
pub fn row_range(bytes: &[u8], start: usize, end: usize) -> Vec<u8> {
    let rows = split_rows(bytes);
    let end = end.min(rows.len());
    if start >= end {
        return Vec::new();
    }
    join_rows(rows[start..end].iter().copied())
}
