//! Streaming row reads over newline-delimited files
//!
//! Reads never hold more than one window of the file beyond the rows they
//! return. Only `\n`-terminated rows are visible: a trailing fragment left by
//! an in-flight append is ignored, so readers never see a torn row.

use crate::internal::{InternalRecord, TagFilter};
use std::collections::{BTreeSet, VecDeque};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes buffered per read
pub const READ_WINDOW: usize = 64 * 1024;

/// Rows `[start, end)` of the file, clipped to what exists
pub fn read_line_range(path: &Path, start: usize, end: usize) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::with_capacity(READ_WINDOW, File::open(path)?);
    let mut out = Vec::new();
    let mut line = Vec::new();
    let mut index = 0usize;

    while index < end {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 || line.last() != Some(&b'\n') {
            break;
        }
        if index >= start {
            out.extend_from_slice(&line);
        }
        index += 1;
    }
    Ok(out)
}

/// The last `n` complete rows of the file, found by scanning backwards
pub fn read_last_lines(path: &Path, n: usize) -> io::Result<Vec<u8>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut file = File::open(path)?;
    let mut pos = file.metadata()?.len();
    let mut buf = vec![0u8; READ_WINDOW];

    // Offset just past the last newline; anything after it is a fragment
    let mut end: Option<u64> = None;
    let mut start = 0u64;
    let mut boundaries = 0usize;

    'scan: while pos > 0 {
        let chunk = (READ_WINDOW as u64).min(pos);
        pos -= chunk;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut buf[..chunk as usize])?;

        for i in (0..chunk as usize).rev() {
            if buf[i] != b'\n' {
                continue;
            }
            let offset = pos + i as u64;
            if end.is_none() {
                end = Some(offset + 1);
                continue;
            }
            boundaries += 1;
            if boundaries == n {
                start = offset + 1;
                break 'scan;
            }
        }
    }

    let Some(end) = end else {
        return Ok(Vec::new());
    };

    file.seek(SeekFrom::Start(start))?;
    let mut out = Vec::with_capacity((end - start) as usize);
    file.take(end - start).read_to_end(&mut out)?;
    Ok(out)
}

/// Number of complete rows in the file
pub fn count_lines(path: &Path) -> io::Result<usize> {
    let mut reader = BufReader::with_capacity(READ_WINDOW, File::open(path)?);
    let mut count = 0usize;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        count += buf.iter().filter(|b| **b == b'\n').count();
        let len = buf.len();
        reader.consume(len);
    }
    Ok(count)
}

/// Data and internal rows whose internal record passes `filter`.
///
/// The internal file is scanned once to pick row indices (keeping only the
/// last `limit` when given), then the data file once to collect them.
pub fn read_tag_filtered(
    data_path: &Path,
    internal_path: &Path,
    filter: &TagFilter,
    limit: Option<usize>,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    if limit == Some(0) {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut reader = BufReader::with_capacity(READ_WINDOW, File::open(internal_path)?);
    let mut selected: VecDeque<(usize, Vec<u8>)> = VecDeque::new();
    let mut line = Vec::new();
    let mut index = 0usize;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 || line.last() != Some(&b'\n') {
            break;
        }
        let record = InternalRecord::parse_line(&line[..line.len() - 1])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if filter.matches(&record.tags) {
            selected.push_back((index, line.clone()));
            if limit.map_or(false, |max| selected.len() > max) {
                selected.pop_front();
            }
        }
        index += 1;
    }

    let wanted: BTreeSet<usize> = selected.iter().map(|(i, _)| *i).collect();
    let internal: Vec<u8> = selected.into_iter().flat_map(|(_, l)| l).collect();

    let mut data = Vec::new();
    let Some(&last_wanted) = wanted.iter().next_back() else {
        return Ok((data, internal));
    };

    let mut reader = BufReader::with_capacity(READ_WINDOW, File::open(data_path)?);
    let mut index = 0usize;
    while index <= last_wanted {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 || line.last() != Some(&b'\n') {
            break;
        }
        if wanted.contains(&index) {
            data.extend_from_slice(&line);
        }
        index += 1;
    }
    Ok((data, internal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    fn numbered(rows: usize) -> Vec<u8> {
        (0..rows).flat_map(|i| format!("row-{}\n", i).into_bytes()).collect()
    }

    #[test]
    fn test_line_range() {
        let file = file_with(&numbered(10));
        let rows = read_line_range(file.path(), 3, 6).unwrap();
        assert_eq!(rows, b"row-3\nrow-4\nrow-5\n".to_vec());

        let clipped = read_line_range(file.path(), 8, 50).unwrap();
        assert_eq!(clipped, b"row-8\nrow-9\n".to_vec());

        assert!(read_line_range(file.path(), 20, 30).unwrap().is_empty());
    }

    #[test]
    fn test_last_lines() {
        let file = file_with(&numbered(10));
        assert_eq!(read_last_lines(file.path(), 2).unwrap(), b"row-8\nrow-9\n".to_vec());
        assert_eq!(read_last_lines(file.path(), 100).unwrap(), numbered(10));
        assert!(read_last_lines(file.path(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_last_lines_across_windows() {
        // Rows far larger than one window in total
        let contents = numbered(30_000);
        assert!(contents.len() > READ_WINDOW * 2);
        let file = file_with(&contents);

        let tail = read_last_lines(file.path(), 20_000).unwrap();
        let expected: Vec<u8> = (10_000..30_000)
            .flat_map(|i| format!("row-{}\n", i).into_bytes())
            .collect();
        assert_eq!(tail, expected);
    }

    #[test]
    fn test_fragment_is_invisible() {
        let file = file_with(b"a\nb\npartial");
        assert_eq!(read_last_lines(file.path(), 1).unwrap(), b"b\n".to_vec());
        assert_eq!(read_line_range(file.path(), 0, 5).unwrap(), b"a\nb\n".to_vec());
        assert_eq!(count_lines(file.path()).unwrap(), 2);

        let only_fragment = file_with(b"partial");
        assert!(read_last_lines(only_fragment.path(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_tag_filtered() {
        let now = Utc::now();
        let internal: Vec<u8> = (0..6)
            .flat_map(|i| {
                let mut record = InternalRecord {
                    id: format!("id-{}", i),
                    tags: Default::default(),
                    timestamp: now,
                };
                if i % 2 == 0 {
                    record.tags.insert("EVEN".to_string());
                }
                record.to_line().unwrap()
            })
            .collect();
        let data_file = file_with(&numbered(6));
        let internal_file = file_with(&internal);

        let even = TagFilter::only(["EVEN"]);
        let (data, _) =
            read_tag_filtered(data_file.path(), internal_file.path(), &even, None).unwrap();
        assert_eq!(data, b"row-0\nrow-2\nrow-4\n".to_vec());

        let (data, internal) = read_tag_filtered(
            data_file.path(),
            internal_file.path(),
            &TagFilter::excluding(["EVEN"]),
            Some(2),
        )
        .unwrap();
        assert_eq!(data, b"row-3\nrow-5\n".to_vec());
        assert_eq!(internal.iter().filter(|b| **b == b'\n').count(), 2);
    }
}
