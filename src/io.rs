//! File formats (§6): binary/text vector files and the directory-of-pages
//! dataset layout used by the CLI's external-mode data folder (`-df`).
//! Grounded in `original_source/util.cc`'s `read_bin_data` plus the paged
//! layout described in §4.10/§6.

use std::fs;
use std::path::Path;

use crate::context::QueryContext;
use crate::error::{AfnError, Result};

/// Reads a raw little-endian `f32` stream of exactly `n * d` values.
pub fn read_bin_vectors(path: impl AsRef<Path>, n: usize, d: usize) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| AfnError::io("read", path, e))?;
    let expected = n * d * 4;
    if bytes.len() != expected {
        return Err(AfnError::Invariant(format!(
            "{}: expected {expected} bytes for n={n} d={d}, got {}",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

/// Writes a flat row-major buffer as a raw little-endian `f32` stream.
pub fn write_bin_vectors(path: impl AsRef<Path>, data: &[f32]) -> Result<()> {
    let path = path.as_ref();
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for x in data {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    fs::write(path, bytes).map_err(|e| AfnError::io("write", path, e))
}

/// Reads the legacy text format: one vector per line, `"id f1 f2 ... fd\n"`
/// with 1-indexed ids. Rows may arrive in any order.
pub fn read_text_vectors(path: impl AsRef<Path>, n: usize, d: usize) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| AfnError::io("read", path, e))?;
    let mut data = vec![0.0f32; n * d];
    let mut seen = vec![false; n];

    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != d + 1 {
            return Err(AfnError::Invariant(format!(
                "{}: expected {} fields per line, got {}",
                path.display(),
                d + 1,
                fields.len()
            )));
        }
        let id1: usize = fields[0]
            .parse()
            .map_err(|_| AfnError::Invariant("malformed 1-indexed id".to_string()))?;
        if id1 == 0 || id1 > n {
            return Err(AfnError::Invariant(format!("id {id1} out of range [1, {n}]")));
        }
        let id = id1 - 1;
        for (i, field) in fields[1..].iter().enumerate() {
            data[id * d + i] = field
                .parse()
                .map_err(|_| AfnError::Invariant("malformed vector component".to_string()))?;
        }
        seen[id] = true;
    }
    if !seen.iter().all(|&s| s) {
        return Err(AfnError::Invariant(format!(
            "{}: fewer than {n} rows present",
            path.display()
        )));
    }
    Ok(data)
}

/// Writes the directory-of-pages layout: `folder/0.data`, `folder/1.data`,
/// ..., each exactly `page_size` bytes, little-endian `f32`, zero-padded.
/// Returns `num_per_page`.
pub fn write_paged_dataset(
    folder: impl AsRef<Path>,
    vectors: &[&[f32]],
    d: usize,
    page_size: usize,
) -> Result<usize> {
    let folder = folder.as_ref();
    fs::create_dir_all(folder).map_err(|e| AfnError::io("create", folder, e))?;
    let num_per_page = page_size / (d * 4);
    if num_per_page == 0 {
        return Err(AfnError::Config(format!(
            "page size {page_size} cannot hold even one {d}-dimensional vector"
        )));
    }

    for (page_id, chunk) in vectors.chunks(num_per_page).enumerate() {
        let mut buf = vec![0u8; page_size];
        for (slot, v) in chunk.iter().enumerate() {
            let base = slot * d * 4;
            for (i, &x) in v.iter().enumerate() {
                buf[base + i * 4..base + i * 4 + 4].copy_from_slice(&x.to_le_bytes());
            }
        }
        let path = folder.join(format!("{page_id}.data"));
        fs::write(&path, buf).map_err(|e| AfnError::io("write", &path, e))?;
    }
    Ok(num_per_page)
}

/// Reads object `id`'s vector out of a directory-of-pages dataset,
/// charging one page read to `ctx`.
pub fn read_paged_object(
    folder: impl AsRef<Path>,
    id: usize,
    d: usize,
    page_size: usize,
    num_per_page: usize,
    ctx: &mut QueryContext,
) -> Result<Vec<f32>> {
    let folder = folder.as_ref();
    let page_id = id / num_per_page;
    let slot = id % num_per_page;
    let path = folder.join(format!("{page_id}.data"));
    let bytes = fs::read(&path).map_err(|e| AfnError::io("read", &path, e))?;
    if bytes.len() != page_size {
        return Err(AfnError::Invariant(format!(
            "{}: expected {page_size} bytes, got {}",
            path.display(),
            bytes.len()
        )));
    }
    ctx.io_count += 1;

    let base = slot * d * 4;
    let mut v = Vec::with_capacity(d);
    for i in 0..d {
        let bytes: [u8; 4] = bytes[base + i * 4..base + i * 4 + 4].try_into().unwrap();
        v.push(f32::from_le_bytes(bytes));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn binary_vectors_round_trip() {
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let dir = tempdir().unwrap();
        let path = dir.path().join("vecs.bin");
        write_bin_vectors(&path, &data).unwrap();
        let read_back = read_bin_vectors(&path, 2, 3).unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn text_vectors_parse_one_indexed_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vecs.txt");
        fs::write(&path, "2 3.0 4.0\n1 1.0 2.0\n").unwrap();
        let data = read_text_vectors(&path, 2, 2).unwrap();
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn paged_dataset_round_trips_every_object() {
        let data: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, (i * 2) as f32]).collect();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let dir = tempdir().unwrap();

        let num_per_page = write_paged_dataset(dir.path(), &refs, 2, 32).unwrap();
        let mut ctx = QueryContext::new(1);
        for i in 0..20 {
            let v = read_paged_object(dir.path(), i, 2, 32, num_per_page, &mut ctx).unwrap();
            assert_eq!(v, data[i]);
        }
        assert_eq!(ctx.io_count, 20);
    }
}
