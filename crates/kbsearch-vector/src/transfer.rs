//! Moving a collection between machines as JSON Lines, one
//! `{"id", "vector", "payload"}` object per point.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use kbsearch_core::traits::VectorStore;
use kbsearch_core::types::{Point, ScrollRequest, StoredPoint};
use kbsearch_core::{Error, Result};

const PAGE_SIZE: usize = 100;

/// Writes every point of the collection to `path`. Returns the number of points.
pub async fn export_collection(store: &dyn VectorStore, path: &Path) -> Result<usize> {
    if !store.collection_exists().await? {
        return Err(Error::NotFound("collection does not exist".into()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    let mut count = 0usize;
    let mut offset = None;
    loop {
        let page = store.scroll(&ScrollRequest { limit: PAGE_SIZE, offset, with_vectors: true }).await?;
        if page.points.is_empty() {
            break;
        }
        for stored in page.points {
            let id = stored.id.clone();
            let vector = stored.vector.ok_or_else(|| Error::VectorStore(format!("point {id} came back without a vector")))?;
            let point = Point { id, vector, payload: stored.payload };
            serde_json::to_writer(&mut out, &point)?;
            out.write_all(b"\n")?;
            count += 1;
        }
        match page.next_offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }
    out.flush()?;
    tracing::info!(points = count, file = %path.display(), "collection exported");
    Ok(count)
}

fn read_points(path: &Path) -> Result<Vec<Point>> {
    if !path.exists() {
        return Err(Error::NotFound(format!("export file {} does not exist", path.display())));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut points = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let point: Point = serde_json::from_str(line)
            .map_err(|e| Error::Operation(format!("{}:{}: {e}", path.display(), line_no + 1)))?;
        points.push(point);
    }
    Ok(points)
}

/// Replaces the collection with the points in `path`. The file is read and
/// checked before the existing collection is dropped.
pub async fn restore_collection(store: &dyn VectorStore, path: &Path, dim: usize) -> Result<usize> {
    let points = read_points(path)?;
    if points.is_empty() {
        return Err(Error::Operation(format!("{} contains no points", path.display())));
    }
    if let Some(bad) = points.iter().find(|p| p.vector.len() != dim) {
        return Err(Error::Operation(format!("point {} has {} dimensions, expected {dim}", bad.id, bad.vector.len())));
    }
    if store.collection_exists().await? {
        store.delete_collection().await?;
    }
    store.create_collection(dim).await?;
    for batch in points.chunks(PAGE_SIZE) {
        store.upsert(batch).await?;
        tracing::debug!(points = batch.len(), "restored batch");
    }
    tracing::info!(points = points.len(), file = %path.display(), "collection restored");
    Ok(points.len())
}

#[derive(Debug, Clone, Default)]
pub struct PayloadSample {
    pub points: Vec<StoredPoint>,
    /// Union of payload keys across the sample, sorted.
    pub keys: BTreeSet<String>,
}

/// The first `limit` points with payloads, without vectors.
pub async fn inspect_payloads(store: &dyn VectorStore, limit: usize) -> Result<PayloadSample> {
    if !store.collection_exists().await? {
        return Err(Error::NotFound("collection does not exist".into()));
    }
    let page = store.scroll(&ScrollRequest { limit, offset: None, with_vectors: false }).await?;
    let keys = page.points.iter().flat_map(|p| p.payload.keys().cloned()).collect();
    Ok(PayloadSample { points: page.points, keys })
}
