use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;

use kbsearch_core::traits::{Embedder, VectorStore};
use kbsearch_core::types::{Chunk, Point, PointId};
use kbsearch_core::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub points: usize,
    pub batches: usize,
    pub created_collection: bool,
}

/// Deterministic UUID for a chunk, so re-indexing the same content overwrites
/// the same points instead of duplicating them.
pub fn chunk_point_id(chunk: &Chunk) -> PointId {
    let mut hasher = blake3::Hasher::new();
    for part in [&chunk.source, &chunk.heading, &chunk.text] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    PointId::Uuid(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}

/// Creates the collection if it is missing. Returns whether it was created.
pub async fn ensure_collection(store: &dyn VectorStore, dim: usize) -> Result<bool> {
    if store.collection_exists().await? {
        return Ok(false);
    }
    store.create_collection(dim).await?;
    Ok(true)
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Embeds chunk texts and upserts them with their payloads, `batch_size` at a time.
pub async fn index_chunks(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<IndexReport> {
    if chunks.is_empty() {
        return Err(Error::NotFound("no chunks to index".into()));
    }
    let start = Instant::now();
    let created_collection = ensure_collection(store, embedder.dim()).await?;
    if created_collection {
        tracing::info!(dim = embedder.dim(), "collection created");
    }

    let pb = progress_bar(chunks.len());
    let mut report = IndexReport { created_collection, ..Default::default() };
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!("expected {} vectors, got {}", batch.len(), vectors.len())));
        }
        let points: Vec<Point> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| Point { id: chunk_point_id(chunk), vector, payload: chunk.payload().to_raw() })
            .collect();
        store.upsert(&points).await?;
        report.points += points.len();
        report.batches += 1;
        pb.set_position(report.points as u64);
        pb.set_message(format!("batch {}", report.batches));
    }
    pb.finish_with_message("done");
    tracing::info!(
        points = report.points,
        batches = report.batches,
        model = embedder.model_id(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "indexing completed"
    );
    Ok(report)
}
