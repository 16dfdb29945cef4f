use kbsearch_core::traits::{Embedder, VectorStore};
use kbsearch_core::types::{Chunk, PointId, ScrollRequest};
use kbsearch_embed::FakeEmbedder;
use kbsearch_vector::{chunk_point_id, index_chunks, MemoryStore};

fn chunk(section: &str, heading: &str, text: &str) -> Chunk {
    Chunk {
        heading: heading.into(),
        text: text.into(),
        section: section.into(),
        source: format!("https://docs.example.org/{section}"),
    }
}

fn sample_chunks() -> Vec<Chunk> {
    vec![
        chunk("api", "Keys", "## Keys\nCreate and rotate API keys in the dashboard settings page."),
        chunk("player", "Embed", "## Embed\nPaste the iframe code of the player into your page to embed video."),
        chunk("upload", "Limits", "## Limits\nThe maximum upload size for a single video file is fifty gigabytes."),
    ]
}

#[tokio::test]
async fn index_creates_collection_and_finds_nearest_chunk() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let embedder = FakeEmbedder::new(64);
    let report = index_chunks(&store, &embedder, &sample_chunks(), 2).await?;
    assert!(report.created_collection);
    assert_eq!(report.points, 3);
    assert_eq!(report.batches, 2);

    let query = embedder.embed_batch(&["rotate API keys".to_string()])?.remove(0);
    let hits = store.query(&query, 2).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].payload.section, "api");
    assert!(hits[0].vector_score >= hits[1].vector_score);
    assert_eq!(hits[0].payload.heading, "Keys");
    Ok(())
}

#[tokio::test]
async fn reindexing_same_content_is_idempotent() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let embedder = FakeEmbedder::new(32);
    index_chunks(&store, &embedder, &sample_chunks(), 64).await?;
    let second = index_chunks(&store, &embedder, &sample_chunks(), 64).await?;
    assert!(!second.created_collection);
    assert_eq!(store.len(), 3);
    Ok(())
}

#[tokio::test]
async fn empty_chunk_list_is_rejected() {
    let store = MemoryStore::new();
    let embedder = FakeEmbedder::new(8);
    assert!(index_chunks(&store, &embedder, &[], 64).await.is_err());
    assert!(!store.collection_exists().await.unwrap());
}

#[test]
fn point_ids_are_stable_uuids() {
    let a = chunk("api", "Keys", "text");
    let id = chunk_point_id(&a);
    assert_eq!(id, chunk_point_id(&a.clone()));
    assert_ne!(id, chunk_point_id(&chunk("api", "Keys", "other text")));
    match id {
        PointId::Uuid(s) => assert!(uuid::Uuid::parse_str(&s).is_ok(), "{s}"),
        PointId::Num(n) => panic!("unexpected numeric id {n}"),
    }
}

#[tokio::test]
async fn scroll_pages_through_all_points() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let embedder = FakeEmbedder::new(16);
    let chunks: Vec<Chunk> = (0..7).map(|i| chunk("s", "", &format!("chunk number {i} with some words"))).collect();
    index_chunks(&store, &embedder, &chunks, 3).await?;

    let mut seen = Vec::new();
    let mut offset = None;
    loop {
        let page = store.scroll(&ScrollRequest { limit: 3, offset, with_vectors: false }).await?;
        assert!(page.points.iter().all(|p| p.vector.is_none()));
        seen.extend(page.points.into_iter().map(|p| p.id));
        match page.next_offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 7);
    Ok(())
}

#[tokio::test]
async fn unavailable_store_fails_queries() {
    let store = MemoryStore::with_collection(4);
    store.set_unavailable(true);
    assert!(store.query(&[1.0, 0.0, 0.0, 0.0], 5).await.is_err());
    assert_eq!(store.query_count(), 1);
}
