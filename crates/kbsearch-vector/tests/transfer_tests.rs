use std::fs;

use kbsearch_core::traits::VectorStore;
use kbsearch_core::types::Chunk;
use kbsearch_core::Error;
use kbsearch_embed::FakeEmbedder;
use kbsearch_vector::{export_collection, index_chunks, inspect_payloads, restore_collection, MemoryStore};

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk {
            heading: format!("Heading {i}"),
            text: format!("## Heading {i}\nbody text for chunk {i}"),
            section: "faq".into(),
            source: format!("https://docs.example.org/faq/page{i}.md"),
        })
        .collect()
}

#[tokio::test]
async fn export_then_restore_into_another_store() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let file = tmp.path().join("data/export.jsonl");
    let source = MemoryStore::new();
    index_chunks(&source, &FakeEmbedder::new(8), &chunks(130), 64).await?;

    assert_eq!(export_collection(&source, &file).await?, 130);
    let text = fs::read_to_string(&file)?;
    assert_eq!(text.lines().count(), 130);
    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap_or_default())?;
    assert!(first.get("id").is_some() && first.get("vector").is_some() && first.get("payload").is_some());

    let target = MemoryStore::with_collection(8);
    assert_eq!(restore_collection(&target, &file, 8).await?, 130);
    assert_eq!(target.len(), 130);
    Ok(())
}

#[tokio::test]
async fn export_of_missing_collection_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let err = export_collection(&MemoryStore::new(), &tmp.path().join("x.jsonl")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[tokio::test]
async fn empty_export_file_keeps_existing_collection() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let file = tmp.path().join("empty.jsonl");
    fs::write(&file, "\n\n")?;
    let store = MemoryStore::new();
    index_chunks(&store, &FakeEmbedder::new(8), &chunks(3), 64).await?;
    assert!(restore_collection(&store, &file, 8).await.is_err());
    assert_eq!(store.len(), 3);
    Ok(())
}

#[tokio::test]
async fn restore_rejects_wrong_dimension() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let file = tmp.path().join("export.jsonl");
    fs::write(&file, r#"{"id":1,"vector":[0.1,0.2],"payload":{"section":"a"}}"#)?;
    assert!(restore_collection(&MemoryStore::new(), &file, 384).await.is_err());
    Ok(())
}

#[tokio::test]
async fn inspect_lists_payload_keys() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    index_chunks(&store, &FakeEmbedder::new(8), &chunks(10), 64).await?;
    let sample = inspect_payloads(&store, 4).await?;
    assert_eq!(sample.points.len(), 4);
    let keys: Vec<&str> = sample.keys.iter().map(String::as_str).collect();
    assert_eq!(keys, ["content", "heading", "section", "source"]);
    assert!(store.collection_exists().await?);
    Ok(())
}
