use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kbsearch_core::config::{resolve_with_base, Settings};
use kbsearch_core::data_processor::DocumentProcessor;
use kbsearch_core::traits::VectorStore;
use kbsearch_embed::load_embedder;
use kbsearch_retrieval::{run_relevance, Fixture, RetrievalEngine};
use kbsearch_vector::{export_collection, index_chunks, inspect_payloads, restore_collection, QdrantStore};

pub struct SearchOverrides {
    pub limit_first: Option<usize>,
    pub limit_final: Option<usize>,
    pub alpha: Option<f32>,
    pub cross_encoder: bool,
}

pub async fn search(settings: &Settings, base_dir: &Path, query: &str, overrides: SearchOverrides) -> anyhow::Result<()> {
    let engine = RetrievalEngine::from_settings(settings, base_dir);
    let defaults = *engine.defaults();
    let options = kbsearch_retrieval::SearchOptions {
        limit_first: overrides.limit_first.unwrap_or(defaults.limit_first),
        limit_final: overrides.limit_final.unwrap_or(defaults.limit_final),
        alpha: overrides.alpha.unwrap_or(defaults.alpha),
        use_cross_encoder: overrides.cross_encoder || defaults.use_cross_encoder,
    };
    let outcome = engine.search_with(query, &options).await.context("search failed")?;
    println!("{outcome}");
    Ok(())
}

fn path_or(base_dir: &Path, given: Option<PathBuf>, configured: &str) -> PathBuf {
    match given {
        Some(p) if p.is_absolute() => p,
        Some(p) => base_dir.join(p),
        None => resolve_with_base(base_dir, configured),
    }
}

pub async fn index(settings: &Settings, base_dir: &Path, docs_dir: Option<PathBuf>, recreate: bool) -> anyhow::Result<()> {
    let docs_dir = path_or(base_dir, docs_dir, &settings.indexing.docs_dir);
    if !docs_dir.is_dir() {
        bail!("docs directory {} does not exist; run the crawler first", docs_dir.display());
    }
    let processor = DocumentProcessor::from_settings(&settings.indexing)?;
    let chunks = processor.process_directory(&docs_dir)?;
    if chunks.is_empty() {
        bail!("no chunks to index in {}", docs_dir.display());
    }

    let store = QdrantStore::new(&settings.vector_store)?;
    if recreate && store.collection_exists().await? {
        store.delete_collection().await?;
    }
    let embedder = load_embedder(&settings.embedding, base_dir)?;
    let report = index_chunks(&store, embedder.as_ref(), &chunks, settings.indexing.batch_size).await?;
    tracing::info!(
        points = report.points,
        collection = store.collection(),
        created = report.created_collection,
        "indexed"
    );
    println!("Indexed {} points into {}", report.points, store.collection());
    Ok(())
}

pub async fn export(settings: &Settings, base_dir: &Path, out: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path_or(base_dir, out, &settings.indexing.export_file);
    let store = QdrantStore::new(&settings.vector_store)?;
    let count = export_collection(&store, &path)
        .await
        .with_context(|| format!("export of collection {} failed", store.collection()))?;
    println!("Экспортировано {count} точек в {}", path.display());
    Ok(())
}

pub async fn restore(settings: &Settings, base_dir: &Path, input: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path_or(base_dir, input, &settings.indexing.export_file);
    let store = QdrantStore::new(&settings.vector_store)?;
    let count = restore_collection(&store, &path, settings.embedding.dim)
        .await
        .with_context(|| format!("restore from {} failed", path.display()))?;
    println!("Восстановлено {count} точек в коллекции '{}'.", store.collection());
    Ok(())
}

pub async fn inspect(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let store = QdrantStore::new(&settings.vector_store)?;
    let sample = inspect_payloads(&store, limit).await?;
    if sample.points.is_empty() {
        println!("Коллекция пуста.");
        return Ok(());
    }
    let keys: Vec<&str> = sample.keys.iter().map(String::as_str).collect();
    println!("Коллекция: {}, просмотр первых {} точек.", store.collection(), sample.points.len());
    println!("Ключи payload в выборке: {keys:?}\n");
    for (i, point) in sample.points.iter().enumerate() {
        println!("--- Точка {} (id={}) ---", i + 1, point.id);
        println!("{}", serde_json::to_string_pretty(&point.payload)?);
        if i + 1 < sample.points.len() {
            println!();
        }
    }
    Ok(())
}

pub async fn relevance(settings: &Settings, base_dir: &Path, fixture: &Path) -> anyhow::Result<ExitCode> {
    let fixture_path = if fixture.is_absolute() { fixture.to_path_buf() } else { base_dir.join(fixture) };
    let fixture = Fixture::load(&fixture_path)?;
    let engine = RetrievalEngine::from_settings(settings, base_dir);
    let report = run_relevance(&engine, &fixture).await.context("relevance run failed")?;
    println!("{report}");
    Ok(if report.exit_code() == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
