use kbsearch_core::config::Config;
use kbsearch_core::traits::Embedder;
use kbsearch_embed::load_embedder;

fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    let embedder = load_embedder(&settings.embedding, &std::env::current_dir()?)?;
    let texts = vec!["как сменить API-ключ".to_string(), "video upload limits".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("model={} B={} dim={}", embedder.model_id(), embs.len(), embedder.dim());
    Ok(())
}
