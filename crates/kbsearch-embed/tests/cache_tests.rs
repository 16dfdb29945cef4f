use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use kbsearch_core::handle::ServiceHandle;
use kbsearch_core::traits::Embedder;
use kbsearch_core::types::Embedding;
use kbsearch_embed::{EmbeddingCache, FakeEmbedder};

struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn model_id(&self) -> &str { "counting" }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> kbsearch_core::Result<Vec<Embedding>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

fn cache(capacity: usize) -> (EmbeddingCache, Arc<CountingEmbedder>) {
    let embedder = Arc::new(CountingEmbedder { inner: FakeEmbedder::new(16), calls: AtomicUsize::new(0) });
    let handle: ServiceHandle<dyn Embedder> = ServiceHandle::ready("embedder", embedder.clone());
    (EmbeddingCache::new(handle, capacity), embedder)
}

#[test]
fn repeated_query_is_embedded_once() {
    let (cache, embedder) = cache(4);
    let a = cache.embed_cached("api key").unwrap();
    let b = cache.embed_cached("api key").unwrap();
    assert_eq!(a, b);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn keys_are_exact_strings() {
    let (cache, embedder) = cache(4);
    cache.embed_cached("api key").unwrap();
    cache.embed_cached("API key").unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}

#[test]
fn least_recently_used_entry_is_evicted() {
    let (cache, embedder) = cache(2);
    cache.embed_cached("a").unwrap();
    cache.embed_cached("b").unwrap();
    cache.embed_cached("a").unwrap(); // refresh a, b is now oldest
    cache.embed_cached("c").unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

    cache.embed_cached("b").unwrap();
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4, "evicted key hits the model again");
}

#[test]
fn lazy_embedder_is_loaded_on_first_miss() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let handle: ServiceHandle<dyn Embedder> = ServiceHandle::lazy("embedder", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeEmbedder::new(8)) as Arc<dyn Embedder>)
    });
    let cache = EmbeddingCache::new(handle, 8);
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    cache.embed_cached("x").unwrap();
    cache.embed_cached("y").unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn concurrent_lookups_stay_within_capacity() {
    let (cache, _) = cache(10);
    let cache = Arc::new(cache);
    let keys: Vec<String> = (0..30).map(|i| format!("query {i}")).collect();

    let workers: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let keys = keys.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let key = &keys[(t * 7 + i) % keys.len()];
                    cache.embed_cached(key).unwrap();
                    assert!(cache.len() <= cache.capacity());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(cache.len(), 10);
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 8 * 200);

    let reference = FakeEmbedder::new(16);
    let mut cached = 0;
    for key in &keys {
        if cache.contains(key) {
            cached += 1;
            let expected = reference.embed_batch(&[key.clone()]).unwrap().remove(0);
            assert_eq!(cache.embed_cached(key).unwrap(), expected, "{key}");
        }
    }
    assert_eq!(cached, 10);
}
