//! Long-lived service handles (embedding model, relevance model) that are
//! constructed once and shared for the process lifetime.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use crate::{Error, Result};

type Loader<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// A service that is either ready up front or loaded on first use.
///
/// Concurrent first callers are serialised; only one runs the loader. A failed
/// load is returned to its caller and attempted again on the next `get`.
pub struct ServiceHandle<T: ?Sized + Send + Sync> {
    name: &'static str,
    cell: OnceLock<Arc<T>>,
    init: Mutex<()>,
    loader: Option<Loader<T>>,
}

impl<T: ?Sized + Send + Sync> ServiceHandle<T> {
    pub fn ready(name: &'static str, service: Arc<T>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(service);
        Self { name, cell, init: Mutex::new(()), loader: None }
    }

    pub fn lazy<F>(name: &'static str, loader: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self { name, cell: OnceLock::new(), init: Mutex::new(()), loader: Some(Box::new(loader)) }
    }

    pub fn is_loaded(&self) -> bool { self.cell.get().is_some() }

    pub fn get(&self) -> Result<Arc<T>> {
        if let Some(service) = self.cell.get() {
            return Ok(Arc::clone(service));
        }
        let _guard = self.init.lock().map_err(|_| Error::Operation(format!("{} init lock poisoned", self.name)))?;
        if let Some(service) = self.cell.get() {
            return Ok(Arc::clone(service));
        }
        let loader = self.loader.as_ref().ok_or_else(|| Error::NotFound(format!("no loader for {}", self.name)))?;
        let start = Instant::now();
        let service = loader()?;
        tracing::info!(service = self.name, elapsed_ms = start.elapsed().as_millis() as u64, "service loaded");
        let _ = self.cell.set(Arc::clone(&service));
        Ok(service)
    }
}
