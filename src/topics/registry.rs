// Process-wide embedder cache.
//
// Loading an embedding model is expensive, so each model name gets one slot
// that is filled on first use and never invalidated. The map lock is held
// only long enough to find or create the slot; the OnceCell inside the slot
// guards the one-time load. After that every request shares the embedder
// read-only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::OnceCell;
use tracing::info;

use super::traits::{Embedder, EmbedderLoader};

type Slot = Arc<OnceCell<Arc<dyn Embedder>>>;

pub struct EmbedderRegistry {
    loader: Arc<dyn EmbedderLoader>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl EmbedderRegistry {
    pub fn new(loader: Arc<dyn EmbedderLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the embedder for `model_name`, loading it on first use.
    ///
    /// Concurrent first callers wait on the same load. A failed load leaves
    /// the slot empty so a later call can retry.
    pub async fn get(&self, model_name: &str) -> Result<Arc<dyn Embedder>> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|e| anyhow::anyhow!("Embedder registry lock poisoned: {}", e))?;
            Arc::clone(slots.entry(model_name.to_string()).or_default())
        };

        let embedder = slot
            .get_or_try_init(|| async {
                info!(model = model_name, "Loading embedding model");
                let loader = Arc::clone(&self.loader);
                let name = model_name.to_string();
                tokio::task::spawn_blocking(move || loader.load(&name))
                    .await
                    .context("spawn_blocking panicked")?
                    .with_context(|| format!("Failed to load embedding model {model_name}"))
            })
            .await?;

        Ok(Arc::clone(embedder))
    }

    /// Number of models loaded so far.
    pub fn loaded(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.values().filter(|s| s.initialized()).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::hashing::HashingEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: AtomicUsize,
    }

    impl EmbedderLoader for CountingLoader {
        fn load(&self, model_name: &str) -> Result<Arc<dyn Embedder>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(HashingEmbedder::new(model_name, 8)))
        }
    }

    struct FailingLoader;

    impl EmbedderLoader for FailingLoader {
        fn load(&self, _model_name: &str) -> Result<Arc<dyn Embedder>> {
            anyhow::bail!("no model files")
        }
    }

    #[tokio::test]
    async fn test_loads_once_per_name() {
        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let registry = EmbedderRegistry::new(loader.clone());

        let a = registry.get("mini").await.unwrap();
        let b = registry.get("mini").await.unwrap();
        registry.get("other").await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.loaded(), 2);
    }

    #[tokio::test]
    async fn test_load_failure_propagates() {
        let registry = EmbedderRegistry::new(Arc::new(FailingLoader));
        let err = registry.get("mini").await.err().unwrap();
        assert!(format!("{err:#}").contains("no model files"));
        assert_eq!(registry.loaded(), 0);
    }
}
