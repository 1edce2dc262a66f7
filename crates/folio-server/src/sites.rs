//! Cached documentation table used to route site requests.
//!
//! Site requests need every documentation's base URL. Loading them from the
//! store on each request costs a query per documentation, so the table is
//! kept in memory and dropped whenever the store emits a build trigger. Every
//! tree mutation emits one, which covers base URL edits as well as creation
//! and deletion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use folio_tree::{BuildTrigger, Documentation, TreeError, TreeStore, TriggerSink};

#[derive(Default)]
pub(crate) struct SiteIndex {
    generation: AtomicU64,
    cached: RwLock<Option<(u64, Arc<[Documentation]>)>>,
}

impl SiteIndex {
    /// Current documentation table, reloaded from `store` when stale.
    pub(crate) async fn documentations(
        &self,
        store: &TreeStore,
    ) -> Result<Arc<[Documentation]>, TreeError> {
        let generation = self.generation.load(Ordering::Acquire);
        if let Some((cached_at, docs)) = self.cached.read().unwrap().as_ref()
            && *cached_at == generation
        {
            return Ok(Arc::clone(docs));
        }

        let docs: Arc<[Documentation]> = store.list_documentations().await?.into();
        // A mutation that landed during the load bumped the generation; the
        // table is served once but not kept.
        if self.generation.load(Ordering::Acquire) == generation {
            *self.cached.write().unwrap() = Some((generation, Arc::clone(&docs)));
        }
        tracing::debug!(documentations = docs.len(), "Reloaded site table");
        Ok(docs)
    }

    pub(crate) fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Sink that invalidates this table before forwarding to `next`.
    pub(crate) fn sink(self: &Arc<Self>, next: Arc<dyn TriggerSink>) -> Arc<dyn TriggerSink> {
        Arc::new(Invalidating {
            index: Arc::clone(self),
            next,
        })
    }
}

struct Invalidating {
    index: Arc<SiteIndex>,
    next: Arc<dyn TriggerSink>,
}

impl TriggerSink for Invalidating {
    fn enqueue(&self, trigger: BuildTrigger) {
        self.index.invalidate();
        self.next.enqueue(trigger);
    }
}
