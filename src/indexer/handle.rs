use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::indexer::corpus::Corpus;
use crate::indexer::recipe::RawRecipe;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared owner of the corpus currently in service.
///
/// Readers take an `Arc` snapshot and keep using it for as long as they
/// need; publishing swaps the pointer, so a reader sees either the old or
/// the new corpus in full. Only one rebuild may run at a time.
#[derive(Debug)]
pub struct CorpusHandle {
    current: RwLock<Arc<Corpus>>,
    rebuilding: AtomicBool,
}

/// Exclusive right to publish the next corpus. Dropping it without
/// publishing leaves the corpus in service untouched.
#[derive(Debug)]
pub struct RebuildPermit<'a> {
    handle: &'a CorpusHandle,
}

impl RebuildPermit<'_> {
    pub fn publish(self, corpus: Corpus) -> Arc<Corpus> {
        self.handle.publish(corpus)
    }
}

impl Drop for RebuildPermit<'_> {
    fn drop(&mut self) {
        self.handle.rebuilding.store(false, Ordering::Release);
    }
}

impl CorpusHandle {
    pub fn new(mut corpus: Corpus) -> Self {
        corpus.set_generation(1);
        Self {
            current: RwLock::new(Arc::new(corpus)),
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Handle serving an empty corpus until the first rebuild is published.
    pub fn empty(config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(Corpus::empty(config))),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Arc<Corpus> {
        Arc::clone(&self.current.read())
    }

    pub fn generation(&self) -> u64 {
        self.current.read().generation()
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Claim the single rebuild slot, failing fast with
    /// `Error::RebuildInProgress` if another rebuild holds it.
    pub fn begin_rebuild(&self) -> Result<RebuildPermit<'_>> {
        self.rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RebuildInProgress)?;
        Ok(RebuildPermit { handle: self })
    }

    /// Replace the corpus in service. The new corpus gets the next generation
    /// number; the previous one lives on until its last reader drops it.
    pub fn publish(&self, mut corpus: Corpus) -> Arc<Corpus> {
        let mut current = self.current.write();
        corpus.set_generation(current.generation() + 1);
        let corpus = Arc::new(corpus);
        *current = Arc::clone(&corpus);
        info!(
            "Published corpus generation {} with {} recipes",
            corpus.generation(),
            corpus.len()
        );
        corpus
    }

    /// Fit a new corpus from `snapshot` and publish it.
    ///
    /// On any failure the corpus in service is left untouched.
    pub fn rebuild_from(
        &self,
        snapshot: Vec<RawRecipe>,
        config: &EngineConfig,
    ) -> Result<Arc<Corpus>> {
        let permit = self.begin_rebuild()?;

        info!("Rebuilding corpus from {} records", snapshot.len());
        match Corpus::rebuild(snapshot, config) {
            Ok(corpus) => Ok(permit.publish(corpus)),
            Err(e) => {
                warn!(
                    "Rebuild failed, keeping generation {}: {}",
                    self.generation(),
                    e.log_safe()
                );
                Err(e)
            }
        }
    }
}
