//! Lazily initialized, shared crypto engine handle.
//!
//! Clones of an [`EngineHandle`] share one cell. The first `get()` starts
//! initialization on the blocking pool; concurrent callers await the same
//! in-flight initialization and all observe the same engine afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ff::Field;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::hash::{FieldHasher, HasherKind, OUTER_COMMITMENT_DOMAIN};
use crate::Fr;

type Builder = Arc<dyn Fn() -> Arc<dyn FieldHasher> + Send + Sync>;

#[derive(Clone)]
pub struct EngineHandle {
    name: &'static str,
    build: Builder,
    cell: Arc<OnceCell<Arc<dyn FieldHasher>>>,
    inits: Arc<AtomicUsize>,
}

impl core::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("hasher", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl EngineHandle {
    /// Uninitialized handle; the engine is built on first use.
    pub fn new(kind: HasherKind) -> Self {
        Self::with_builder(kind.name(), move || Arc::from(kind.build()))
    }

    /// Handle around an already built hasher. No initialization ever runs.
    pub fn ready(hasher: Arc<dyn FieldHasher>) -> Self {
        let name = hasher.name();
        let cell = Arc::new(OnceCell::new_with(Some(Arc::clone(&hasher))));
        Self {
            name,
            build: Arc::new(move || Arc::clone(&hasher)),
            cell,
            inits: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_builder(
        name: &'static str,
        build: impl Fn() -> Arc<dyn FieldHasher> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            build: Arc::new(build),
            cell: Arc::new(OnceCell::new()),
            inits: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of initializations this handle has started. A failed one leaves
    /// the cell empty and the next `get()` starts over.
    pub fn initializations(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub async fn get(&self) -> Result<Arc<dyn FieldHasher>, EngineError> {
        let hasher = self
            .cell
            .get_or_try_init(|| {
                let name = self.name;
                let build = Arc::clone(&self.build);
                let inits = Arc::clone(&self.inits);
                async move {
                    info!(hasher = name, "initializing crypto engine");
                    inits.fetch_add(1, Ordering::SeqCst);
                    let built = tokio::task::spawn_blocking(move || init_engine(build.as_ref()))
                        .await
                        .map_err(|e| EngineError::Init(e.to_string()))??;
                    debug!(hasher = name, "crypto engine ready");
                    Ok::<_, EngineError>(built)
                }
            })
            .await?;
        Ok(Arc::clone(hasher))
    }
}

fn init_engine(
    build: &(dyn Fn() -> Arc<dyn FieldHasher> + Send + Sync),
) -> Result<Arc<dyn FieldHasher>, EngineError> {
    let hasher = build();
    let probe = [Fr::ONE, Fr::from(2u64)];
    let a = hasher.hash(OUTER_COMMITMENT_DOMAIN, &probe);
    let b = hasher.hash(OUTER_COMMITMENT_DOMAIN, &probe);
    if a != b || a == hasher.hash(OUTER_COMMITMENT_DOMAIN + 1, &probe) {
        return Err(EngineError::SelfTest(hasher.name()));
    }
    Ok(hasher)
}
