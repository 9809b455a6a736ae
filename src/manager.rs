//! Render resource manager – owns the single reusable engine instance.
//!
//! The instance is launched lazily on first use and shared by every
//! concurrent render. Launch and recovery happen under the slot's async
//! mutex, so at most one live instance exists. Prints run on the blocking
//! pool with the mutex released.
//!
//! Any failure while using a page terminates the instance it came from and
//! forgets it, provided nothing has replaced it in the meantime (checked by
//! launch generation). The failure is surfaced, not retried; the next call
//! launches a fresh instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use crate::engine::{EngineInstance, EnginePage, PageSetup, RenderEngine};
use crate::error::{EngineError, ForgeError};

struct Held {
    generation: u64,
    instance: Arc<dyn EngineInstance>,
}

/// A page opened on the shared instance. Give it back with
/// [`RenderManager::release_page`].
pub struct PageHandle {
    generation: u64,
    instance: Arc<dyn EngineInstance>,
    page: Box<dyn EnginePage>,
}

impl PageHandle {
    /// Launch generation of the instance this page belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn print_pdf(&mut self, markup: &str, setup: &PageSetup) -> Result<Vec<u8>, EngineError> {
        self.page.print_pdf(markup, setup)
    }
}

pub struct RenderManager {
    engine: Arc<dyn RenderEngine>,
    slot: Mutex<Option<Held>>,
    launches: AtomicU64,
}

impl RenderManager {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            engine,
            slot: Mutex::new(None),
            launches: AtomicU64::new(0),
        }
    }

    /// Number of instances launched so far.
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Whether an instance is currently cached.
    pub async fn has_instance(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Open a page, launching an instance first if none is usable.
    pub async fn acquire_page(&self) -> Result<PageHandle, ForgeError> {
        let (generation, instance) = self.instance().await?;
        match instance.open_page() {
            Ok(page) => Ok(PageHandle {
                generation,
                instance,
                page,
            }),
            Err(e) => Err(self.recover(generation, &instance, e).await),
        }
    }

    pub fn release_page(&self, handle: PageHandle) {
        debug!("manager: page released (generation {})", handle.generation);
        drop(handle);
    }

    /// Print `markup` on a pooled page.
    pub async fn render(&self, markup: &str, setup: &PageSetup) -> Result<Vec<u8>, ForgeError> {
        let mut handle = self.acquire_page().await?;
        let generation = handle.generation;
        let instance = Arc::clone(&handle.instance);

        let markup = markup.to_owned();
        let setup = setup.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let result = handle.print_pdf(&markup, &setup);
            (handle, result)
        })
        .await;

        let cause = match joined {
            Ok((handle, Ok(bytes))) if !bytes.is_empty() => {
                self.release_page(handle);
                return Ok(bytes);
            }
            Ok((handle, Ok(_))) => {
                self.release_page(handle);
                EngineError::EmptyOutput
            }
            Ok((handle, Err(e))) => {
                self.release_page(handle);
                e
            }
            Err(e) => EngineError::Crashed(format!("print worker failed: {e}")),
        };
        Err(self.recover(generation, &instance, cause).await)
    }

    /// Terminate and forget the cached instance, if any.
    pub async fn shutdown(&self) {
        if let Some(held) = self.slot.lock().await.take() {
            held.instance.terminate();
            info!("manager: engine instance shut down (generation {})", held.generation);
        }
    }

    async fn instance(&self) -> Result<(u64, Arc<dyn EngineInstance>), ForgeError> {
        let mut slot = self.slot.lock().await;
        if let Some(held) = slot.as_ref() {
            if held.instance.is_alive() {
                return Ok((held.generation, Arc::clone(&held.instance)));
            }
            warn!(
                "manager: cached instance (generation {}) is dead; relaunching",
                held.generation
            );
            *slot = None;
        }

        let engine = Arc::clone(&self.engine);
        let launched = tokio::task::spawn_blocking(move || engine.launch())
            .await
            .map_err(|e| EngineError::Launch(format!("launch worker failed: {e}")))
            .and_then(|r| r);
        let instance = match launched {
            Ok(instance) => instance,
            Err(e) => {
                error!("manager: failed to launch '{}' engine: {e}", self.engine.name());
                return Err(ForgeError::Render(e));
            }
        };

        let generation = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "manager: launched '{}' engine (generation {generation})",
            self.engine.name()
        );
        *slot = Some(Held {
            generation,
            instance: Arc::clone(&instance),
        });
        Ok((generation, instance))
    }

    async fn recover(
        &self,
        generation: u64,
        instance: &Arc<dyn EngineInstance>,
        cause: EngineError,
    ) -> ForgeError {
        if instance.is_alive() {
            instance.terminate();
        }
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|h| h.generation == generation) {
            *slot = None;
            warn!("manager: discarded engine instance (generation {generation}): {cause}");
        } else {
            debug!("manager: instance (generation {generation}) was already replaced");
        }
        ForgeError::Render(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ForgeEngine;
    use crate::layout_config::LayoutConfig;

    fn manager() -> RenderManager {
        RenderManager::new(Arc::new(ForgeEngine::new()))
    }

    #[tokio::test]
    async fn launches_lazily() {
        let mgr = manager();
        assert_eq!(mgr.launch_count(), 0);
        assert!(!mgr.has_instance().await);

        let handle = mgr.acquire_page().await.unwrap();
        assert_eq!(handle.generation(), 1);
        mgr.release_page(handle);
        assert!(mgr.has_instance().await);

        let handle = mgr.acquire_page().await.unwrap();
        assert_eq!(handle.generation(), 1);
        assert_eq!(mgr.launch_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_forces_a_relaunch() {
        let mgr = manager();
        let setup = LayoutConfig::default().page_setup("t");
        mgr.render("<p>one</p>", &setup).await.unwrap();
        mgr.shutdown().await;
        assert!(!mgr.has_instance().await);

        mgr.render("<p>two</p>", &setup).await.unwrap();
        assert_eq!(mgr.launch_count(), 2);
    }
}
