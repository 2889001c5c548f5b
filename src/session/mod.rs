use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::browser::{BrowserBackend, BrowserLauncher, PageDriver};
use crate::extract::VideoId;
use crate::ExtractionError;

/// Book-keeping of live page contexts, shared with every [`PageContext`]
#[derive(Debug, Default)]
pub struct ContextRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, VideoId>>,
    destroyed: AtomicUsize,
}

impl ContextRegistry {
    fn register(&self, video_id: &VideoId) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut live) = self.live.lock() {
            live.insert(id, video_id.clone());
        }
        id
    }

    /// Returns false if the context was already gone
    fn deregister(&self, id: u64) -> bool {
        let removed = self
            .live
            .lock()
            .map(|mut live| live.remove(&id).is_some())
            .unwrap_or(false);
        if removed {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    /// Contexts handed out and not yet destroyed
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    /// Contexts destroyed over the lifetime of the session
    pub fn destroyed_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// An isolated browsing context bound to one video.
///
/// Hand it back through [`SessionManager::release_context`]. If it is dropped instead
/// (for example when the owning task is cancelled) the page is closed in the background.
pub struct PageContext {
    id: u64,
    video_id: VideoId,
    page: Arc<dyn PageDriver>,
    registry: Arc<ContextRegistry>,
}

impl PageContext {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }
}

impl std::fmt::Debug for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageContext")
            .field("id", &self.id)
            .field("video_id", &self.video_id)
            .finish()
    }
}

impl Drop for PageContext {
    fn drop(&mut self) {
        if !self.registry.deregister(self.id) {
            return;
        }
        let page = Arc::clone(&self.page);
        let video_id = self.video_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        tracing::warn!("Background close of context for {} failed: {}", video_id, e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("No runtime to close context for {}; leaving it to the browser", video_id);
            }
        }
    }
}

/// Owns the single browser process and hands out isolated page contexts
pub struct SessionManager {
    launcher: Arc<dyn BrowserLauncher>,
    backend: RwLock<Option<Arc<dyn BrowserBackend>>>,
    registry: Arc<ContextRegistry>,
    shut_down: AtomicBool,
    launches: AtomicUsize,
}

impl SessionManager {
    /// Launch the browser and return a ready session
    pub async fn start(launcher: Arc<dyn BrowserLauncher>) -> Result<Self, ExtractionError> {
        let backend = launcher.launch().await?;
        tracing::info!("Browser session started ({})", launcher.engine_name());

        Ok(Self {
            launcher,
            backend: RwLock::new(Some(backend)),
            registry: Arc::new(ContextRegistry::default()),
            shut_down: AtomicBool::new(false),
            launches: AtomicUsize::new(1),
        })
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    /// Number of browser processes launched, including restarts
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Create an isolated context for `video_id`
    pub async fn acquire_context(&self, video_id: &VideoId) -> Result<PageContext, ExtractionError> {
        let backend = self.live_backend().await?;

        let page = backend.open_page().await.map_err(|e| {
            ExtractionError::Session(format!("could not open a page context: {}", e.detail()))
        })?;

        let id = self.registry.register(video_id);
        tracing::debug!("Acquired context #{} for {}", id, video_id);

        Ok(PageContext {
            id,
            video_id: video_id.clone(),
            page: Arc::from(page),
            registry: Arc::clone(&self.registry),
        })
    }

    /// Close the context's page and free it. Runs on every exit path of an extraction.
    pub async fn release_context(&self, context: PageContext) -> Result<(), ExtractionError> {
        // Deregistering first turns the context's own drop into a no-op.
        if !context.registry.deregister(context.id) {
            return Ok(());
        }
        tracing::debug!("Releasing context #{} for {}", context.id, context.video_id);

        let page = Arc::clone(&context.page);
        drop(context);
        page.close().await
    }

    /// Terminate the browser process. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), ExtractionError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let backend = self.backend.write().await.take();
        if let Some(backend) = backend {
            let live = self.registry.live_count();
            if live > 0 {
                tracing::warn!("Shutting down browser with {} live context(s)", live);
            }
            tracing::info!("Shutting down browser session");
            backend.shutdown().await?;
        }
        Ok(())
    }

    /// Current backend, relaunching once if the process died
    async fn live_backend(&self) -> Result<Arc<dyn BrowserBackend>, ExtractionError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ExtractionError::Session("session has been shut down".into()));
        }

        if let Some(backend) = self.backend.read().await.as_ref() {
            if backend.is_alive() {
                return Ok(Arc::clone(backend));
            }
        }

        let mut slot = self.backend.write().await;
        // Another task may have relaunched while we waited for the lock.
        if let Some(backend) = slot.as_ref() {
            if backend.is_alive() {
                return Ok(Arc::clone(backend));
            }
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ExtractionError::Session("session has been shut down".into()));
        }

        if let Some(dead) = slot.take() {
            tracing::warn!("Browser process is gone; recreating session");
            if let Err(e) = dead.shutdown().await {
                tracing::debug!("Cleanup of dead browser failed: {}", e);
            }
        }

        let backend = self.launcher.launch().await.map_err(|e| {
            ExtractionError::Session(format!("failed to recreate browser: {}", e.detail()))
        })?;
        self.launches.fetch_add(1, Ordering::SeqCst);
        *slot = Some(Arc::clone(&backend));
        Ok(backend)
    }
}
