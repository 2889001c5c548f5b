use async_trait::async_trait;
use chromiumoxide::browser::HeadlessMode;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::{Browser, BrowserConfig as CdpConfig, Handler, Page};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{
    BrowserBackend, BrowserLauncher, LabelMatch, PageDriver, RawSegmentNode, ReadyState,
    SegmentLayout, Selector,
};
use crate::config::{BrowserEngine, BrowserSettings};
use crate::ExtractionError;

/// Launches Chromium-family browsers through chromiumoxide
pub struct ChromiumLauncher {
    settings: BrowserSettings,
    request_timeout: Duration,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings, request_timeout: Duration) -> Self {
        Self {
            settings,
            request_timeout,
        }
    }

    /// Explicit path first, then the engine's well-known binary names on PATH.
    /// `None` lets chromiumoxide run its own Chromium detection.
    fn resolve_executable(&self) -> Result<Option<PathBuf>, ExtractionError> {
        if let Some(path) = &self.settings.executable_path {
            if !path.is_file() {
                return Err(ExtractionError::Session(format!(
                    "browser executable does not exist: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        match self.settings.engine {
            BrowserEngine::Chromium => Ok(None),
            engine => find_on_path(engine.executable_names())
                .map(Some)
                .ok_or_else(|| {
                    ExtractionError::Session(format!(
                        "no {} executable found on PATH (tried {})",
                        engine,
                        engine.executable_names().join(", ")
                    ))
                }),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserBackend>, ExtractionError> {
        let profile = TempDir::new().map_err(|e| {
            ExtractionError::Session(format!("failed to create browser profile dir: {}", e))
        })?;

        let mut builder = CdpConfig::builder()
            .user_data_dir(profile.path())
            .request_timeout(self.request_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg("--autoplay-policy=user-gesture-required")
            .arg("--lang=en-US");

        builder = if self.settings.headless {
            builder.headless_mode(HeadlessMode::New)
        } else {
            builder.with_head()
        };

        if let Some(executable) = self.resolve_executable()? {
            tracing::debug!("Using browser executable: {}", executable.display());
            builder = builder.chrome_executable(executable);
        }

        let config = builder.build().map_err(ExtractionError::Session)?;

        tracing::info!(
            "Launching {} ({})",
            self.settings.engine,
            if self.settings.headless { "headless" } else { "visible" }
        );
        let (browser, handler) = Browser::launch(config).await.map_err(|e| {
            ExtractionError::Session(format!(
                "failed to launch {}: {}. Ensure it is installed or set browser.executable_path",
                self.settings.engine, e
            ))
        })?;

        let alive = Arc::new(AtomicBool::new(true));
        let handler_task = spawn_handler_task(handler, Arc::clone(&alive));

        Ok(Arc::new(ChromiumBackend {
            browser: Arc::new(Mutex::new(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            alive,
            _profile: profile,
        }))
    }

    fn engine_name(&self) -> &'static str {
        self.settings.engine.as_str()
    }
}

/// Drive the CDP event loop until the connection drops
fn spawn_handler_task(mut handler: Handler, alive: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("chromiumoxide handler event error: {}", e);
            }
        }
        tracing::warn!("Browser connection closed");
        alive.store(false, Ordering::SeqCst);
    })
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        names.iter().find_map(|name| {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            let exe = candidate.with_extension("exe");
            exe.is_file().then_some(exe)
        })
    })
}

/// One browser process shared by every page context
pub struct ChromiumBackend {
    browser: Arc<Mutex<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    alive: Arc<AtomicBool>,
    _profile: TempDir,
}

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn open_page(&self) -> Result<Box<dyn PageDriver>, ExtractionError> {
        let browser = self.browser.lock().await;

        let context_id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await?;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(ExtractionError::Browser)?;

        let page = match browser.new_page(params).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(dispose) = browser.dispose_browser_context(context_id).await {
                    tracing::warn!("Failed to dispose browser context: {}", dispose);
                }
                return Err(e.into());
            }
        };

        Ok(Box::new(ChromiumPage {
            page,
            context_id,
            browser: Arc::clone(&self.browser),
        }))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), ExtractionError> {
        let mut browser = self.browser.lock().await;

        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed waiting for browser process to exit: {}", e);
        }

        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
        self.alive.store(false, Ordering::SeqCst);

        closed.map(|_| ()).map_err(Into::into)
    }
}

/// A page inside its own CDP browser context
pub struct ChromiumPage {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Mutex<Browser>>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, ExtractionError> {
        let result = self.page.evaluate(script).await?;
        result
            .into_value::<T>()
            .map_err(|e| ExtractionError::Browser(format!("unexpected script result: {}", e)))
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), ExtractionError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn ready_state(&self) -> Result<ReadyState, ExtractionError> {
        let state: String = self.eval("document.readyState".to_string()).await?;
        Ok(ReadyState::parse(&state))
    }

    async fn exists(&self, selector: &Selector) -> Result<bool, ExtractionError> {
        self.eval(format!("!!({})", find_expression(selector))).await
    }

    async fn click(&self, selector: &Selector) -> Result<bool, ExtractionError> {
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.scrollIntoView({{ block: 'center' }});
                el.click();
                return true;
            }})()"#,
            find_expression(selector)
        );
        self.eval(script).await
    }

    async fn count_segments(&self, layout: &SegmentLayout) -> Result<usize, ExtractionError> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js_string(&layout.node)
        ))
        .await
    }

    async fn segment_nodes(
        &self,
        layout: &SegmentLayout,
    ) -> Result<Vec<RawSegmentNode>, ExtractionError> {
        let script = format!(
            r#"Array.from(document.querySelectorAll({node})).map((node) => {{
                const read = (sel) => {{
                    const el = node.querySelector(sel);
                    return el ? (el.innerText ?? el.textContent ?? '') : null;
                }};
                return {{ timestamp: read({timestamp}), text: read({text}) }};
            }})"#,
            node = js_string(&layout.node),
            timestamp = js_string(&layout.timestamp),
            text = js_string(&layout.text),
        );
        self.eval(script).await
    }

    async fn close(&self) -> Result<(), ExtractionError> {
        let page_closed = self.page.clone().close().await;

        let browser = self.browser.lock().await;
        browser
            .dispose_browser_context(self.context_id.clone())
            .await?;

        page_closed.map_err(Into::into)
    }
}

/// JSON string literal, which is also a valid JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// JavaScript expression evaluating to the matched element or `null`
fn find_expression(selector: &Selector) -> String {
    match selector {
        Selector::Css(css) => format!("document.querySelector({})", js_string(css)),
        Selector::Label { scope, label, mode } => format!(
            r#"(() => {{
                const needle = {label}.trim().toLowerCase();
                const exact = {exact};
                for (const el of document.querySelectorAll({scope})) {{
                    const names = [el.getAttribute('aria-label'), el.innerText, el.textContent];
                    for (const raw of names) {{
                        const name = (raw || '').trim().replace(/\s+/g, ' ').toLowerCase();
                        if (!name) continue;
                        if (exact ? name === needle : name.includes(needle)) return el;
                    }}
                }}
                return null;
            }})()"#,
            label = js_string(label),
            exact = matches!(mode, LabelMatch::Exact),
            scope = js_string(scope),
        ),
    }
}
