//! Browser session lifecycle.
//!
//! A session is an opaque handle to one browser automation context, owned
//! exclusively by a single run. [`ChromiumSession`] launches a headless
//! Chrome via chromiumoxide; [`SnapshotSession`] serves pre-captured HTML so
//! plans can run offline against saved pages and fixtures. Closing is
//! idempotent and must happen on every exit path — a leaked headless process
//! is an operational hazard, not a leak of memory.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::GleanerConfig;

/// Errors surfaced by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser session init failed: {0}")]
    Init(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("failed to capture page content: {0}")]
    Content(String),
    #[error("browser session is closed")]
    Closed,
}

/// One browser automation context: navigate once, snapshot, release.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Load the given URL in the session's page.
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Capture the current page's full DOM as HTML.
    async fn content(&self) -> Result<String, SessionError>;

    /// Release the session. Idempotent; safe to call on any exit path.
    async fn close(&self) -> Result<(), SessionError>;
}

struct SessionState {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

/// Headless Chrome session backed by chromiumoxide.
pub struct ChromiumSession {
    state: Mutex<Option<SessionState>>,
}

impl ChromiumSession {
    /// Launch a browser process for this configuration.
    pub async fn launch(config: &GleanerConfig) -> Result<Self, SessionError> {
        let browser_config = build_browser_config(config).map_err(SessionError::Init)?;
        let (browser, handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| SessionError::Init(err.to_string()))?;
        let handler = spawn_handler(handler);

        Ok(Self {
            state: Mutex::new(Some(SessionState {
                browser,
                handler,
                page: None,
            })),
        })
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or(SessionError::Closed)?;

        let page = state
            .browser
            .new_page(url)
            .await
            .map_err(|err| SessionError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        page.wait_for_navigation()
            .await
            .map_err(|err| SessionError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        state.page = Some(page);
        Ok(())
    }

    async fn content(&self) -> Result<String, SessionError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or(SessionError::Closed)?;
        let page = state
            .page
            .as_ref()
            .ok_or_else(|| SessionError::Content("no page has been opened".to_string()))?;

        page.content()
            .await
            .map_err(|err| SessionError::Content(err.to_string()))
    }

    async fn close(&self) -> Result<(), SessionError> {
        let state = { self.state.lock().await.take() };
        let Some(mut state) = state else {
            return Ok(());
        };

        // Best-effort graceful shutdown; the handler abort severs the CDP
        // connection either way and the child process is reaped by wait().
        let _ = state.browser.close().await;
        let _ = state.browser.wait().await;
        state.handler.abort();
        Ok(())
    }
}

fn build_browser_config(config: &GleanerConfig) -> Result<BrowserConfig, String> {
    let viewport = Viewport {
        width: config.window_size.width,
        height: config.window_size.height,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: config.window_size.width >= config.window_size.height,
        has_touch: false,
    };

    let mut args = vec![format!(
        "--window-size={},{}",
        config.window_size.width, config.window_size.height
    )];
    if config.disable_gpu {
        args.push("--disable-gpu".to_string());
    }
    args.extend(config.extra_args.iter().cloned());

    let mut builder = BrowserConfig::builder();
    if let Some(path) = &config.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let builder = builder.viewport(viewport).args(args);
    let builder = if config.headless {
        builder
    } else {
        builder.with_head()
    };

    builder.build()
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                eprintln!("chromiumoxide handler error: {err}");
            }
        }
    })
}

#[async_trait]
impl<S: BrowserSession + ?Sized> BrowserSession for std::sync::Arc<S> {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        (**self).navigate(url).await
    }

    async fn content(&self) -> Result<String, SessionError> {
        (**self).content().await
    }

    async fn close(&self) -> Result<(), SessionError> {
        (**self).close().await
    }
}

/// Session serving a pre-captured HTML snapshot.
///
/// Navigation is a no-op beyond bookkeeping, which makes this the seam for
/// offline runs (`--snapshot`) and fixture-driven tests.
#[derive(Debug)]
pub struct SnapshotSession {
    html: String,
    closed: AtomicBool,
}

impl SnapshotSession {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// Load a snapshot from a saved HTML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path).map_err(|err| {
            SessionError::Content(format!("failed to read snapshot {}: {err}", path.display()))
        })?;
        Ok(Self::new(html))
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrowserSession for SnapshotSession {
    async fn navigate(&self, _url: &str) -> Result<(), SessionError> {
        self.ensure_open()
    }

    async fn content(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(self.html.clone())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
