//! Headless Chromium engine driven over the DevTools protocol.

use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{RenderError, RenderPage, RenderWorker, WorkerLauncher};
use crate::config::RenderConfig;

/// Upper bound for the `Browser.getVersion` liveness round-trip.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolves once the document, its images, an optional `window.__cardReady`
/// promise and its web fonts have settled.
const NETWORK_IDLE_JS: &str = r#"(async () => {
  if (document.readyState !== 'complete') {
    await new Promise((resolve) => window.addEventListener('load', resolve, { once: true }));
  }
  await Promise.all(Array.from(document.images)
    .filter((img) => !img.complete)
    .map((img) => new Promise((resolve) => {
      img.addEventListener('load', resolve, { once: true });
      img.addEventListener('error', resolve, { once: true });
    })));
  if (window.__cardReady) {
    await window.__cardReady;
  }
  if (document.fonts) {
    await document.fonts.ready;
  }
  return true;
})()"#;

/// Chrome flags for a container-friendly, deterministic renderer.
const CHROME_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--hide-scrollbars",
    "--mute-audio",
    "--font-render-hinting=none",
];

/// Launches one headless Chromium process per worker.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    timeout: Duration,
    settle: Option<Duration>,
}

impl ChromeLauncher {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            executable: config.chrome_path.clone(),
            timeout: config.timeout,
            settle: config.settle,
        }
    }

    fn browser_config(&self, data_dir: &Path) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(data_dir)
            .request_timeout(self.timeout);

        for arg in CHROME_ARGS {
            builder = builder.arg(*arg);
        }

        if let Some(ref path) = self.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl WorkerLauncher for ChromeLauncher {
    type Worker = ChromeWorker;

    async fn launch(&self, id: u64) -> Result<ChromeWorker, RenderError> {
        // Concurrent browsers must not share a profile directory
        let data_dir = std::env::temp_dir().join(format!(
            "goal_renderer-{}-{}",
            std::process::id(),
            id
        ));
        let config = self.browser_config(&data_dir)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(worker = id, error = %e, "devtools handler event error");
                }
            }
            debug!(worker = id, "devtools handler stopped");
        });

        debug!(worker = id, dir = %data_dir.display(), "chrome launched");

        Ok(ChromeWorker {
            id,
            browser: Some(browser),
            handler,
            data_dir,
            timeout: self.timeout,
            settle: self.settle,
        })
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}

/// One headless Chromium process plus its DevTools handler task.
pub struct ChromeWorker {
    id: u64,
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    data_dir: PathBuf,
    timeout: Duration,
    settle: Option<Duration>,
}

impl ChromeWorker {
    /// Apply viewport, load markup, wait for idle, capture.
    async fn capture(&self, page: &Page, render: &RenderPage) -> Result<Bytes, RenderError> {
        let dims = render.dimensions;

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(dims.width),
            i64::from(dims.height),
            dims.scale,
            false,
        ))
        .await
        .map_err(fault)?;

        page.set_content(&render.html).await.map_err(fault)?;

        let idle = EvaluateParams::builder()
            .expression(NETWORK_IDLE_JS)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(RenderError::Fault)?;
        page.evaluate_expression(idle).await.map_err(fault)?;

        if let Some(settle) = self.settle {
            tokio::time::sleep(settle).await;
        }

        let png = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .omit_background(false)
                    .build(),
            )
            .await
            .map_err(fault)?;

        Ok(Bytes::from(png))
    }
}

fn fault(e: chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Fault(e.to_string())
}

#[async_trait]
impl RenderWorker for ChromeWorker {
    fn id(&self) -> u64 {
        self.id
    }

    async fn is_live(&self) -> bool {
        let Some(browser) = self.browser.as_ref() else {
            return false;
        };
        if self.handler.is_finished() {
            return false;
        }

        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, browser.version()).await,
            Ok(Ok(_))
        )
    }

    async fn render(&mut self, render: &RenderPage) -> Result<Bytes, RenderError> {
        let browser = self.browser.as_ref().ok_or(RenderError::Closed)?;
        let deadline = tokio::time::Instant::now() + self.timeout;

        let page = match tokio::time::timeout_at(deadline, browser.new_page("about:blank")).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(fault(e)),
            Err(_) => return Err(RenderError::Timeout(self.timeout)),
        };

        let result = tokio::time::timeout_at(deadline, self.capture(&page, render)).await;

        // The page is closed regardless of outcome
        close_within(self.id, PROBE_TIMEOUT, page.close()).await;

        match result {
            Ok(captured) => captured,
            Err(_) => Err(RenderError::Timeout(self.timeout)),
        }
    }

    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(worker = self.id, error = %e, "browser close failed");
            }
            if let Err(e) = browser.wait().await {
                debug!(worker = self.id, error = %e, "browser wait failed");
            }
            self.handler.abort();

            if let Err(e) = tokio::fs::remove_dir_all(&self.data_dir).await {
                debug!(worker = self.id, error = %e, "profile cleanup failed");
            }
            debug!(worker = self.id, "chrome closed");
        }
    }
}

/// Await a page close for at most `limit`. Returns false if it did not finish.
async fn close_within<F, E>(worker: u64, limit: Duration, close: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(limit, close).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(worker, error = %e, "page close failed");
            true
        }
        Err(_) => {
            warn!(worker, limit_ms = limit.as_millis() as u64, "page close timed out");
            false
        }
    }
}

impl Drop for ChromeWorker {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
