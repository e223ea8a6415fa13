//! Chromium driver over the DevTools protocol
//!
//! # Architecture
//!
//! One browser process serves the whole run. Every scenario gets its own
//! incognito browser context and a single page inside it, so cookies from one
//! identity never leak into a concurrently running scenario:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Browser Instance                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐        │
//! │  │  Context 1  │ │  Context 2  │ │  Context 3  │ ...    │
//! │  │  Retailer / │ │  QA Tech /  │ │  Admin /    │        │
//! │  │  reports    │ │  packaging  │ │  account    │        │
//! │  └─────────────┘ └─────────────┘ └─────────────┘        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Content frames are queried in an isolated world created for the frame
//! (`Page.createIsolatedWorld`). The world shares the frame's DOM but not
//! its JavaScript globals, and it cannot see the host document. Site
//! isolation is disabled at launch so cross-origin micro-frontends stay
//! reachable from the page's own session.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::dom::DescribeNodeParams;
use chromiumoxide::cdp::browser_protocol::page::CreateIsolatedWorldParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{EvaluateParams, ExecutionContextId};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::HarnessConfig;
use crate::driver::{Driver, DriverFactory, Scope};
use crate::error::{HarnessError, Result};
use crate::locator::{self, Locator};

const WORLD_NAME: &str = "role-harness";

/// Launches Chrome once and opens an isolated context per scenario
pub struct ChromeFactory {
    browser: Browser,
    handle: tokio::task::JoinHandle<()>,
    /// Profile directory created by [`ChromeFactory::launch`]
    user_data_dir: Option<PathBuf>,
}

impl ChromeFactory {
    /// Launch Chrome according to the `[harness]` section
    pub async fn launch(config: &HarnessConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-site-isolation-trials")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .window_size(1440, 900);

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        // Unique profile directory so parallel runs on one machine don't collide
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let user_data_dir =
            std::env::temp_dir().join(format!("role-harness-{}-{}", std::process::id(), stamp));
        builder = builder.user_data_dir(&user_data_dir);

        let browser_config = builder.build().map_err(HarnessError::Driver)?;
        let mut factory = Self::with_config(browser_config).await?;
        factory.user_data_dir = Some(user_data_dir);
        Ok(factory)
    }

    /// Launch with a fully custom browser configuration
    pub async fn with_config(config: BrowserConfig) -> Result<Self> {
        info!("Launching browser");
        let (browser, mut handler) = Browser::launch(config).await?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        info!("Browser launched successfully");
        Ok(Self {
            browser,
            handle,
            user_data_dir: None,
        })
    }

    pub fn user_data_dir(&self) -> Option<&std::path::Path> {
        self.user_data_dir.as_deref()
    }

    /// Close the browser, wait for the process to exit and remove the
    /// profile directory created at launch
    pub async fn shutdown(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handle.abort();

        if let Some(dir) = self.user_data_dir.take() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }
        info!("Browser shut down");
        closed.map(|_| ()).map_err(HarnessError::from)
    }
}

#[async_trait]
impl DriverFactory for ChromeFactory {
    type Driver = ChromeDriver;

    async fn open(&self) -> Result<ChromeDriver> {
        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context.clone())
            .build()
            .map_err(HarnessError::Driver)?;
        let page = self.browser.new_page(target).await?;

        debug!("Opened page in browser context {:?}", context);
        Ok(ChromeDriver {
            page,
            context,
            worlds: Mutex::new(HashMap::new()),
        })
    }

    async fn close(&self, driver: ChromeDriver) -> Result<()> {
        let ChromeDriver { page, context, .. } = driver;
        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }
        self.browser
            .execute(DisposeBrowserContextParams::new(context))
            .await?;
        Ok(())
    }
}

/// A page in its own browser context
pub struct ChromeDriver {
    page: Page,
    context: BrowserContextId,
    /// Isolated world per frame title, dropped when the frame's document goes away
    worlds: Mutex<HashMap<String, ExecutionContextId>>,
}

impl ChromeDriver {
    /// Underlying chromiumoxide page
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, scope: &Scope, script: String) -> Result<T> {
        match scope {
            Scope::Page => {
                let value = self.page.evaluate(script).await?;
                value
                    .into_value()
                    .map_err(|e| HarnessError::Driver(format!("unexpected script result: {}", e)))
            }
            Scope::Frame(title) => self.eval_in_frame(title, script).await,
        }
    }

    async fn eval_in_frame<T: DeserializeOwned>(&self, title: &str, script: String) -> Result<T> {
        let context = self.frame_world(title).await?;
        let params = EvaluateParams::builder()
            .expression(script)
            .context_id(context)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(HarnessError::Driver)?;

        let detached = || HarnessError::FrameDetached {
            frame: title.to_string(),
        };

        let response = match self.page.execute(params).await {
            Ok(response) => response.result,
            Err(e) => {
                // Stale execution context: the frame navigated or was replaced
                debug!("Evaluation in frame \"{}\" failed: {}", title, e);
                self.worlds.lock().await.remove(title);
                return Err(detached());
            }
        };

        if let Some(exception) = response.exception_details {
            return Err(HarnessError::Driver(format!(
                "script raised in frame \"{}\": {}",
                title, exception.text
            )));
        }

        let value = response.result.value.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(value)
            .map_err(|e| HarnessError::Driver(format!("unexpected script result: {}", e)))
    }

    /// Execution context of an isolated world inside the titled frame
    async fn frame_world(&self, title: &str) -> Result<ExecutionContextId> {
        if let Some(context) = self.worlds.lock().await.get(title) {
            return Ok(context.clone());
        }

        let detached = || HarnessError::FrameDetached {
            frame: title.to_string(),
        };

        let owner = self
            .page
            .find_element(frame_selector(title))
            .await
            .map_err(|_| detached())?;

        let node = self
            .page
            .execute(
                DescribeNodeParams::builder()
                    .backend_node_id(owner.backend_node_id)
                    .build(),
            )
            .await?
            .result
            .node;
        let frame_id = node.frame_id.ok_or_else(detached)?;

        let world = CreateIsolatedWorldParams::builder()
            .frame_id(frame_id)
            .world_name(WORLD_NAME)
            .build()
            .map_err(HarnessError::Driver)?;
        let context = self
            .page
            .execute(world)
            .await
            .map_err(|_| detached())?
            .result
            .execution_context_id;

        self.worlds
            .lock()
            .await
            .insert(title.to_string(), context.clone());
        Ok(context)
    }
}

fn frame_selector(title: &str) -> String {
    format!(
        "iframe[title={}]",
        serde_json::Value::String(title.to_string())
    )
}

#[async_trait]
impl Driver for ChromeDriver {
    #[instrument(skip(self))]
    async fn open(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        self.worlds.lock().await.clear();
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn frame_attached(&self, title: &str) -> Result<bool> {
        let owner = Locator::css(frame_selector(title));
        let attached: usize = self
            .eval(&Scope::Page, locator::count_visible_script(&owner))
            .await?;
        if attached == 0 {
            self.worlds.lock().await.remove(title);
        }
        Ok(attached > 0)
    }

    async fn count(&self, scope: &Scope, locator: &Locator) -> Result<usize> {
        self.eval(scope, locator::count_visible_script(locator)).await
    }

    async fn is_interactable(&self, scope: &Scope, locator: &Locator) -> Result<bool> {
        self.eval(scope, locator::interactable_script(locator)).await
    }

    #[instrument(skip(self, scope, locator), fields(scope = %scope, locator = %locator))]
    async fn click(&self, scope: &Scope, locator: &Locator) -> Result<bool> {
        self.eval(scope, locator::click_script(locator)).await
    }

    #[instrument(skip(self, scope, locator, text), fields(scope = %scope, locator = %locator))]
    async fn fill(&self, scope: &Scope, locator: &Locator, text: &str) -> Result<bool> {
        self.eval(scope, locator::fill_script(locator, text)).await
    }

    async fn press_key(&self, scope: &Scope, key: &str) -> Result<()> {
        let _: bool = self.eval(scope, locator::press_key_script(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_selector_quotes_title() {
        assert_eq!(
            frame_selector("EPR Reports"),
            r#"iframe[title="EPR Reports"]"#
        );
    }
}
