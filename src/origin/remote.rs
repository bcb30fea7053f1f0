//! The allow-list the validator reads from.
//!
//! The bundled list is always available. A remote document may replace it, but
//! only one fetch is ever attempted per cache, and a slow or broken fetch simply
//! leaves the bundled list in place.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::BUNDLED_VALID_ORIGINS;
use crate::error::BridgeError;

/// Shape of the published allow-list document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidOriginsDocument {
    #[serde(rename = "validOrigins", default)]
    pub valid_origins: Vec<String>,
}

/// Somewhere a [`ValidOriginsDocument`] can be fetched from.
pub trait AllowListSource {
    fn fetch(&self) -> impl Future<Output = Result<ValidOriginsDocument, BridgeError>>;
}

/// A source that hands back a fixed document. Handy for embedders that ship
/// their own list, and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAllowListSource {
    doc: ValidOriginsDocument,
}

impl StaticAllowListSource {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            doc: ValidOriginsDocument {
                valid_origins: origins.into_iter().map(Into::into).collect(),
            },
        }
    }
}

impl AllowListSource for StaticAllowListSource {
    async fn fetch(&self) -> Result<ValidOriginsDocument, BridgeError> {
        Ok(self.doc.clone())
    }
}

/// HTTPS source for the published document.
#[cfg(feature = "remote-allowlist")]
#[derive(Debug, Clone)]
pub struct HttpAllowListSource {
    client: reqwest::Client,
    url: url::Url,
}

#[cfg(feature = "remote-allowlist")]
impl HttpAllowListSource {
    pub fn new(url: &str) -> Result<Self, BridgeError> {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Use a preconfigured client (proxy, TLS roots, user agent).
    pub fn with_client(client: reqwest::Client, url: &str) -> Result<Self, BridgeError> {
        Ok(Self {
            client,
            url: url::Url::parse(url)?,
        })
    }

    pub fn from_config(cfg: &crate::config::RemoteAllowListConfig) -> Result<Self, BridgeError> {
        Self::new(&cfg.url)
    }
}

#[cfg(feature = "remote-allowlist")]
impl AllowListSource for HttpAllowListSource {
    async fn fetch(&self) -> Result<ValidOriginsDocument, BridgeError> {
        let doc = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<ValidOriginsDocument>()
            .await?;
        Ok(doc)
    }
}

static SHARED: Lazy<Arc<AllowListCache>> = Lazy::new(|| Arc::new(AllowListCache::bundled()));

/// Bundled list plus a write-once remote slot.
#[derive(Debug)]
pub struct AllowListCache {
    bundled: Vec<String>,
    remote: OnceCell<Vec<String>>,
    attempted: AtomicBool,
}

impl AllowListCache {
    pub fn new<I, S>(bundled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bundled: bundled.into_iter().map(Into::into).collect(),
            remote: OnceCell::new(),
            attempted: AtomicBool::new(false),
        }
    }

    /// A cache seeded with [`BUNDLED_VALID_ORIGINS`].
    pub fn bundled() -> Self {
        Self::new(BUNDLED_VALID_ORIGINS.iter().copied())
    }

    /// The process-wide cache. Bridges built with default settings share it, so
    /// the remote document is fetched at most once per process.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// The list currently in force.
    pub fn origins(&self) -> &[String] {
        self.remote.get().unwrap_or(&self.bundled)
    }

    pub fn is_remote(&self) -> bool {
        self.remote.get().is_some()
    }

    pub fn prefetch_attempted(&self) -> bool {
        self.attempted.load(Ordering::Acquire)
    }

    /// Try once to replace the bundled list with the remote one.
    ///
    /// Returns `true` when the remote list is in force afterwards. Any failure
    /// (error, timeout, empty list) is logged and leaves the bundled list.
    pub async fn prefetch<S: AllowListSource>(&self, source: &S, timeout: Duration) -> bool {
        if self.attempted.swap(true, Ordering::AcqRel) {
            debug!("allow-list prefetch already attempted");
            return self.is_remote();
        }

        match tokio::time::timeout(timeout, source.fetch()).await {
            Ok(Ok(doc)) => {
                let origins: Vec<String> = doc
                    .valid_origins
                    .into_iter()
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect();
                if origins.is_empty() {
                    warn!("remote allow-list is empty; keeping bundled list");
                    return false;
                }
                info!(count = origins.len(), "remote allow-list installed");
                // Only this call passed the `attempted` gate, so the slot is empty.
                let _ = self.remote.set(origins);
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "remote allow-list fetch failed; keeping bundled list");
                false
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "remote allow-list fetch timed out; keeping bundled list");
                false
            }
        }
    }
}
