use std::sync::Arc;

use tracing::trace;
use url::Url;

use super::remote::AllowListCache;

const SECURE_SCHEME: &str = "https";
const SECURE_PREFIX: &str = "https://";

/// Match a host against a literal host or a `*.suffix` pattern.
///
/// A wildcard stands for exactly one leading label, so `*.teams.microsoft.com`
/// accepts `sub.teams.microsoft.com` but neither `a.b.teams.microsoft.com` nor
/// `teams.microsoft.com.evil.com`.
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if pattern.starts_with("*.") {
        // Keep the leading dot so the label counts line up: ".a.b" splits into 3.
        let suffix = &pattern[1..];
        host.len() > suffix.len()
            && host.split('.').count() == suffix.split('.').count()
            && host.ends_with(suffix)
    } else {
        pattern == host
    }
}

/// `host[:port]` as the browser reports it (default ports omitted).
fn host_with_port(origin: &Url) -> Option<String> {
    let host = origin.host_str()?;
    Some(match origin.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Decides whether a peer origin may exchange messages with us.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    allow_list: Arc<AllowListCache>,
    additional: Vec<String>,
}

impl OriginValidator {
    pub fn new(allow_list: Arc<AllowListCache>, additional: Vec<String>) -> Self {
        Self {
            allow_list,
            additional,
        }
    }

    pub fn allow_list(&self) -> &Arc<AllowListCache> {
        &self.allow_list
    }

    pub fn additional_origins(&self) -> &[String] {
        &self.additional
    }

    pub fn set_additional_origins(&mut self, additional: Vec<String>) {
        self.additional = additional;
    }

    pub fn is_allowed(&self, origin: &Url) -> bool {
        if origin.scheme() != SECURE_SCHEME {
            trace!(%origin, "origin rejected: insecure scheme");
            return false;
        }
        let Some(host) = host_with_port(origin) else {
            return false;
        };

        if self
            .allow_list
            .origins()
            .iter()
            .any(|pattern| matches_host_pattern(pattern, &host))
        {
            return true;
        }

        let extra = self.additional.iter().any(|entry| {
            let pattern = entry.strip_prefix(SECURE_PREFIX).unwrap_or(entry);
            matches_host_pattern(pattern, &host)
        });
        if !extra {
            trace!(%origin, "origin rejected: not in allow-list");
        }
        extra
    }

    /// Parse and check in one go; unparsable origins are rejected.
    pub fn is_allowed_str(&self, origin: &str) -> bool {
        match Url::parse(origin) {
            Ok(url) => self.is_allowed(&url),
            Err(e) => {
                trace!(origin, error = %e, "origin rejected: unparsable");
                false
            }
        }
    }
}
