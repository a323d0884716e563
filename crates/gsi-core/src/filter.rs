//! Acceptance filters evaluated before an update is decoded.
//!
//! A [`FilterChain`] is an ordered list of [`StateFilter`] predicates over a
//! [`SessionContext`]. The chain permits an update iff it is empty or every
//! predicate returns `true`; evaluation stops at the first `false`.
//!
//! Predicates are pure. Rejections log the failing predicate's description,
//! which names token keys but never token values.

use std::net::IpAddr;

use tracing::info;

use crate::config::FilterConfig;
use crate::context::SessionContext;

/// A predicate that may reject an update before it is committed.
pub trait StateFilter: Send + Sync {
    /// Whether the update described by `context` may proceed.
    fn permits(&self, context: &SessionContext) -> bool;

    /// Short human-readable name used in logs and rejections.
    fn describe(&self) -> String;
}

/// Requires an auth token with a specific value.
#[derive(Clone)]
pub struct RequireAuthToken {
    key: String,
    expected: String,
}

impl RequireAuthToken {
    /// Require `key` (case-insensitive) to carry exactly `expected`.
    pub fn new(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            key: key.into().to_ascii_lowercase(),
            expected: expected.into(),
        }
    }

    /// The required key, lowercased.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for RequireAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequireAuthToken")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl StateFilter for RequireAuthToken {
    fn permits(&self, context: &SessionContext) -> bool {
        context.auth().matches(&self.key, &self.expected)
    }

    fn describe(&self) -> String {
        format!("auth token {:?}", self.key)
    }
}

/// Only accepts updates from loopback addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackOnly;

impl StateFilter for LoopbackOnly {
    fn permits(&self, context: &SessionContext) -> bool {
        is_loopback(context.client().ip())
    }

    fn describe(&self) -> String {
        String::from("loopback only")
    }
}

/// IPv4 loopback also counts when it arrives as an IPv4-mapped IPv6 address.
fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}

/// Only accepts updates from an explicit set of addresses.
#[derive(Debug, Clone)]
pub struct AddressAllowList {
    allowed: Vec<IpAddr>,
}

impl AddressAllowList {
    /// Allow exactly these addresses.
    pub fn new(allowed: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl StateFilter for AddressAllowList {
    fn permits(&self, context: &SessionContext) -> bool {
        let ip = context.client().ip();
        let canonical = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(ip, IpAddr::V4),
            IpAddr::V4(_) => ip,
        };
        self.allowed.contains(&ip) || self.allowed.contains(&canonical)
    }

    fn describe(&self) -> String {
        format!("address allow-list ({} entries)", self.allowed.len())
    }
}

/// Only accepts updates posted to one exact path.
#[derive(Debug, Clone)]
pub struct PathEquals {
    path: String,
}

impl PathEquals {
    /// Require the request path to equal `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl StateFilter for PathEquals {
    fn permits(&self, context: &SessionContext) -> bool {
        context.path() == self.path
    }

    fn describe(&self) -> String {
        format!("path {:?}", self.path)
    }
}

/// An update was rejected by a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rejected by filter: {filter}")]
pub struct FilterRejection {
    /// Description of the rejecting filter.
    pub filter: String,
}

/// Ordered, short-circuiting set of filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn StateFilter>>,
}

impl FilterChain {
    /// An empty chain, which permits everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain described by configuration.
    ///
    /// Order is fixed: path, loopback, allow-list, then auth tokens sorted
    /// by key.
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut chain = Self::new();
        if let Some(path) = &config.path {
            chain.push(PathEquals::new(path.clone()));
        }
        if config.loopback_only {
            chain.push(LoopbackOnly);
        }
        if !config.allowed_addresses.is_empty() {
            chain.push(AddressAllowList::new(config.allowed_addresses.iter().copied()));
        }
        for (key, expected) in &config.auth_tokens {
            chain.push(RequireAuthToken::new(key.clone(), expected.clone()));
        }
        chain
    }

    /// Append a filter. It runs after every filter already in the chain.
    pub fn push(&mut self, filter: impl StateFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, filter: impl StateFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Descriptions of every filter, in evaluation order.
    pub fn describe(&self) -> Vec<String> {
        self.filters.iter().map(|filter| filter.describe()).collect()
    }

    /// Evaluate the chain, stopping at the first filter that rejects.
    pub fn check(&self, context: &SessionContext) -> Result<(), FilterRejection> {
        match self.filters.iter().find(|filter| !filter.permits(context)) {
            None => Ok(()),
            Some(filter) => {
                let filter = filter.describe();
                info!(
                    sequence = context.sequence(),
                    client = %context.client(),
                    filter = %filter,
                    "update rejected by filter"
                );
                Err(FilterRejection { filter })
            }
        }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.describe()).finish()
    }
}
