use ahash::AHashSet;
use std::{fmt, sync::Arc};

/// A configured Steem RPC backend.
///
/// Endpoints are built once by the registry loader and never mutated. The
/// plugin and call sets are owned by each endpoint; an empty plugin set means
/// the node supports every plugin.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: Arc<str>,
    pub name: Option<Arc<str>>,
    /// Pool replication factor, `1..=MAX_WEIGHT` once loaded into a registry.
    pub weight: u32,
    pub full: bool,
    pub plugins: AHashSet<String>,
    pub call_whitelist: AHashSet<String>,
    pub call_blacklist: AHashSet<String>,
}

impl Endpoint {
    /// Creates a full node with weight 1 and no restrictions.
    #[must_use]
    pub fn new(host: impl Into<Arc<str>>) -> Self {
        Self {
            host: host.into(),
            name: None,
            weight: 1,
            full: true,
            plugins: AHashSet::new(),
            call_whitelist: AHashSet::new(),
            call_blacklist: AHashSet::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    #[must_use]
    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    #[must_use]
    pub fn with_plugins<I, S>(mut self, plugins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plugins = plugins.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_whitelist<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call_whitelist = calls.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_blacklist<I, S>(mut self, calls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call_blacklist = calls.into_iter().map(Into::into).collect();
        self
    }

    /// Display identity: the configured name, or the host when unnamed.
    #[must_use]
    pub fn identity(&self) -> &Arc<str> {
        self.name.as_ref().unwrap_or(&self.host)
    }

    /// Returns `true` if the node serves `plugin`. An empty plugin set supports everything.
    #[must_use]
    pub fn has_plugin(&self, plugin: &str) -> bool {
        self.plugins.is_empty() || self.plugins.contains(plugin)
    }

    /// Returns `true` if any of `calls` is on the whitelist.
    #[must_use]
    pub fn whitelisted_any<'a>(&self, calls: impl IntoIterator<Item = &'a str>) -> bool {
        calls.into_iter().any(|call| self.call_whitelist.contains(call))
    }

    /// Returns `true` if any of `calls` is on the blacklist.
    #[must_use]
    pub fn blacklisted_any<'a>(&self, calls: impl IntoIterator<Item = &'a str>) -> bool {
        calls.into_iter().any(|call| self.call_blacklist.contains(call))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Endpoint '{}' weight={}>", self.identity(), self.weight)
    }
}
