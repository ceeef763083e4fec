//! Method-to-plugin resolution and endpoint eligibility rules.
//!
//! Steem exposes the same call under several spellings (`get_block`,
//! `condenser_api.get_block`, `block_api.get_block`). Policy checks run
//! against every spelling so operators can list whichever form they prefer.

use ahash::{AHashMap, AHashSet};
use std::sync::LazyLock;

use super::endpoint::Endpoint;

/// Plugin assumed when a method does not name a known one.
pub const DEFAULT_PLUGIN: &str = "condenser_api";

/// Plugins recognised as the first segment of a method name.
pub const KNOWN_PLUGINS: &[&str] = &[
    "condenser_api",
    "network_broadcast_api",
    "rc_api",
    "account_by_key",
    "database_api",
    "account_history_api",
    "block_api",
    "market_history_api",
];

/// Bare method names whose owning plugin differs from the prefix they are called under.
pub const PLUGIN_ALIASES: &[(&str, &str)] = &[
    ("get_block", "block_api"),
    ("get_account_history", "account_history_api"),
    ("get_witness_by_account", "account_by_key"),
    ("get_accounts", "account_by_key"),
    ("get_market_history", "market_history_api"),
    ("get_market_history_buckets", "market_history_api"),
    ("get_open_orders", "market_history_api"),
];

/// Legacy and high-memory calls that only full nodes answer correctly.
pub const FULL_NODE_METHODS: &[&str] = &[
    "get_account_votes",
    "condenser_api.get_account_votes",
    "condenser_api.get_active_votes",
    "condenser_api.get_blog",
    "condenser_api.get_content",
    "condenser_api.get_content_replies",
    "condenser_api.get_discussions_by_active",
    "condenser_api.get_discussions_by_author_before_date",
    "condenser_api.get_discussions_by_blog",
    "condenser_api.get_discussions_by_cashout",
    "condenser_api.get_discussions_by_children",
    "condenser_api.get_discussions_by_comments",
    "condenser_api.get_discussions_by_created",
    "condenser_api.get_discussions_by_feed",
    "condenser_api.get_discussions_by_hot",
    "condenser_api.get_discussions_by_promoted",
    "condenser_api.get_discussions_by_trending",
    "condenser_api.get_discussions_by_votes",
    "condenser_api.get_comment_discussions_by_payout",
    "condenser_api.get_feed",
    "condenser_api.get_feed_entries",
    "condenser_api.get_follow_count",
    "condenser_api.get_followers",
    "condenser_api.get_following",
    "condenser_api.get_blog_authors",
    "condenser_api.get_blog_entries",
];

static KNOWN_PLUGINS_SET: LazyLock<AHashSet<&'static str>> =
    LazyLock::new(|| KNOWN_PLUGINS.iter().copied().collect());

static PLUGIN_ALIASES_MAP: LazyLock<AHashMap<&'static str, &'static str>> =
    LazyLock::new(|| PLUGIN_ALIASES.iter().copied().collect());

static FULL_NODE_METHODS_SET: LazyLock<AHashSet<&'static str>> =
    LazyLock::new(|| FULL_NODE_METHODS.iter().copied().collect());

/// Resolves the plugin responsible for `method`.
///
/// # Example
///
/// ```
/// use balancer_core::upstream::capability::find_plugin;
///
/// assert_eq!(find_plugin("get_accounts"), "account_by_key");
/// assert_eq!(find_plugin("condenser_api.get_block"), "block_api");
/// assert_eq!(find_plugin("database_api.get_config"), "database_api");
/// assert_eq!(find_plugin("get_dynamic_global_properties"), "condenser_api");
/// ```
#[must_use]
pub fn find_plugin(method: &str) -> &'static str {
    let mut segments = method.split('.');
    let base = segments.next().unwrap_or_default();

    if base == DEFAULT_PLUGIN {
        if let Some(plugin) =
            segments.next().and_then(|call| PLUGIN_ALIASES_MAP.get(call).copied())
        {
            return plugin;
        }
    }

    if let Some(plugin) = PLUGIN_ALIASES_MAP.get(base).copied() {
        return plugin;
    }

    KNOWN_PLUGINS_SET.get(base).copied().unwrap_or(DEFAULT_PLUGIN)
}

/// Returns every spelling of `method`: itself, the bare name, the
/// `condenser_api.` form and the owning plugin's form.
#[must_use]
pub fn call_aliases(method: &str) -> AHashSet<String> {
    let bare = method.rsplit('.').next().unwrap_or(method);
    let plugin = find_plugin(method);

    [
        method.to_string(),
        bare.to_string(),
        format!("{DEFAULT_PLUGIN}.{bare}"),
        format!("{plugin}.{bare}"),
    ]
    .into_iter()
    .collect()
}

/// Decides whether `endpoint` is allowed to serve `method`.
///
/// The whitelist short-circuits every other rule. Otherwise a missing plugin
/// or a blacklisted alias rejects the call, and light nodes reject the
/// full-node-only methods.
#[must_use]
pub fn can_call(endpoint: &Endpoint, method: &str) -> bool {
    let plugin = find_plugin(method);
    let aliases = call_aliases(method);
    let alias_iter = || aliases.iter().map(String::as_str);

    tracing::trace!(method = %method, plugin = %plugin, aliases = ?aliases, "resolving call");

    if !endpoint.call_whitelist.is_empty() && endpoint.whitelisted_any(alias_iter()) {
        return true;
    }

    if !endpoint.has_plugin(plugin) || endpoint.blacklisted_any(alias_iter()) {
        return false;
    }

    if !endpoint.full && alias_iter().any(|alias| FULL_NODE_METHODS_SET.contains(alias)) {
        return false;
    }

    true
}
