//! Centralized configuration for Shoal.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::time::Duration;

/// Central configuration for all Shoal components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ShoalConfig {
    pub client: ClientConfig,
    pub network: NetworkConfig,
}

/// What happens to a torrent's peers and statistics when it is unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnloadPolicy {
    /// Unload and reload both start from empty peer and statistics records
    #[default]
    ClearHistory,
    /// Keep records across unload; they become readable again on reload
    RetainHistory,
}

/// Client identity and torrent lifecycle configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Azureus-style client prefix of the peer id
    pub peer_id_prefix: &'static str,
    /// Stable per-install string hashed into the peer id
    pub install_seed: String,
    /// TCP port reported to trackers
    pub listen_port: u16,
    pub unload_policy: UnloadPolicy,
    /// Fixed seed for tier shuffling (None = OS entropy)
    pub shuffle_seed: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_id_prefix: "-SH0001-",
            install_seed: "shoal".to_string(),
            listen_port: 6881,
            unload_policy: UnloadPolicy::default(),
            shuffle_seed: None,
        }
    }
}

/// Tracker communication configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Upper bound for one tracker request, connect to last body byte
    pub tracker_timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: &'static str,
    /// Redirects followed before a request fails
    pub max_redirects: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tracker_timeout: Duration::from_secs(30),
            user_agent: "shoal/0.1.0",
            max_redirects: 3,
        }
    }
}

impl ShoalConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(seconds) = lookup("SHOAL_TRACKER_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.network.tracker_timeout = Duration::from_secs(seconds);
        }

        if let Some(port) = lookup("SHOAL_LISTEN_PORT").and_then(|v| v.parse().ok()) {
            config.client.listen_port = port;
        }

        if let Some(seed) = lookup("SHOAL_SHUFFLE_SEED").and_then(|v| v.parse().ok()) {
            config.client.shuffle_seed = Some(seed);
        }

        if let Some(retain) = lookup("SHOAL_RETAIN_HISTORY").and_then(|v| v.parse::<bool>().ok())
        {
            config.client.unload_policy = if retain {
                UnloadPolicy::RetainHistory
            } else {
                UnloadPolicy::ClearHistory
            };
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            client: ClientConfig {
                install_seed: "shoal-test".to_string(),
                shuffle_seed: Some(42),
                ..Default::default()
            },
            network: NetworkConfig {
                tracker_timeout: Duration::from_secs(2),
                ..Default::default()
            },
        }
    }
}
