//! Option structures for transport, model, polling and session configuration.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Generic model options containing common generation parameters
/// and provider-specific model configuration.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelOptions<T> {
    /// Model identifier (e.g., "gemini-2.0-flash").
    pub model: String,

    /// System instructions sent alongside every query.
    pub system: Option<String>,

    /// Temperature for sampling (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Top-p (nucleus) sampling parameter.
    pub top_p: Option<f32>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,

    /// Provider-specific model options.
    pub provider: T,
}

impl<T: Default> ModelOptions<T> {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            provider: T::default(),
        }
    }

    /// Set the system instructions.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Transport configuration options.
///
/// Controls how requests are sent over the network.
#[derive(Debug, Clone)]
pub enum TransportOptions {
    /// HTTP transport configuration
    Http {
        /// Request timeout. If None, default client timeout is used.
        /// Generation requests override this with the per-query timeout.
        timeout: Option<Duration>,
        /// HTTP proxy URL.
        proxy: Option<String>,
        /// Additional HTTP headers to send with every request.
        headers: Option<HashMap<String, String>>,
    },
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions::Http {
            timeout: None,
            proxy: None,
            headers: None,
        }
    }
}

impl TransportOptions {
    /// Create new default HTTP transport options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        match &mut self {
            TransportOptions::Http { timeout, .. } => *timeout = Some(duration),
        }
        self
    }

    /// Set the proxy.
    pub fn with_proxy(mut self, proxy_url: String) -> Self {
        match &mut self {
            TransportOptions::Http { proxy, .. } => *proxy = Some(proxy_url),
        }
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        match &mut self {
            TransportOptions::Http { headers, .. } => {
                headers.get_or_insert_with(HashMap::new).insert(key, value);
            }
        }
        self
    }
}

/// Fixed-interval polling policy used while waiting for remote processing.
///
/// There is no backoff or jitter: the service is asked for its state once per
/// `interval` until `max_wait` has been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Total time budget for one wait.
    pub max_wait: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Shortest delay between two status checks; smaller intervals are raised to it.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl PollOptions {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    /// Set the delay between polls.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the total wait budget.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// The interval actually slept between polls, never below [`MIN_POLL_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

/// Options for a [`RemoteJobTracker`](crate::tracker::RemoteJobTracker).
#[derive(Debug, Clone, Default)]
pub struct TrackerOptions {
    /// When set, payloads are staged to a temporary file in this directory
    /// and uploaded from it. The file is kept until processing ends.
    pub staging_dir: Option<PathBuf>,
}

impl TrackerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage payloads in the given directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Stage payloads in the system temporary directory.
    pub fn with_system_staging(self) -> Self {
        self.with_staging_dir(std::env::temp_dir())
    }
}

/// Options for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Polling policy used by `load`.
    pub poll: PollOptions,
    /// Upper bound for a single generation request.
    pub query_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll: PollOptions::default(),
            query_timeout: Duration::from_secs(600),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the polling policy.
    pub fn with_poll(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    /// Set the generation timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}
