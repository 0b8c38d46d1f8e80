//! Pluggable load strategies.
//!
//! A [`LoadStrategy`] knows how to turn one kind of [`Request`] into a
//! [`LoadResult`]. The dispatcher picks the first registered strategy whose
//! [`can_handle`](LoadStrategy::can_handle) accepts the request and invokes
//! [`load`](LoadStrategy::load) once per execution attempt.
//!
//! Built-in strategies:
//!
//! | Strategy | Sources | Provenance |
//! |---|---|---|
//! | [`FileStrategy`] | `file://…`, absolute paths | Disk |
//! | [`AssetStrategy`] | `asset:///…` | Disk |
//! | [`NetworkStrategy`] | `http://…`, `https://…` | Network |

mod asset;
mod decode;
mod file;
mod network;

pub use asset::AssetStrategy;
pub use decode::{decode_bytes, orientation_degrees};
pub use file::FileStrategy;
pub use network::{
    NetworkStrategy, NetworkStrategyConfig, DEFAULT_NETWORK_RETRY_COUNT,
    DEFAULT_NETWORK_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

use crate::error::LoadError;
use crate::request::Request;
use crate::result::LoadResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by [`LoadStrategy::load`].
pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<LoadResult, LoadError>> + Send + 'a>>;

/// Fetches and decodes one kind of source.
///
/// The outcome of [`load`](Self::load) is terminal for the attempt: either a
/// result or an error, exactly once.
///
/// # Example
///
/// ```
/// use imgload::error::LoadError;
/// use imgload::request::Request;
/// use imgload::strategy::{LoadFuture, LoadStrategy};
///
/// struct Unreachable;
///
/// impl LoadStrategy for Unreachable {
///     fn name(&self) -> &str {
///         "unreachable"
///     }
///
///     fn can_handle(&self, request: &Request) -> bool {
///         request.source().scheme() == Some("void")
///     }
///
///     fn load<'a>(&'a self, _request: &'a Request) -> LoadFuture<'a> {
///         Box::pin(async { Err(LoadError::strategy("unreachable", "nothing here")) })
///     }
/// }
/// ```
pub trait LoadStrategy: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    fn can_handle(&self, request: &Request) -> bool;

    fn load<'a>(&'a self, request: &'a Request) -> LoadFuture<'a>;

    /// Number of retries a hunter using this strategy may attempt.
    fn retry_count(&self) -> u32 {
        0
    }

    /// Whether another attempt should be made given current connectivity.
    fn should_retry(&self, _is_connected: bool) -> bool {
        false
    }

    /// Whether `error` may be retried or replayed at all.
    ///
    /// Returning false makes the failure terminal without consulting
    /// [`should_retry`](Self::should_retry) or replay.
    fn should_retry_error(&self, _error: &LoadError) -> bool {
        true
    }

    /// Whether failed requests may be replayed once connectivity returns.
    fn supports_replay(&self) -> bool {
        false
    }
}

/// Strategy used when nothing else accepts a request.
#[derive(Debug, Default)]
pub struct UnsupportedStrategy;

impl LoadStrategy for UnsupportedStrategy {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn can_handle(&self, _request: &Request) -> bool {
        true
    }

    fn load<'a>(&'a self, request: &'a Request) -> LoadFuture<'a> {
        let source = request.source().to_string();
        Box::pin(async move { Err(LoadError::NoStrategy(source)) })
    }
}

/// Ordered set of strategies; first match wins.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn LoadStrategy>>,
    fallback: Arc<dyn LoadStrategy>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            fallback: Arc::new(UnsupportedStrategy),
        }
    }

    /// Appends a strategy with lower precedence than those already added.
    pub fn register(&mut self, strategy: Arc<dyn LoadStrategy>) {
        self.strategies.push(strategy);
    }

    /// Selects the strategy for a request.
    ///
    /// Falls back to a strategy that fails with [`LoadError::NoStrategy`].
    pub fn for_request(&self, request: &Request) -> Arc<dyn LoadStrategy> {
        self.strategies
            .iter()
            .find(|strategy| strategy.can_handle(request))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static str);

    impl LoadStrategy for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn can_handle(&self, request: &Request) -> bool {
            request.source().scheme() == Some(self.1)
        }

        fn load<'a>(&'a self, _request: &'a Request) -> LoadFuture<'a> {
            Box::pin(async { Err(LoadError::Cancelled) })
        }
    }

    #[test]
    fn test_first_match_wins() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(Named("first", "demo")));
        registry.register(Arc::new(Named("second", "demo")));

        let request = Request::uri("demo://x").build().unwrap();
        assert_eq!(registry.for_request(&request).name(), "first");
    }

    #[tokio::test]
    async fn test_unmatched_request_falls_back_to_unsupported() {
        let registry = StrategyRegistry::new();
        let request = Request::uri("gopher://x").build().unwrap();

        let strategy = registry.for_request(&request);
        assert_eq!(strategy.name(), "unsupported");
        assert_eq!(
            strategy.load(&request).await.unwrap_err(),
            LoadError::NoStrategy("gopher://x".to_string())
        );
    }

    #[test]
    fn test_default_retry_policy() {
        let strategy = Named("plain", "demo");
        assert_eq!(strategy.retry_count(), 0);
        assert!(!strategy.should_retry(true));
        assert!(!strategy.supports_replay());
        assert!(strategy.should_retry_error(&LoadError::strategy("plain", "boom")));
    }
}
