pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod query;
pub mod response;
pub mod step;
pub mod transport;
pub mod trend;
pub mod window;

pub use cache::{CacheStats, QueryCache};
pub use client::{BoardSnapshot, PromClient};
pub use config::RetryPolicy;
pub use error::{QueryError, TransientCause, TransportError};
pub use normalize::{NormalizedPoint, NormalizedSeries};
pub use query::{MetricQuery, QueryMode, RequestDescriptor};
pub use transport::{HttpExecutor, HttpResponse, ReqwestExecutor, RetryingTransport};
pub use trend::{TrendDirection, TrendResult};
pub use window::{RangeWindow, TimeRange};

/// Default user agent for `cranedash` - automatically uses the package version
///
/// Sent on every request to the metrics backend so proxy and backend logs can
/// attribute dashboard traffic. Can be overridden via the
/// `CRANEDASH_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
