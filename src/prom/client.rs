use super::cache::QueryCache;
use super::config::{COMPARISON_OFFSET_SECS, DEFAULT_RANGE_SECS, RetryPolicy};
use super::error::QueryError;
use super::normalize::{NormalizedSeries, normalize};
use super::query::{RequestDescriptor, build_instant, build_range};
use super::response::decode;
use super::transport::{HttpExecutor, ReqwestExecutor, RetryingTransport};
use super::trend::{TrendResult, compute};
use super::window::{RangeWindow, resolve};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a dashboard board shows for one expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    /// Default one hour range, five points
    pub series: NormalizedSeries,
    /// Instant value one week before now
    pub comparison: NormalizedSeries,
    pub trend: TrendResult,
}

/// Metrics backend client
///
/// Builds requests against `base_url`, sends them through the retrying
/// transport and hands back normalized series. Results are memoized when a
/// cache is attached.
pub struct PromClient<E = ReqwestExecutor> {
    base_url: String,
    transport: RetryingTransport<E>,
    cache: Option<Arc<QueryCache>>,
}

impl PromClient<ReqwestExecutor> {
    /// Create a client backed by `reqwest`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> crate::error::Result<Self> {
        let executor = ReqwestExecutor::new(user_agent)?;
        Ok(Self::with_executor(base_url, executor, policy))
    }
}

impl<E: HttpExecutor> PromClient<E> {
    #[must_use]
    pub fn with_executor(base_url: impl Into<String>, executor: E, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.into(),
            transport: RetryingTransport::new(executor, policy),
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn transport(&self) -> &RetryingTransport<E> {
        &self.transport
    }

    /// Run an instant query; `eval_time` defaults to now
    ///
    /// # Errors
    ///
    /// Returns any build, transport or decode failure.
    pub async fn instant(
        &self,
        expression: &str,
        eval_time: Option<i64>,
    ) -> Result<NormalizedSeries, QueryError> {
        let request = build_instant(&self.base_url, expression, eval_time)?;
        self.fetch(&request).await
    }

    /// Run a range query, filling unset bounds and step with the defaults
    ///
    /// # Errors
    ///
    /// Returns any build, transport or decode failure.
    pub async fn range(
        &self,
        expression: &str,
        start: Option<i64>,
        end: Option<i64>,
        step: Option<&str>,
    ) -> Result<NormalizedSeries, QueryError> {
        let request = build_range(&self.base_url, expression, start, end, step)?;
        self.fetch(&request).await
    }

    /// Run a range query over a named dashboard window
    ///
    /// # Errors
    ///
    /// Returns any build, transport or decode failure.
    pub async fn range_window(
        &self,
        expression: &str,
        window: RangeWindow,
        step: Option<&str>,
    ) -> Result<NormalizedSeries, QueryError> {
        let range = resolve(window);
        debug!(
            "Window {} resolved to {}..{}",
            window,
            range.start_secs(),
            range.end_secs()
        );
        self.range(expression, Some(range.start_secs()), Some(range.end_secs()), step)
            .await
    }

    /// Fetch the default range and the value one week back, then compare them
    ///
    /// Both queries are in flight at the same time. A failed comparison query
    /// leaves the comparison empty and the trend `Insufficient`.
    ///
    /// # Errors
    ///
    /// Fails only if the current range query fails.
    pub async fn board(&self, expression: &str) -> Result<BoardSnapshot, QueryError> {
        let now = Utc::now().timestamp();
        let current = build_range(
            &self.base_url,
            expression,
            Some(now - DEFAULT_RANGE_SECS),
            Some(now),
            None,
        )?;
        let previous = build_instant(
            &self.base_url,
            expression,
            Some(now - COMPARISON_OFFSET_SECS),
        )?;

        let (series, comparison) = tokio::join!(self.fetch(&current), self.fetch(&previous));
        let series = series?;
        let comparison = comparison.unwrap_or_else(|err| {
            warn!("Comparison query for {} failed, trend unavailable: {}", expression, err);
            NormalizedSeries::empty()
        });
        let trend = compute(&series, &comparison);

        info!(
            "Board {}: latest {:?}, trend {} {:?}",
            expression,
            series.latest_value(),
            trend.direction.arrow(),
            trend.percent
        );

        Ok(BoardSnapshot {
            series,
            comparison,
            trend,
        })
    }

    /// Send a built request and normalize the answer
    ///
    /// # Errors
    ///
    /// Returns transport failures, undecodable bodies and backend errors.
    pub async fn fetch(&self, request: &RequestDescriptor) -> Result<NormalizedSeries, QueryError> {
        if let Some(cache) = &self.cache {
            if let Some(series) = cache.get(request).await {
                return Ok(series);
            }
        }

        let body = self.transport.execute(request).await?;
        let raw = decode(request.mode, &body)?;
        let series = normalize(&raw);

        let dropped = raw.flattened_sample_count().saturating_sub(series.len());
        if dropped > 0 {
            debug!("Dropped {} malformed samples from {}", dropped, request.url);
        }

        if let Some(cache) = &self.cache {
            cache.put(request, series.clone()).await;
        }

        Ok(series)
    }
}
