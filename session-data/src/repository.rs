use crate::{bar::Bar, error::RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use session_instrument::{Interval, Symbol};

/// Single entry point onto whatever durable bar store backs this session (Parquet, a
/// time-series database, or a vendor API client). The core never inspects the concrete
/// implementation - no duck typing, one method per operation.
#[async_trait]
pub trait BarRepository: Send + Sync {
    /// Bars in `[start, end)`, chronological, inclusive of `start` and exclusive of `end`.
    async fn get_bars(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, RepositoryError>;

    /// The most recently written bar for `(symbol, interval)`, if any.
    async fn get_latest_bar(
        &self,
        symbol: &Symbol,
        interval: &Interval,
    ) -> Result<Option<Bar>, RepositoryError>;

    /// Persist bars obtained during gap-fill repair.
    async fn write_bars(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        bars: &[Bar],
    ) -> Result<(), RepositoryError>;
}
