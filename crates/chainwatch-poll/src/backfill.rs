//! Watermark-bounded backfill over newest-first paginated listings.
//!
//! The watermark is the highest entry ID processed so far. Each run walks
//! pages from the newest entry backwards and stops at the first entry at or
//! below the watermark, so every entry is visited once across runs.
//!
//! Two bounds keep a run cheap:
//!
//! - On the very first run ([`NEVER_RUN`]) only one page is read; history
//!   older than that page is never scanned.
//! - At most `page_threshold` pages are read per run. When the threshold is
//!   hit the watermark still moves to the newest ID seen and the older
//!   uncovered entries are skipped for good. This bounds latency under
//!   sustained volume at the cost of under-counting.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::outlier::is_denomination;

/// Pages fetched per run before giving up on reaching the watermark.
pub const DEFAULT_PAGE_THRESHOLD: usize = 10;

/// Watermark value of a backfill that has never run.
pub const NEVER_RUN: u64 = 0;

/// An entry with a monotonically increasing ID (transaction ID, height...).
pub trait Sequenced {
    fn sequence_id(&self) -> u64;
}

/// One page of a newest-first listing.
#[derive(Debug, Clone)]
pub struct Page<E> {
    /// Entries in descending ID order.
    pub entries: Vec<E>,
    /// Cursor for the next (older) page; `None` at the end of the listing.
    pub next_cursor: Option<String>,
}

impl<E> Page<E> {
    pub fn new(entries: Vec<E>, next_cursor: Option<String>) -> Self {
        Self {
            entries,
            next_cursor,
        }
    }

    pub fn last(entries: Vec<E>) -> Self {
        Self::new(entries, None)
    }
}

/// A paginated, newest-first data source.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Entry: Sequenced + Send + Sync;

    /// Fetch the page at `cursor`; `None` is the newest page.
    async fn fetch_page(
        &self,
        ctx: &CancellationToken,
        cursor: Option<&str>,
    ) -> anyhow::Result<Page<Self::Entry>>;
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// First run: one page read.
    ColdStart,
    /// Reached an entry at or below the previous watermark.
    CaughtUp,
    /// The listing ended before the watermark was found.
    Exhausted,
    /// `page_threshold` pages read without reaching the watermark.
    ThresholdReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub pages_fetched: usize,
    pub entries_processed: usize,
    pub previous_watermark: u64,
    pub watermark: u64,
    pub stop: StopReason,
}

/// Backfill state for one listing. Held in memory only; a restart begins
/// again from [`NEVER_RUN`].
#[derive(Debug, Clone)]
pub struct Backfill {
    watermark: u64,
    page_threshold: usize,
}

impl Default for Backfill {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_THRESHOLD)
    }
}

impl Backfill {
    pub fn new(page_threshold: usize) -> Self {
        Self {
            watermark: NEVER_RUN,
            page_threshold: page_threshold.max(1),
        }
    }

    pub fn with_watermark(mut self, watermark: u64) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn watermark(&self) -> u64 {
        self.watermark
    }

    pub fn page_threshold(&self) -> usize {
        self.page_threshold
    }

    /// Visit every entry newer than the watermark, then advance it.
    ///
    /// A fetch error aborts the run and leaves the watermark untouched, so
    /// the same entries are offered again next run. Callers should discard
    /// whatever `visit` accumulated in that case.
    pub async fn run<S, F>(
        &mut self,
        ctx: &CancellationToken,
        source: &S,
        mut visit: F,
    ) -> anyhow::Result<BackfillReport>
    where
        S: PageSource + ?Sized,
        F: FnMut(&S::Entry),
    {
        let previous = self.watermark;

        if previous == NEVER_RUN {
            let page = source.fetch_page(ctx, None).await?;
            let mut newest = previous;
            for entry in &page.entries {
                newest = newest.max(entry.sequence_id());
                visit(entry);
            }
            self.watermark = newest;
            debug!(watermark = newest, entries = page.entries.len(), "backfill cold start");
            return Ok(BackfillReport {
                pages_fetched: 1,
                entries_processed: page.entries.len(),
                previous_watermark: previous,
                watermark: newest,
                stop: StopReason::ColdStart,
            });
        }

        let mut cursor: Option<String> = None;
        let mut newest = previous;
        let mut pages_fetched = 0;
        let mut entries_processed = 0;
        let mut stop = StopReason::ThresholdReached;

        'pages: while pages_fetched < self.page_threshold {
            let page = source.fetch_page(ctx, cursor.as_deref()).await?;
            pages_fetched += 1;

            if page.entries.is_empty() {
                stop = StopReason::Exhausted;
                break;
            }

            for entry in &page.entries {
                let id = entry.sequence_id();
                if id <= previous {
                    stop = StopReason::CaughtUp;
                    break 'pages;
                }
                newest = newest.max(id);
                visit(entry);
                entries_processed += 1;
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    stop = StopReason::Exhausted;
                    break;
                }
            }
        }

        if stop == StopReason::ThresholdReached {
            warn!(
                pages = pages_fetched,
                previous_watermark = previous,
                watermark = newest,
                "backfill page threshold reached; older entries skipped"
            );
        }

        self.watermark = newest;
        Ok(BackfillReport {
            pages_fetched,
            entries_processed,
            previous_watermark: previous,
            watermark: newest,
            stop,
        })
    }
}

/// Parse a numeric field from a listing entry, degrading to zero.
///
/// Accepts plain numbers, exponent forms (`"2.5e+16"`) and coin strings
/// with a trailing denomination (`"5000uluna"`). Anything else is logged
/// and counted as zero so one bad field never aborts a page.
pub fn lenient_amount(field: &str, raw: &str) -> f64 {
    let trimmed = raw.trim();
    let numeric_len = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(numeric_len);

    let parsed = if is_denomination(suffix) {
        number.parse::<f64>()
    } else {
        trimmed.parse::<f64>()
    };
    match parsed {
        Ok(value) if value.is_finite() => value,
        _ => {
            warn!(field, value = raw, "malformed numeric field, using zero");
            0.0
        }
    }
}
