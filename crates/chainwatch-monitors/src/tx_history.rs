//! Transaction counters fed by watermark backfill.
//!
//! Each run visits only transactions newer than the previous run's
//! watermark and adds them to drain counters, so a scrape sees exactly the
//! transactions that landed since the previous scrape.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chainwatch_metrics::{MetricSet, MetricStore};
use chainwatch_monitor::Monitor;
use chainwatch_poll::{lenient_amount, Backfill, Page, PageSource, Sequenced};
use chainwatch_transport::{EndpointClient, FailoverTransport, HttpClient};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TxHistoryConfig;
use crate::json;

/// One transaction as listed by the gateway. Numeric fields are kept raw
/// and parsed leniently when counted.
#[derive(Debug, Clone, PartialEq)]
pub struct TxRecord {
    pub id: u64,
    pub success: bool,
    pub gas_used: String,
    pub fee: String,
}

impl Sequenced for TxRecord {
    fn sequence_id(&self) -> u64 {
        self.id
    }
}

/// Reads a newest-first transaction listing through JSON pointers.
pub struct JsonPageSource<C = HttpClient> {
    config: TxHistoryConfig,
    transport: Arc<FailoverTransport<C>>,
}

impl<C: EndpointClient> JsonPageSource<C> {
    pub fn new(config: TxHistoryConfig, transport: Arc<FailoverTransport<C>>) -> Self {
        Self { config, transport }
    }

    fn record(&self, entry: &Value) -> Option<TxRecord> {
        let id = json::u64_at(entry, &self.config.id_pointer)?;
        let success = json::lookup(entry, &self.config.code_pointer)
            .and_then(json::as_u64)
            .is_none_or(|code| code == 0);
        Some(TxRecord {
            id,
            success,
            gas_used: json::text_at(entry, &self.config.gas_pointer).unwrap_or_default(),
            fee: json::text_at(entry, &self.config.fee_pointer).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl<C: EndpointClient + 'static> PageSource for JsonPageSource<C> {
    type Entry = TxRecord;

    async fn fetch_page(
        &self,
        ctx: &CancellationToken,
        cursor: Option<&str>,
    ) -> anyhow::Result<Page<TxRecord>> {
        let path = json::fill(&self.config.path, "cursor", cursor.unwrap_or(""));
        let doc: Value = self
            .transport
            .get_json(ctx, &path)
            .await
            .with_context(|| format!("{}: fetching {path}", self.config.name))?;

        let entries = json::lookup(&doc, &self.config.entries_pointer)
            .and_then(Value::as_array)
            .with_context(|| {
                format!(
                    "{}: no array at {}",
                    self.config.name, self.config.entries_pointer
                )
            })?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.record(entry) {
                Some(record) => records.push(record),
                None => warn!(monitor = %self.config.name, "skipping transaction without id"),
            }
        }

        let next_cursor = json::text_at(&doc, &self.config.next_pointer).filter(|c| !c.is_empty());
        Ok(Page::new(records, next_cursor))
    }
}

pub struct TxHistoryMonitor<S> {
    name: String,
    names: Names,
    store: MetricStore,
    backfill: Mutex<Backfill>,
    source: S,
}

struct Names {
    succeeded: String,
    failed: String,
    gas_used: String,
    fees: String,
    watermark: String,
}

#[derive(Default)]
struct Totals {
    succeeded: f64,
    failed: f64,
    gas_used: f64,
    fees: f64,
}

impl<S: PageSource<Entry = TxRecord>> TxHistoryMonitor<S> {
    pub fn new(name: impl Into<String>, page_threshold: usize, source: S) -> Self {
        let name = name.into();
        let names = Names {
            succeeded: format!("{name}_tx_succeeded"),
            failed: format!("{name}_tx_failed"),
            gas_used: format!("{name}_gas_used"),
            fees: format!("{name}_fees"),
            watermark: format!("{name}_watermark"),
        };
        let schema = MetricSet::new()
            .with_drain(names.succeeded.as_str())
            .with_drain(names.failed.as_str())
            .with_drain(names.gas_used.as_str())
            .with_drain(names.fees.as_str())
            .with_gauge(names.watermark.as_str());

        Self {
            name,
            names,
            store: MetricStore::new(schema),
            backfill: Mutex::new(Backfill::new(page_threshold)),
            source,
        }
    }

    pub async fn watermark(&self) -> u64 {
        self.backfill.lock().await.watermark()
    }
}

#[async_trait]
impl<S: PageSource<Entry = TxRecord> + 'static> Monitor for TxHistoryMonitor<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn store(&self) -> &MetricStore {
        &self.store
    }

    async fn handler(&self, ctx: &CancellationToken) -> anyhow::Result<()> {
        let mut backfill = self.backfill.lock().await;
        let mut totals = Totals::default();

        let report = backfill
            .run(ctx, &self.source, |tx| {
                if tx.success {
                    totals.succeeded += 1.0;
                } else {
                    totals.failed += 1.0;
                }
                totals.gas_used += lenient_amount("gas_used", &tx.gas_used);
                totals.fees += lenient_amount("fee", &tx.fee);
            })
            .await
            .with_context(|| format!("{}: backfill", self.name))?;

        let mut staging = self.store.stage();
        staging.add(&self.names.succeeded, totals.succeeded)?;
        staging.add(&self.names.failed, totals.failed)?;
        staging.add(&self.names.gas_used, totals.gas_used)?;
        staging.add(&self.names.fees, totals.fees)?;
        staging.set(&self.names.watermark, report.watermark as f64)?;
        staging.commit().await;

        debug!(
            monitor = %self.name,
            pages = report.pages_fetched,
            entries = report.entries_processed,
            watermark = report.watermark,
            stop = ?report.stop,
            "tx history updated"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGateway;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    /// Newest-first listing of `ids`, `per_page` per page, cursor = offset.
    struct Listing {
        ids: StdMutex<Vec<u64>>,
        per_page: usize,
        fail: StdMutex<bool>,
    }

    impl Listing {
        fn new(mut ids: Vec<u64>, per_page: usize) -> Self {
            ids.sort_unstable_by(|a, b| b.cmp(a));
            Self {
                ids: StdMutex::new(ids),
                per_page,
                fail: StdMutex::new(false),
            }
        }

        fn push(&self, new: impl IntoIterator<Item = u64>) {
            let mut ids = self.ids.lock().unwrap();
            ids.extend(new);
            ids.sort_unstable_by(|a, b| b.cmp(a));
        }
    }

    #[async_trait]
    impl PageSource for Listing {
        type Entry = TxRecord;

        async fn fetch_page(
            &self,
            _ctx: &CancellationToken,
            cursor: Option<&str>,
        ) -> anyhow::Result<Page<TxRecord>> {
            if *self.fail.lock().unwrap() {
                anyhow::bail!("listing unavailable");
            }
            let offset: usize = cursor.map(str::parse::<usize>).transpose()?.unwrap_or(0);
            let ids = self.ids.lock().unwrap();
            let entries: Vec<TxRecord> = ids
                .iter()
                .skip(offset)
                .take(self.per_page)
                .map(|&id| TxRecord {
                    id,
                    success: id % 5 != 0,
                    gas_used: "100".to_string(),
                    fee: format!("{}uluna", 10),
                })
                .collect();
            let next = offset + self.per_page;
            let next_cursor = (next < ids.len()).then(|| next.to_string());
            Ok(Page::new(entries, next_cursor))
        }
    }

    #[tokio::test]
    async fn counts_only_new_transactions() {
        let ctx = CancellationToken::new();
        let listing = Listing::new((1..=10).collect(), 4);
        let monitor = TxHistoryMonitor::new("treasury", 10, listing);

        // Cold start: one page only (ids 10..7).
        monitor.handler(&ctx).await.unwrap();
        assert_eq!(monitor.watermark().await, 10);
        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 3.0);
        assert_eq!(monitor.get_metric("treasury_tx_failed").await.unwrap(), 1.0);
        assert_eq!(monitor.get_metric("treasury_gas_used").await.unwrap(), 400.0);
        assert_eq!(monitor.get_metric("treasury_fees").await.unwrap(), 40.0);
        assert_eq!(monitor.get_metric("treasury_watermark").await.unwrap(), 10.0);

        // Nothing new: drains stay at zero.
        monitor.handler(&ctx).await.unwrap();
        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 0.0);

        // Six new transactions span two pages.
        monitor.source.push(11..=16);
        monitor.handler(&ctx).await.unwrap();
        assert_eq!(monitor.watermark().await, 16);
        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 5.0);
        assert_eq!(monitor.get_metric("treasury_tx_failed").await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn runs_between_scrapes_accumulate() {
        let ctx = CancellationToken::new();
        let listing = Listing::new(vec![1, 2], 10);
        let monitor = TxHistoryMonitor::new("treasury", 10, listing);

        monitor.handler(&ctx).await.unwrap();
        monitor.source.push([3, 4]);
        monitor.handler(&ctx).await.unwrap();

        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 4.0);
        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn failed_run_commits_nothing() {
        let ctx = CancellationToken::new();
        let listing = Listing::new(vec![1, 2], 10);
        let monitor = TxHistoryMonitor::new("treasury", 10, listing);
        monitor.handler(&ctx).await.unwrap();
        let _ = monitor.get_metric("treasury_tx_succeeded").await.unwrap();

        monitor.source.push([3]);
        *monitor.source.fail.lock().unwrap() = true;
        assert!(monitor.handler(&ctx).await.is_err());
        assert_eq!(monitor.watermark().await, 2);
        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 0.0);

        *monitor.source.fail.lock().unwrap() = false;
        monitor.handler(&ctx).await.unwrap();
        assert_eq!(monitor.get_metric("treasury_tx_succeeded").await.unwrap(), 1.0);
    }

    fn json_config() -> TxHistoryConfig {
        TxHistoryConfig {
            name: "treasury".to_string(),
            path: "/txs?offset={cursor}".to_string(),
            entries_pointer: "/txs".to_string(),
            id_pointer: "/id".to_string(),
            code_pointer: "/code".to_string(),
            gas_pointer: "/gas_used".to_string(),
            fee_pointer: "/tx/fee/amount/0/amount".to_string(),
            next_pointer: "/next".to_string(),
        }
    }

    #[tokio::test]
    async fn json_listing_is_decoded() {
        let gateway = MockGateway::new();
        gateway.route(
            "/txs?offset=",
            json!({
                "txs": [
                    {
                        "id": 12,
                        "gas_used": "80000",
                        "tx": { "fee": { "amount": [{ "amount": "1500", "denom": "uluna" }] } }
                    },
                    { "id": "11", "code": 5, "gas_used": 20000, "tx": { "fee": { "amount": [] } } },
                    { "gas_used": "1" },
                ],
                "next": 11,
            }),
        );
        let source = JsonPageSource::new(json_config(), gateway.transport());

        let page = source.fetch_page(&CancellationToken::new(), None).await.unwrap();
        assert_eq!(
            page.entries,
            vec![
                TxRecord {
                    id: 12,
                    success: true,
                    gas_used: "80000".to_string(),
                    fee: "1500".to_string(),
                },
                TxRecord {
                    id: 11,
                    success: false,
                    gas_used: "20000".to_string(),
                    fee: String::new(),
                },
            ]
        );
        assert_eq!(page.next_cursor.as_deref(), Some("11"));
    }

    #[tokio::test]
    async fn json_listing_follows_cursor() {
        let gateway = MockGateway::new();
        gateway.route(
            "/txs?offset=",
            json!({
                "txs": [
                    { "id": 4, "gas_used": "1", "tx": {} },
                    { "id": 3, "gas_used": "1", "tx": {} }
                ],
                "next": "2"
            }),
        );
        gateway.route(
            "/txs?offset=2",
            json!({
                "txs": [
                    { "id": 2, "gas_used": "1", "tx": {} },
                    { "id": 1, "gas_used": "1", "tx": {} }
                ],
                "next": ""
            }),
        );
        let source = JsonPageSource::new(json_config(), gateway.transport());

        let ctx = CancellationToken::new();
        let mut backfill = Backfill::new(10).with_watermark(1);
        let report = backfill.run(&ctx, &source, |_| {}).await.unwrap();
        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.entries_processed, 3);
        assert_eq!(report.watermark, 4);
    }
}
