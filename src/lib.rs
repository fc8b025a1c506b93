//! Wholesale produce price scraper and analyzer.
//!
//! Fetches paged price listings over HTTP, parses them into typed
//! [`PriceRecord`](models::PriceRecord)s, persists them idempotently to a flat
//! CSV store, and computes grouped statistics and charts from that store.
//!
//! # Quick start
//!
//! ```no_run
//! use produce_prices::{Pipeline, models::FetchQuery};
//! use produce_prices::aggregate::{Filter, GroupKey, PriceField, Statistic};
//!
//! let pipeline = Pipeline::builder().store_path("prices.csv").build().unwrap();
//!
//! // Build phase
//! let report = pipeline.fetch_and_persist(&FetchQuery::default()).unwrap();
//!
//! // Analysis phase
//! let by_category = pipeline
//!     .aggregate(&Filter::default(), GroupKey::Category, PriceField::Average, Statistic::Mean)
//!     .unwrap();
//! ```

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod render;
pub mod store;

pub use aggregate::Aggregator;
pub use error::{Phase, PriceError, Result};
pub use fetcher::{FetchConfig, HttpFetcher, PageSource, RetryPolicy};
pub use store::{DatasetStore, StoreIndex, WriteSummary};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;

use aggregate::{Filter, GroupKey, PriceField, Statistic};
use models::{AggregateResult, Dataset, FetchQuery, PageRequest};

// ---------------------------------------------------------------------------
// PipelineBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing a [`Pipeline`].
///
/// Use [`Pipeline::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](PipelineBuilder::build).
#[derive(Default)]
pub struct PipelineBuilder {
    store_path: Option<PathBuf>,
    fetch: FetchConfig,
}

impl PipelineBuilder {
    /// Set the store file. Defaults to `price_detail.csv` in the platform
    /// data directory. A `.gz` suffix stores the file compressed.
    pub fn store_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.store_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn endpoint(mut self, url: &str) -> Self {
        self.fetch.endpoint = url.to_string();
        self
    }

    /// Per-request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.fetch.timeout = timeout;
        self
    }

    /// Minimum spacing between requests. Defaults to 350 ms.
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.fetch.request_delay = delay;
        self
    }

    /// Rows requested per page. Defaults to 40.
    pub fn page_size(mut self, size: u32) -> Self {
        self.fetch.page_size = size;
        self
    }

    pub fn max_pages(mut self, pages: Option<u32>) -> Self {
        self.fetch.max_pages = pages;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.fetch.retry = policy;
        self
    }

    pub fn fetch_config(mut self, config: FetchConfig) -> Self {
        self.fetch = config;
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        if self.fetch.page_size == 0 {
            return Err(PriceError::InvalidArgument(
                "page size must be at least 1".to_string(),
            ));
        }
        if self.fetch.retry.max_attempts == 0 {
            return Err(PriceError::InvalidArgument(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        let path = self.store_path.unwrap_or_else(config::default_store_path);
        Ok(Pipeline {
            store: DatasetStore::new(path),
            fetch: self.fetch,
        })
    }
}

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// Counters for one fetch-and-persist run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Row count the source reported for the query.
    pub reported_total: u64,
    pub pages: u32,
    pub parsed: usize,
    /// Rows rejected by the parser.
    pub dropped: usize,
    pub written: usize,
    pub skipped_duplicates: usize,
    /// Records in the store when the run finished.
    pub stored_total: usize,
}

impl FetchReport {
    /// Records that reached the store, new or already present.
    pub fn processed(&self) -> usize {
        self.written + self.skipped_duplicates
    }
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} page(s), {} parsed, {} dropped, {} written, {} duplicate(s), {} stored",
            self.pages,
            self.parsed,
            self.dropped,
            self.written,
            self.skipped_duplicates,
            self.stored_total
        )
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One configured run of the scrape/store/analyze pipeline.
///
/// Holds the store location and fetch settings for the run; nothing is
/// shared between pipelines.
pub struct Pipeline {
    store: DatasetStore,
    fetch: FetchConfig,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn fetch_config(&self) -> &FetchConfig {
        &self.fetch
    }

    // -- Build phase -------------------------------------------------------

    /// Fetch all pages for `query` over HTTP and persist them page by page.
    pub fn fetch_and_persist(&self, query: &FetchQuery) -> Result<FetchReport> {
        let mut fetcher = HttpFetcher::new(self.fetch.clone());
        let report = self.fetch_with(&mut fetcher, query);
        info!("Issued {} HTTP request(s)", fetcher.requests());
        fetcher.close();
        report
    }

    /// Fetch and persist using any page source.
    ///
    /// A probe request with `limit = 1` reports the total row count, from
    /// which the page count is derived. Each page is parsed and written as
    /// its own atomic batch, so a failure on page N leaves pages before N
    /// persisted. Stored identities are read once per run. The walk ends
    /// early on an empty page.
    pub fn fetch_with<S: PageSource>(&self, source: &mut S, query: &FetchQuery) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let mut index = self
            .store
            .index()
            .map_err(|e| e.aborted(Phase::Load, 0))?;
        report.stored_total = index.len();
        info!("Store {} holds {} record(s)", self.store.path().display(), index.len());

        let probe = source
            .fetch_page(&PageRequest::page(query, 1, 1))
            .map_err(|e| e.aborted(Phase::Fetch, 0))?;
        report.reported_total = parser::parse_envelope(&probe.body)
            .map_err(|e| e.aborted(Phase::Parse, 0))?
            .count;

        let page_size = self.fetch.page_size;
        let mut pages = report.reported_total.div_ceil(page_size as u64);
        if let Some(max) = self.fetch.max_pages {
            pages = pages.min(max as u64);
        }
        info!(
            "Source reports {} row(s); fetching {} page(s) of {}",
            report.reported_total, pages, page_size
        );

        for page in 1..=pages as u32 {
            let request = PageRequest::page(query, page, page_size);
            let raw = source
                .fetch_page(&request)
                .map_err(|e| e.aborted(Phase::Fetch, report.processed()))?;
            let parsed =
                parser::parse_page(&raw).map_err(|e| e.aborted(Phase::Parse, report.processed()))?;
            if parsed.records.is_empty() && parsed.dropped == 0 {
                info!("Page {} is empty; stopping", page);
                break;
            }

            report.pages += 1;
            report.parsed += parsed.records.len();
            report.dropped += parsed.dropped;

            let summary = self
                .store
                .append_indexed(&parsed.records, &mut index)
                .map_err(|e| e.aborted(Phase::Write, report.processed()))?;
            report.written += summary.written;
            report.skipped_duplicates += summary.skipped_duplicates;
            report.stored_total = summary.total;
            info!(
                "Page {}/{}: {} record(s), {} new",
                page,
                pages,
                parsed.records.len(),
                summary.written
            );
        }

        if !self.store.exists() {
            let summary = self
                .store
                .append_indexed(&[], &mut index)
                .map_err(|e| e.aborted(Phase::Write, report.processed()))?;
            report.stored_total = summary.total;
        }
        info!("Fetch finished: {}", report);
        Ok(report)
    }

    // -- Analysis phase ----------------------------------------------------

    /// Load the whole store.
    pub fn load(&self) -> Result<Dataset> {
        self.store.load().map_err(|e| e.aborted(Phase::Load, 0))
    }

    /// Load, filter and summarize the store.
    pub fn aggregate(
        &self,
        filter: &Filter,
        key: GroupKey,
        field: PriceField,
        stat: Statistic,
    ) -> Result<AggregateResult> {
        let dataset = self.load()?.filter(filter);
        info!(
            "Aggregating {} record(s) by {:?}: {} of {}",
            dataset.len(),
            key,
            stat,
            field.column()
        );
        Ok(Aggregator::new(&dataset).aggregate(key, field, stat))
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pipeline(store={}, endpoint={}, page_size={})",
            self.store.path().display(),
            self.fetch.endpoint,
            self.fetch.page_size
        )
    }
}
