//! Master order: the canonical item-code sequence rows are sorted by.
//!
//! A [`MasterOrderSource`] knows how to read the raw code column from
//! somewhere (SharePoint via Graph, a local workbook, or memory).
//! [`MasterOrderCache`] sits in front of one source and owns the TTL, the
//! failure policy and the single cached `(timestamp, sequence)` pair.
//!
//! ## Concurrency
//!
//! The cached pair lives behind one `tokio::sync::Mutex`. A caller that finds
//! the entry expired refreshes it while still holding the lock, so concurrent
//! callers wait for that one fetch instead of issuing their own, and no
//! caller ever sees a timestamp paired with another fetch's codes.

pub mod graph;
pub mod workbook;

use crate::config::{ConversionConfig, MasterOrderPolicy};
use crate::error::MasterOrderError;
use crate::output::MasterFreshness;
use crate::record::normalize_code;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use graph::GraphWorkbookSource;

/// Something that can produce the raw master code column.
///
/// Values are returned as read; [`MasterOrderCache`] normalizes them.
pub trait MasterOrderSource: Send + Sync {
    fn fetch(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<Vec<String>, MasterOrderError>> + Send;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}

/// Reads the configured table from an xlsx file on disk.
#[derive(Debug, Clone)]
pub struct LocalWorkbookSource {
    path: PathBuf,
    location: crate::config::WorkbookLocation,
}

impl LocalWorkbookSource {
    pub fn new(path: impl Into<PathBuf>, config: &ConversionConfig) -> Self {
        Self {
            path: path.into(),
            location: config.workbook.clone(),
        }
    }
}

impl MasterOrderSource for LocalWorkbookSource {
    async fn fetch(&self, _credential: &str) -> Result<Vec<String>, MasterOrderError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| MasterOrderError::Workbook {
                detail: format!("{}: {}", self.path.display(), e),
            })?;
        workbook::read_code_column(&bytes, &self.location)
    }

    fn kind(&self) -> &'static str {
        "local"
    }
}

/// A fixed sequence. Empty means "keep extraction order".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticOrder(pub Vec<String>);

impl StaticOrder {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl MasterOrderSource for StaticOrder {
    async fn fetch(&self, _credential: &str) -> Result<Vec<String>, MasterOrderError> {
        Ok(self.0.clone())
    }

    fn kind(&self) -> &'static str {
        "static"
    }
}

/// Runtime choice between the built-in sources.
#[derive(Debug, Clone)]
pub enum MasterSource {
    Graph(GraphWorkbookSource),
    Local(LocalWorkbookSource),
    Static(StaticOrder),
}

impl MasterOrderSource for MasterSource {
    async fn fetch(&self, credential: &str) -> Result<Vec<String>, MasterOrderError> {
        match self {
            MasterSource::Graph(s) => s.fetch(credential).await,
            MasterSource::Local(s) => s.fetch(credential).await,
            MasterSource::Static(s) => s.fetch(credential).await,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            MasterSource::Graph(s) => s.kind(),
            MasterSource::Local(s) => s.kind(),
            MasterSource::Static(s) => s.kind(),
        }
    }
}

impl From<GraphWorkbookSource> for MasterSource {
    fn from(s: GraphWorkbookSource) -> Self {
        MasterSource::Graph(s)
    }
}

impl From<LocalWorkbookSource> for MasterSource {
    fn from(s: LocalWorkbookSource) -> Self {
        MasterSource::Local(s)
    }
}

impl From<StaticOrder> for MasterSource {
    fn from(s: StaticOrder) -> Self {
        MasterSource::Static(s)
    }
}

/// Trim, strip leading zeros, drop empties. Order is preserved.
pub fn normalize_sequence<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|code| normalize_code(code.as_ref()).map(str::to_string))
        .collect()
}

/// A master sequence as handed to the orderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterOrder {
    pub codes: Arc<[String]>,
    pub freshness: MasterFreshness,
}

impl MasterOrder {
    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}

#[derive(Debug)]
struct CachedOrder {
    fetched_at: Instant,
    codes: Arc<[String]>,
}

/// TTL cache plus failure policy in front of one source.
#[derive(Debug)]
pub struct MasterOrderCache<S> {
    source: S,
    ttl: Duration,
    policy: MasterOrderPolicy,
    entry: Mutex<Option<CachedOrder>>,
}

impl<S: MasterOrderSource> MasterOrderCache<S> {
    pub fn new(source: S, ttl: Duration, policy: MasterOrderPolicy) -> Self {
        Self {
            source,
            ttl,
            policy,
            entry: Mutex::new(None),
        }
    }

    pub fn from_config(source: S, config: &ConversionConfig) -> Self {
        Self::new(source, config.cache_ttl(), config.master_policy)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The master sequence, from cache when fresh.
    ///
    /// On a failed refresh the previous entry stays in place; what the caller
    /// gets depends on the policy.
    pub async fn get_master_order(&self, credential: &str) -> Result<MasterOrder, MasterOrderError> {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!("Master order served from cache ({} codes)", cached.codes.len());
                return Ok(MasterOrder {
                    codes: Arc::clone(&cached.codes),
                    freshness: MasterFreshness::Cached,
                });
            }
        }

        match self.source.fetch(credential).await {
            Ok(raw) => {
                let codes: Arc<[String]> = normalize_sequence(raw).into();
                info!(
                    "Fetched master order from {} source ({} codes)",
                    self.source.kind(),
                    codes.len()
                );
                *entry = Some(CachedOrder {
                    fetched_at: Instant::now(),
                    codes: Arc::clone(&codes),
                });
                Ok(MasterOrder {
                    codes,
                    freshness: MasterFreshness::Fetched,
                })
            }
            Err(e) => self.on_failure(entry.as_ref(), e),
        }
    }

    fn on_failure(
        &self,
        previous: Option<&CachedOrder>,
        err: MasterOrderError,
    ) -> Result<MasterOrder, MasterOrderError> {
        match (self.policy, previous) {
            (MasterOrderPolicy::ServeStale, Some(cached)) => {
                warn!("Master order refresh failed ({err}); serving stale copy");
                Ok(MasterOrder {
                    codes: Arc::clone(&cached.codes),
                    freshness: MasterFreshness::Stale,
                })
            }
            (MasterOrderPolicy::DegradeToEmpty, _) => {
                warn!("Master order unavailable ({err}); rows keep extraction order");
                Ok(MasterOrder {
                    codes: Arc::from(Vec::new()),
                    freshness: MasterFreshness::Unavailable,
                })
            }
            _ => Err(err),
        }
    }

    /// Drop the cached entry so the next call fetches.
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(180);

    /// Counts fetches; returns whatever `next` holds at call time.
    struct CountingSource {
        calls: AtomicUsize,
        next: std::sync::Mutex<Result<Vec<String>, MasterOrderError>>,
        delay: Duration,
    }

    impl CountingSource {
        fn ok(codes: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                next: std::sync::Mutex::new(Ok(codes.iter().map(|c| c.to_string()).collect())),
                delay: Duration::ZERO,
            }
        }

        fn set(&self, next: Result<Vec<String>, MasterOrderError>) {
            *self.next.lock().unwrap() = next;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MasterOrderSource for CountingSource {
        async fn fetch(&self, _credential: &str) -> Result<Vec<String>, MasterOrderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.next.lock().unwrap().clone()
        }

        fn kind(&self) -> &'static str {
            "counting"
        }
    }

    fn failure() -> MasterOrderError {
        MasterOrderError::HttpStatus {
            url: "https://graph.test".into(),
            status: 503,
        }
    }

    #[test]
    fn test_normalize_sequence_trims_and_strips() {
        assert_eq!(
            normalize_sequence([" 00845 ", "", "120", "000", "7"]),
            vec!["845", "120", "7"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_uses_cache() {
        let cache = MasterOrderCache::new(
            CountingSource::ok(&["0120", "845"]),
            TTL,
            MasterOrderPolicy::FailClosed,
        );

        let first = cache.get_master_order("t").await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        let second = cache.get_master_order("t").await.unwrap();

        assert_eq!(first.codes(), &["120".to_string(), "845".to_string()]);
        assert_eq!(first.codes, second.codes);
        assert_eq!(first.freshness, MasterFreshness::Fetched);
        assert_eq!(second.freshness, MasterFreshness::Cached);
        assert_eq!(cache.source().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_triggers_exactly_one_refetch() {
        let cache = MasterOrderCache::new(
            CountingSource::ok(&["1"]),
            TTL,
            MasterOrderPolicy::FailClosed,
        );
        cache.get_master_order("t").await.unwrap();

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        cache.source().set(Ok(vec!["2".into()]));
        let refreshed = cache.get_master_order("t").await.unwrap();
        let again = cache.get_master_order("t").await.unwrap();

        assert_eq!(refreshed.codes(), &["2".to_string()]);
        assert_eq!(refreshed.freshness, MasterFreshness::Fetched);
        assert_eq!(again.freshness, MasterFreshness::Cached);
        assert_eq!(cache.source().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let mut source = CountingSource::ok(&["1", "2"]);
        source.delay = Duration::from_secs(2);
        let cache = MasterOrderCache::new(source, TTL, MasterOrderPolicy::FailClosed);

        let (a, b) = tokio::join!(cache.get_master_order("t"), cache.get_master_order("t"));

        assert_eq!(a.unwrap().codes, b.unwrap().codes);
        assert_eq!(cache.source().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_closed_surfaces_error_then_recovers() {
        let cache = MasterOrderCache::new(
            CountingSource::ok(&["1"]),
            TTL,
            MasterOrderPolicy::FailClosed,
        );
        cache.get_master_order("t").await.unwrap();
        tokio::time::advance(TTL).await;

        cache.source().set(Err(failure()));
        assert_eq!(cache.get_master_order("t").await.unwrap_err(), failure());

        cache.source().set(Ok(vec!["9".into()]));
        let next = cache.get_master_order("t").await.unwrap();
        assert_eq!(next.codes(), &["9".to_string()]);
        assert_eq!(cache.source().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serve_stale_returns_previous_sequence() {
        let cache = MasterOrderCache::new(
            CountingSource::ok(&["845", "120"]),
            TTL,
            MasterOrderPolicy::ServeStale,
        );
        cache.get_master_order("t").await.unwrap();
        tokio::time::advance(TTL).await;

        cache.source().set(Err(failure()));
        let stale = cache.get_master_order("t").await.unwrap();
        assert_eq!(stale.freshness, MasterFreshness::Stale);
        assert_eq!(stale.codes(), &["845".to_string(), "120".to_string()]);
    }

    #[tokio::test]
    async fn test_serve_stale_without_entry_is_an_error() {
        let source = CountingSource::ok(&[]);
        source.set(Err(failure()));
        let cache = MasterOrderCache::new(source, TTL, MasterOrderPolicy::ServeStale);
        assert!(cache.get_master_order("t").await.is_err());
    }

    #[tokio::test]
    async fn test_degrade_to_empty_is_explicit() {
        let source = CountingSource::ok(&[]);
        source.set(Err(failure()));
        let cache = MasterOrderCache::new(source, TTL, MasterOrderPolicy::DegradeToEmpty);
        let order = cache.get_master_order("t").await.unwrap();
        assert!(order.codes().is_empty());
        assert_eq!(order.freshness, MasterFreshness::Unavailable);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_fetches() {
        let cache = MasterOrderCache::new(
            CountingSource::ok(&["1"]),
            Duration::ZERO,
            MasterOrderPolicy::FailClosed,
        );
        cache.get_master_order("t").await.unwrap();
        cache.get_master_order("t").await.unwrap();
        assert_eq!(cache.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = MasterOrderCache::new(
            CountingSource::ok(&["1"]),
            TTL,
            MasterOrderPolicy::FailClosed,
        );
        cache.get_master_order("t").await.unwrap();
        cache.invalidate().await;
        cache.get_master_order("t").await.unwrap();
        assert_eq!(cache.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_static_source_through_enum() {
        let source: MasterSource = StaticOrder::new(["120", "845"]).into();
        assert_eq!(source.kind(), "static");
        assert_eq!(source.fetch("").await.unwrap(), vec!["120", "845"]);
    }

    #[tokio::test]
    async fn test_local_source_reads_file() {
        let mut wb = rust_xlsxwriter::Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("SURFACE").unwrap();
        ws.write_string(1, 0, "845").unwrap();
        ws.write_string(2, 0, "120").unwrap();
        let table = rust_xlsxwriter::Table::new()
            .set_name("OrdenPreparacion")
            .set_columns(&[rust_xlsxwriter::TableColumn::new().set_header("SKU")]);
        ws.add_table(0, 0, 2, 0, &table).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maestro.xlsx");
        wb.save(&path).unwrap();

        let config = ConversionConfig::default();
        let source = LocalWorkbookSource::new(&path, &config);
        assert_eq!(source.fetch("").await.unwrap(), vec!["845", "120"]);

        let missing = LocalWorkbookSource::new(dir.path().join("nope.xlsx"), &config);
        assert!(matches!(
            missing.fetch("").await,
            Err(MasterOrderError::Workbook { .. })
        ));
    }
}
