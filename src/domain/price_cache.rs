//! Cache-aside price store in front of the external price oracle.
//!
//! A miss fetches a whole window around the requested date and
//! bulk-inserts it, so nearby lookups become hits. The in-memory store is
//! safe for concurrent read/insert; snapshots are persisted by a single
//! background worker and never block a caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::JoinHandle;

use chrono::{Duration, NaiveDate};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ports::price_source::{DailyPrice, PriceSource};

use super::error::ReportError;
use super::instrument::{Instrument, InstrumentType};
use super::money::{Currency, Quotes};
use super::transaction::today;

/// Days fetched on each side of a missed date.
pub const FETCH_WINDOW_DAYS: i64 = 60;

/// Oracle wire date format (`31-01-2024`).
pub const ORACLE_DATE_FORMAT: &str = "%d-%m-%Y";

pub struct PriceCache {
    source: Box<dyn PriceSource>,
    store: DashMap<Instrument, BTreeMap<NaiveDate, Quotes>>,
    persister: Option<SnapshotWorker>,
}

impl PriceCache {
    pub fn new(source: Box<dyn PriceSource>) -> PriceCache {
        PriceCache {
            source,
            store: DashMap::new(),
            persister: None,
        }
    }

    /// Cache backed by an on-disk snapshot: loads a prior snapshot if one
    /// exists and persists asynchronously after each bulk insert.
    pub fn with_snapshot(source: Box<dyn PriceSource>, path: PathBuf) -> PriceCache {
        let store = DashMap::new();
        match load_snapshot(&path) {
            Ok(Some(entries)) => {
                let mut days = 0usize;
                for entry in entries {
                    let total = entry.prices.len();
                    // A snapshot from an older currency set (or a
                    // hand-edited one) may carry sparse vectors; serving
                    // those as hits would break arithmetic downstream.
                    let prices: BTreeMap<NaiveDate, Quotes> = entry
                        .prices
                        .into_iter()
                        .filter(|(_, quotes)| quotes.is_complete())
                        .collect();
                    if prices.len() < total {
                        log::warn!(
                            "dropped {} snapshot days for {} missing a tracked currency",
                            total - prices.len(),
                            entry.instrument
                        );
                    }
                    days += prices.len();
                    if !prices.is_empty() {
                        store.insert(entry.instrument, prices);
                    }
                }
                log::info!(
                    "loaded price snapshot from {} ({} days)",
                    path.display(),
                    days
                );
            }
            Ok(None) => {}
            Err(reason) => {
                log::warn!(
                    "ignoring unreadable price snapshot {}: {}",
                    path.display(),
                    reason
                );
            }
        }
        PriceCache {
            source,
            store,
            persister: Some(SnapshotWorker::spawn(path)),
        }
    }

    /// The market price of one unit of `instrument` on `date`, in every
    /// tracked currency.
    pub fn price(
        &self,
        instrument: &Instrument,
        date: NaiveDate,
    ) -> Result<Quotes, ReportError> {
        if let Some(days) = self.store.get(instrument) {
            if let Some(quotes) = days.get(&date) {
                return Ok(quotes.clone());
            }
        }

        log::debug!("price cache miss: {} {}", instrument, date);
        let start = date - Duration::days(FETCH_WINDOW_DAYS);
        let end = date + Duration::days(FETCH_WINDOW_DAYS);
        let fetched = self.source.price_window(
            instrument.instrument_type,
            &instrument.symbol,
            start,
            end,
        )?;
        let parsed = parse_window(instrument, start, end, fetched)?;

        let requested = parsed.get(&date).cloned();
        self.store
            .entry(instrument.clone())
            .or_default()
            .extend(parsed);
        self.schedule_snapshot();

        requested.ok_or_else(|| ReportError::PriceUnavailable {
            instrument_type: instrument.instrument_type,
            symbol: instrument.symbol.clone(),
            start,
            end,
        })
    }

    /// `amount` of `currency` on `date`, converted into every tracked
    /// currency: the price of one unit of the currency instrument times
    /// the amount.
    pub fn exchange_rates(
        &self,
        date: NaiveDate,
        amount: Decimal,
        currency: Currency,
    ) -> Result<Quotes, ReportError> {
        let rates = self.price(
            &Instrument::new(InstrumentType::Currency, currency.code()),
            date,
        )?;
        Ok(rates.multiply_scalar(amount))
    }

    /// Drain pending snapshot writes and stop the persistence worker.
    /// Also runs implicitly on drop.
    pub fn shutdown(&mut self) {
        self.persister.take();
    }

    fn schedule_snapshot(&self) {
        let Some(worker) = &self.persister else {
            return;
        };
        // Today's price is provisional, so it never reaches the snapshot.
        let cutoff = today();
        let mut entries: Vec<SnapshotEntry> = self
            .store
            .iter()
            .map(|kv| SnapshotEntry {
                instrument: kv.key().clone(),
                prices: kv
                    .value()
                    .iter()
                    .filter(|(date, _)| **date != cutoff)
                    .map(|(date, quotes)| (*date, quotes.clone()))
                    .collect(),
            })
            .collect();
        entries.sort_by(|a, b| a.instrument.cmp(&b.instrument));

        match serde_json::to_string(&entries) {
            Ok(payload) => worker.submit(payload),
            Err(e) => log::warn!("price snapshot serialization failed: {}", e),
        }
    }
}

fn parse_window(
    instrument: &Instrument,
    start: NaiveDate,
    end: NaiveDate,
    fetched: Vec<DailyPrice>,
) -> Result<BTreeMap<NaiveDate, Quotes>, ReportError> {
    let malformed = || ReportError::PriceUnavailable {
        instrument_type: instrument.instrument_type,
        symbol: instrument.symbol.clone(),
        start,
        end,
    };

    let mut parsed = BTreeMap::new();
    for daily in fetched {
        let date = NaiveDate::parse_from_str(&daily.day, ORACLE_DATE_FORMAT)
            .map_err(|_| malformed())?;

        // Every tracked currency must be present; a partial day would
        // otherwise read as a silent zero downstream.
        let mut values = BTreeMap::new();
        for currency in Currency::ALL {
            let raw = daily.quotes.get(currency.code()).ok_or_else(malformed)?;
            let value: Decimal = raw.replace(',', "").parse().map_err(|_| malformed())?;
            values.insert(currency, value);
        }
        parsed.insert(date, Quotes::from_fn(|c| values[&c]));
    }
    Ok(parsed)
}

/// A persisted (instrument, day → quotes) block.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    instrument: Instrument,
    prices: Vec<(NaiveDate, Quotes)>,
}

fn load_snapshot(path: &Path) -> Result<Option<Vec<SnapshotEntry>>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Single-consumer snapshot writer. Jobs are fire-and-forget; dropping
/// the worker drains the queue and joins the thread, so the last snapshot
/// submitted before shutdown always lands.
struct SnapshotWorker {
    tx: Option<mpsc::Sender<String>>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWorker {
    fn spawn(path: PathBuf) -> SnapshotWorker {
        let (tx, rx) = mpsc::channel::<String>();
        let handle = std::thread::spawn(move || {
            for payload in rx {
                if let Err(e) = write_atomically(&path, &payload) {
                    log::warn!("price snapshot write to {} failed: {}", path.display(), e);
                }
            }
        });
        SnapshotWorker {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    fn submit(&self, payload: String) {
        if let Some(tx) = &self.tx {
            if tx.send(payload).is_err() {
                log::warn!("price snapshot worker is gone; snapshot dropped");
            }
        }
    }
}

impl Drop for SnapshotWorker {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("price snapshot worker panicked");
            }
        }
    }
}

fn write_atomically(path: &Path, payload: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, payload)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Oracle fake that serves a flat price for every day of the
    /// requested window and counts how often it is called.
    struct CountingSource {
        price: Decimal,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl CountingSource {
        fn new(price: Decimal) -> (CountingSource, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                CountingSource {
                    price,
                    calls: calls.clone(),
                    fail: false,
                },
                calls,
            )
        }

        fn failing() -> CountingSource {
            CountingSource {
                price: Decimal::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }
        }
    }

    impl PriceSource for CountingSource {
        fn price_window(
            &self,
            instrument_type: InstrumentType,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyPrice>, ReportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReportError::PriceUnavailable {
                    instrument_type,
                    symbol: symbol.to_string(),
                    start,
                    end,
                });
            }
            let mut days = Vec::new();
            let mut day = start;
            while day <= end {
                days.push(DailyPrice {
                    day: day.format(ORACLE_DATE_FORMAT).to_string(),
                    quotes: Currency::ALL
                        .iter()
                        .map(|c| (c.code().to_string(), self.price.to_string()))
                        .collect(),
                });
                day += Duration::days(1);
            }
            Ok(days)
        }
    }

    fn bist(symbol: &str) -> Instrument {
        Instrument::new(InstrumentType::Bist, symbol)
    }

    #[test]
    fn second_lookup_hits_the_cache() {
        let (source, calls) = CountingSource::new(dec!(110));
        let cache = PriceCache::new(Box::new(source));

        let d = date(2024, 3, 1);
        let first = cache.price(&bist("XYZ"), d).unwrap();
        assert_eq!(first.get(Currency::Usd), dec!(110));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = cache.price(&bist("XYZ"), d).unwrap();
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn window_fetch_amortizes_nearby_dates() {
        let (source, calls) = CountingSource::new(dec!(42));
        let cache = PriceCache::new(Box::new(source));

        cache.price(&bist("XYZ"), date(2024, 3, 1)).unwrap();
        // Anything inside the fetched window is already present.
        cache.price(&bist("XYZ"), date(2024, 3, 20)).unwrap();
        cache.price(&bist("XYZ"), date(2024, 2, 10)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Outside the window triggers a new fetch.
        cache.price(&bist("XYZ"), date(2024, 8, 1)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn oracle_failure_propagates_with_window() {
        let cache = PriceCache::new(Box::new(CountingSource::failing()));
        let err = cache.price(&bist("XYZ"), date(2024, 3, 1)).unwrap_err();
        match err {
            ReportError::PriceUnavailable {
                symbol, start, end, ..
            } => {
                assert_eq!(symbol, "XYZ");
                assert_eq!(start, date(2024, 3, 1) - Duration::days(FETCH_WINDOW_DAYS));
                assert_eq!(end, date(2024, 3, 1) + Duration::days(FETCH_WINDOW_DAYS));
            }
            other => panic!("expected PriceUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn exchange_rates_scale_the_currency_price() {
        let (source, _) = CountingSource::new(dec!(30));
        let cache = PriceCache::new(Box::new(source));

        let quotes = cache
            .exchange_rates(date(2024, 3, 1), dec!(10), Currency::Usd)
            .unwrap();
        assert_eq!(quotes.get(Currency::Try), dec!(300));
    }

    #[test]
    fn snapshot_reload_serves_without_oracle_calls() {
        let dir = tempfile::TempDir::new().unwrap();
        let snapshot = dir.path().join("prices.json");
        let d = date(2024, 3, 1);

        {
            let (source, _) = CountingSource::new(dec!(55));
            let mut cache = PriceCache::with_snapshot(Box::new(source), snapshot.clone());
            cache.price(&bist("XYZ"), d).unwrap();
            cache.shutdown();
        }
        assert!(snapshot.exists());

        let (source, calls) = CountingSource::new(dec!(999));
        let cache = PriceCache::with_snapshot(Box::new(source), snapshot);
        let quotes = cache.price(&bist("XYZ"), d).unwrap();
        assert_eq!(quotes.get(Currency::Usd), dec!(55));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snapshot_excludes_todays_provisional_price() {
        let dir = tempfile::TempDir::new().unwrap();
        let snapshot = dir.path().join("prices.json");
        let now = today();

        {
            let (source, _) = CountingSource::new(dec!(70));
            let mut cache = PriceCache::with_snapshot(Box::new(source), snapshot.clone());
            cache.price(&bist("XYZ"), now).unwrap();
            cache.shutdown();
        }

        let content = std::fs::read_to_string(&snapshot).unwrap();
        let entries: Vec<SnapshotEntry> = serde_json::from_str(&content).unwrap();
        let days: Vec<NaiveDate> = entries
            .iter()
            .flat_map(|e| e.prices.iter().map(|(d, _)| *d))
            .collect();
        assert!(!days.is_empty());
        assert!(days.iter().all(|d| *d != now));
    }

    #[test]
    fn sparse_snapshot_days_are_dropped_and_refetched() {
        let dir = tempfile::TempDir::new().unwrap();
        let snapshot = dir.path().join("prices.json");
        // One persisted day that only carries USD.
        std::fs::write(
            &snapshot,
            r#"[{"instrument":{"instrument_type":"Bist","symbol":"XYZ"},"prices":[["2024-03-01",{"values":{"Usd":"55"}}]]}]"#,
        )
        .unwrap();

        let (source, calls) = CountingSource::new(dec!(12));
        let cache = PriceCache::with_snapshot(Box::new(source), snapshot);
        let quotes = cache.price(&bist("XYZ"), date(2024, 3, 1)).unwrap();
        for currency in Currency::ALL {
            assert_eq!(quotes.get(currency), dec!(12));
        }
        // The sparse day never counted as a hit.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corrupt_snapshot_is_ignored_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let snapshot = dir.path().join("prices.json");
        std::fs::write(&snapshot, "not json").unwrap();

        let (source, calls) = CountingSource::new(dec!(12));
        let cache = PriceCache::with_snapshot(Box::new(source), snapshot);
        let quotes = cache.price(&bist("XYZ"), date(2024, 3, 1)).unwrap();
        assert_eq!(quotes.get(Currency::Eur), dec!(12));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn partial_currency_day_is_malformed() {
        struct PartialSource;
        impl PriceSource for PartialSource {
            fn price_window(
                &self,
                _instrument_type: InstrumentType,
                _symbol: &str,
                start: NaiveDate,
                _end: NaiveDate,
            ) -> Result<Vec<DailyPrice>, ReportError> {
                Ok(vec![DailyPrice {
                    day: start.format(ORACLE_DATE_FORMAT).to_string(),
                    quotes: [("USD".to_string(), "1.0".to_string())].into(),
                }])
            }
        }

        let cache = PriceCache::new(Box::new(PartialSource));
        let err = cache.price(&bist("XYZ"), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, ReportError::PriceUnavailable { .. }));
    }
}
