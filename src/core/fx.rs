use super::dk::PeriodError;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// DKK per USD used when no real rate is available for a date
pub const DEFAULT_USD_DKK_RATE: Decimal = dec!(6.90);

/// Where a rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RateSource {
    /// Read back from the rate cache
    Cached,
    /// Fetched from the external provider
    Api,
    /// Supplied by the user
    Manual,
    /// Fixed fallback, never stored
    Default,
}

impl RateSource {
    pub fn display(&self) -> &'static str {
        match self {
            RateSource::Cached => "Cached",
            RateSource::Api => "API",
            RateSource::Manual => "Manual",
            RateSource::Default => "Default",
        }
    }

    pub fn is_real(&self) -> bool {
        !matches!(self, RateSource::Default)
    }
}

/// USD/DKK rate for one date. `source` records the provenance (API or manual)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExchangeRateRecord {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    #[schemars(with = "f64")]
    pub rate: Decimal,
    pub source: RateSource,
}

/// Rate handed back to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRate {
    pub rate: Decimal,
    pub source: RateSource,
}

/// Persistent store of historical rates. Historical rates never change, so
/// `upsert` keeps an existing record for the date untouched.
pub trait RateCache {
    fn get(&self, date: NaiveDate) -> anyhow::Result<Option<ExchangeRateRecord>>;
    fn upsert(&mut self, record: ExchangeRateRecord) -> anyhow::Result<()>;
}

/// External source of historical USD/DKK rates
pub trait RateProvider {
    fn fetch(&self, date: NaiveDate) -> anyhow::Result<Decimal>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRateCache {
    records: BTreeMap<NaiveDate, ExchangeRateRecord>,
}

impl MemoryRateCache {
    pub fn new() -> Self {
        MemoryRateCache::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RateCache for MemoryRateCache {
    fn get(&self, date: NaiveDate) -> anyhow::Result<Option<ExchangeRateRecord>> {
        Ok(self.records.get(&date).cloned())
    }

    fn upsert(&mut self, record: ExchangeRateRecord) -> anyhow::Result<()> {
        self.records.entry(record.date).or_insert(record);
        Ok(())
    }
}

/// Result of warming the cache over a date range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchSummary {
    pub business_days: usize,
    pub resolved: usize,
}

/// Resolves the USD/DKK rate for a date: cache, then provider, then the
/// caller's manual rate, then the default rate.
pub struct ExchangeRateResolver {
    cache: Box<dyn RateCache>,
    provider: Option<Box<dyn RateProvider>>,
    default_rate: Decimal,
}

impl ExchangeRateResolver {
    pub fn new(cache: Box<dyn RateCache>, provider: Option<Box<dyn RateProvider>>) -> Self {
        ExchangeRateResolver {
            cache,
            provider,
            default_rate: DEFAULT_USD_DKK_RATE,
        }
    }

    /// Resolver that never goes to the network
    pub fn offline(cache: Box<dyn RateCache>) -> Self {
        ExchangeRateResolver::new(cache, None)
    }

    pub fn with_default_rate(mut self, rate: Decimal) -> Self {
        self.default_rate = rate;
        self
    }

    pub fn cache(&self) -> &dyn RateCache {
        self.cache.as_ref()
    }

    /// Never fails: lookup and storage problems are logged and the next
    /// fallback is used instead.
    pub fn resolve(&mut self, date: NaiveDate, manual_rate: Option<Decimal>) -> ResolvedRate {
        match self.cache.get(date) {
            Ok(Some(record)) => {
                log::debug!("Rate {} for {} read from cache", record.rate, date);
                return ResolvedRate {
                    rate: record.rate,
                    source: RateSource::Cached,
                };
            }
            Ok(None) => {}
            Err(err) => log::warn!("Rate cache lookup for {} failed: {:#}", date, err),
        }

        if let Some(provider) = &self.provider {
            match provider.fetch(date) {
                Ok(rate) if rate > Decimal::ZERO => {
                    self.store(date, rate, RateSource::Api);
                    return ResolvedRate {
                        rate,
                        source: RateSource::Api,
                    };
                }
                Ok(rate) => log::warn!("Ignoring non-positive rate {} for {}", rate, date),
                Err(err) => log::warn!("Rate lookup for {} failed: {:#}", date, err),
            }
        }

        match manual_rate {
            Some(rate) if rate > Decimal::ZERO => {
                self.store(date, rate, RateSource::Manual);
                return ResolvedRate {
                    rate,
                    source: RateSource::Manual,
                };
            }
            Some(rate) => log::warn!("Ignoring non-positive manual rate {} for {}", rate, date),
            None => {}
        }

        log::warn!(
            "No rate available for {}, using default {}",
            date,
            self.default_rate
        );
        ResolvedRate {
            rate: self.default_rate,
            source: RateSource::Default,
        }
    }

    /// Convert a USD amount to DKK at the rate for `date`
    pub fn convert(
        &mut self,
        amount_usd: Decimal,
        date: NaiveDate,
        manual_rate: Option<Decimal>,
    ) -> (Decimal, ResolvedRate) {
        let resolved = self.resolve(date, manual_rate);
        (amount_usd * resolved.rate, resolved)
    }

    /// Resolve every business day in `[from, to]`, counting the days that got a
    /// real rate
    pub fn prefetch(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<PrefetchSummary, PeriodError> {
        if from > to {
            return Err(PeriodError::InvertedRange { from, to });
        }
        let mut summary = PrefetchSummary::default();
        for date in from.iter_days().take_while(|d| *d <= to) {
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            summary.business_days += 1;
            if self.resolve(date, None).source.is_real() {
                summary.resolved += 1;
            }
        }
        log::info!(
            "Prefetched rates {} to {}: {}/{} business days resolved",
            from,
            to,
            summary.resolved,
            summary.business_days
        );
        Ok(summary)
    }

    fn store(&mut self, date: NaiveDate, rate: Decimal, source: RateSource) {
        let record = ExchangeRateRecord { date, rate, source };
        if let Err(err) = self.cache.upsert(record) {
            log::warn!("Failed to cache rate for {}: {:#}", date, err);
        }
    }
}
