use super::allocation::{self, Allocation, LotConsumption};
use super::dk::Period;
use super::fx::{ExchangeRateResolver, RateSource};
use super::lots::{CostBasisMethod, HoldingPeriod, Ledger};
use super::store::{build_ledger, DisposalTransaction, LedgerStore};
use super::warnings::Warning;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Which total a gain is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GainBucket {
    ShortTerm,
    LongTerm,
    /// Average cost disposals carry no single acquisition date
    AverageCost,
}

impl GainBucket {
    fn of(method: CostBasisMethod, holding_period: Option<HoldingPeriod>) -> Self {
        match (method, holding_period) {
            (CostBasisMethod::AverageCost, _) => GainBucket::AverageCost,
            (CostBasisMethod::LotBased, Some(HoldingPeriod::LongTerm)) => GainBucket::LongTerm,
            // a lot based sale with nothing allocated has no acquisition date either
            (CostBasisMethod::LotBased, _) => GainBucket::ShortTerm,
        }
    }
}

/// A costed disposal
#[derive(Debug, Clone, Serialize)]
pub struct DisposalRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub shares_sold: Decimal,
    pub proceeds_usd: Decimal,
    pub proceeds_dkk: Decimal,
    pub cost_basis_usd: Decimal,
    pub cost_basis_dkk: Decimal,
    pub gain_usd: Decimal,
    pub gain_dkk: Decimal,
    pub exchange_rate: Decimal,
    pub rate_source: RateSource,
    pub method: CostBasisMethod,
    pub holding_period: Option<HoldingPeriod>,
    pub bucket: GainBucket,
    pub lots_consumed: Vec<LotConsumption>,
    pub warnings: Vec<Warning>,
}

impl DisposalRecord {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A disposal left out of the totals
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDisposal {
    pub disposal: DisposalTransaction,
    pub reason: String,
}

/// Totals for one ticker
#[derive(Debug, Clone, Serialize)]
pub struct TickerSummary {
    pub ticker: String,
    pub method: CostBasisMethod,
    pub transactions: usize,
    pub shares_sold: Decimal,
    pub gain_usd: Decimal,
    pub gain_dkk: Decimal,
}

/// Gain totals in both currencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GainTotals {
    pub proceeds_usd: Decimal,
    pub proceeds_dkk: Decimal,
    pub cost_basis_usd: Decimal,
    pub cost_basis_dkk: Decimal,
    pub gain_usd: Decimal,
    pub gain_dkk: Decimal,
    pub short_term_gain_usd: Decimal,
    pub short_term_gain_dkk: Decimal,
    pub long_term_gain_usd: Decimal,
    pub long_term_gain_dkk: Decimal,
    pub average_cost_gain_usd: Decimal,
    pub average_cost_gain_dkk: Decimal,
}

impl GainTotals {
    fn add(&mut self, d: &DisposalRecord) {
        self.proceeds_usd += d.proceeds_usd;
        self.proceeds_dkk += d.proceeds_dkk;
        self.cost_basis_usd += d.cost_basis_usd;
        self.cost_basis_dkk += d.cost_basis_dkk;
        self.gain_usd += d.gain_usd;
        self.gain_dkk += d.gain_dkk;
        let (usd, dkk) = match d.bucket {
            GainBucket::ShortTerm => (&mut self.short_term_gain_usd, &mut self.short_term_gain_dkk),
            GainBucket::LongTerm => (&mut self.long_term_gain_usd, &mut self.long_term_gain_dkk),
            GainBucket::AverageCost => (
                &mut self.average_cost_gain_usd,
                &mut self.average_cost_gain_dkk,
            ),
        };
        *usd += d.gain_usd;
        *dkk += d.gain_dkk;
    }
}

/// Capital gains for a period
#[derive(Debug, Clone, Serialize)]
pub struct CapitalGainsReport {
    pub period: String,
    pub totals: GainTotals,
    pub by_ticker: BTreeMap<String, TickerSummary>,
    pub disposals: Vec<DisposalRecord>,
    pub skipped: Vec<SkippedDisposal>,
}

/// CSV record for disposal output
#[derive(Debug, Serialize, Deserialize)]
pub struct DisposalCsvRecord {
    pub date: String,
    pub ticker: String,
    pub shares: String,
    pub method: String,
    pub term: String,
    pub rate: String,
    pub rate_source: String,
    pub proceeds_usd: String,
    pub cost_usd: String,
    pub gain_usd: String,
    pub proceeds_dkk: String,
    pub cost_dkk: String,
    pub gain_dkk: String,
    pub lots: String,
}

impl From<&DisposalRecord> for DisposalCsvRecord {
    fn from(d: &DisposalRecord) -> Self {
        DisposalCsvRecord {
            date: d.date.format("%Y-%m-%d").to_string(),
            ticker: d.ticker.clone(),
            shares: d.shares_sold.to_string(),
            method: d.method.display().to_string(),
            term: d
                .holding_period
                .map(|h| h.display().to_string())
                .unwrap_or_default(),
            rate: d.exchange_rate.to_string(),
            rate_source: d.rate_source.display().to_string(),
            proceeds_usd: d.proceeds_usd.round_dp(2).to_string(),
            cost_usd: d.cost_basis_usd.round_dp(2).to_string(),
            gain_usd: d.gain_usd.round_dp(2).to_string(),
            proceeds_dkk: d.proceeds_dkk.round_dp(2).to_string(),
            cost_dkk: d.cost_basis_dkk.round_dp(2).to_string(),
            gain_dkk: d.gain_dkk.round_dp(2).to_string(),
            lots: d
                .lots_consumed
                .iter()
                .map(|l| format!("{}:{}", l.lot_id, l.shares))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl CapitalGainsReport {
    pub fn total_gain_dkk(&self) -> Decimal {
        self.totals.gain_dkk
    }

    pub fn disposal_count(&self) -> usize {
        self.disposals.len()
    }

    /// Gains of one bucket as (USD, DKK)
    pub fn gain_in(&self, bucket: GainBucket) -> (Decimal, Decimal) {
        match bucket {
            GainBucket::ShortTerm => (
                self.totals.short_term_gain_usd,
                self.totals.short_term_gain_dkk,
            ),
            GainBucket::LongTerm => (
                self.totals.long_term_gain_usd,
                self.totals.long_term_gain_dkk,
            ),
            GainBucket::AverageCost => (
                self.totals.average_cost_gain_usd,
                self.totals.average_cost_gain_dkk,
            ),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        crate::utils::write_csv(self.disposals.iter().map(DisposalCsvRecord::from), writer)
    }
}

/// Cost every disposal in `period` against the current holdings.
///
/// Settled disposals keep the allocation recorded when they were settled.
/// The rest are processed in date order against a working copy of the
/// ledger, so a lot consumed by an earlier sale is not available to a later
/// one, and a lot acquired after a sale is never used for it. The stored
/// holdings are not changed. Each amount is converted at the exchange rate of
/// its own transaction date, so DKK totals are sums of individually
/// converted amounts.
pub fn compute_capital_gains(
    store: &dyn LedgerStore,
    resolver: &mut ExchangeRateResolver,
    period: Period,
) -> anyhow::Result<CapitalGainsReport> {
    let mut disposals = store.disposals(period.start_date(), period.end_date())?;
    disposals.retain(|d| period.contains(d.date));
    disposals.sort_by_key(|d| d.date);
    let mut ledger = build_ledger(store, period.end_date())?;

    let mut records = Vec::new();
    let mut skipped = Vec::new();
    let mut totals = GainTotals::default();
    let mut by_ticker: BTreeMap<String, TickerSummary> = BTreeMap::new();

    for disposal in disposals {
        let allocation = match &disposal.settlement {
            Some(settled) => {
                log::debug!(
                    "Sale of {} {} on {} is settled, cost basis {}",
                    disposal.shares_sold,
                    disposal.ticker,
                    disposal.date,
                    settled.cost_basis_usd
                );
                settled.clone()
            }
            None => match allocate_in(&mut ledger, &disposal) {
                Ok(allocation) => allocation,
                Err(reason) => {
                    log::warn!(
                        "Skipping sale of {} {} on {}: {}",
                        disposal.shares_sold,
                        disposal.ticker,
                        disposal.date,
                        reason
                    );
                    skipped.push(SkippedDisposal { reason, disposal });
                    continue;
                }
            },
        };

        let mut warnings = Vec::new();
        if !allocation.is_complete() {
            log::warn!(
                "Sale of {} {} on {} exceeds holdings, {} shares have no cost basis",
                disposal.shares_sold,
                disposal.ticker,
                disposal.date,
                allocation.shares_unallocated
            );
            warnings.push(Warning::InsufficientCostBasis {
                available: allocation.shares_allocated,
                required: disposal.shares_sold,
            });
        }

        let rate = resolver.resolve(disposal.date, disposal.manual_rate);
        if rate.source == RateSource::Default {
            warnings.push(Warning::DefaultExchangeRate {
                date: disposal.date,
                rate: rate.rate,
            });
        }

        let proceeds_dkk = disposal.proceeds_usd * rate.rate;
        let cost_basis_dkk = allocation.cost_basis_usd * rate.rate;
        let record = DisposalRecord {
            date: disposal.date,
            ticker: disposal.ticker.clone(),
            shares_sold: disposal.shares_sold,
            proceeds_usd: disposal.proceeds_usd,
            proceeds_dkk,
            cost_basis_usd: allocation.cost_basis_usd,
            cost_basis_dkk,
            gain_usd: disposal.proceeds_usd - allocation.cost_basis_usd,
            gain_dkk: proceeds_dkk - cost_basis_dkk,
            exchange_rate: rate.rate,
            rate_source: rate.source,
            method: allocation.method,
            holding_period: allocation.holding_period,
            bucket: GainBucket::of(allocation.method, allocation.holding_period),
            lots_consumed: allocation.lots_consumed,
            warnings,
        };
        log::debug!(
            "Sale {} {} on {}: proceeds {} DKK, cost {} DKK, gain {} DKK",
            record.shares_sold,
            record.ticker,
            record.date,
            record.proceeds_dkk,
            record.cost_basis_dkk,
            record.gain_dkk
        );

        totals.add(&record);
        let summary = by_ticker
            .entry(record.ticker.clone())
            .or_insert_with(|| TickerSummary {
                ticker: record.ticker.clone(),
                method: record.method,
                transactions: 0,
                shares_sold: Decimal::ZERO,
                gain_usd: Decimal::ZERO,
                gain_dkk: Decimal::ZERO,
            });
        summary.transactions += 1;
        summary.shares_sold += record.shares_sold;
        summary.gain_usd += record.gain_usd;
        summary.gain_dkk += record.gain_dkk;
        records.push(record);
    }

    log::info!(
        "Capital gains {}: {} disposals, {} skipped, net gain {} DKK",
        period,
        records.len(),
        skipped.len(),
        totals.gain_dkk.round_dp(2)
    );

    Ok(CapitalGainsReport {
        period: period.display(),
        totals,
        by_ticker,
        disposals: records,
        skipped,
    })
}

/// Allocate an unsettled disposal against the working ledger and consume
/// the lots it used
fn allocate_in(ledger: &mut Ledger, disposal: &DisposalTransaction) -> Result<Allocation, String> {
    let position = ledger
        .position_mut(&disposal.ticker)
        .ok_or_else(|| format!("no position for {}", disposal.ticker))?;
    position.reclassify(disposal.date);
    let allocation = allocation::allocate(
        position,
        disposal.shares_sold,
        disposal.lot_id,
        disposal.date,
    )
    .map_err(|err| err.to_string())?;
    allocation::apply(position, &allocation);
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dk::TaxYear;
    use crate::core::fx::{ExchangeRateRecord, MemoryRateCache, RateCache};
    use crate::core::store::{settle_disposal, Holding, MethodElection, Portfolio};
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn holding(ticker: &str, d: &str, shares: Decimal, cost: Decimal) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            lot_id: None,
            acquisition_date: date(d),
            shares,
            cost_per_share_usd: cost,
        }
    }

    fn sale(ticker: &str, d: &str, shares: Decimal, proceeds: Decimal) -> DisposalTransaction {
        DisposalTransaction {
            ticker: ticker.to_string(),
            date: date(d),
            shares_sold: shares,
            proceeds_usd: proceeds,
            lot_id: None,
            manual_rate: None,
            settlement: None,
        }
    }

    fn resolver(rates: &[(&str, Decimal)]) -> ExchangeRateResolver {
        let mut cache = MemoryRateCache::new();
        for (d, rate) in rates {
            cache
                .upsert(ExchangeRateRecord {
                    date: date(d),
                    rate: *rate,
                    source: RateSource::Api,
                })
                .unwrap();
        }
        ExchangeRateResolver::offline(Box::new(cache))
    }

    fn year(y: i32) -> Period {
        Period::Year(TaxYear(y))
    }

    #[test]
    fn fifo_gain_converted_at_sale_date_rate() {
        let store = Portfolio {
            holdings: vec![
                holding("MSFT", "2022-01-10", dec!(50), dec!(200)),
                holding("MSFT", "2023-01-10", dec!(50), dec!(300)),
            ],
            disposals: vec![sale("MSFT", "2024-03-01", dec!(50), dec!(20000))],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        assert_eq!(report.disposal_count(), 1);
        let d = &report.disposals[0];
        assert_eq!(d.cost_basis_usd, dec!(10000));
        assert_eq!(d.gain_usd, dec!(10000));
        assert_eq!(d.proceeds_dkk, dec!(140000));
        assert_eq!(d.gain_dkk, dec!(70000));
        assert_eq!(d.rate_source, RateSource::Cached);
        assert_eq!(d.holding_period, Some(HoldingPeriod::LongTerm));
        assert_eq!(report.gain_in(GainBucket::LongTerm), (dec!(10000), dec!(70000)));
        assert_eq!(report.gain_in(GainBucket::ShortTerm), (dec!(0), dec!(0)));
    }

    #[test]
    fn totals_sum_individually_converted_amounts() {
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2024-01-02", dec!(100), dec!(100))],
            disposals: vec![
                sale("MSFT", "2024-03-01", dec!(10), dec!(2000)),
                sale("MSFT", "2024-09-02", dec!(10), dec!(2000)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(6)), ("2024-09-02", dec!(8))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        // 1000 USD gain at 6 plus 1000 USD gain at 8
        assert_eq!(report.totals.gain_usd, dec!(2000));
        assert_eq!(report.total_gain_dkk(), dec!(14000));
        assert_eq!(report.totals.short_term_gain_dkk, dec!(14000));
    }

    #[test]
    fn later_sales_consume_remaining_lots() {
        let store = Portfolio {
            holdings: vec![
                holding("MSFT", "2022-01-10", dec!(10), dec!(100)),
                holding("MSFT", "2023-01-10", dec!(10), dec!(200)),
            ],
            disposals: vec![
                sale("MSFT", "2024-06-01", dec!(10), dec!(3000)),
                sale("MSFT", "2024-03-01", dec!(10), dec!(3000)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7)), ("2024-06-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        assert_eq!(report.disposals[0].date, date("2024-03-01"));
        assert_eq!(report.disposals[0].cost_basis_usd, dec!(1000));
        assert_eq!(report.disposals[1].cost_basis_usd, dec!(2000));
        assert_eq!(report.disposals[1].lots_consumed[0].lot_id, 2);
    }

    #[test]
    fn disposal_without_position_skipped() {
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2022-01-10", dec!(10), dec!(100))],
            disposals: vec![
                sale("TSLA", "2024-03-01", dec!(5), dec!(1000)),
                sale("MSFT", "2024-03-01", dec!(5), dec!(1000)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        assert_eq!(report.disposal_count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].disposal.ticker, "TSLA");
        assert_eq!(report.totals.gain_usd, dec!(500));
    }

    #[test]
    fn bad_lot_request_skipped_without_aborting() {
        let mut bad = sale("MSFT", "2024-03-01", dec!(5), dec!(1000));
        bad.lot_id = Some(7);
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2022-01-10", dec!(10), dec!(100))],
            disposals: vec![bad, sale("MSFT", "2024-04-01", dec!(5), dec!(1000))],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-04-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        assert_eq!(report.disposal_count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("no lot 7"));
    }

    #[test]
    fn over_selling_flagged() {
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2022-01-10", dec!(10), dec!(100))],
            disposals: vec![sale("MSFT", "2024-03-01", dec!(12), dec!(2400))],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        let d = &report.disposals[0];
        assert_eq!(d.cost_basis_usd, dec!(1000));
        assert_eq!(
            d.warnings,
            vec![Warning::InsufficientCostBasis {
                available: dec!(10),
                required: dec!(12),
            }]
        );
    }

    #[test]
    fn sale_before_only_lot_has_no_cost_basis() {
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2024-06-01", dec!(10), dec!(100))],
            disposals: vec![sale("MSFT", "2024-03-01", dec!(5), dec!(1000))],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        let d = &report.disposals[0];
        assert!(d.lots_consumed.is_empty());
        assert_eq!(d.cost_basis_usd, dec!(0));
        assert_eq!(d.holding_period, None);
        assert_eq!(
            d.warnings,
            vec![Warning::InsufficientCostBasis {
                available: dec!(0),
                required: dec!(5),
            }]
        );
    }

    #[test]
    fn lots_bought_after_sale_not_used() {
        let store = Portfolio {
            holdings: vec![
                holding("MSFT", "2022-01-10", dec!(10), dec!(100)),
                holding("MSFT", "2024-06-01", dec!(10), dec!(500)),
            ],
            disposals: vec![
                sale("MSFT", "2024-03-01", dec!(15), dec!(3000)),
                sale("MSFT", "2024-07-01", dec!(10), dec!(3000)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7)), ("2024-07-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        let early = &report.disposals[0];
        assert_eq!(early.cost_basis_usd, dec!(1000));
        assert_eq!(early.holding_period, Some(HoldingPeriod::LongTerm));
        assert!(early.has_warnings());
        // the June lot is still whole for the July sale
        let late = &report.disposals[1];
        assert_eq!(late.cost_basis_usd, dec!(5000));
        assert_eq!(late.lots_consumed[0].lot_id, 2);
        assert!(!late.has_warnings());
    }

    #[test]
    fn report_unchanged_after_settling() {
        let mut store = Portfolio {
            holdings: vec![
                holding("MSFT", "2022-01-10", dec!(10), dec!(100)),
                holding("MSFT", "2023-01-10", dec!(10), dec!(200)),
            ],
            disposals: vec![
                sale("MSFT", "2024-03-01", dec!(10), dec!(3000)),
                sale("MSFT", "2024-06-03", dec!(5), dec!(1500)),
            ],
            ..Default::default()
        };
        let rates = [("2024-03-01", dec!(7)), ("2024-06-03", dec!(7))];

        let before = compute_capital_gains(&store, &mut resolver(&rates), year(2024)).unwrap();
        settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap();
        let after = compute_capital_gains(&store, &mut resolver(&rates), year(2024)).unwrap();

        assert_eq!(before.totals, after.totals);
        assert_eq!(after.disposals[0].cost_basis_usd, dec!(1000));
        assert_eq!(after.disposals[0].lots_consumed, before.disposals[0].lots_consumed);
        assert_eq!(after.disposals[1].cost_basis_usd, dec!(1000));
        assert_eq!(after.disposals[1].lots_consumed[0].lot_id, 2);

        settle_disposal(&mut store, "MSFT", date("2024-06-03")).unwrap();
        let settled = compute_capital_gains(&store, &mut resolver(&rates), year(2024)).unwrap();
        assert_eq!(settled.totals, before.totals);
    }

    #[test]
    fn average_cost_gains_in_own_bucket() {
        let mut methods = BTreeMap::new();
        methods.insert(
            "MSFT".to_string(),
            MethodElection {
                method: CostBasisMethod::AverageCost,
                average_cost_per_share_usd: None,
            },
        );
        let store = Portfolio {
            holdings: vec![
                holding("MSFT", "2022-01-10", dec!(50), dec!(200)),
                holding("MSFT", "2023-01-10", dec!(50), dec!(300)),
            ],
            methods,
            disposals: vec![sale("MSFT", "2024-03-01", dec!(50), dec!(20000))],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        let d = &report.disposals[0];
        assert_eq!(d.cost_basis_usd, dec!(12500));
        assert_eq!(d.holding_period, None);
        assert_eq!(d.bucket, GainBucket::AverageCost);
        assert_eq!(report.totals.average_cost_gain_usd, dec!(7500));
        assert_eq!(report.by_ticker["MSFT"].method, CostBasisMethod::AverageCost);
    }

    #[test]
    fn only_disposals_in_period_counted() {
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2022-01-10", dec!(100), dec!(100))],
            disposals: vec![
                sale("MSFT", "2023-12-29", dec!(1), dec!(150)),
                sale("MSFT", "2024-02-01", dec!(1), dec!(150)),
                sale("MSFT", "2024-05-02", dec!(1), dec!(150)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[]);

        let q1 = Period::quarter(2024, 1).unwrap();
        let report = compute_capital_gains(&store, &mut resolver, q1).unwrap();
        assert_eq!(report.disposal_count(), 1);
        assert_eq!(report.period, "2024-Q1");
        // no cached rate, offline: default rate used and flagged
        assert!(matches!(
            report.disposals[0].warnings[0],
            Warning::DefaultExchangeRate { .. }
        ));
    }

    #[test]
    fn per_ticker_summary() {
        let store = Portfolio {
            holdings: vec![
                holding("MSFT", "2022-01-10", dec!(100), dec!(100)),
                holding("AAPL", "2022-01-10", dec!(100), dec!(50)),
            ],
            disposals: vec![
                sale("MSFT", "2024-03-01", dec!(10), dec!(1500)),
                sale("MSFT", "2024-04-01", dec!(5), dec!(400)),
                sale("AAPL", "2024-04-01", dec!(20), dec!(1000)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7)), ("2024-04-01", dec!(7))]);

        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();
        let msft = &report.by_ticker["MSFT"];
        assert_eq!(msft.transactions, 2);
        assert_eq!(msft.shares_sold, dec!(15));
        assert_eq!(msft.gain_usd, dec!(400));
        assert_eq!(msft.gain_dkk, dec!(2800));
        assert_eq!(report.by_ticker["AAPL"].gain_usd, dec!(0));
    }

    #[test]
    fn csv_output_has_row_per_disposal() {
        let store = Portfolio {
            holdings: vec![holding("MSFT", "2022-01-10", dec!(100), dec!(100))],
            disposals: vec![
                sale("MSFT", "2024-03-01", dec!(10), dec!(1500)),
                sale("MSFT", "2024-04-01", dec!(5), dec!(400)),
            ],
            ..Default::default()
        };
        let mut resolver = resolver(&[("2024-03-01", dec!(7)), ("2024-04-01", dec!(7))]);
        let report = compute_capital_gains(&store, &mut resolver, year(2024)).unwrap();

        let mut output = Vec::new();
        report.write_csv(&mut output).unwrap();
        let csv_str = String::from_utf8(output).unwrap();
        assert_eq!(csv_str.lines().count(), 3);
        assert!(csv_str.contains("gain_dkk"));
        assert!(csv_str.contains("1:10"));
    }
}
