use super::dk::{Period, TaxYear};
use super::fx::{ExchangeRateResolver, RateSource};
use super::store::{IncomeCategory, LedgerStore};
use super::warnings::Warning;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Maximum US withholding creditable under the US/Denmark treaty
pub const TREATY_RATE: Decimal = dec!(0.15);

/// Whether the taxpayer also files a US return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilerStatus {
    /// Files in the US; the credit is limited to tax actually paid there
    ForeignFiler,
    #[default]
    ResidentOnly,
}

impl FilerStatus {
    pub fn display(&self) -> &'static str {
        match self {
            FilerStatus::ForeignFiler => "US filer",
            FilerStatus::ResidentOnly => "Resident only",
        }
    }
}

/// A converted dividend or withholding entry
#[derive(Debug, Clone, Serialize)]
pub struct IncomeRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub category: IncomeCategory,
    /// Withholding is always positive here
    pub amount_usd: Decimal,
    pub amount_dkk: Decimal,
    pub exchange_rate: Decimal,
    pub rate_source: RateSource,
    pub warnings: Vec<Warning>,
}

/// Dividends and withholding for one ticker
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickerDividends {
    pub payments: usize,
    pub gross_usd: Decimal,
    pub gross_dkk: Decimal,
    pub withheld_usd: Decimal,
    pub withheld_dkk: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct DividendReport {
    pub period: String,
    pub filer_status: FilerStatus,
    pub gross_dividends_usd: Decimal,
    pub gross_dividends_dkk: Decimal,
    pub withheld_usd: Decimal,
    pub withheld_dkk: Decimal,
    /// Foreign tax figure the credit was limited by, for US filers
    pub actual_foreign_tax_usd: Option<Decimal>,
    pub treaty_rate: Decimal,
    pub foreign_tax_credit_usd: Decimal,
    pub foreign_tax_credit_dkk: Decimal,
    /// Danish share income tax on the gross dividends
    pub share_income_tax_dkk: Decimal,
    pub tax_after_credit_dkk: Decimal,
    pub by_ticker: BTreeMap<String, TickerDividends>,
    pub transactions: Vec<IncomeRecord>,
}

/// CSV record for dividend output
#[derive(Debug, Serialize, Deserialize)]
pub struct IncomeCsvRecord {
    pub date: String,
    pub ticker: String,
    pub category: String,
    pub rate: String,
    pub rate_source: String,
    pub amount_usd: String,
    pub amount_dkk: String,
}

impl From<&IncomeRecord> for IncomeCsvRecord {
    fn from(r: &IncomeRecord) -> Self {
        IncomeCsvRecord {
            date: r.date.format("%Y-%m-%d").to_string(),
            ticker: r.ticker.clone(),
            category: format!("{:?}", r.category),
            rate: r.exchange_rate.to_string(),
            rate_source: r.rate_source.display().to_string(),
            amount_usd: r.amount_usd.round_dp(2).to_string(),
            amount_dkk: r.amount_dkk.round_dp(2).to_string(),
        }
    }
}

impl DividendReport {
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        crate::utils::write_csv(self.transactions.iter().map(IncomeCsvRecord::from), writer)
    }
}

/// Foreign tax credit as (USD, DKK).
///
/// US filers who state the tax actually paid get the lesser of that and the
/// treaty rate on gross dividends, carried into DKK at the average rate of
/// the dividends themselves. Otherwise the credit is the treaty rate on
/// gross dividends.
pub fn foreign_tax_credit(
    status: FilerStatus,
    gross_usd: Decimal,
    gross_dkk: Decimal,
    actual_foreign_tax_usd: Option<Decimal>,
) -> (Decimal, Decimal) {
    match (status, actual_foreign_tax_usd) {
        (FilerStatus::ForeignFiler, Some(actual)) => {
            let credit_usd = actual.min(gross_usd * TREATY_RATE);
            let credit_dkk = if gross_usd.is_zero() {
                Decimal::ZERO
            } else {
                credit_usd * gross_dkk / gross_usd
            };
            (credit_usd, credit_dkk)
        }
        _ => (gross_usd * TREATY_RATE, gross_dkk * TREATY_RATE),
    }
}

/// Aggregate dividends and withholding in `period`, converting each entry at
/// the rate for its own date.
///
/// A US filer without an `actual_foreign_tax_usd` figure gets the treaty
/// rate credit, the same as a resident-only taxpayer.
pub fn compute_dividends(
    store: &dyn LedgerStore,
    resolver: &mut ExchangeRateResolver,
    period: Period,
    status: FilerStatus,
    actual_foreign_tax_usd: Option<Decimal>,
) -> anyhow::Result<DividendReport> {
    let mut income = store.income(period.start_date(), period.end_date())?;
    income.retain(|i| period.contains(i.date));
    income.sort_by_key(|i| i.date);

    let mut gross_usd = Decimal::ZERO;
    let mut gross_dkk = Decimal::ZERO;
    let mut withheld_usd = Decimal::ZERO;
    let mut withheld_dkk = Decimal::ZERO;
    let mut by_ticker: BTreeMap<String, TickerDividends> = BTreeMap::new();
    let mut transactions = Vec::with_capacity(income.len());

    for entry in income {
        let amount_usd = match entry.category {
            IncomeCategory::Dividend => entry.amount_usd,
            IncomeCategory::Withholding => entry.amount_usd.abs(),
        };
        let (amount_dkk, rate) = resolver.convert(amount_usd, entry.date, entry.manual_rate);

        let ticker = by_ticker.entry(entry.ticker.clone()).or_default();
        match entry.category {
            IncomeCategory::Dividend => {
                gross_usd += amount_usd;
                gross_dkk += amount_dkk;
                ticker.payments += 1;
                ticker.gross_usd += amount_usd;
                ticker.gross_dkk += amount_dkk;
            }
            IncomeCategory::Withholding => {
                withheld_usd += amount_usd;
                withheld_dkk += amount_dkk;
                ticker.withheld_usd += amount_usd;
                ticker.withheld_dkk += amount_dkk;
            }
        }

        let mut warnings = Vec::new();
        if rate.source == RateSource::Default {
            warnings.push(Warning::DefaultExchangeRate {
                date: entry.date,
                rate: rate.rate,
            });
        }
        transactions.push(IncomeRecord {
            date: entry.date,
            ticker: entry.ticker,
            category: entry.category,
            amount_usd,
            amount_dkk,
            exchange_rate: rate.rate,
            rate_source: rate.source,
            warnings,
        });
    }

    let actual_foreign_tax_usd = match status {
        FilerStatus::ForeignFiler => actual_foreign_tax_usd,
        FilerStatus::ResidentOnly => None,
    };
    if status == FilerStatus::ForeignFiler && actual_foreign_tax_usd.is_none() {
        log::warn!(
            "No US tax paid given for {}, crediting the treaty rate ({} USD withheld)",
            period,
            withheld_usd
        );
    }
    let (credit_usd, credit_dkk) =
        foreign_tax_credit(status, gross_usd, gross_dkk, actual_foreign_tax_usd);

    let year: TaxYear = period.tax_year();
    let share_income_tax_dkk = year.share_income_tax(gross_dkk);
    let tax_after_credit_dkk = (share_income_tax_dkk - credit_dkk).max(Decimal::ZERO);

    log::info!(
        "Dividends {}: gross {} DKK, withheld {} DKK, credit {} DKK ({})",
        period,
        gross_dkk.round_dp(2),
        withheld_dkk.round_dp(2),
        credit_dkk.round_dp(2),
        status.display()
    );

    Ok(DividendReport {
        period: period.display(),
        filer_status: status,
        gross_dividends_usd: gross_usd,
        gross_dividends_dkk: gross_dkk,
        withheld_usd,
        withheld_dkk,
        actual_foreign_tax_usd,
        treaty_rate: TREATY_RATE,
        foreign_tax_credit_usd: credit_usd,
        foreign_tax_credit_dkk: credit_dkk,
        share_income_tax_dkk,
        tax_after_credit_dkk,
        by_ticker,
        transactions,
    })
}
