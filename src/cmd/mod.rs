pub mod dividends;
pub mod gains;
pub mod method;
pub mod rates;
pub mod schema;
pub mod settle;
pub mod tax;

use clap::Args;
use rsutax::core::{ExchangeRateResolver, Period, RateProvider, TaxYear, DEFAULT_USD_DKK_RATE};
use rsutax::frankfurter::{FrankfurterClient, DEFAULT_BASE_URL};
use rsutax::storage::{JsonStore, RateCacheFile};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Portfolio file holding holdings, method elections and transactions
#[derive(Args, Debug)]
pub struct PortfolioArgs {
    /// Portfolio JSON file
    #[arg(short, long, default_value = "portfolio.json")]
    pub portfolio: PathBuf,
}

impl PortfolioArgs {
    pub fn open(&self) -> anyhow::Result<JsonStore> {
        JsonStore::open(&self.portfolio)
    }
}

/// Where exchange rates come from
#[derive(Args, Debug)]
pub struct RateArgs {
    /// Rate cache JSON file, created when missing
    #[arg(long, default_value = "rates.json")]
    pub rates: PathBuf,

    /// Only use cached and manual rates
    #[arg(long)]
    pub offline: bool,

    /// Base URL of the Frankfurter rate API
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub rate_api: String,

    /// Rate API timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// USD/DKK rate used when no other rate is available
    #[arg(long, default_value_t = DEFAULT_USD_DKK_RATE)]
    pub default_rate: Decimal,
}

impl RateArgs {
    pub fn resolver(&self) -> anyhow::Result<ExchangeRateResolver> {
        let cache = RateCacheFile::open(&self.rates)?;
        let provider: Option<Box<dyn RateProvider>> = if self.offline {
            log::debug!("Offline, rate API disabled");
            None
        } else {
            let client =
                FrankfurterClient::new(&self.rate_api, Duration::from_secs(self.timeout))?;
            Some(Box::new(client))
        };
        let resolver = ExchangeRateResolver::new(Box::new(cache), provider);
        Ok(resolver.with_default_rate(self.default_rate))
    }
}

/// Reporting period: a year, or one quarter or month of it
#[derive(Args, Debug)]
pub struct PeriodArgs {
    /// Income year (e.g., 2024)
    #[arg(short, long)]
    pub year: i32,

    /// Quarter of the year (1-4)
    #[arg(short, long, conflicts_with = "month")]
    pub quarter: Option<u32>,

    /// Month of the year (1-12)
    #[arg(short, long)]
    pub month: Option<u32>,
}

impl PeriodArgs {
    pub fn period(&self) -> anyhow::Result<Period> {
        let period = match (self.quarter, self.month) {
            (Some(quarter), _) => Period::quarter(self.year, quarter)?,
            (None, Some(month)) => Period::month(self.year, month)?,
            (None, None) => Period::Year(TaxYear(self.year)),
        };
        Ok(period)
    }
}

/// Output selection shared by the report commands
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output as JSON instead of formatted tables
    #[arg(long, conflicts_with = "csv")]
    pub json: bool,

    /// Output transactions as CSV
    #[arg(long)]
    pub csv: bool,
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period_args(quarter: Option<u32>, month: Option<u32>) -> PeriodArgs {
        PeriodArgs {
            year: 2024,
            quarter,
            month,
        }
    }

    #[test]
    fn period_from_args() {
        assert_eq!(
            period_args(None, None).period().unwrap(),
            Period::Year(TaxYear(2024))
        );
        assert_eq!(period_args(Some(2), None).period().unwrap().display(), "2024-Q2");
        assert_eq!(period_args(None, Some(7)).period().unwrap().display(), "2024-07");
        assert!(period_args(Some(5), None).period().is_err());
        assert!(period_args(None, Some(13)).period().is_err());
    }
}
