//! Rates command - look up and prefetch USD/DKK rates

use super::{print_json, RateArgs};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use rsutax::core::{ResolvedRate, Warning};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Subcommand, Debug)]
pub enum RatesCommand {
    /// Resolve the rate for one date, caching it
    Get(GetRateCommand),
    /// Fill the cache for every business day in a range
    Prefetch(PrefetchCommand),
}

impl RatesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self {
            RatesCommand::Get(cmd) => cmd.exec(),
            RatesCommand::Prefetch(cmd) => cmd.exec(),
        }
    }
}

#[derive(Args, Debug)]
pub struct GetRateCommand {
    /// Date (YYYY-MM-DD)
    #[arg(short, long)]
    date: NaiveDate,

    /// Rate to store if none can be fetched
    #[arg(long)]
    manual_rate: Option<Decimal>,

    /// Amount in USD to convert
    #[arg(short, long)]
    amount: Option<Decimal>,

    #[command(flatten)]
    rates: RateArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RateOutput {
    date: NaiveDate,
    #[serde(flatten)]
    resolved: ResolvedRate,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount_usd: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount_dkk: Option<Decimal>,
}

impl GetRateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut resolver = self.rates.resolver()?;
        let resolved = resolver.resolve(self.date, self.manual_rate);
        let output = RateOutput {
            date: self.date,
            resolved,
            amount_usd: self.amount,
            amount_dkk: self.amount.map(|a| a * resolved.rate),
        };

        if self.json {
            return print_json(&output);
        }
        println!(
            "{} USD/DKK {} ({})",
            output.date,
            resolved.rate,
            resolved.source.display()
        );
        if let (Some(usd), Some(dkk)) = (output.amount_usd, output.amount_dkk) {
            println!("{} USD = {:.2} DKK", usd, dkk);
        }
        if !resolved.source.is_real() {
            let warning = Warning::DefaultExchangeRate {
                date: self.date,
                rate: resolved.rate,
            };
            eprintln!("warning: {}", warning.message());
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct PrefetchCommand {
    /// First date (YYYY-MM-DD)
    #[arg(long)]
    from: NaiveDate,

    /// Last date (YYYY-MM-DD)
    #[arg(long)]
    to: NaiveDate,

    #[command(flatten)]
    rates: RateArgs,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl PrefetchCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut resolver = self.rates.resolver()?;
        let summary = resolver.prefetch(self.from, self.to)?;

        if self.json {
            return print_json(&summary);
        }
        println!(
            "{} to {}: {} of {} business days have a rate",
            self.from, self.to, summary.resolved, summary.business_days
        );
        Ok(())
    }
}
