//! Gains command - capital gains on share sales

use super::{print_json, print_table, OutputArgs, PeriodArgs, PortfolioArgs, RateArgs};
use clap::Args;
use rsutax::core::{compute_capital_gains, CapitalGainsReport, DisposalRecord, GainBucket};
use rsutax::utils::{format_dkk, format_usd};
use std::io;
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct GainsCommand {
    #[command(flatten)]
    portfolio: PortfolioArgs,

    #[command(flatten)]
    period: PeriodArgs,

    #[command(flatten)]
    rates: RateArgs,

    #[command(flatten)]
    output: OutputArgs,
}

impl GainsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let store = self.portfolio.open()?;
        let mut resolver = self.rates.resolver()?;
        let report = compute_capital_gains(&store, &mut resolver, self.period.period()?)?;

        if self.output.json {
            print_json(&report)
        } else if self.output.csv {
            report.write_csv(io::stdout())
        } else {
            print_report(&report);
            Ok(())
        }
    }
}

fn print_report(report: &CapitalGainsReport) {
    println!();
    println!("CAPITAL GAINS ({})", report.period);
    println!();

    if report.disposals.is_empty() {
        println!("No disposals in period");
    } else {
        print_table(report.disposals.iter().map(DisposalRow::from).collect());
    }
    println!();

    let totals = &report.totals;
    println!(
        "  Proceeds: {} | Cost: {} | Gain: {} ({})",
        format_dkk(totals.proceeds_dkk),
        format_dkk(totals.cost_basis_dkk),
        format_dkk(totals.gain_dkk),
        format_usd(totals.gain_usd)
    );
    for (label, bucket) in [
        ("Short term", GainBucket::ShortTerm),
        ("Long term", GainBucket::LongTerm),
        ("Average cost", GainBucket::AverageCost),
    ] {
        let (usd, dkk) = report.gain_in(bucket);
        if !usd.is_zero() || !dkk.is_zero() {
            println!("  {}: {} ({})", label, format_dkk(dkk), format_usd(usd));
        }
    }

    if !report.by_ticker.is_empty() {
        println!();
        println!("BY TICKER");
        let rows = report
            .by_ticker
            .values()
            .map(|t| TickerRow {
                ticker: t.ticker.clone(),
                method: t.method.display().to_string(),
                sales: t.transactions,
                shares: t.shares_sold.normalize().to_string(),
                gain_usd: format_usd(t.gain_usd),
                gain_dkk: format_dkk(t.gain_dkk),
            })
            .collect();
        print_table(rows);
    }

    let warnings: Vec<_> = report
        .disposals
        .iter()
        .flat_map(|d| d.warnings.iter().map(move |w| (d, w)))
        .collect();
    if !warnings.is_empty() || !report.skipped.is_empty() {
        println!();
        println!("WARNINGS");
        for (d, w) in warnings {
            println!("  {} {}: {}", d.date, d.ticker, w.message());
        }
        for s in &report.skipped {
            println!(
                "  {} {}: skipped, {}",
                s.disposal.date, s.disposal.ticker, s.reason
            );
        }
    }
    println!();
}

#[derive(Debug, Tabled)]
struct DisposalRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Shares")]
    shares: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Term")]
    term: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Gain")]
    gain: String,
}

impl From<&DisposalRecord> for DisposalRow {
    fn from(d: &DisposalRecord) -> Self {
        let flag = if d.has_warnings() { " *" } else { "" };
        DisposalRow {
            date: d.date.format("%Y-%m-%d").to_string(),
            ticker: d.ticker.clone(),
            shares: d.shares_sold.normalize().to_string(),
            method: d.method.display().to_string(),
            term: d
                .holding_period
                .map_or("-".to_string(), |h| h.display().to_string()),
            rate: format!("{} ({})", d.exchange_rate, d.rate_source.display()),
            proceeds: format_dkk(d.proceeds_dkk),
            cost: format_dkk(d.cost_basis_dkk),
            gain: format!("{}{}", format_dkk(d.gain_dkk), flag),
        }
    }
}

#[derive(Debug, Tabled)]
struct TickerRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Sales")]
    sales: usize,
    #[tabled(rename = "Shares")]
    shares: String,
    #[tabled(rename = "Gain (USD)")]
    gain_usd: String,
    #[tabled(rename = "Gain (DKK)")]
    gain_dkk: String,
}
