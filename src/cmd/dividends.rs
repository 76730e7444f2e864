//! Dividends command - dividend income, withholding and foreign tax credit

use super::{print_json, print_table, OutputArgs, PeriodArgs, PortfolioArgs, RateArgs};
use clap::Args;
use rsutax::core::{compute_dividends, DividendReport, FilerStatus};
use rsutax::utils::{format_dkk, format_usd};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io;
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct DividendsCommand {
    #[command(flatten)]
    portfolio: PortfolioArgs,

    #[command(flatten)]
    period: PeriodArgs,

    #[command(flatten)]
    rates: RateArgs,

    /// Taxpayer also files a US return
    #[arg(long)]
    us_filer: bool,

    /// US tax actually paid on the dividends, in USD (US filers only)
    #[arg(long, requires = "us_filer")]
    foreign_tax: Option<Decimal>,

    #[command(flatten)]
    output: OutputArgs,
}

impl DividendsCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let store = self.portfolio.open()?;
        let mut resolver = self.rates.resolver()?;
        let status = if self.us_filer {
            FilerStatus::ForeignFiler
        } else {
            FilerStatus::ResidentOnly
        };
        let report = compute_dividends(
            &store,
            &mut resolver,
            self.period.period()?,
            status,
            self.foreign_tax,
        )?;

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

fn print_report(report: &DividendReport) {
    println!();
    println!(
        "DIVIDENDS ({}) - {}",
        report.period,
        report.filer_status.display()
    );
    println!();

    if report.by_ticker.is_empty() {
        println!("No dividends in period");
        println!();
        return;
    }

    let rows = report
        .by_ticker
        .iter()
        .map(|(ticker, t)| TickerRow {
            ticker: ticker.clone(),
            payments: t.payments,
            gross_usd: format_usd(t.gross_usd),
            gross_dkk: format_dkk(t.gross_dkk),
            withheld_usd: format_usd(t.withheld_usd),
            withheld_dkk: format_dkk(t.withheld_dkk),
        })
        .collect();
    print_table(rows);
    println!();

    println!(
        "  Gross: {} ({}) | Withheld: {} ({})",
        format_dkk(report.gross_dividends_dkk),
        format_usd(report.gross_dividends_usd),
        format_dkk(report.withheld_dkk),
        format_usd(report.withheld_usd)
    );
    println!(
        "  Foreign tax credit @ {:.0}% cap: {} ({})",
        report.treaty_rate * dec!(100),
        format_dkk(report.foreign_tax_credit_dkk),
        format_usd(report.foreign_tax_credit_usd)
    );
    println!(
        "  Share income tax: {} | After credit: {}",
        format_dkk(report.share_income_tax_dkk),
        format_dkk(report.tax_after_credit_dkk)
    );

    let defaulted = report
        .transactions
        .iter()
        .filter(|t| !t.warnings.is_empty())
        .count();
    if defaulted > 0 {
        println!();
        println!("WARNINGS");
        for t in report.transactions.iter() {
            for w in &t.warnings {
                println!("  {} {}: {}", t.date, t.ticker, w.message());
            }
        }
    }
    println!();
}

#[derive(Debug, Tabled)]
struct TickerRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Payments")]
    payments: usize,
    #[tabled(rename = "Gross (USD)")]
    gross_usd: String,
    #[tabled(rename = "Gross (DKK)")]
    gross_dkk: String,
    #[tabled(rename = "Withheld (USD)")]
    withheld_usd: String,
    #[tabled(rename = "Withheld (DKK)")]
    withheld_dkk: String,
}
