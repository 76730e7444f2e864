//! Settle command - write a sale down against the stored lots

use super::{print_json, print_table, PortfolioArgs};
use chrono::NaiveDate;
use clap::Args;
use rsutax::core::settle_disposal;
use rsutax::utils::format_usd;
use tabled::Tabled;

/// Reports never change the stored lots. Settling a recorded sale writes its
/// lots down and keeps the allocation on the sale, so reports for its period
/// stay the same and later sales start from what is left.
#[derive(Args, Debug)]
pub struct SettleCommand {
    #[command(flatten)]
    portfolio: PortfolioArgs,

    /// Ticker sold
    #[arg(short, long)]
    ticker: String,

    /// Date of the recorded sale (YYYY-MM-DD)
    #[arg(short, long)]
    date: NaiveDate,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl SettleCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut store = self.portfolio.open()?;
        let allocation = settle_disposal(&mut store, &self.ticker, self.date)?;

        if self.json {
            return print_json(&allocation);
        }
        println!(
            "Settled {} {} on {} ({}), cost basis {}",
            allocation.shares_allocated.normalize(),
            self.ticker,
            self.date,
            allocation.method.display(),
            format_usd(allocation.cost_basis_usd)
        );
        if !allocation.lots_consumed.is_empty() {
            let rows = allocation
                .lots_consumed
                .iter()
                .map(|l| LotRow {
                    lot: l.lot_id,
                    acquired: l.acquisition_date.format("%Y-%m-%d").to_string(),
                    shares: l.shares.normalize().to_string(),
                    cost: format_usd(l.cost_usd),
                })
                .collect();
            print_table(rows);
        }
        Ok(())
    }
}

#[derive(Debug, Tabled)]
struct LotRow {
    #[tabled(rename = "Lot")]
    lot: u32,
    #[tabled(rename = "Acquired")]
    acquired: String,
    #[tabled(rename = "Shares")]
    shares: String,
    #[tabled(rename = "Cost")]
    cost: String,
}
