//! Method command - show or change the cost basis method of a ticker

use super::{print_json, print_table, PortfolioArgs};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use rsutax::core::{build_ledger, set_method, CostBasisMethod, LedgerStore};
use rsutax::utils::format_usd;
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct MethodCommand {
    #[command(flatten)]
    portfolio: PortfolioArgs,

    /// Ticker to change; shows every position when omitted
    #[arg(short, long, requires = "method")]
    ticker: Option<String>,

    /// Method to elect. Average cost cannot be undone.
    #[arg(short, long, value_enum, requires = "ticker")]
    method: Option<MethodArg>,

    /// Date lots are classified at (default today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    /// Lot based, oldest lots first
    Fifo,
    /// Weighted average cost
    Average,
}

impl From<MethodArg> for CostBasisMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Fifo => CostBasisMethod::LotBased,
            MethodArg::Average => CostBasisMethod::AverageCost,
        }
    }
}

impl MethodCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut store = self.portfolio.open()?;
        let as_of = self.as_of.unwrap_or_else(|| Local::now().date_naive());

        if let (Some(ticker), Some(method)) = (&self.ticker, self.method) {
            let election = set_method(&mut store, ticker, method.into(), as_of)?;
            log::info!("{} now uses {}", ticker, election.method);
            if self.json {
                return print_json(&election);
            }
            println!("{}: {}", ticker, election.method.display());
            if let Some(average) = election.average_cost_per_share_usd {
                println!("  Average cost: {}/share", format_usd(average));
            }
            return Ok(());
        }

        self.show(&store, as_of)
    }

    fn show(&self, store: &dyn LedgerStore, as_of: NaiveDate) -> anyhow::Result<()> {
        let ledger = build_ledger(store, as_of)?;
        let rows: Vec<PositionRow> = ledger
            .positions()
            .map(|p| PositionRow {
                ticker: p.ticker.clone(),
                method: p.method().display().to_string(),
                lots: p.open_lots().count(),
                shares: p.total_shares().normalize().to_string(),
                cost: format_usd(p.total_cost()),
                average: format_usd(
                    p.cached_average_cost()
                        .unwrap_or_else(|| p.weighted_average_cost()),
                ),
            })
            .collect();

        if self.json {
            return print_json(&rows);
        }
        if rows.is_empty() {
            println!("No holdings");
        } else {
            print_table(rows);
        }
        Ok(())
    }
}

#[derive(Debug, Tabled, serde::Serialize)]
struct PositionRow {
    #[tabled(rename = "Ticker")]
    ticker: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Lots")]
    lots: usize,
    #[tabled(rename = "Shares")]
    shares: String,
    #[tabled(rename = "Cost")]
    cost: String,
    #[tabled(rename = "Avg/Share")]
    average: String,
}
