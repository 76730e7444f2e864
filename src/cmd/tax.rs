//! Tax command - annual income tax with the §7P reduction

use super::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use rsutax::core::{calculate_income_tax, TaxInput, TaxResult, TaxYear};
use rsutax::utils::{format_dkk, format_pct};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tabled::Tabled;

#[derive(Args, Debug)]
pub struct TaxCommand {
    /// Read the income figures from a JSON file instead of flags
    #[arg(short, long, conflicts_with_all = ["year", "salary"])]
    input: Option<PathBuf>,

    /// Income year (e.g., 2024)
    #[arg(short, long, required_unless_present = "input")]
    year: Option<i32>,

    /// Annual salary in DKK
    #[arg(short, long, required_unless_present = "input")]
    salary: Option<Decimal>,

    /// Equity income granted under §7P, in DKK
    #[arg(long, default_value_t = Decimal::ZERO)]
    equity_7p: Decimal,

    /// Equity income outside §7P, in DKK
    #[arg(long, default_value_t = Decimal::ZERO)]
    equity_other: Decimal,

    /// Other deductions, in DKK
    #[arg(long, default_value_t = Decimal::ZERO)]
    deductions: Decimal,

    /// §7P allowance in DKK (default 20% of salary)
    #[arg(long)]
    allowance_7p: Option<Decimal>,

    /// Output as JSON instead of a formatted table
    #[arg(long)]
    json: bool,
}

impl TaxCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let input = self.tax_input()?;
        let result = calculate_income_tax(&input);

        if self.json {
            print_json(&result)
        } else {
            print_result(&result);
            Ok(())
        }
    }

    fn tax_input(&self) -> anyhow::Result<TaxInput> {
        if let Some(path) = &self.input {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            let input = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("reading tax input {}", path.display()))?;
            return Ok(input);
        }
        match (self.year, self.salary) {
            (Some(year), Some(salary)) => Ok(TaxInput {
                tax_year: TaxYear(year),
                salary,
                equity_income_7p: self.equity_7p,
                equity_income_other: self.equity_other,
                additional_deductions: self.deductions,
                allowance_7p: self.allowance_7p,
            }),
            _ => anyhow::bail!("--year and --salary are required without --input"),
        }
    }
}

fn print_result(result: &TaxResult) {
    println!();
    println!("INCOME TAX ({})", result.tax_year);
    println!();

    let lines = [
        ("Total income", result.total_income),
        ("AM contribution", result.am_contribution),
        ("Income after AM", result.income_after_contribution),
        ("Personal allowance", result.personal_allowance),
        ("Taxable income", result.taxable_income),
        ("Municipal tax", result.municipal_tax),
        ("Bottom tax", result.bottom_tax),
        ("Top tax base", result.top_tax_base),
        ("Top tax", result.top_tax),
        ("Tax before §7P", result.tax_before_benefit),
        ("§7P allowance", result.allowance_7p),
        ("§7P reduction", -result.reduction_7p),
        ("Total tax", result.total_tax),
        ("Net income", result.net_income),
    ];
    let rows = lines
        .into_iter()
        .map(|(item, amount)| TaxRow {
            item: item.to_string(),
            amount: format_dkk(amount),
        })
        .collect();
    print_table(rows);
    println!();
    println!("  Effective tax rate: {}", format_pct(result.effective_tax_rate));
    println!();
}

#[derive(Debug, Tabled)]
struct TaxRow {
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "DKK")]
    amount: String,
}
