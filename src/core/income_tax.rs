use super::dk::TaxYear;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annual income to be taxed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaxInput {
    #[schemars(with = "i32")]
    pub tax_year: TaxYear,
    #[schemars(with = "f64")]
    pub salary: Decimal,
    /// Equity income granted under a §7P scheme
    #[serde(default)]
    #[schemars(with = "f64")]
    pub equity_income_7p: Decimal,
    /// Equity income outside §7P, taxed as salary
    #[serde(default)]
    #[schemars(with = "f64")]
    pub equity_income_other: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub additional_deductions: Decimal,
    /// §7P allowance; 20% of salary when not given
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub allowance_7p: Option<Decimal>,
}

impl TaxInput {
    pub fn new(tax_year: TaxYear, salary: Decimal) -> Self {
        TaxInput {
            tax_year,
            salary,
            equity_income_7p: Decimal::ZERO,
            equity_income_other: Decimal::ZERO,
            additional_deductions: Decimal::ZERO,
            allowance_7p: None,
        }
    }
}

/// Every step of the calculation, unrounded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxResult {
    pub tax_year: TaxYear,
    pub total_income: Decimal,
    pub am_contribution: Decimal,
    pub income_after_contribution: Decimal,
    pub personal_allowance: Decimal,
    pub taxable_income: Decimal,
    pub municipal_tax: Decimal,
    pub bottom_tax: Decimal,
    pub top_tax_base: Decimal,
    pub top_tax: Decimal,
    pub tax_before_benefit: Decimal,
    pub allowance_7p: Decimal,
    pub reduction_7p: Decimal,
    pub total_tax: Decimal,
    /// Percent of total income
    pub effective_tax_rate: Decimal,
    pub net_income: Decimal,
}

/// Calculate Danish income tax for a year.
///
/// The §7P reduction applies the combined municipal and bottom rate to the
/// allowance net of AM contribution. This is an average rate estimate of the
/// tax saved, not a recalculation through the brackets.
pub fn calculate_income_tax(input: &TaxInput) -> TaxResult {
    let year = input.tax_year;

    let total_income = input.salary + input.equity_income_7p + input.equity_income_other;
    let am_contribution = total_income * year.am_contribution_rate();
    let income_after_contribution = total_income - am_contribution;

    let personal_allowance = year.personal_allowance();
    let taxable_income = (income_after_contribution
        - personal_allowance
        - input.additional_deductions)
        .max(Decimal::ZERO);

    let municipal_tax = taxable_income * year.municipal_rate();
    let bottom_tax = taxable_income * year.bottom_rate();
    let top_tax_base = (taxable_income - year.top_tax_threshold()).max(Decimal::ZERO);
    let top_tax = top_tax_base * year.top_rate();
    let tax_before_benefit = am_contribution + municipal_tax + bottom_tax + top_tax;

    let allowance_7p = input
        .allowance_7p
        .unwrap_or_else(|| input.salary * year.allowance_7p_share());
    let reduction_7p = if input.equity_income_7p > Decimal::ZERO && allowance_7p > Decimal::ZERO {
        allowance_7p
            * (Decimal::ONE - year.am_contribution_rate())
            * (year.municipal_rate() + year.bottom_rate())
    } else {
        Decimal::ZERO
    };

    let total_tax = tax_before_benefit - reduction_7p;
    let effective_tax_rate = if total_income.is_zero() {
        Decimal::ZERO
    } else {
        total_tax / total_income * Decimal::ONE_HUNDRED
    };

    log::debug!(
        "Income tax {}: taxable {}, before benefit {}, §7P reduction {}, total {}",
        year,
        taxable_income,
        tax_before_benefit,
        reduction_7p,
        total_tax
    );

    TaxResult {
        tax_year: year,
        total_income,
        am_contribution,
        income_after_contribution,
        personal_allowance,
        taxable_income,
        municipal_tax,
        bottom_tax,
        top_tax_base,
        top_tax,
        tax_before_benefit,
        allowance_7p,
        reduction_7p,
        total_tax,
        effective_tax_rate,
        net_income: total_income - total_tax,
    }
}
