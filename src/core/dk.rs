use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Danish income year (runs 1 January to 31 December)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxYear(pub i32);

impl TaxYear {
    pub fn from_date(date: NaiveDate) -> Self {
        TaxYear(date.year())
    }

    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, 1, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn end_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, 12, 31).unwrap_or(NaiveDate::MAX)
    }

    pub fn display(&self) -> String {
        self.0.to_string()
    }

    /// Labour market contribution (AM-bidrag), levied on gross income
    pub fn am_contribution_rate(&self) -> Decimal {
        dec!(0.08)
    }

    /// Flat approximation of municipal plus church tax
    pub fn municipal_rate(&self) -> Decimal {
        dec!(0.25)
    }

    /// Bottom bracket (bundskat)
    pub fn bottom_rate(&self) -> Decimal {
        dec!(0.1209)
    }

    /// Top bracket (topskat), applied above `top_tax_threshold`
    pub fn top_rate(&self) -> Decimal {
        dec!(0.15)
    }

    pub fn top_tax_threshold(&self) -> Decimal {
        match self.0 {
            2025.. => dec!(611800),
            2024 => dec!(588900),
            // 2023 and earlier
            _ => dec!(568900),
        }
    }

    /// Personal allowance (personfradrag)
    pub fn personal_allowance(&self) -> Decimal {
        match self.0 {
            2025.. => dec!(51600),
            2024 => dec!(49700),
            _ => dec!(48000),
        }
    }

    /// Share of salary that may be granted under §7P when no explicit
    /// allowance is given
    pub fn allowance_7p_share(&self) -> Decimal {
        dec!(0.20)
    }

    /// Upper limit of the lower share income bracket (aktieindkomst)
    pub fn share_income_limit(&self) -> Decimal {
        match self.0 {
            2025.. => dec!(67500),
            2024 => dec!(61000),
            _ => dec!(58900),
        }
    }

    pub fn share_income_rate_low(&self) -> Decimal {
        dec!(0.27)
    }

    pub fn share_income_rate_high(&self) -> Decimal {
        dec!(0.42)
    }

    /// Share income tax on `income` DKK, using the two share income brackets
    pub fn share_income_tax(&self, income: Decimal) -> Decimal {
        if income <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let limit = self.share_income_limit();
        let low = income.min(limit);
        let high = (income - limit).max(Decimal::ZERO);
        low * self.share_income_rate_low() + high * self.share_income_rate_high()
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid quarter {0}, expected 1-4")]
    InvalidQuarter(u32),
    #[error("invalid month {0}, expected 1-12")]
    InvalidMonth(u32),
    #[error("start date {from} is after end date {to}")]
    InvertedRange { from: NaiveDate, to: NaiveDate },
}

/// Reporting period within an income year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Year(TaxYear),
    Quarter { year: TaxYear, quarter: u32 },
    Month { year: TaxYear, month: u32 },
}

impl Period {
    pub fn quarter(year: i32, quarter: u32) -> Result<Self, PeriodError> {
        if !(1..=4).contains(&quarter) {
            return Err(PeriodError::InvalidQuarter(quarter));
        }
        Ok(Period::Quarter {
            year: TaxYear(year),
            quarter,
        })
    }

    pub fn month(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        Ok(Period::Month {
            year: TaxYear(year),
            month,
        })
    }

    pub fn tax_year(&self) -> TaxYear {
        match self {
            Period::Year(year) => *year,
            Period::Quarter { year, .. } | Period::Month { year, .. } => *year,
        }
    }

    /// First day of the period (inclusive)
    pub fn start_date(&self) -> NaiveDate {
        match *self {
            Period::Year(year) => year.start_date(),
            Period::Quarter { year, quarter } => first_of_month(year.0, (quarter - 1) * 3 + 1),
            Period::Month { year, month } => first_of_month(year.0, month),
        }
    }

    /// Last day of the period (inclusive)
    pub fn end_date(&self) -> NaiveDate {
        let next_start = match *self {
            Period::Year(year) => return year.end_date(),
            Period::Quarter { year, quarter } if quarter == 4 => return year.end_date(),
            Period::Quarter { year, quarter } => first_of_month(year.0, quarter * 3 + 1),
            Period::Month { year, month } if month == 12 => return year.end_date(),
            Period::Month { year, month } => first_of_month(year.0, month + 1),
        };
        next_start.pred_opt().unwrap_or(next_start)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }

    pub fn display(&self) -> String {
        match self {
            Period::Year(year) => year.display(),
            Period::Quarter { year, quarter } => format!("{}-Q{}", year.0, quarter),
            Period::Month { year, month } => format!("{}-{:02}", year.0, month),
        }
    }
}

impl From<TaxYear> for Period {
    fn from(year: TaxYear) -> Self {
        Period::Year(year)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn tax_year_is_calendar_year() {
        assert_eq!(TaxYear::from_date(date("2024-01-01")), TaxYear(2024));
        assert_eq!(TaxYear::from_date(date("2024-12-31")), TaxYear(2024));
        assert_eq!(TaxYear::from_date(date("2025-01-01")), TaxYear(2025));
    }

    #[test]
    fn tax_year_start_end_dates() {
        let ty = TaxYear(2024);
        assert_eq!(ty.start_date(), date("2024-01-01"));
        assert_eq!(ty.end_date(), date("2024-12-31"));
    }

    #[test]
    fn thresholds_by_year() {
        assert_eq!(TaxYear(2024).top_tax_threshold(), dec!(588900));
        assert_eq!(TaxYear(2025).top_tax_threshold(), dec!(611800));
        assert_eq!(TaxYear(2023).top_tax_threshold(), dec!(568900));
        assert_eq!(TaxYear(2024).personal_allowance(), dec!(49700));
        assert_eq!(TaxYear(2019).personal_allowance(), dec!(48000));
    }

    #[test]
    fn share_income_tax_brackets() {
        let ty = TaxYear(2024);
        assert_eq!(ty.share_income_tax(dec!(0)), dec!(0));
        assert_eq!(ty.share_income_tax(dec!(-100)), dec!(0));
        assert_eq!(ty.share_income_tax(dec!(10000)), dec!(2700));
        // 61,000 at 27% + 9,000 at 42%
        assert_eq!(ty.share_income_tax(dec!(70000)), dec!(16470) + dec!(3780));
    }

    #[test]
    fn quarter_bounds() {
        let q1 = Period::quarter(2024, 1).unwrap();
        assert_eq!(q1.start_date(), date("2024-01-01"));
        assert_eq!(q1.end_date(), date("2024-03-31"));

        let q4 = Period::quarter(2024, 4).unwrap();
        assert_eq!(q4.start_date(), date("2024-10-01"));
        assert_eq!(q4.end_date(), date("2024-12-31"));
    }

    #[test]
    fn month_bounds_handle_leap_year() {
        let feb = Period::month(2024, 2).unwrap();
        assert_eq!(feb.start_date(), date("2024-02-01"));
        assert_eq!(feb.end_date(), date("2024-02-29"));
        assert!(feb.contains(date("2024-02-29")));
        assert!(!feb.contains(date("2024-03-01")));

        let dec = Period::month(2023, 12).unwrap();
        assert_eq!(dec.end_date(), date("2023-12-31"));
    }

    #[test]
    fn invalid_quarter_and_month_rejected() {
        assert_eq!(Period::quarter(2024, 0), Err(PeriodError::InvalidQuarter(0)));
        assert_eq!(Period::quarter(2024, 5), Err(PeriodError::InvalidQuarter(5)));
        assert_eq!(Period::month(2024, 13), Err(PeriodError::InvalidMonth(13)));
        assert_eq!(Period::month(2024, 0), Err(PeriodError::InvalidMonth(0)));
    }

    #[test]
    fn period_display() {
        assert_eq!(Period::Year(TaxYear(2024)).display(), "2024");
        assert_eq!(Period::quarter(2024, 2).unwrap().display(), "2024-Q2");
        assert_eq!(Period::month(2024, 3).unwrap().display(), "2024-03");
    }
}
