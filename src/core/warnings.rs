use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Domain warning types attached to report rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Position held fewer shares than were sold, so part of the sale has
    /// no cost basis. When `available = 0`, there was no cost basis at all.
    InsufficientCostBasis {
        available: Decimal,
        required: Decimal,
    },
    /// No real exchange rate was found for the date and the default was used.
    DefaultExchangeRate { date: NaiveDate, rate: Decimal },
}

impl Warning {
    pub fn message(&self) -> String {
        match self {
            Warning::InsufficientCostBasis {
                available,
                required,
            } => format!(
                "only {} of {} shares sold had a cost basis",
                available, required
            ),
            Warning::DefaultExchangeRate { date, rate } => {
                format!("no exchange rate for {}, default {} used", date, rate)
            }
        }
    }
}
