use crate::core::RateProvider;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Daily ECB reference rates from the Frankfurter API
pub struct FrankfurterClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, Decimal>,
}

impl FrankfurterClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(FrankfurterClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.base_url, date.format("%Y-%m-%d"))
    }
}

impl RateProvider for FrankfurterClient {
    /// Rates on weekends and holidays are those of the previous business day
    fn fetch(&self, date: NaiveDate) -> anyhow::Result<Decimal> {
        let url = self.url(date);
        log::debug!("Fetching USD/DKK rate from {}", url);
        let response = self
            .client
            .get(&url)
            .query(&[("from", "USD"), ("to", "DKK")])
            .send()
            .with_context(|| format!("requesting {}", url))?;

        if !response.status().is_success() {
            bail!("rate request for {} failed with status {}", date, response.status());
        }

        let body: RatesResponse = response
            .json()
            .with_context(|| format!("decoding rate response for {}", date))?;
        match body.rates.get("DKK") {
            Some(rate) => {
                log::info!("USD/DKK {} fetched for {}", rate, date);
                Ok(*rate)
            }
            None => bail!("no DKK rate in response for {}", date),
        }
    }
}
