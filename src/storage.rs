//! JSON files backing the ledger store and the rate cache

use crate::core::{
    Allocation, DisposalTransaction, ExchangeRateRecord, Holding, IncomeTransaction, LedgerStore,
    MethodElection, Portfolio, RateCache,
};
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Portfolio file, rewritten after every change
pub struct JsonStore {
    path: PathBuf,
    portfolio: Portfolio,
}

impl JsonStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening portfolio {}", path.display()))?;
        let portfolio: Portfolio = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("reading portfolio {}", path.display()))?;
        log::debug!(
            "Loaded {} holdings, {} disposals, {} income entries from {}",
            portfolio.holdings.len(),
            portfolio.disposals.len(),
            portfolio.income.len(),
            path.display()
        );
        Ok(JsonStore {
            path: path.to_path_buf(),
            portfolio,
        })
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    fn save(&self) -> anyhow::Result<()> {
        write_json(&self.path, &self.portfolio)
            .with_context(|| format!("writing portfolio {}", self.path.display()))
    }
}

impl LedgerStore for JsonStore {
    fn holdings(&self) -> anyhow::Result<Vec<Holding>> {
        self.portfolio.holdings()
    }

    fn method_elections(&self) -> anyhow::Result<BTreeMap<String, MethodElection>> {
        self.portfolio.method_elections()
    }

    fn disposals(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<DisposalTransaction>> {
        self.portfolio.disposals(from, to)
    }

    fn income(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<IncomeTransaction>> {
        self.portfolio.income(from, to)
    }

    fn save_method(&mut self, ticker: &str, election: MethodElection) -> anyhow::Result<()> {
        self.portfolio.save_method(ticker, election)?;
        self.save()
    }

    fn record_settlement(
        &mut self,
        disposal: &DisposalTransaction,
        allocation: Allocation,
        holdings: Vec<Holding>,
    ) -> anyhow::Result<()> {
        self.portfolio.record_settlement(disposal, allocation, holdings)?;
        self.save()
    }
}

/// Rate cache kept as a JSON list of records. A missing file is an empty cache.
pub struct RateCacheFile {
    path: PathBuf,
    records: BTreeMap<NaiveDate, ExchangeRateRecord>,
}

impl RateCacheFile {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let records = if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("opening rate cache {}", path.display()))?;
            let list: Vec<ExchangeRateRecord> = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("reading rate cache {}", path.display()))?;
            list.into_iter().map(|r| (r.date, r)).collect()
        } else {
            log::debug!("No rate cache at {}, starting empty", path.display());
            BTreeMap::new()
        };
        Ok(RateCacheFile {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn save(&self) -> anyhow::Result<()> {
        let list: Vec<&ExchangeRateRecord> = self.records.values().collect();
        write_json(&self.path, &list)
            .with_context(|| format!("writing rate cache {}", self.path.display()))
    }
}

impl RateCache for RateCacheFile {
    fn get(&self, date: NaiveDate) -> anyhow::Result<Option<ExchangeRateRecord>> {
        Ok(self.records.get(&date).cloned())
    }

    fn upsert(&mut self, record: ExchangeRateRecord) -> anyhow::Result<()> {
        if self.records.contains_key(&record.date) {
            return Ok(());
        }
        self.records.insert(record.date, record);
        self.save()
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
