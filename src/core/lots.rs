use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lots held for longer than this many days are long term
pub const LONG_TERM_DAYS: i64 = 365;

/// Holding period classification of a lot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum HoldingPeriod {
    ShortTerm,
    LongTerm,
}

impl HoldingPeriod {
    pub fn between(acquired: NaiveDate, as_of: NaiveDate) -> Self {
        if (as_of - acquired).num_days() > LONG_TERM_DAYS {
            HoldingPeriod::LongTerm
        } else {
            HoldingPeriod::ShortTerm
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            HoldingPeriod::ShortTerm => "Short",
            HoldingPeriod::LongTerm => "Long",
        }
    }
}

/// Cost basis regime elected for a ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum CostBasisMethod {
    /// Each lot keeps its own cost; disposals consume oldest lots first
    #[default]
    LotBased,
    /// All lots blended into one weighted average cost (permanent election)
    AverageCost,
}

impl CostBasisMethod {
    pub fn display(&self) -> &'static str {
        match self {
            CostBasisMethod::LotBased => "FIFO",
            CostBasisMethod::AverageCost => "Average",
        }
    }
}

impl std::fmt::Display for CostBasisMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("{ticker} uses average cost, which cannot be changed back to lot based")]
    IrreversibleMethod { ticker: String },
    #[error("{ticker} has more than one lot numbered {lot_id}")]
    DuplicateLot { ticker: String, lot_id: u32 },
}

/// A batch of shares acquired on one date at one cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionLot {
    pub lot_id: u32,
    pub acquisition_date: NaiveDate,
    pub shares: Decimal,
    pub cost_per_share: Decimal,
    pub holding_period: HoldingPeriod,
}

impl AcquisitionLot {
    pub fn new(
        lot_id: u32,
        acquisition_date: NaiveDate,
        shares: Decimal,
        cost_per_share: Decimal,
        as_of: NaiveDate,
    ) -> Self {
        AcquisitionLot {
            lot_id,
            acquisition_date,
            shares,
            cost_per_share,
            holding_period: HoldingPeriod::between(acquisition_date, as_of),
        }
    }

    pub fn cost(&self) -> Decimal {
        self.shares * self.cost_per_share
    }

    pub fn is_empty(&self) -> bool {
        self.shares <= Decimal::ZERO
    }
}

/// All lots held for one ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub ticker: String,
    lots: Vec<AcquisitionLot>,
    method: CostBasisMethod,
    average_cost_per_share: Option<Decimal>,
}

impl Position {
    pub fn new(ticker: String) -> Self {
        Position {
            ticker,
            lots: Vec::new(),
            method: CostBasisMethod::LotBased,
            average_cost_per_share: None,
        }
    }

    pub fn lots(&self) -> &[AcquisitionLot] {
        &self.lots
    }

    pub fn method(&self) -> CostBasisMethod {
        self.method
    }

    pub fn total_shares(&self) -> Decimal {
        self.lots.iter().map(|l| l.shares).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lots.iter().map(|l| l.cost()).sum()
    }

    /// Cached weighted average, only present under average cost
    pub fn cached_average_cost(&self) -> Option<Decimal> {
        self.average_cost_per_share
    }

    /// Record an acquisition under the next free lot number. Lots stay
    /// ordered by acquisition date, with same-day lots kept in insertion order.
    pub fn add_lot(
        &mut self,
        acquisition_date: NaiveDate,
        shares: Decimal,
        cost_per_share: Decimal,
        as_of: NaiveDate,
    ) -> u32 {
        let lot_id = self.lots.iter().map(|l| l.lot_id).max().unwrap_or(0) + 1;
        self.insert_lot(AcquisitionLot::new(
            lot_id,
            acquisition_date,
            shares,
            cost_per_share,
            as_of,
        ));
        lot_id
    }

    /// Record an acquisition that already has a lot number
    pub fn add_numbered_lot(
        &mut self,
        lot_id: u32,
        acquisition_date: NaiveDate,
        shares: Decimal,
        cost_per_share: Decimal,
        as_of: NaiveDate,
    ) -> Result<(), PositionError> {
        if self.lots.iter().any(|l| l.lot_id == lot_id) {
            return Err(PositionError::DuplicateLot {
                ticker: self.ticker.clone(),
                lot_id,
            });
        }
        self.insert_lot(AcquisitionLot::new(
            lot_id,
            acquisition_date,
            shares,
            cost_per_share,
            as_of,
        ));
        Ok(())
    }

    fn insert_lot(&mut self, lot: AcquisitionLot) {
        let index = self
            .lots
            .partition_point(|l| l.acquisition_date <= lot.acquisition_date);
        log::debug!(
            "Position {} ADD lot {}: qty={}, cost/share={}. New total: qty={}",
            self.ticker,
            lot.lot_id,
            lot.shares,
            lot.cost_per_share,
            self.total_shares() + lot.shares
        );
        self.lots.insert(index, lot);
        if self.method == CostBasisMethod::AverageCost {
            self.average_cost_per_share = Some(self.weighted_average_cost());
        }
    }

    /// Weighted average cost over all lots, zero when nothing is held
    pub fn weighted_average_cost(&self) -> Decimal {
        let shares = self.total_shares();
        if shares.is_zero() {
            Decimal::ZERO
        } else {
            self.total_cost() / shares
        }
    }

    /// Open lots already acquired on `date`
    pub fn lots_held_on(&self, date: NaiveDate) -> impl Iterator<Item = &AcquisitionLot> {
        self.open_lots().filter(move |l| l.acquisition_date <= date)
    }

    pub fn shares_held_on(&self, date: NaiveDate) -> Decimal {
        self.lots_held_on(date).map(|l| l.shares).sum()
    }

    /// Average cost of the shares held on `date`. Uses the position's average
    /// when every open lot was already held, otherwise blends only the lots
    /// acquired by then.
    pub fn average_cost_on(&mut self, date: NaiveDate) -> Decimal {
        let held = self.shares_held_on(date);
        if held == self.total_shares() {
            return self.average_cost();
        }
        if held.is_zero() {
            return Decimal::ZERO;
        }
        let cost: Decimal = self.lots_held_on(date).map(|l| l.cost()).sum();
        cost / held
    }

    /// Average cost, deriving and caching it when missing
    pub fn average_cost(&mut self) -> Decimal {
        match self.average_cost_per_share {
            Some(avg) => avg,
            None => {
                let avg = self.weighted_average_cost();
                self.average_cost_per_share = Some(avg);
                avg
            }
        }
    }

    /// Change the cost basis method. Moving from average cost back to lot
    /// based is rejected; setting the current method again is a no-op.
    pub fn set_method(&mut self, method: CostBasisMethod) -> Result<(), PositionError> {
        match (self.method, method) {
            (CostBasisMethod::AverageCost, CostBasisMethod::LotBased) => {
                Err(PositionError::IrreversibleMethod {
                    ticker: self.ticker.clone(),
                })
            }
            (CostBasisMethod::LotBased, CostBasisMethod::AverageCost) => {
                self.method = CostBasisMethod::AverageCost;
                self.average_cost_per_share = Some(self.weighted_average_cost());
                log::info!(
                    "Position {} switched to average cost at {}",
                    self.ticker,
                    self.average_cost_per_share.unwrap_or_default()
                );
                Ok(())
            }
            // unchanged
            _ => Ok(()),
        }
    }

    /// Restore a stored average cost election, keeping a stored average if one was saved
    pub(crate) fn restore_average_cost(&mut self, average: Option<Decimal>) {
        self.method = CostBasisMethod::AverageCost;
        self.average_cost_per_share = average;
    }

    /// Re-derive holding periods relative to `as_of`
    pub fn reclassify(&mut self, as_of: NaiveDate) {
        for lot in &mut self.lots {
            lot.holding_period = HoldingPeriod::between(lot.acquisition_date, as_of);
        }
    }

    /// Reduce the shares of a lot. Lots reaching zero stay in place but are
    /// skipped by later FIFO walks.
    pub(crate) fn reduce_lot(&mut self, lot_id: u32, shares: Decimal) {
        if let Some(lot) = self.lots.iter_mut().find(|l| l.lot_id == lot_id) {
            lot.shares = (lot.shares - shares).max(Decimal::ZERO);
        }
    }

    /// Remove shares proportionally from every lot held on `date` (average
    /// cost disposals). Lots acquired later are left alone.
    pub(crate) fn reduce_pro_rata(&mut self, shares: Decimal, date: NaiveDate) {
        let total = self.shares_held_on(date);
        if total.is_zero() {
            return;
        }
        let held = self.lots.iter_mut().filter(|l| l.acquisition_date <= date);
        if shares >= total {
            for lot in held {
                lot.shares = Decimal::ZERO;
            }
            return;
        }
        let proportion = shares / total;
        for lot in held {
            lot.shares -= lot.shares * proportion;
        }
    }

    /// Lots that still hold shares
    pub fn open_lots(&self) -> impl Iterator<Item = &AcquisitionLot> {
        self.lots.iter().filter(|l| !l.is_empty())
    }
}

/// Positions for every ticker, keyed by ticker
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    positions: BTreeMap<String, Position>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn position_mut(&mut self, ticker: &str) -> Option<&mut Position> {
        self.positions.get_mut(ticker)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Add a lot to `ticker`, numbering it when `lot_id` is not given
    pub fn record_acquisition(
        &mut self,
        ticker: &str,
        lot_id: Option<u32>,
        acquisition_date: NaiveDate,
        shares: Decimal,
        cost_per_share: Decimal,
        as_of: NaiveDate,
    ) -> Result<u32, PositionError> {
        let position = self
            .positions
            .entry(ticker.to_string())
            .or_insert_with(|| Position::new(ticker.to_string()));
        match lot_id {
            Some(lot_id) => {
                position.add_numbered_lot(
                    lot_id,
                    acquisition_date,
                    shares,
                    cost_per_share,
                    as_of,
                )?;
                Ok(lot_id)
            }
            None => Ok(position.add_lot(acquisition_date, shares, cost_per_share, as_of)),
        }
    }

    /// Drop positions that no longer hold any shares
    pub fn retain_held(&mut self) {
        self.positions.retain(|_, p| p.total_shares() > Decimal::ZERO);
    }
}
