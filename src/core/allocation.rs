use super::lots::{CostBasisMethod, HoldingPeriod, Position};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("cannot sell a negative number of shares: {0}")]
    NegativeShares(Decimal),
    #[error("{ticker} has no lot {lot_id}")]
    UnknownLot { ticker: String, lot_id: u32 },
    #[error("{ticker} lot {lot_id} was acquired on {acquired}, after the sale on {sold}")]
    LotNotYetAcquired {
        ticker: String,
        lot_id: u32,
        acquired: NaiveDate,
        sold: NaiveDate,
    },
    #[error("{ticker} lot {lot_id} holds {available} shares, {requested} requested")]
    InsufficientLotShares {
        ticker: String,
        lot_id: u32,
        available: Decimal,
        requested: Decimal,
    },
    #[error("{ticker} holds {available} shares, {requested} requested")]
    InsufficientShares {
        ticker: String,
        available: Decimal,
        requested: Decimal,
    },
}

/// Shares taken from a single lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LotConsumption {
    pub lot_id: u32,
    #[schemars(with = "String")]
    pub acquisition_date: NaiveDate,
    #[schemars(with = "f64")]
    pub shares: Decimal,
    #[schemars(with = "f64")]
    pub cost_usd: Decimal,
}

/// Cost basis consumed by one disposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Allocation {
    /// Sale date; only lots acquired by then are used
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub method: CostBasisMethod,
    #[schemars(with = "f64")]
    pub cost_basis_usd: Decimal,
    pub lots_consumed: Vec<LotConsumption>,
    /// Holding period of the oldest lot consumed; `None` under average cost
    pub holding_period: Option<HoldingPeriod>,
    #[schemars(with = "f64")]
    pub shares_allocated: Decimal,
    /// Requested shares that no lot could cover
    #[schemars(with = "f64")]
    pub shares_unallocated: Decimal,
}

impl Allocation {
    fn empty(method: CostBasisMethod, date: NaiveDate) -> Self {
        Allocation {
            date,
            method,
            cost_basis_usd: Decimal::ZERO,
            lots_consumed: Vec::new(),
            holding_period: None,
            shares_allocated: Decimal::ZERO,
            shares_unallocated: Decimal::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shares_unallocated.is_zero()
    }
}

/// Work out the cost basis of selling `shares` from `position` on `date`.
///
/// Only lots acquired on or before `date` can be sold. Under lot based
/// accounting the oldest lots are consumed first, unless `lot_id` names a
/// specific lot, in which case only that lot may be used. Under average cost
/// every share carries the weighted average cost of the shares held on
/// `date`.
///
/// Selling more than is held is not an error here: whatever is held gets
/// allocated and the remainder is reported in `shares_unallocated`. The
/// position itself is not reduced, see [`apply`].
pub fn allocate(
    position: &mut Position,
    shares: Decimal,
    lot_id: Option<u32>,
    date: NaiveDate,
) -> Result<Allocation, AllocationError> {
    if shares < Decimal::ZERO {
        return Err(AllocationError::NegativeShares(shares));
    }
    let method = position.method();
    if shares.is_zero() {
        return Ok(Allocation::empty(method, date));
    }

    match method {
        CostBasisMethod::AverageCost => {
            if let Some(lot_id) = lot_id {
                log::warn!(
                    "{} uses average cost, ignoring requested lot {}",
                    position.ticker,
                    lot_id
                );
            }
            Ok(allocate_average(position, shares, date))
        }
        CostBasisMethod::LotBased => match lot_id {
            Some(lot_id) => allocate_specific(position, shares, lot_id, date),
            None => Ok(allocate_fifo(position, shares, date)),
        },
    }
}

fn allocate_average(position: &mut Position, shares: Decimal, date: NaiveDate) -> Allocation {
    let average = position.average_cost_on(date);
    let held = position.shares_held_on(date);
    let allocated = shares.min(held);
    let cost = allocated * average;
    log::debug!(
        "Average match: {} {} at {}/share, cost {}",
        allocated,
        position.ticker,
        average,
        cost
    );
    Allocation {
        date,
        method: CostBasisMethod::AverageCost,
        cost_basis_usd: cost,
        lots_consumed: Vec::new(),
        holding_period: None,
        shares_allocated: allocated,
        shares_unallocated: shares - allocated,
    }
}

fn allocate_specific(
    position: &Position,
    shares: Decimal,
    lot_id: u32,
    date: NaiveDate,
) -> Result<Allocation, AllocationError> {
    let lot = position
        .lots()
        .iter()
        .find(|l| l.lot_id == lot_id)
        .ok_or_else(|| AllocationError::UnknownLot {
            ticker: position.ticker.clone(),
            lot_id,
        })?;
    if lot.acquisition_date > date {
        return Err(AllocationError::LotNotYetAcquired {
            ticker: position.ticker.clone(),
            lot_id,
            acquired: lot.acquisition_date,
            sold: date,
        });
    }
    if lot.shares < shares {
        return Err(AllocationError::InsufficientLotShares {
            ticker: position.ticker.clone(),
            lot_id,
            available: lot.shares,
            requested: shares,
        });
    }
    let cost = shares * lot.cost_per_share;
    log::debug!(
        "Specific lot match: {} {} from lot {} at cost {}",
        shares,
        position.ticker,
        lot_id,
        cost
    );
    Ok(Allocation {
        date,
        method: CostBasisMethod::LotBased,
        cost_basis_usd: cost,
        lots_consumed: vec![LotConsumption {
            lot_id,
            acquisition_date: lot.acquisition_date,
            shares,
            cost_usd: cost,
        }],
        holding_period: Some(lot.holding_period),
        shares_allocated: shares,
        shares_unallocated: Decimal::ZERO,
    })
}

fn allocate_fifo(position: &Position, shares: Decimal, date: NaiveDate) -> Allocation {
    let mut allocation = Allocation::empty(CostBasisMethod::LotBased, date);
    let mut remaining = shares;

    for lot in position.lots_held_on(date) {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(lot.shares);
        let cost = take * lot.cost_per_share;
        if allocation.holding_period.is_none() {
            allocation.holding_period = Some(lot.holding_period);
        }
        allocation.lots_consumed.push(LotConsumption {
            lot_id: lot.lot_id,
            acquisition_date: lot.acquisition_date,
            shares: take,
            cost_usd: cost,
        });
        allocation.cost_basis_usd += cost;
        allocation.shares_allocated += take;
        remaining -= take;
        log::debug!(
            "FIFO match: {} {} from lot {} ({}) at cost {}",
            take,
            position.ticker,
            lot.lot_id,
            lot.acquisition_date,
            cost
        );
    }

    allocation.shares_unallocated = remaining;
    allocation
}

/// Reduce `position` by what `allocation` consumed
pub fn apply(position: &mut Position, allocation: &Allocation) {
    match allocation.method {
        CostBasisMethod::LotBased => {
            for consumed in &allocation.lots_consumed {
                position.reduce_lot(consumed.lot_id, consumed.shares);
            }
        }
        CostBasisMethod::AverageCost => {
            position.reduce_pro_rata(allocation.shares_allocated, allocation.date)
        }
    }
}
