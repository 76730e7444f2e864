use super::allocation::{self, Allocation, AllocationError};
use super::lots::{CostBasisMethod, Ledger};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shares acquired in one batch (vest, purchase or reinvested dividend)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Holding {
    pub ticker: String,
    /// Lot number, stored once a settled sale has written the ticker down
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_id: Option<u32>,
    #[schemars(with = "String")]
    pub acquisition_date: NaiveDate,
    #[schemars(with = "f64")]
    pub shares: Decimal,
    /// Cost per share in USD
    #[schemars(with = "f64")]
    pub cost_per_share_usd: Decimal,
}

/// Cost basis method chosen for a ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MethodElection {
    pub method: CostBasisMethod,
    /// Weighted average cost per share stored when average cost was elected
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub average_cost_per_share_usd: Option<Decimal>,
}

/// A sale of shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DisposalTransaction {
    pub ticker: String,
    #[schemars(with = "String")]
    pub date: NaiveDate,
    #[schemars(with = "f64")]
    pub shares_sold: Decimal,
    /// Total sale proceeds in USD
    #[schemars(with = "f64")]
    pub proceeds_usd: Decimal,
    /// Sell from this lot instead of the oldest lots
    #[serde(default)]
    pub lot_id: Option<u32>,
    /// USD/DKK rate to fall back on when no rate can be found for the date
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub manual_rate: Option<Decimal>,
    /// Cost basis written down against the holdings when the sale was settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Allocation>,
}

impl DisposalTransaction {
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum IncomeCategory {
    Dividend,
    Withholding,
}

/// Dividend paid or tax withheld on a dividend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IncomeTransaction {
    pub ticker: String,
    #[schemars(with = "String")]
    pub date: NaiveDate,
    /// Signed amount in USD; withholding is often recorded as negative
    #[schemars(with = "f64")]
    pub amount_usd: Decimal,
    pub category: IncomeCategory,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub manual_rate: Option<Decimal>,
}

/// Storage for holdings and transactions
pub trait LedgerStore {
    fn holdings(&self) -> anyhow::Result<Vec<Holding>>;
    fn method_elections(&self) -> anyhow::Result<BTreeMap<String, MethodElection>>;
    /// Disposals dated within `[from, to]`
    fn disposals(&self, from: NaiveDate, to: NaiveDate)
        -> anyhow::Result<Vec<DisposalTransaction>>;
    /// Income transactions dated within `[from, to]`
    fn income(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<IncomeTransaction>>;
    fn save_method(&mut self, ticker: &str, election: MethodElection) -> anyhow::Result<()>;
    /// Mark the stored `disposal` as settled by `allocation` and replace every
    /// holding of its ticker with `holdings`
    fn record_settlement(
        &mut self,
        disposal: &DisposalTransaction,
        allocation: Allocation,
        holdings: Vec<Holding>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettleError {
    #[error("no sale of {ticker} recorded on {date}")]
    NoSuchDisposal { ticker: String, date: NaiveDate },
    #[error("the sale of {ticker} on {date} is already settled")]
    AlreadySettled { ticker: String, date: NaiveDate },
    #[error("the sale of {ticker} on {earlier} must be settled before the one on {date}")]
    EarlierUnsettled {
        ticker: String,
        date: NaiveDate,
        earlier: NaiveDate,
    },
}

/// Holdings and transactions kept in memory, also the on-disk portfolio format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Portfolio {
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodElection>,
    #[serde(default)]
    pub disposals: Vec<DisposalTransaction>,
    #[serde(default)]
    pub income: Vec<IncomeTransaction>,
}

impl LedgerStore for Portfolio {
    fn holdings(&self) -> anyhow::Result<Vec<Holding>> {
        Ok(self.holdings.clone())
    }

    fn method_elections(&self) -> anyhow::Result<BTreeMap<String, MethodElection>> {
        Ok(self.methods.clone())
    }

    fn disposals(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<DisposalTransaction>> {
        Ok(self
            .disposals
            .iter()
            .filter(|d| d.date >= from && d.date <= to)
            .cloned()
            .collect())
    }

    fn income(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<IncomeTransaction>> {
        Ok(self
            .income
            .iter()
            .filter(|i| i.date >= from && i.date <= to)
            .cloned()
            .collect())
    }

    fn save_method(&mut self, ticker: &str, election: MethodElection) -> anyhow::Result<()> {
        self.methods.insert(ticker.to_string(), election);
        Ok(())
    }

    fn record_settlement(
        &mut self,
        disposal: &DisposalTransaction,
        allocation: Allocation,
        holdings: Vec<Holding>,
    ) -> anyhow::Result<()> {
        let stored = self
            .disposals
            .iter_mut()
            .find(|d| **d == *disposal && !d.is_settled())
            .ok_or_else(|| SettleError::NoSuchDisposal {
                ticker: disposal.ticker.clone(),
                date: disposal.date,
            })?;
        stored.settlement = Some(allocation);
        self.holdings.retain(|h| h.ticker != disposal.ticker);
        self.holdings.extend(holdings);
        Ok(())
    }
}

/// Build the ledger of current positions from stored holdings, classified
/// as of `as_of`. Holdings keep a stored lot number; the rest are numbered
/// per ticker in acquisition order after the stored ones.
pub fn build_ledger(store: &dyn LedgerStore, as_of: NaiveDate) -> anyhow::Result<Ledger> {
    let mut holdings = store.holdings()?;
    holdings.sort_by_key(|h| (h.lot_id.is_none(), h.acquisition_date));

    let mut ledger = Ledger::new();
    for holding in &holdings {
        if holding.shares <= Decimal::ZERO {
            log::warn!(
                "Ignoring {} holding from {} with {} shares",
                holding.ticker,
                holding.acquisition_date,
                holding.shares
            );
            continue;
        }
        ledger.record_acquisition(
            &holding.ticker,
            holding.lot_id,
            holding.acquisition_date,
            holding.shares,
            holding.cost_per_share_usd,
            as_of,
        )?;
    }

    for (ticker, election) in store.method_elections()? {
        if election.method != CostBasisMethod::AverageCost {
            continue;
        }
        if let Some(position) = ledger.position_mut(&ticker) {
            position.restore_average_cost(election.average_cost_per_share_usd);
        }
    }

    ledger.retain_held();
    Ok(ledger)
}

/// Change the cost basis method of `ticker` and store the election. Going
/// back from average cost to lot based is rejected.
pub fn set_method(
    store: &mut dyn LedgerStore,
    ticker: &str,
    method: CostBasisMethod,
    as_of: NaiveDate,
) -> anyhow::Result<MethodElection> {
    let mut ledger = build_ledger(store, as_of)?;
    let position = ledger
        .position_mut(ticker)
        .ok_or_else(|| anyhow::anyhow!("no holdings for {}", ticker))?;
    position.set_method(method)?;

    let election = MethodElection {
        method: position.method(),
        average_cost_per_share_usd: position.cached_average_cost(),
    };
    store.save_method(ticker, election.clone())?;
    Ok(election)
}

/// Write the recorded sale of `ticker` on `date` down against the stored
/// lots and keep the allocation on the sale, so later reports reuse it.
///
/// Sales of a ticker are settled in date order, each one once. Unlike
/// reporting, settling is strict: selling more shares than were held on the
/// sale date fails and leaves the store untouched.
pub fn settle_disposal(
    store: &mut dyn LedgerStore,
    ticker: &str,
    date: NaiveDate,
) -> anyhow::Result<Allocation> {
    let recorded: Vec<DisposalTransaction> = store
        .disposals(NaiveDate::MIN, date)?
        .into_iter()
        .filter(|d| d.ticker == ticker)
        .collect();

    if let Some(earlier) = recorded
        .iter()
        .filter(|d| d.date < date && !d.is_settled())
        .map(|d| d.date)
        .min()
    {
        return Err(SettleError::EarlierUnsettled {
            ticker: ticker.to_string(),
            date,
            earlier,
        }
        .into());
    }

    let mut on_date = recorded.iter().filter(|d| d.date == date).peekable();
    if on_date.peek().is_none() {
        return Err(SettleError::NoSuchDisposal {
            ticker: ticker.to_string(),
            date,
        }
        .into());
    }
    let disposal = on_date
        .find(|d| !d.is_settled())
        .cloned()
        .ok_or_else(|| SettleError::AlreadySettled {
            ticker: ticker.to_string(),
            date,
        })?;

    let mut ledger = build_ledger(store, date)?;
    let position = ledger
        .position_mut(ticker)
        .ok_or_else(|| anyhow::anyhow!("no holdings for {}", ticker))?;

    let available = position.shares_held_on(date);
    if disposal.shares_sold > available {
        return Err(AllocationError::InsufficientShares {
            ticker: ticker.to_string(),
            available,
            requested: disposal.shares_sold,
        }
        .into());
    }

    let allocation = allocation::allocate(position, disposal.shares_sold, disposal.lot_id, date)?;
    allocation::apply(position, &allocation);

    let remaining: Vec<Holding> = position
        .open_lots()
        .map(|lot| Holding {
            ticker: ticker.to_string(),
            lot_id: Some(lot.lot_id),
            acquisition_date: lot.acquisition_date,
            shares: lot.shares,
            cost_per_share_usd: lot.cost_per_share,
        })
        .collect();
    store.record_settlement(&disposal, allocation.clone(), remaining)?;
    log::info!(
        "Settled sale of {} {} on {}: cost basis {} USD",
        disposal.shares_sold,
        ticker,
        date,
        allocation.cost_basis_usd
    );
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lots::PositionError;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn holding(ticker: &str, d: &str, shares: Decimal, cost: Decimal) -> Holding {
        Holding {
            ticker: ticker.to_string(),
            lot_id: None,
            acquisition_date: date(d),
            shares,
            cost_per_share_usd: cost,
        }
    }

    fn sale(ticker: &str, d: &str, shares: Decimal) -> DisposalTransaction {
        DisposalTransaction {
            ticker: ticker.to_string(),
            date: date(d),
            shares_sold: shares,
            proceeds_usd: shares * dec!(400),
            lot_id: None,
            manual_rate: None,
            settlement: None,
        }
    }

    fn portfolio() -> Portfolio {
        Portfolio {
            holdings: vec![
                holding("MSFT", "2023-06-15", dec!(20), dec!(300)),
                holding("MSFT", "2022-06-15", dec!(10), dec!(250)),
                holding("AAPL", "2023-01-01", dec!(0), dec!(150)),
            ],
            ..Default::default()
        }
    }

    fn msft_holdings(store: &Portfolio) -> Vec<Holding> {
        let mut msft: Vec<_> = store
            .holdings
            .iter()
            .filter(|h| h.ticker == "MSFT")
            .cloned()
            .collect();
        msft.sort_by_key(|h| h.acquisition_date);
        msft
    }

    #[test]
    fn ledger_numbers_lots_in_date_order() {
        let ledger = build_ledger(&portfolio(), date("2024-01-01")).unwrap();
        let msft = ledger.position("MSFT").unwrap();

        assert_eq!(msft.lots()[0].lot_id, 1);
        assert_eq!(msft.lots()[0].acquisition_date, date("2022-06-15"));
        assert_eq!(msft.lots()[1].lot_id, 2);
        assert_eq!(msft.total_shares(), dec!(30));
        // zero-share holdings produce no position
        assert!(ledger.position("AAPL").is_none());
    }

    #[test]
    fn ledger_keeps_stored_lot_numbers() {
        let mut store = portfolio();
        store.holdings[0].lot_id = Some(2);
        store.holdings.push(holding("MSFT", "2021-01-01", dec!(5), dec!(200)));

        let ledger = build_ledger(&store, date("2024-01-01")).unwrap();
        let ids: Vec<u32> = ledger
            .position("MSFT")
            .unwrap()
            .lots()
            .iter()
            .map(|l| l.lot_id)
            .collect();
        // unnumbered holdings follow the stored number, in date order
        assert_eq!(ids, vec![3, 4, 2]);
    }

    #[test]
    fn duplicate_stored_lot_number_rejected() {
        let mut store = portfolio();
        store.holdings[0].lot_id = Some(1);
        store.holdings[1].lot_id = Some(1);

        let err = build_ledger(&store, date("2024-01-01")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PositionError>(),
            Some(&PositionError::DuplicateLot {
                ticker: "MSFT".to_string(),
                lot_id: 1
            })
        );
    }

    #[test]
    fn stored_average_election_restored() {
        let mut store = portfolio();
        set_method(&mut store, "MSFT", CostBasisMethod::AverageCost, date("2024-01-01")).unwrap();

        let election = store.methods.get("MSFT").unwrap();
        assert_eq!(election.method, CostBasisMethod::AverageCost);
        // (10 * 250 + 20 * 300) / 30
        assert_eq!(
            election.average_cost_per_share_usd.unwrap().round_dp(4),
            dec!(283.3333)
        );

        let ledger = build_ledger(&store, date("2024-01-01")).unwrap();
        assert_eq!(
            ledger.position("MSFT").unwrap().method(),
            CostBasisMethod::AverageCost
        );
    }

    #[test]
    fn stored_average_election_cannot_be_reverted() {
        let mut store = portfolio();
        set_method(&mut store, "MSFT", CostBasisMethod::AverageCost, date("2024-01-01")).unwrap();

        let err = set_method(&mut store, "MSFT", CostBasisMethod::LotBased, date("2024-01-01"))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PositionError>(),
            Some(&PositionError::IrreversibleMethod {
                ticker: "MSFT".to_string()
            })
        );
        assert_eq!(
            store.methods.get("MSFT").unwrap().method,
            CostBasisMethod::AverageCost
        );
    }

    #[test]
    fn set_method_for_unknown_ticker_fails() {
        let mut store = portfolio();
        let result = set_method(
            &mut store,
            "TSLA",
            CostBasisMethod::AverageCost,
            date("2024-01-01"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn settle_writes_down_oldest_lot_first() {
        let mut store = portfolio();
        store.disposals = vec![sale("MSFT", "2024-03-01", dec!(15))];

        let allocation = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap();
        assert_eq!(allocation.cost_basis_usd, dec!(2500) + dec!(1500));

        let msft = msft_holdings(&store);
        assert_eq!(msft.len(), 1);
        assert_eq!(msft[0].acquisition_date, date("2023-06-15"));
        assert_eq!(msft[0].shares, dec!(15));
        assert_eq!(msft[0].lot_id, Some(2));
        assert_eq!(store.disposals[0].settlement, Some(allocation));
    }

    #[test]
    fn settling_twice_rejected() {
        let mut store = portfolio();
        store.disposals = vec![sale("MSFT", "2024-03-01", dec!(10))];
        settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap();
        let settled = store.clone();

        let err = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SettleError>(),
            Some(&SettleError::AlreadySettled {
                ticker: "MSFT".to_string(),
                date: date("2024-03-01"),
            })
        );
        assert_eq!(store, settled);
        assert_eq!(msft_holdings(&store)[0].shares, dec!(20));
    }

    #[test]
    fn same_day_sales_settled_one_at_a_time() {
        let mut store = portfolio();
        store.disposals = vec![
            sale("MSFT", "2024-03-01", dec!(10)),
            sale("MSFT", "2024-03-01", dec!(5)),
        ];

        let first = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap();
        let second = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap();
        assert_eq!(first.cost_basis_usd, dec!(2500));
        assert_eq!(second.cost_basis_usd, dec!(1500));
        assert!(store.disposals.iter().all(|d| d.is_settled()));
    }

    #[test]
    fn settle_requires_a_recorded_sale() {
        let mut store = portfolio();
        let err = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SettleError>(),
            Some(&SettleError::NoSuchDisposal {
                ticker: "MSFT".to_string(),
                date: date("2024-03-01"),
            })
        );
    }

    #[test]
    fn settle_in_date_order() {
        let mut store = portfolio();
        store.disposals = vec![
            sale("MSFT", "2024-03-01", dec!(5)),
            sale("MSFT", "2024-05-01", dec!(5)),
        ];

        let err = settle_disposal(&mut store, "MSFT", date("2024-05-01")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SettleError>(),
            Some(&SettleError::EarlierUnsettled {
                ticker: "MSFT".to_string(),
                date: date("2024-05-01"),
                earlier: date("2024-03-01"),
            })
        );
    }

    #[test]
    fn settled_lot_numbers_survive_later_settles() {
        let mut store = portfolio();
        store.holdings.push(holding("MSFT", "2024-01-15", dec!(10), dec!(350)));
        let mut from_lot = sale("MSFT", "2024-05-01", dec!(4));
        from_lot.lot_id = Some(3);
        store.disposals = vec![sale("MSFT", "2024-03-01", dec!(10)), from_lot];

        settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap();
        // lot 1 is gone, lot 3 is still the 2024-01-15 purchase
        let allocation = settle_disposal(&mut store, "MSFT", date("2024-05-01")).unwrap();
        assert_eq!(allocation.lots_consumed[0].lot_id, 3);
        assert_eq!(allocation.lots_consumed[0].acquisition_date, date("2024-01-15"));
        assert_eq!(allocation.cost_basis_usd, dec!(1400));
    }

    #[test]
    fn settle_rejects_over_selling() {
        let mut store = portfolio();
        store.disposals = vec![sale("MSFT", "2024-03-01", dec!(31))];
        let before = store.clone();

        let err = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AllocationError>(),
            Some(&AllocationError::InsufficientShares {
                ticker: "MSFT".to_string(),
                available: dec!(30),
                requested: dec!(31),
            })
        );
        assert_eq!(store, before);
    }

    #[test]
    fn settle_only_counts_shares_held_on_sale_date() {
        let mut store = Portfolio {
            holdings: vec![holding("MSFT", "2024-06-01", dec!(10), dec!(100))],
            disposals: vec![sale("MSFT", "2024-03-01", dec!(5))],
            ..Default::default()
        };
        let before = store.clone();

        let err = settle_disposal(&mut store, "MSFT", date("2024-03-01")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AllocationError>(),
            Some(&AllocationError::InsufficientShares {
                ticker: "MSFT".to_string(),
                available: dec!(0),
                requested: dec!(5),
            })
        );
        assert_eq!(store, before);
    }

    #[test]
    fn store_filters_by_date_range() {
        let mut store = portfolio();
        store.disposals = vec![
            sale("MSFT", "2023-12-31", dec!(1)),
            sale("MSFT", "2024-01-01", dec!(1)),
            sale("MSFT", "2024-12-31", dec!(1)),
            sale("MSFT", "2025-01-01", dec!(1)),
        ];
        let in_2024 = store.disposals(date("2024-01-01"), date("2024-12-31")).unwrap();
        assert_eq!(in_2024.len(), 2);
    }
}
