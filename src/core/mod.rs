pub mod allocation;
pub mod dividends;
pub mod dk;
pub mod fx;
pub mod gains;
pub mod income_tax;
pub mod lots;
pub mod store;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use allocation::{allocate, apply, Allocation, AllocationError, LotConsumption};
pub use dividends::{
    compute_dividends, foreign_tax_credit, DividendReport, FilerStatus, IncomeRecord,
    TickerDividends, TREATY_RATE,
};
pub use dk::{Period, PeriodError, TaxYear};
pub use fx::{
    ExchangeRateRecord, ExchangeRateResolver, MemoryRateCache, PrefetchSummary, RateCache,
    RateProvider, RateSource, ResolvedRate, DEFAULT_USD_DKK_RATE,
};
pub use gains::{
    compute_capital_gains, CapitalGainsReport, DisposalRecord, GainBucket, GainTotals,
    SkippedDisposal, TickerSummary,
};
pub use income_tax::{calculate_income_tax, TaxInput, TaxResult};
pub use lots::{
    AcquisitionLot, CostBasisMethod, HoldingPeriod, Ledger, Position, PositionError,
};
pub use store::{
    build_ledger, set_method, settle_disposal, DisposalTransaction, Holding, IncomeCategory,
    IncomeTransaction, LedgerStore, MethodElection, Portfolio, SettleError,
};
pub use warnings::Warning;
