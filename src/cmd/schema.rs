//! Schema command - print expected input formats

use clap::Args;
use rsutax::core::{ExchangeRateRecord, Portfolio, TaxInput};
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which input file to describe
    #[arg(value_enum, default_value = "portfolio")]
    input: SchemaInput,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaInput {
    /// Portfolio file: holdings, methods, disposals and income
    Portfolio,
    /// Rate cache file
    Rates,
    /// Income figures for the tax command
    TaxInput,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let schema = match self.input {
            SchemaInput::Portfolio => schema_for!(Portfolio),
            SchemaInput::Rates => schema_for!(Vec<ExchangeRateRecord>),
            SchemaInput::TaxInput => schema_for!(TaxInput),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}
