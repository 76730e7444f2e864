mod cmd;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "rsutax",
    version,
    about = "Danish tax on US equity compensation: capital gains, dividends and income tax"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capital gains on share sales in a period
    Gains(cmd::gains::GainsCommand),
    /// Dividends, US withholding and the foreign tax credit
    Dividends(cmd::dividends::DividendsCommand),
    /// Income tax for a year, including the §7P reduction
    Tax(cmd::tax::TaxCommand),
    /// USD/DKK exchange rates
    #[command(subcommand)]
    Rates(cmd::rates::RatesCommand),
    /// Show or change the cost basis method of a ticker
    Method(cmd::method::MethodCommand),
    /// Write a sale down against the stored lots
    Settle(cmd::settle::SettleCommand),
    /// Print the JSON schema of an input file
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Gains(cmd) => cmd.exec(),
        Command::Dividends(cmd) => cmd.exec(),
        Command::Tax(cmd) => cmd.exec(),
        Command::Rates(cmd) => cmd.exec(),
        Command::Method(cmd) => cmd.exec(),
        Command::Settle(cmd) => cmd.exec(),
        Command::Schema(cmd) => cmd.exec(),
    }
}
