use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use crate::core::{
    BalanceKind, CycleType, DEFAULT_MAX_CYCLES, FrequencyUnit, RateConfig, RecurringItem,
    SimulationError, SimulationInputs, Snapshot, simulate,
};
use crate::store::{RecordStore, StoreError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliBalanceKind {
    Expense,
    Credit,
    Payment,
    Investment,
}

impl From<CliBalanceKind> for BalanceKind {
    fn from(value: CliBalanceKind) -> Self {
        match value {
            CliBalanceKind::Expense => BalanceKind::Expense,
            CliBalanceKind::Credit => BalanceKind::Credit,
            CliBalanceKind::Payment => BalanceKind::Payment,
            CliBalanceKind::Investment => BalanceKind::Investment,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliCycleType {
    Monthly,
    Yearly,
}

impl From<CliCycleType> for CycleType {
    fn from(value: CliCycleType) -> Self {
        match value {
            CliCycleType::Monthly => CycleType::Monthly,
            CliCycleType::Yearly => CycleType::Yearly,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliFrequencyUnit {
    PerMonth,
    PerYear,
}

impl From<CliFrequencyUnit> for FrequencyUnit {
    fn from(value: CliFrequencyUnit) -> Self {
        match value {
            CliFrequencyUnit::PerMonth => FrequencyUnit::PerMonth,
            CliFrequencyUnit::PerYear => FrequencyUnit::PerYear,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "payoff",
    about = "Recurring cash-flow tracker and month-by-month debt payoff simulator"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "BALANCE_FILE_PATH",
        default_value = "balance.json",
        help = "Path of the recurring item store"
    )]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty item store, replacing any existing one
    Init,
    /// List, add, update or remove recurring items
    #[command(subcommand)]
    Items(ItemsCommand),
    /// Run the payoff simulation over the stored items
    Simulate(SimulateCommand),
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
pub enum ItemsCommand {
    List,
    Add(ItemArgs),
    Update(ItemArgs),
    Remove {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ItemArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub name: String,
    #[arg(long, help = "Unsigned amount per occurrence")]
    pub value: f64,
    #[arg(long, default_value_t = 1.0, help = "Occurrences per frequency unit")]
    pub frequency: f64,
    #[arg(long, value_enum, default_value_t = CliFrequencyUnit::PerMonth)]
    pub frequency_unit: CliFrequencyUnit,
    #[arg(
        long,
        value_enum,
        default_value_t = CliCycleType::Monthly,
        help = "Clock that drives the item: monthly items land every month, yearly items every December"
    )]
    pub cycle: CliCycleType,
    #[arg(long, help = "Cycle index at which the item stops contributing")]
    pub expiry: Option<u32>,
    #[arg(long, help = "Cycle index at which the item starts contributing")]
    pub start_cycle: Option<u32>,
    #[arg(long, value_enum)]
    pub kind: CliBalanceKind,
}

impl From<ItemArgs> for RecurringItem {
    fn from(args: ItemArgs) -> Self {
        RecurringItem {
            id: args.id,
            name: args.name,
            value: args.value,
            frequency: args.frequency,
            frequency_unit: args.frequency_unit.into(),
            cycle: args.cycle.into(),
            expiry: args.expiry,
            start_cycle: args.start_cycle,
            kind: args.kind.into(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long, env = "DEBIT_SIZE", help = "Outstanding debt to pay down")]
    pub payment_size: f64,
    #[arg(long, env = "INVESTMENT_SIZE", default_value_t = 0.0)]
    pub investment_size: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Lump sum taken from the investment balance and paid into the debt up front"
    )]
    pub initial_payment: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Flat tax on investment earnings plus monthly credit, in percent"
    )]
    pub profit_tax: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Share of the investment balance withdrawn every December, in percent"
    )]
    pub yearly_skim: f64,
    #[arg(
        long,
        env = "PAYMENT_INTEREST_RATE",
        default_value_t = 0.0,
        help = "Monthly interest on the outstanding debt, in percent"
    )]
    pub payment_interest_rate: f64,
    #[arg(
        long,
        env = "INVESTMENT_INTEREST_RATE",
        default_value_t = 0.0,
        help = "Monthly return on the investment balance, in percent"
    )]
    pub investment_interest_rate: f64,
    #[arg(long, help = "Calendar month (1-12) of the first cycle; defaults to the current month")]
    pub start_month: Option<u32>,
    #[arg(long, default_value_t = DEFAULT_MAX_CYCLES, help = "Abort runs longer than this many months")]
    pub max_cycles: u32,
}

#[derive(Args, Debug)]
pub struct SimulateCommand {
    #[command(flatten)]
    pub args: SimulateArgs,
    #[arg(long, help = "Print snapshots as JSON instead of a table")]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub rates: RateConfig,
    pub inputs: SimulationInputs,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Input(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

pub fn current_month() -> u32 {
    Local::now().month()
}

pub fn build_scenario(args: SimulateArgs) -> Result<Scenario, String> {
    if !args.payment_size.is_finite() || args.payment_size <= 0.0 {
        return Err("--payment-size must be > 0".to_string());
    }

    if !args.investment_size.is_finite() || args.investment_size < 0.0 {
        return Err("--investment-size must be >= 0".to_string());
    }

    if !args.initial_payment.is_finite() || args.initial_payment < 0.0 {
        return Err("--initial-payment must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--profit-tax", args.profit_tax),
        ("--yearly-skim", args.yearly_skim),
    ] {
        if !(0.0..=100.0).contains(&rate) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }

    for (name, rate) in [
        ("--payment-interest-rate", args.payment_interest_rate),
        ("--investment-interest-rate", args.investment_interest_rate),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    let start_month = args.start_month.unwrap_or_else(current_month);
    if !(1..=12).contains(&start_month) {
        return Err("--start-month must be between 1 and 12".to_string());
    }

    if args.max_cycles == 0 {
        return Err("--max-cycles must be > 0".to_string());
    }

    Ok(Scenario {
        rates: RateConfig {
            payment_interest_rate: args.payment_interest_rate / 100.0,
            investment_interest_rate: args.investment_interest_rate / 100.0,
        },
        inputs: SimulationInputs {
            payment_size: args.payment_size,
            investment_size: args.investment_size,
            initial_payment: args.initial_payment,
            profit_tax: args.profit_tax / 100.0,
            yearly_skim: args.yearly_skim / 100.0,
            start_month,
            max_cycles: args.max_cycles,
        },
    })
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Init => {
            let store = RecordStore::init(&cli.store)?;
            println!("Initialized empty item store at {}", store.path().display());
        }
        Command::Items(command) => run_items(&cli.store, command)?,
        Command::Simulate(command) => run_simulate(&cli.store, command)?,
        Command::Serve { port } => crate::api::run_http_server(port, cli.store).await?,
    }
    Ok(())
}

fn run_items(path: &Path, command: ItemsCommand) -> Result<(), CliError> {
    let mut store = RecordStore::open(path)?;
    match command {
        ItemsCommand::List => {
            print!("{}", render_items(store.items()));
            return Ok(());
        }
        ItemsCommand::Add(args) => store.add(vec![args.into()])?,
        ItemsCommand::Update(args) => store.update(vec![args.into()])?,
        ItemsCommand::Remove { ids } => store.remove(&ids)?,
    }
    store.save()?;
    Ok(())
}

fn run_simulate(path: &Path, command: SimulateCommand) -> Result<(), CliError> {
    let scenario = build_scenario(command.args).map_err(CliError::Input)?;
    let store = RecordStore::open(path)?;

    let snapshots = match simulate(&scenario.rates, &scenario.inputs, store.items()) {
        Ok(snapshots) => snapshots,
        Err(SimulationError::NonConvergent {
            max_cycles,
            partial,
        }) => {
            print_snapshots(&partial, command.json)?;
            return Err(SimulationError::NonConvergent {
                max_cycles,
                partial: Vec::new(),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    print_snapshots(&snapshots, command.json)
}

fn print_snapshots(snapshots: &[Snapshot], json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshots)?);
    } else {
        print!("{}", render_table(snapshots));
    }
    Ok(())
}

pub fn render_table(snapshots: &[Snapshot]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6} {:>5} {:>14} {:>14} {:>12} {:>12} {:>12} {:>12}",
        "cycle", "month", "payment", "investment", "credit", "debit", "invested", "paid"
    );
    for snapshot in snapshots {
        let month = snapshot
            .calendar_month
            .map_or_else(|| "-".to_string(), |m| m.to_string());
        let b = &snapshot.breakdown;
        let _ = writeln!(
            out,
            "{:>6} {:>5} {:>14.2} {:>14.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            snapshot.cycle,
            month,
            snapshot.payment_size,
            snapshot.investment_size,
            b.credit,
            b.debit,
            b.investment,
            b.payment
        );
    }
    out
}

pub fn render_items(items: &[RecurringItem]) -> String {
    let mut out = String::new();
    for item in items {
        let window = match (item.start_cycle, item.expiry) {
            (Some(start), Some(expiry)) => format!("{start}..{expiry}"),
            (Some(start), None) => format!("{start}.."),
            (None, Some(expiry)) => format!("..{expiry}"),
            (None, None) => "always".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<16} {:<24} {:>10.2} x{:<6} {:?}/{:?} {:?} [{}]",
            item.id,
            item.name,
            item.value,
            item.frequency,
            item.cycle,
            item.frequency_unit,
            item.kind,
            window
        );
    }
    out
}
