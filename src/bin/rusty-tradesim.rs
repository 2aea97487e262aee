//! rusty-tradesim CLI - paper trading against a replayed market
//!
//! Every invocation resumes the same replay timeline (its start instant is
//! kept in `session.json` under the state directory) and the same ledgers.
//!
//! ## Example Usage
//!
//! ```bash
//! # Show the replay clock
//! rusty-tradesim status
//!
//! # Current quotes
//! rusty-tradesim quotes
//!
//! # Buy 10 AAPL at market, then sell 5 at a fixed price
//! rusty-tradesim --account alice order buy AAPL 10
//! rusty-tradesim --account alice order sell AAPL 5 --limit 190.5
//!
//! # Stream quotes at 60x speed
//! rusty-tradesim watch --speed 60
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rusty_tradesim::data::HistoryWindow;
use rusty_tradesim::feed::{Quote, SimulationStatus, SystemClock};
use rusty_tradesim::order::{OrderRequest, OrderSide};
use rusty_tradesim::prelude::{JsonFileStore, SimConfig, StateBundle, TradingSimulator};
use rusty_tradesim::types::EpochMillis;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

const SESSION_FILE: &str = "session.json";

/// rusty-tradesim: paper trading against replayed market data
#[derive(Parser)]
#[command(name = "rusty-tradesim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Paper trading against replayed market data", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Account to act on
    #[arg(short, long, global = true, default_value = "default")]
    account: String,

    /// Override the series directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the state directory
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show replay progress
    Status,

    /// Show current quotes
    Quotes {
        /// Only this symbol
        #[arg(value_name = "SYMBOL")]
        symbol: Option<String>,
    },

    /// Print the price history of a symbol
    History {
        #[arg(value_name = "SYMBOL")]
        symbol: String,

        /// Window: 1W, 1M, 3M, 6M, 1Y or a day count such as 45D
        #[arg(short, long, default_value = "1M")]
        window: String,
    },

    /// Place an order
    Order {
        /// buy or sell
        #[arg(value_name = "SIDE")]
        side: String,

        #[arg(value_name = "SYMBOL")]
        symbol: String,

        #[arg(value_name = "QUANTITY")]
        quantity: u64,

        /// Fill at this price instead of the market
        #[arg(short, long)]
        limit: Option<f64>,
    },

    /// Show the valued portfolio
    Portfolio,

    /// Show order history
    Orders {
        /// Show at most this many orders
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show trading statistics
    Stats,

    /// Export all ledgers as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all ledgers from an export
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Restart the replay from the first point of every series
    Reset,

    /// Delete all ledgers, orders and realized trades
    Clear {
        /// Required to actually clear
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Stream quotes until Ctrl-C
    Watch {
        /// Replay speed multiplier
        #[arg(short, long)]
        speed: Option<f64>,
    },
}

/// Replay start shared across invocations
#[derive(Debug, Serialize, Deserialize)]
struct Session {
    simulation_start: EpochMillis,
}

fn load_config(path: Option<&Path>) -> SimConfig {
    let candidate = match path {
        Some(p) => Some(p.to_path_buf()),
        None => dirs::home_dir()
            .map(|home| home.join(".rusty-tradesim").join("config.toml"))
            .filter(|p| p.exists()),
    };

    match candidate {
        Some(p) => match SimConfig::load(&p) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{} Failed to load config: {}", "Warning:".yellow(), e);
                SimConfig::default()
            }
        },
        None => SimConfig::default(),
    }
}

/// Build the simulator and resume (or start) the shared timeline
fn open_simulator(config: SimConfig) -> Result<TradingSimulator> {
    fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("creating {}", config.state_dir.display()))?;
    let store = JsonFileStore::open(config.state_dir.clone())?;
    let source = rusty_tradesim::data::source_for(&config);
    let session_path = config.state_dir.join(SESSION_FILE);

    let simulator = TradingSimulator::with_parts(config, source, Arc::new(store), Arc::new(SystemClock))?;

    match read_session(&session_path)? {
        Some(session) => simulator.initialize_from(session.simulation_start)?,
        None => {
            simulator.initialize()?;
            save_session(&session_path, &simulator)?;
        }
    }
    Ok(simulator)
}

fn read_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let session = serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(session))
}

fn save_session(path: &Path, simulator: &TradingSimulator) -> Result<()> {
    if let Some(simulation_start) = simulator.timeline().simulation_start() {
        fs::write(path, serde_json::to_string_pretty(&Session { simulation_start })?)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref());
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }

    if cli.verbose {
        println!("{} v{}", "rusty-tradesim".cyan().bold(), env!("CARGO_PKG_VERSION"));
        println!("Data dir: {}", config.data_dir.display().to_string().dimmed());
        println!("State dir: {}", config.state_dir.display().to_string().dimmed());
    }

    if let Err(e) = run(cli.command, &cli.account, config) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(command: Commands, account: &str, config: SimConfig) -> Result<()> {
    let state_dir = config.state_dir.clone();
    let simulator = open_simulator(config)?;

    match command {
        Commands::Status => show_status(&simulator),
        Commands::Quotes { symbol } => show_quotes(&simulator, symbol.as_deref()),
        Commands::History { symbol, window } => show_history(&simulator, &symbol, &window),
        Commands::Order {
            side,
            symbol,
            quantity,
            limit,
        } => place_order(&simulator, account, &side, symbol, quantity, limit),
        Commands::Portfolio => show_portfolio(&simulator, account),
        Commands::Orders { limit } => show_orders(&simulator, account, limit),
        Commands::Stats => show_stats(&simulator, account),
        Commands::Export { output } => export_state(&simulator, output),
        Commands::Import { file } => import_state(&simulator, &file),
        Commands::Reset => {
            simulator.reset_simulation();
            save_session(&state_dir.join(SESSION_FILE), &simulator)?;
            println!("{} Replay restarted", "✓".green());
            Ok(())
        }
        Commands::Clear { force } => {
            if !force {
                bail!("refusing to clear without --force");
            }
            simulator.clear_all_data()?;
            println!("{} All trading data cleared", "✓".green());
            Ok(())
        }
        Commands::Watch { speed } => watch(simulator, speed),
    }
}

fn signed(value: f64) -> colored::ColoredString {
    let text = format!("{:+.2}", value);
    if value > 0.0 {
        text.green()
    } else if value < 0.0 {
        text.red()
    } else {
        text.normal()
    }
}

fn print_quote(quote: &Quote) {
    match quote {
        Quote::Live(s) => println!(
            "{:<8} {:>10.2} {:>9} ({:>+6.2}%)  {}",
            s.symbol.bold(),
            s.price,
            signed(s.change),
            s.change_percent,
            s.name.dimmed()
        ),
        Quote::NoData { symbol } => println!("{:<8} {:>10}", symbol.bold(), "no data".dimmed()),
    }
}

fn show_status(simulator: &TradingSimulator) -> Result<()> {
    match simulator.status() {
        SimulationStatus::Inactive { message } => println!("{} {}", "Inactive:".yellow(), message),
        SimulationStatus::Active {
            simulation_start,
            data_start,
            current_simulation_time,
            elapsed_real_ms,
            ..
        } => {
            println!("{}", "Simulation active".green().bold());
            println!("  Started:       {}", simulation_start);
            println!("  Data start:    {}", data_start);
            println!("  Replay time:   {}", current_simulation_time);
            println!("  Elapsed:       {:.1}s", elapsed_real_ms as f64 / 1000.0);
        }
    }
    Ok(())
}

fn show_quotes(simulator: &TradingSimulator, symbol: Option<&str>) -> Result<()> {
    match symbol {
        Some(symbol) => print_quote(&simulator.current_quote(symbol)),
        None => simulator.all_current_quotes().iter().for_each(print_quote),
    }
    Ok(())
}

fn show_history(simulator: &TradingSimulator, symbol: &str, window: &str) -> Result<()> {
    let window: HistoryWindow = window.parse()?;
    let points = simulator.historical_series(symbol, window);
    if points.is_empty() {
        println!("No data for {} in the last {}", symbol, window);
        return Ok(());
    }
    println!("{:<20} {:>10} {:>10} {:>10} {:>10} {:>12}", "time", "open", "high", "low", "close", "volume");
    for p in points {
        let time = chrono::DateTime::from_timestamp(p.time, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| p.time.to_string());
        println!(
            "{:<20} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12.0}",
            time, p.open, p.high, p.low, p.close, p.volume
        );
    }
    Ok(())
}

fn place_order(
    simulator: &TradingSimulator,
    account: &str,
    side: &str,
    symbol: String,
    quantity: u64,
    limit: Option<f64>,
) -> Result<()> {
    let side: OrderSide = side.parse()?;
    let request = match limit {
        Some(price) => OrderRequest::limit(symbol, side, quantity, price),
        None => OrderRequest::market(symbol, side, quantity),
    };

    let order = simulator.place_order(account, request)?;
    println!(
        "{} #{} {} {} {} @ {:.2} = {:.2}",
        "✓ Executed".green().bold(),
        order.id,
        order.side,
        order.quantity,
        order.symbol,
        order.execution_price,
        order.total_value
    );
    Ok(())
}

fn show_portfolio(simulator: &TradingSimulator, account: &str) -> Result<()> {
    let ledger = simulator.ledger(account)?;
    let v = &ledger.valuation;

    println!("{} {}", "Account".bold(), ledger.account_id.cyan());
    println!("  Cash:            {:>12.2}", ledger.cash);
    println!("  Holdings value:  {:>12.2}", v.portfolio_value);
    println!("  Total value:     {:>12.2}", v.total_value);
    println!("  Total return:    {:>12} ({:+.2}%)", signed(v.total_return), v.total_return_percent);

    if !v.holdings.is_empty() {
        println!();
        println!("{:<8} {:>8} {:>10} {:>10} {:>12} {:>12}", "symbol", "qty", "avg", "price", "value", "unrealized");
        for h in &v.holdings {
            println!(
                "{:<8} {:>8} {:>10.2} {:>10.2} {:>12.2} {:>12}",
                h.holding.symbol,
                h.holding.quantity,
                h.holding.average_price,
                h.current_price,
                h.market_value,
                signed(h.unrealized_pnl)
            );
        }
    }
    Ok(())
}

fn show_orders(simulator: &TradingSimulator, account: &str, limit: Option<usize>) -> Result<()> {
    let orders = simulator.order_history(account)?;
    if orders.is_empty() {
        println!("No orders for {}", account);
        return Ok(());
    }
    for order in orders.iter().take(limit.unwrap_or(usize::MAX)) {
        println!(
            "#{:<5} {}  {:<4} {:>6} {:<6} @ {:>10.2}  {:>12.2}  {}",
            order.id,
            order.timestamp.format("%Y-%m-%d %H:%M:%S"),
            order.side,
            order.quantity,
            order.symbol,
            order.execution_price,
            order.total_value,
            order.order_kind
        );
    }
    Ok(())
}

fn show_stats(simulator: &TradingSimulator, account: &str) -> Result<()> {
    let stats = simulator.trading_stats(account)?;
    let perf = simulator.performance(account)?;

    println!("{}", "Trading statistics".bold());
    println!("  Orders:          {} ({} buy / {} sell)", stats.total_orders, stats.buy_orders, stats.sell_orders);
    println!("  Volume:          {:.2}", stats.total_volume);
    println!("  Realized P&L:    {}", signed(stats.total_realized_pnl));
    println!("  Unrealized P&L:  {}", signed(perf.unrealized_pnl));
    println!("  Total P&L:       {}", signed(perf.total_pnl));
    println!(
        "  Win rate:        {:.1}% ({} won / {} lost)",
        stats.win_rate, stats.winning_trades, stats.losing_trades
    );
    println!("  Avg win / loss:  {} / {}", signed(stats.avg_win), signed(stats.avg_loss));
    Ok(())
}

fn export_state(simulator: &TradingSimulator, output: Option<PathBuf>) -> Result<()> {
    let json = simulator.export_state()?.to_json()?;
    match output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("{} Exported to {}", "✓".green(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn import_state(simulator: &TradingSimulator, file: &Path) -> Result<()> {
    let contents = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let bundle = StateBundle::from_json(&contents)?;
    simulator.import_state(bundle)?;
    println!("{} Imported {}", "✓".green(), file.display());
    Ok(())
}

fn watch(simulator: TradingSimulator, speed: Option<f64>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(async move {
        simulator.subscribe(|quotes| {
            println!("{}", chrono::Local::now().format("%H:%M:%S").to_string().dimmed());
            quotes.iter().for_each(print_quote);
        });

        let period = match speed {
            Some(multiplier) => {
                simulator.start_replay()?;
                simulator.set_speed(multiplier).await?
            }
            None => simulator.start_replay()?,
        };
        println!("{} tick every {:?}, Ctrl-C to stop", "Watching".cyan().bold(), period);
        simulator.all_current_quotes().iter().for_each(print_quote);

        tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
        simulator.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}
