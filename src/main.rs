//! BTC5M — Polymarket 5-minute Bitcoin window trader
//!
//! Entry point. Loads configuration, initialises structured logging, then
//! runs one pass of discover → gate → price → (dry run | execute), or one
//! of the maintenance actions (show/update config, list/cancel orders).

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{error, info};

use btc5m::config::{self, ConfigKey, TraderConfig};
use btc5m::engine::executor::{ExecutionOutcome, Executor, OrderTicket};
use btc5m::platforms::polymarket::PolymarketClient;
use btc5m::platforms::signer::SignerGateway;
use btc5m::platforms::OrderGateway;
use btc5m::strategy::{check_window, evaluate};
use btc5m::types::{FillEstimate, MarketWindow, OrderKind, OrderQuantity, Side, TraderError};

const FUNDER_ENV: &str = "POLY_FUNDER";

/// Polymarket BTC 5-Min Trader
#[derive(Parser, Debug)]
#[command(name = "btc5m")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Execute real trades (default: dry run)
    #[arg(long)]
    live: bool,

    /// Show order book only, no trade
    #[arg(long)]
    book: bool,

    /// List open orders
    #[arg(long)]
    orders: bool,

    /// Cancel an order by ID
    #[arg(long, value_name = "ORDER_ID")]
    cancel: Option<String>,

    /// BUY = buy YES token; SELL = buy NO token
    #[arg(long, value_enum, ignore_case = true, default_value = "BUY")]
    side: CliSide,

    /// Limit price for GTC orders (e.g. 0.55)
    #[arg(long)]
    price: Option<f64>,

    /// USDC amount to spend (default from config)
    #[arg(long)]
    size: Option<f64>,

    /// Order type (default from config)
    #[arg(long = "type", value_name = "GTC|FOK", value_parser = parse_order_kind)]
    order_type: Option<OrderKind>,

    /// Override high-slippage block
    #[arg(long)]
    force: bool,

    /// Show current config
    #[arg(long)]
    config: bool,

    /// Update config (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Path to the JSON config file
    #[arg(long, value_name = "PATH")]
    config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliSide {
    #[value(name = "BUY")]
    Buy,
    #[value(name = "SELL")]
    Sell,
}

impl CliSide {
    fn outcome(self) -> Side {
        match self {
            CliSide::Buy => Side::Yes,
            CliSide::Sell => Side::No,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CliSide::Buy => "BUY",
            CliSide::Sell => "SELL",
        }
    }
}

fn parse_order_kind(s: &str) -> Result<OrderKind, String> {
    s.parse::<OrderKind>().map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cli = Cli::parse();
    let cfg_path = config::config_path(cli.config_file.as_deref());

    // -- Config update (the only path with a failing exit code) ----------

    if !cli.set.is_empty() {
        match config::update_config(&cfg_path, &cli.set) {
            Ok(updates) => {
                println!("✅ Config updated: {}", serde_json::Value::Object(updates));
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ {e:#}");
                std::process::exit(1);
            }
        }
    }

    let cfg = TraderConfig::load(&cfg_path)?;

    if cli.config {
        println!("\n⚙️  Current Config:");
        for key in ConfigKey::ALL {
            println!("  {key}: {}", cfg.value_of(key));
        }
        println!("\n  Config file: {}", cfg_path.display());
        return Ok(());
    }

    // -- Order maintenance -----------------------------------------------

    if cli.orders || cli.cancel.is_some() {
        let Some(gateway) = signer_gateway() else {
            return Ok(());
        };
        let executor = Executor::new(Some(gateway), false, cfg.sig_type);

        if let Some(order_id) = cli.cancel.as_deref() {
            match executor.cancel(order_id).await {
                Ok(()) => println!("✅ Cancelled order {order_id}"),
                Err(e) => println!("❌ Cancel failed: {e}"),
            }
        } else {
            list_orders(&executor).await;
        }
        return Ok(());
    }

    run(&cli, &cfg).await;
    Ok(())
}

/// One discover → gate → price → execute pass. Failures are reported,
/// never turned into a process error.
async fn run(cli: &Cli, cfg: &TraderConfig) {
    info!(live = cli.live, side = cli.side.label(), "BTC5M starting");

    let market = match PolymarketClient::new() {
        Ok(client) => client,
        Err(e) => {
            println!("❌ {e:#}");
            return;
        }
    };

    // -- Discovery -------------------------------------------------------

    println!("\n🔍 Discovering active BTC 5-min market...");
    let window = match market.discover_window().await {
        Ok(w) => w,
        Err(e) => {
            println!("❌ {e}");
            return;
        }
    };
    print_window(&window);

    if let Err(e) = check_window(&window, cfg.min_time_remaining) {
        println!("\n⛔ {e}");
        return;
    }

    // -- Order book ------------------------------------------------------

    let outcome = cli.side.outcome();
    let notional = cli.size.unwrap_or(cfg.default_size);

    println!("\n📖 Order Book ({outcome} token, ${notional} USDC)...");
    let book = match market.fetch_book(window.token_for(outcome)).await {
        Ok(b) => b,
        Err(e) => {
            println!("❌ {e}");
            return;
        }
    };
    let estimate = evaluate(&book, notional, &cfg.slippage_policy());
    print_estimate(&estimate);

    if estimate.blocked && !cli.force {
        println!("\n⛔ Trade blocked due to high slippage. Use --force to override.");
        return;
    }
    if cli.book {
        return;
    }

    // -- Execution -------------------------------------------------------

    let gateway = if cli.live {
        match signer_gateway() {
            Some(g) => Some(g),
            None => return,
        }
    } else {
        None
    };
    let funder = std::env::var(FUNDER_ENV).ok();
    let executor = Executor::new(gateway, !cli.live, cfg.sig_type).with_funder(funder);

    let ticket = OrderTicket {
        side: outcome,
        kind: cli.order_type.unwrap_or(cfg.order_type),
        notional,
        limit_price: cli.price,
    };
    let request = match executor.prepare(&window, &estimate, &ticket, cli.force) {
        Ok(r) => r,
        Err(e) => {
            println!("\n❌ {e}");
            return;
        }
    };

    println!("\n📝 Order Summary:");
    println!("  Side:       {} {outcome}", cli.side.label());
    println!("  Type:       {}", request.order_type);
    if let Some(price) = request.price {
        println!("  Price:      ${price}");
    }
    match request.quantity {
        OrderQuantity::Size(shares) => println!("  Size:       ${notional} USDC ({shares:.2} shares)"),
        OrderQuantity::Amount(_) => {
            println!("  Size:       ${notional} USDC (~{:.2} shares)", estimate.shares)
        }
    }
    println!("  Window:     closes in {}s", window.seconds_remaining);

    if executor.is_dry_run() {
        if executor.execute(&request).await.is_ok() {
            println!("\n  [DRY RUN] No order placed. Use --live to execute.");
        }
        return;
    }

    println!("\n🚀 Placing order via {}...", executor.gateway_name().unwrap_or("gateway"));
    match executor.execute(&request).await {
        Ok(ExecutionOutcome::Placed(ack)) => {
            println!("  Order ID:  {}", ack.order_id_or_na());
            println!("  Status:    {}", ack.status);
            if let Some(msg) = &ack.error_msg {
                println!("  ⚠️  {msg}");
            }
            println!("\n✅ Order {}.", ack.status.to_lowercase());
        }
        Ok(ExecutionOutcome::DryRun { .. }) => {}
        Err(TraderError::OrderRejected { status, order_id, message }) => {
            println!("  Order ID:  {}", order_id.as_deref().unwrap_or("N/A"));
            println!("  Status:    {status}");
            if let Some(msg) = message {
                println!("  ⚠️  {msg}");
            }
            println!("\n⚠️  Unexpected status: {status}. Check Polymarket for order state.");
        }
        Err(e) => {
            error!(error = %e, "Order placement failed");
            println!("❌ Order failed: {e}");
        }
    }
}

fn signer_gateway() -> Option<Box<dyn OrderGateway>> {
    match SignerGateway::from_env() {
        Ok(g) => Some(Box::new(g)),
        Err(e) => {
            println!("❌ {e}");
            None
        }
    }
}

async fn list_orders(executor: &Executor) {
    match executor.open_orders().await {
        Ok(orders) => {
            println!("\n📋 Open Orders ({} total)", orders.len());
            for order in &orders {
                println!("  {order}");
            }
        }
        Err(e) => println!("Error: {e}"),
    }
}

fn print_window(window: &MarketWindow) {
    println!("  Title:      {}", window.title);
    println!("  YES token:  {}...", short(&window.yes_token, 24));
    println!("  NO token:   {}...", short(&window.no_token, 24));
    println!("  Closes in:  {}s  ({})", window.seconds_remaining, window.end_label);
    println!("  Liquidity:  ${:.0}", window.liquidity);
}

fn print_estimate(estimate: &FillEstimate) {
    let or_na = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "N/A".to_string());
    println!("  Best ask:     ${}", or_na(estimate.best_ask));
    println!("  Best bid:     ${}", or_na(estimate.best_bid));
    println!("  Ask depth:    ${} USDC", estimate.ask_depth);
    println!("  Your shares:  {:.2}", estimate.shares);
    println!("  Avg fill:     ${}", or_na(estimate.avg_price));
    println!("  Slippage:     {}%", estimate.slippage_pct);
    for warning in &estimate.warnings {
        println!("  ⚠️  {warning}");
    }
}

fn short(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Initialise the tracing subscriber. Logs go to stderr so stdout stays
/// the operator-facing report.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("btc5m=info"));

    let json_logging = std::env::var("BTC5M_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
