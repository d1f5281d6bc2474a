//! Trading journal analytics.
//!
//! Imports broker trade history into a local journal and reports performance
//! metrics (win rate, drawdown, profit factor, risk/reward) per account.

mod config;
mod db;
mod import;
mod metrics;
mod models;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::Database;
use crate::import::{load_batch_file, parse_timestamp, TradeImporter};
use crate::metrics::{
    apply_filters, compute_metrics, hourly_breakdown, monthly_breakdown, session_breakdown,
    simulate, symbol_breakdown, time_ordered, weekday_breakdown, DateRange, ProfitRange,
    TradeFilters,
};
use crate::models::{Trade, TradeType, TradingAccount};

/// Trading journal analytics CLI.
#[derive(Parser)]
#[command(name = "tradelens")]
#[command(about = "Import broker trades and analyze trading performance", long_about = None)]
struct Cli {
    /// Database URL (defaults to TRADELENS_DATABASE_URL or ./tradelens.db)
    #[arg(short, long)]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "TRADELENS_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage trading accounts
    Account {
        #[command(subcommand)]
        action: AccountCommand,
    },

    /// Import trades from a JSON export
    Import {
        /// Path to the JSON batch file
        file: PathBuf,

        /// Target account (falls back to the file's trading_account_id)
        #[arg(short, long)]
        account: Option<Uuid>,

        /// Validate only, don't store anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show performance metrics for an account
    Metrics {
        #[arg(short, long)]
        account: Uuid,

        #[command(flatten)]
        filters: FilterArgs,

        /// Print the running balance curve
        #[arg(long)]
        curve: bool,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Break profitability down by hour, session, weekday, month or symbol
    Breakdown {
        #[arg(short, long)]
        account: Uuid,

        /// Grouping dimension
        #[arg(value_enum)]
        by: BreakdownKind,

        #[command(flatten)]
        filters: FilterArgs,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete all trades of an account
    Purge {
        #[arg(short, long)]
        account: Uuid,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Create a trading account
    Add {
        /// Display name
        name: String,

        /// Starting balance
        #[arg(short, long)]
        balance: Option<Decimal>,

        #[arg(long)]
        broker: Option<String>,

        #[arg(long)]
        number: Option<String>,

        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// List trading accounts
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum BreakdownKind {
    Hourly,
    Session,
    Weekday,
    Monthly,
    Symbol,
}

/// Trade filter flags shared by the reporting commands.
#[derive(Args, Default)]
struct FilterArgs {
    /// Earliest open time (RFC 3339 or YYYY-MM-DD, inclusive)
    #[arg(long)]
    from: Option<String>,

    /// Latest open time (RFC 3339 or YYYY-MM-DD, inclusive of the whole day)
    #[arg(long)]
    to: Option<String>,

    /// Only these symbols (repeatable)
    #[arg(long = "symbol")]
    symbols: Vec<String>,

    /// Only these trade types (repeatable: buy, sell)
    #[arg(long = "type")]
    trade_types: Vec<String>,

    #[arg(long, allow_hyphen_values = true)]
    min_profit: Option<Decimal>,

    #[arg(long, allow_hyphen_values = true)]
    max_profit: Option<Decimal>,
}

impl FilterArgs {
    fn to_filters(&self) -> Result<TradeFilters> {
        let start = self.from.as_deref().map(parse_timestamp).transpose()?;
        let end = self.to.as_deref().map(parse_end_bound).transpose()?;

        let trade_types = self
            .trade_types
            .iter()
            .map(|t| t.parse::<TradeType>())
            .collect::<Result<Vec<_>>>()?;

        let profit_range = (self.min_profit.is_some() || self.max_profit.is_some()).then(|| {
            ProfitRange {
                min: self.min_profit,
                max: self.max_profit,
            }
        });

        Ok(TradeFilters {
            date_range: DateRange { start, end },
            symbols: self.symbols.clone(),
            trade_types,
            profit_range,
        })
    }
}

/// A bare date as an upper bound covers the whole day.
fn parse_end_bound(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = parse_timestamp(raw)?;
    if raw.trim().len() == 10 {
        Ok(parsed + Duration::days(1) - Duration::nanoseconds(1))
    } else {
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::from_env()?;
    if let Some(url) = cli.database {
        config.database_url = url;
    }

    let db = Database::new(&config.database_url).await?;

    match cli.command {
        Commands::Account { action } => match action {
            AccountCommand::Add {
                name,
                balance,
                broker,
                number,
                currency,
            } => {
                let mut account =
                    TradingAccount::new(name, balance.unwrap_or(config.default_starting_balance));
                account.broker = broker;
                account.account_number = number;
                account.currency = currency;

                db.create_account(&account).await?;
                info!(account = %account.id, name = %account.account_name, "Created trading account");

                println!("Created account: {}", account.id);
            }

            AccountCommand::List => {
                let accounts = db.list_accounts().await?;

                if accounts.is_empty() {
                    println!("No accounts yet. Use 'tradelens account add <name>' to create one.");
                    return Ok(());
                }

                println!(
                    "\n{:<38} {:<20} {:<12} {:>14} {:>8}",
                    "ID", "NAME", "BROKER", "START BALANCE", "ACTIVE"
                );
                println!("{}", "-".repeat(96));

                for account in accounts {
                    println!(
                        "{:<38} {:<20} {:<12} {:>14.2} {:>8}",
                        account.id,
                        truncate(&account.account_name, 18),
                        truncate(account.broker.as_deref().unwrap_or("-"), 10),
                        account.starting_balance,
                        if account.is_active { "yes" } else { "no" }
                    );
                }
            }
        },

        Commands::Import {
            file,
            account,
            dry_run,
        } => {
            let batch = load_batch_file(&file)?;
            let account_id = account
                .or(batch.trading_account_id)
                .ok_or_else(|| anyhow::anyhow!("No account given; pass --account <id>"))?;

            let account = load_account(&db, account_id).await?;
            info!(
                account = %account.id,
                file = %file.display(),
                items = batch.items.len(),
                "Importing trades"
            );

            let existing = db.existing_tickets(account.id).await?;
            let importer = TradeImporter::new(&config);
            let mut prepared = importer.prepare(account.id, batch.items, &existing)?;

            if dry_run {
                prepared.report.mark_dry_run();
            } else if !prepared.trades.is_empty() {
                let written = db.insert_trades(&prepared.trades).await?;
                prepared.report.imported = written as usize;
            }

            if !prepared.report.is_success() {
                warn!(errors = prepared.report.errors, "Some trades were rejected");
            }
            println!("\n{}", prepared.report);
        }

        Commands::Metrics {
            account,
            filters,
            curve,
            json,
        } => {
            let account = load_account(&db, account).await?;
            let trades = load_filtered(&db, &account, &filters).await?;

            let snapshot = compute_metrics(&trades, Some(account.starting_balance));

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.to_map())?);
                return Ok(());
            }

            println!("\n=== Account: {} ===", account.account_name);
            println!("Starting Balance: ${:.2} {}", account.starting_balance, account.currency);
            println!();
            print!("{}", snapshot);

            if curve {
                let replay = simulate(&time_ordered(&trades), account.starting_balance);

                println!("\n--- Balance Curve ---");
                println!("{:<20} {:>14} {:>14} {:>12}", "TIME", "BALANCE", "PEAK", "DRAWDOWN");
                for point in &replay.curve {
                    println!(
                        "{:<20} {:>14.2} {:>14.2} {:>12.2}",
                        point.time.format("%Y-%m-%d %H:%M"),
                        point.balance,
                        point.peak,
                        point.drawdown
                    );
                }
                println!(
                    "Peak: ${:.2}  Final: ${:.2}",
                    replay.peak_balance, replay.final_balance
                );
            }
        }

        Commands::Breakdown {
            account,
            by,
            filters,
            json,
        } => {
            let account = load_account(&db, account).await?;
            let trades = load_filtered(&db, &account, &filters).await?;

            match by {
                BreakdownKind::Hourly => {
                    let rows = hourly_breakdown(&trades);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                        return Ok(());
                    }

                    println!("\n{:<6} {:>8} {:>12} {:>8} {:>12}", "HOUR", "TRADES", "PROFIT", "WIN%", "AVG");
                    println!("{}", "-".repeat(50));
                    for row in rows.iter().filter(|r| r.stats.trade_count > 0) {
                        println!(
                            "{:<6} {:>8} {:>12.2} {:>7.1}% {:>12.2}",
                            format!("{:02}:00", row.hour),
                            row.stats.trade_count,
                            row.stats.profit,
                            row.stats.win_rate,
                            row.stats.avg_profit
                        );
                    }
                }

                BreakdownKind::Session => {
                    let rows = session_breakdown(&trades);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                        return Ok(());
                    }

                    println!(
                        "\n{:<14} {:>12} {:>8} {:>12} {:>8} {:>12}",
                        "SESSION", "UTC", "TRADES", "PROFIT", "WIN%", "AVG"
                    );
                    println!("{}", "-".repeat(72));
                    for row in &rows {
                        println!(
                            "{:<14} {:>12} {:>8} {:>12.2} {:>7.1}% {:>12.2}",
                            row.session,
                            format!("{:02}:00-{:02}:00", row.start_hour, row.end_hour),
                            row.stats.trade_count,
                            row.stats.profit,
                            row.stats.win_rate,
                            row.stats.avg_profit
                        );
                    }
                }

                BreakdownKind::Weekday => {
                    let rows = weekday_breakdown(&trades);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                        return Ok(());
                    }

                    println!("\n{:<6} {:>8} {:>12} {:>8} {:>12}", "DAY", "TRADES", "PROFIT", "WIN%", "AVG");
                    println!("{}", "-".repeat(50));
                    for row in &rows {
                        println!(
                            "{:<6} {:>8} {:>12.2} {:>7.1}% {:>12.2}",
                            row.day,
                            row.stats.trade_count,
                            row.stats.profit,
                            row.stats.win_rate,
                            row.stats.avg_profit
                        );
                    }
                }

                BreakdownKind::Monthly => {
                    let rows = monthly_breakdown(&trades);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                        return Ok(());
                    }

                    println!("\n{:<6} {:>8} {:>12} {:>8} {:>12}", "MONTH", "TRADES", "PROFIT", "WIN%", "AVG");
                    println!("{}", "-".repeat(50));
                    for row in rows.iter().filter(|r| r.stats.trade_count > 0) {
                        println!(
                            "{:<6} {:>8} {:>12.2} {:>7.1}% {:>12.2}",
                            row.month,
                            row.stats.trade_count,
                            row.stats.profit,
                            row.stats.win_rate,
                            row.stats.avg_profit
                        );
                    }
                }

                BreakdownKind::Symbol => {
                    let rows = symbol_breakdown(&trades);
                    if json {
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                        return Ok(());
                    }

                    println!(
                        "\n{:<20} {:>8} {:>12} {:>8} {:>12} {:>8}",
                        "SYMBOL", "TRADES", "PROFIT", "WIN%", "AVG", "RISK"
                    );
                    println!("{}", "-".repeat(72));
                    for row in &rows {
                        println!(
                            "{:<20} {:>8} {:>12.2} {:>7.1}% {:>12.2} {:>8.2}",
                            truncate(&row.symbol, 20),
                            row.stats.trade_count,
                            row.stats.profit,
                            row.stats.win_rate,
                            row.stats.avg_profit,
                            row.risk_score
                        );
                    }
                }
            }
        }

        Commands::Purge { account } => {
            let account = load_account(&db, account).await?;
            let removed = db.delete_trades(account.id).await?;
            info!(account = %account.id, removed, "Purged trades");
            println!("Removed {} trades from {}", removed, account.account_name);
        }

        Commands::Config => print_config(&config),
    }

    Ok(())
}

async fn load_account(db: &Database, id: Uuid) -> Result<TradingAccount> {
    db.get_account(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Trading account {} not found", id))
}

/// Fetch an account's trades and apply the command-line filters.
async fn load_filtered(db: &Database, account: &TradingAccount, args: &FilterArgs) -> Result<Vec<Trade>> {
    let trades = db.get_trades(account.id).await?;
    let filters = args.to_filters()?;

    if filters.is_empty() {
        return Ok(trades);
    }

    let filtered = apply_filters(&trades, &filters);
    info!(total = trades.len(), kept = filtered.len(), "Applied trade filters");
    Ok(filtered)
}

fn print_config(config: &AppConfig) {
    println!("\n=== Configuration ===\n");
    println!("Storage:");
    println!("  Database URL:         {}", config.database_url);
    println!("\nAccounts:");
    println!("  Default Balance:      {}", config.default_starting_balance);
    println!("\nImport:");
    println!("  Max Batch Size:       {}", config.max_import_batch);
    println!("  Max Symbol Length:    {}", config.max_symbol_len);
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_filter_args_conversion() {
        let args = FilterArgs {
            from: Some("2024-01-01".to_string()),
            to: Some("2024-01-31".to_string()),
            symbols: vec!["EURUSD".to_string()],
            trade_types: vec!["SELL".to_string()],
            min_profit: Some(Decimal::ZERO),
            max_profit: None,
        };

        let filters = args.to_filters().unwrap();
        assert_eq!(
            filters.date_range.start,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        let end = filters.date_range.end.unwrap();
        assert!(end > Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
        assert!(end < Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(filters.trade_types, vec![TradeType::Sell]);
        assert!(filters.profit_range.is_some());

        assert!(FilterArgs::default().to_filters().unwrap().is_empty());

        let bad = FilterArgs {
            trade_types: vec!["hold".to_string()],
            ..Default::default()
        };
        assert!(bad.to_filters().is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("EURUSD", 10), "EURUSD");
        assert_eq!(truncate("A very long account name", 10), "A very ...");
    }
}
