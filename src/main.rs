mod analytics;
mod app;
mod config;
mod ledger;
mod parser;
mod reports;
mod store;

use std::error;
use std::path::Path;
use std::process;

use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;

use crate::app::{AddArgs, App, Command};
use crate::config::Config;
use crate::ledger::costing;
use crate::ledger::{Ledger, Transaction, TransactionKind};
use crate::store::Store;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let app = App::new();

    let config = if Path::new(&app.config_path).exists() {
        Config::new(&app.config_path).unwrap_or_else(|err| {
            eprintln!("Unable to read config file \"{}\": {}", app.config_path, err);
            process::exit(1);
        })
    } else {
        Config::default()
    };

    if let Err(err) = run(app.command, &config) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn run(command: Command, config: &Config) -> Result<(), Box<dyn error::Error>> {
    let store = Store::new(&config.store_path, config.sync_url.clone());
    let mut ledger = store.fetch();
    let epsilon = config.quantity_epsilon;

    match command {
        Command::Add(args) => {
            let txn = build_transaction(args)?;
            let id = txn.id.clone();

            let update = costing::apply_transaction(&ledger, txn, epsilon)?;
            ledger.replace(update.transactions, update.lots);
            store.save(&ledger);

            if let Some(recorded) = ledger.transactions().iter().find(|txn| txn.id == id) {
                match (recorded.cost_of_goods_sold, recorded.profit) {
                    (Some(cogs), Some(profit)) => println!(
                        "Sale recorded. COGS {:.2} {}, profit {:.2} {}",
                        cogs, config.currency, profit, config.currency
                    ),
                    _ => println!("Purchase recorded, inventory updated."),
                }
                println!("Transaction id: {}", recorded.id);
            }
        }

        Command::Import { path } => {
            let outcome = parser::import_sheet(&ledger, &path, epsilon)?;
            ledger = outcome.ledger;
            store.save(&ledger);
            println!("{} transaction(s) imported from {}", outcome.imported, path);
        }

        Command::Delete { ids } => {
            let before = ledger.transactions().len();
            let outcome = costing::delete_transactions(&ledger, &ids, epsilon);
            let removed = before - outcome.transactions.len();

            print_warnings(&outcome.warnings);
            ledger.replace(outcome.transactions, outcome.lots);
            store.save(&ledger);
            println!("{} transaction(s) deleted, ledger recomputed.", removed);
        }

        Command::Summary => print_summary(&ledger, config),

        Command::Report { dir } => {
            reports::write_all(&ledger, &dir)?;
            println!("Reports written to {}", dir);
        }

        Command::Backup { path } => {
            store::write_backup(&ledger, &path)?;
            println!("Backup written to {}", path);
        }

        Command::Restore { path } => {
            let backup = store::read_backup(&path)?;
            // lots in the file are ignored; derived state is rebuilt from
            // the transactions so a tampered or stale snapshot cannot
            // smuggle in inconsistent inventory
            let outcome = costing::recompute(backup.transactions, epsilon);
            print_warnings(&outcome.warnings);

            ledger.replace(outcome.transactions, outcome.lots);
            store.save(&ledger);
            println!(
                "Backup restored: {} transactions, {} lots.",
                ledger.transactions().len(),
                ledger.lots().len()
            );
        }

        Command::Reset => {
            store.reset();
            println!("Store cleared.");
        }
    }

    Ok(())
}

fn build_transaction(args: AddArgs) -> Result<Transaction, Box<dyn error::Error>> {
    let kind = match args.kind.as_str() {
        "purchase" => TransactionKind::Purchase,
        "sale" => TransactionKind::Sale,
        other => return Err(format!("unknown transaction kind {:?}", other).into()),
    };
    let date: NaiveDate = args
        .date
        .parse()
        .map_err(|_| format!("--date expects YYYY-MM-DD, got {:?}", args.date))?;

    let taxable_amount = args.taxable_amount.unwrap_or(args.quantity * args.rate);
    let tax_amount = args.tax_amount.unwrap_or(0.0);
    let total_amount = args.total_amount.unwrap_or(taxable_amount + tax_amount);

    Ok(Transaction {
        id: ledger::generate_id(),
        kind,
        date,
        party_name: args.party,
        quantity: args.quantity,
        unit_rate: args.rate,
        taxable_amount,
        tax_amount,
        total_amount,
        cost_of_goods_sold: None,
        profit: None,
    })
}

fn print_warnings(warnings: &[costing::ShortfallWarning]) {
    for warning in warnings {
        println!(
            "warning: sale {} on {} wanted {:.3} g but history only covers {:.3} g",
            warning.transaction_id,
            warning.date,
            warning.requested,
            warning.requested - warning.unfilled
        );
    }
}

fn print_summary(ledger: &Ledger, config: &Config) {
    let today = Local::now().date_naive();
    let month_ago = today - chrono::Duration::days(30);
    let stock = analytics::stock_summary(ledger.lots());
    let aging = analytics::stock_aging(ledger.lots(), today);
    let turnover = analytics::turnover_stats(ledger.transactions(), ledger.lots());

    let lifetime_profit: f64 = ledger
        .transactions()
        .iter()
        .filter_map(|txn| txn.profit)
        .sum();
    let recent_profit: f64 = analytics::profit_by_day(ledger.transactions(), month_ago, today)
        .iter()
        .map(|d| d.profit)
        .sum();
    let value_month_ago =
        analytics::inventory_value_on(ledger.transactions(), month_ago, config.quantity_epsilon);
    let sales = ledger
        .transactions()
        .iter()
        .filter(|txn| txn.is_sale())
        .count();

    println!("Stock on hand    : {:.3} g in {} open lots", stock.grams_on_hand, stock.open_lots);
    println!("Inventory value  : {:.2} {} (FIFO basis)", stock.fifo_value, config.currency);
    println!("   30 days ago   : {:.2} {}", value_month_ago, config.currency);
    println!("Lifetime profit  : {:.2} {} over {} sales", lifetime_profit, config.currency, sales);
    println!("Profit (30 days) : {:.2} {}", recent_profit, config.currency);
    println!("Total COGS       : {:.2} {}", turnover.total_cogs, config.currency);
    if turnover.turnover_ratio > 0.0 {
        println!("Turnover ratio   : {:.2}x", turnover.turnover_ratio);
    }
    if turnover.avg_days_to_sell > 0.0 {
        println!("Avg days to sell : {:.0}", turnover.avg_days_to_sell);
    }
    println!(
        "Stock age        : {:.3} g <7d, {:.3} g 8-15d, {:.3} g 16-30d, {:.3} g >30d (avg {:.0}d)",
        aging.days_0_to_7,
        aging.days_8_to_15,
        aging.days_16_to_30,
        aging.days_over_30,
        aging.weighted_avg_days
    );

    for alert in analytics::risk_alerts(ledger.transactions(), ledger.lots(), today) {
        println!(
            "[{}] {}: {}",
            match alert.severity {
                analytics::AlertSeverity::High => "HIGH",
                analytics::AlertSeverity::Medium => "MEDIUM",
            },
            alert.context,
            alert.message
        );
    }
}
