use std::error;
use std::path::Path;

use chrono::NaiveDate;
use csv::Writer;
use serde::Serialize;

use crate::analytics;
use crate::ledger::{Ledger, Transaction, TransactionKind};

#[derive(Debug, Serialize)]
struct InventoryRow {
    lot_id: String,
    date: NaiveDate,
    original_grams: f64,
    remaining_grams: f64,
    cost_per_gram: f64,
    value: f64,
    revenue_allocated: f64,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct TransactionRow {
    date: NaiveDate,
    kind: &'static str,
    party: String,
    grams: f64,
    rate_per_gram: f64,
    taxable_amount: f64,
    tax_amount: f64,
    total_amount: f64,
    cost_of_goods_sold: Option<f64>,
    cost_per_gram_sold: Option<f64>,
    profit: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CustomerRow {
    customer: String,
    transactions: usize,
    total_grams: f64,
    revenue_ex_tax: f64,
    avg_selling_price: f64,
    avg_profit_per_gram: f64,
    margin_pct: f64,
    pattern: String,
}

#[derive(Debug, Serialize)]
struct SupplierRow {
    supplier: String,
    transactions: usize,
    total_grams: f64,
    avg_rate: f64,
    min_rate: f64,
    max_rate: f64,
    rate_volatility: f64,
}

#[derive(Debug, Serialize)]
struct MonthlyRow {
    month: String,
    turnover_ex_tax: f64,
    profit: f64,
    margin_pct: f64,
    grams_sold: f64,
}

// one CSV per report, written next to each other in the output directory
pub fn write_all(ledger: &Ledger, dir: &str) -> Result<(), Box<dyn error::Error>> {
    std::fs::create_dir_all(dir)?;
    let dir = Path::new(dir);

    write_inventory(ledger, dir.join("inventory.csv"))?;
    write_transactions(ledger, dir.join("transactions.csv"))?;
    write_customers(ledger, dir.join("customers.csv"))?;
    write_suppliers(ledger, dir.join("suppliers.csv"))?;
    write_monthly(ledger, dir.join("monthly_ledger.csv"))?;
    Ok(())
}

fn write_inventory<P: AsRef<Path>>(ledger: &Ledger, path: P) -> Result<(), Box<dyn error::Error>> {
    let mut writer = Writer::from_path(path)?;
    for lot in ledger.lots() {
        writer.serialize(InventoryRow {
            lot_id: lot.id.clone(),
            date: lot.date,
            original_grams: lot.original_quantity,
            remaining_grams: lot.remaining_quantity,
            cost_per_gram: lot.cost_per_unit,
            value: lot.value(),
            revenue_allocated: lot.total_revenue_allocated,
            status: if lot.is_open() { "Active" } else { "Closed" },
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_transactions<P: AsRef<Path>>(
    ledger: &Ledger,
    path: P,
) -> Result<(), Box<dyn error::Error>> {
    let mut writer = Writer::from_path(path)?;
    // newest first, the order the business reads statements in
    for txn in ledger.transactions().iter().rev() {
        writer.serialize(transaction_row(txn))?;
    }
    writer.flush()?;
    Ok(())
}

fn transaction_row(txn: &Transaction) -> TransactionRow {
    TransactionRow {
        date: txn.date,
        kind: match txn.kind {
            TransactionKind::Purchase => "PURCHASE",
            TransactionKind::Sale => "SALE",
        },
        party: txn.party_name.clone(),
        grams: txn.quantity,
        rate_per_gram: txn.unit_rate,
        taxable_amount: txn.taxable_amount,
        tax_amount: txn.tax_amount,
        total_amount: txn.total_amount,
        cost_of_goods_sold: txn.cost_of_goods_sold,
        cost_per_gram_sold: txn
            .cost_of_goods_sold
            .map(|cogs| if txn.quantity > 0.0 { cogs / txn.quantity } else { 0.0 }),
        profit: txn.profit,
    }
}

fn write_customers<P: AsRef<Path>>(ledger: &Ledger, path: P) -> Result<(), Box<dyn error::Error>> {
    let mut writer = Writer::from_path(path)?;
    for stat in analytics::customer_stats(ledger.transactions()) {
        writer.serialize(CustomerRow {
            customer: stat.name,
            transactions: stat.tx_count,
            total_grams: stat.total_grams,
            revenue_ex_tax: stat.total_spend,
            avg_selling_price: stat.avg_selling_price,
            avg_profit_per_gram: stat.avg_profit_per_gram,
            margin_pct: stat.margin_pct,
            pattern: stat.pattern,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_suppliers<P: AsRef<Path>>(ledger: &Ledger, path: P) -> Result<(), Box<dyn error::Error>> {
    let mut writer = Writer::from_path(path)?;
    for stat in analytics::supplier_stats(ledger.transactions()) {
        writer.serialize(SupplierRow {
            supplier: stat.name,
            transactions: stat.tx_count,
            total_grams: stat.total_grams_purchased,
            avg_rate: stat.avg_rate,
            min_rate: stat.min_rate,
            max_rate: stat.max_rate,
            rate_volatility: stat.rate_volatility,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_monthly<P: AsRef<Path>>(ledger: &Ledger, path: P) -> Result<(), Box<dyn error::Error>> {
    let mut writer = Writer::from_path(path)?;
    for month in analytics::monthly_performance(ledger.transactions()) {
        writer.serialize(MonthlyRow {
            month: format!("{}-{:02}", month.year, month.month),
            turnover_ex_tax: month.turnover,
            profit: month.profit,
            margin_pct: month.margin_pct(),
            grams_sold: month.grams_sold,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::costing;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn txn(id: &str, kind: TransactionKind, date: NaiveDate, qty: f64, rate: f64) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind,
            date,
            party_name: match kind {
                TransactionKind::Purchase => "Ratanlal Refiners".to_string(),
                TransactionKind::Sale => "Mehta Jewellers".to_string(),
            },
            quantity: qty,
            unit_rate: rate,
            taxable_amount: qty * rate,
            tax_amount: qty * rate * 0.03,
            total_amount: qty * rate * 1.03,
            cost_of_goods_sold: None,
            profit: None,
        }
    }

    fn sample_ledger() -> Ledger {
        let outcome = costing::recompute(
            vec![
                txn("p1", TransactionKind::Purchase, day(1), 10.0, 6200.0),
                txn("p2", TransactionKind::Purchase, day(2), 5.0, 6300.0),
                txn("s1", TransactionKind::Sale, day(3), 12.0, 6500.0),
            ],
            costing::DEFAULT_QUANTITY_EPSILON,
        );
        Ledger::from_parts(outcome.transactions, outcome.lots)
    }

    #[test]
    fn report_set_is_written_with_expected_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = sample_ledger();

        write_all(&ledger, dir.path().to_str().unwrap()).unwrap();

        for name in &[
            "inventory.csv",
            "transactions.csv",
            "customers.csv",
            "suppliers.csv",
            "monthly_ledger.csv",
        ] {
            assert!(dir.path().join(name).exists(), "missing report {}", name);
        }

        let inventory = std::fs::read_to_string(dir.path().join("inventory.csv")).unwrap();
        let mut lines = inventory.lines();
        assert_eq!(
            lines.next().unwrap(),
            "lot_id,date,original_grams,remaining_grams,cost_per_gram,value,revenue_allocated,status"
        );
        assert!(inventory.contains("Closed"));
        assert!(inventory.contains("Active"));

        let transactions = std::fs::read_to_string(dir.path().join("transactions.csv")).unwrap();
        // newest first: the sale row comes before the purchases
        let first_row = transactions.lines().nth(1).unwrap();
        assert!(first_row.contains("SALE"));

        let customers = std::fs::read_to_string(dir.path().join("customers.csv")).unwrap();
        assert!(customers.contains("Mehta Jewellers"));

        let monthly = std::fs::read_to_string(dir.path().join("monthly_ledger.csv")).unwrap();
        assert!(monthly.contains("2024-03"));
    }
}
