pub mod costing;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Purchase,
    Sale,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub date: NaiveDate,
    pub party_name: String,
    pub quantity: f64,
    pub unit_rate: f64,
    pub taxable_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_of_goods_sold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
}

impl Transaction {
    pub fn is_sale(&self) -> bool {
        self.kind == TransactionKind::Sale
    }

    pub fn is_purchase(&self) -> bool {
        self.kind == TransactionKind::Purchase
    }

    // revenue excluding tax; invoices recorded without a separate taxable
    // amount fall back to quantity times rate
    pub fn revenue_basis(&self) -> f64 {
        if self.taxable_amount > 0.0 {
            self.taxable_amount
        } else {
            self.quantity * self.unit_rate
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: String,
    pub date: NaiveDate,
    pub original_quantity: f64,
    pub remaining_quantity: f64,
    pub cost_per_unit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_revenue_allocated: f64,
}

impl Lot {
    // a lot shares the id of the purchase that opened it
    pub fn open(purchase: &Transaction) -> Lot {
        Lot {
            id: purchase.id.clone(),
            date: purchase.date,
            original_quantity: purchase.quantity,
            remaining_quantity: purchase.quantity,
            cost_per_unit: purchase.unit_rate,
            closed_date: None,
            total_revenue_allocated: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.remaining_quantity > 0.0
    }

    pub fn value(&self) -> f64 {
        self.remaining_quantity * self.cost_per_unit
    }
}

// Transactions are kept in replay order (ascending by date, same-date entries
// in insertion order) so that replaying the list front to back always yields
// the same allocation. Views that want newest-first iterate in reverse.
// Lots are kept oldest first, which is the order FIFO allocation visits them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    lots: Vec<Lot>,
}

impl Ledger {
    pub fn new() -> Ledger {
        Ledger {
            transactions: Vec::new(),
            lots: Vec::new(),
        }
    }

    pub fn from_parts(transactions: Vec<Transaction>, lots: Vec<Lot>) -> Ledger {
        Ledger { transactions, lots }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    // single swap of both sequences; readers never observe a transaction
    // list and a lot list from different commits
    pub fn replace(&mut self, transactions: Vec<Transaction>, lots: Vec<Lot>) {
        self.transactions = transactions;
        self.lots = lots;
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(|txn| txn.date).max()
    }
}

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
