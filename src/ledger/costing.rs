use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::ledger::{Ledger, Lot, Transaction, TransactionKind};

// quantities below this many grams are treated as floating point residue
pub const DEFAULT_QUANTITY_EPSILON: f64 = 1e-4;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum CostingError {
    #[error("insufficient stock: sale wants {requested} g, only {available} g on hand")]
    InsufficientStock { requested: f64, available: f64 },
    #[error("malformed transaction: {reason}")]
    MalformedTransaction { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LedgerUpdate {
    pub transactions: Vec<Transaction>,
    pub lots: Vec<Lot>,
}

// a historical sale that could not be fully covered by the lots open at its
// date; recompute absorbs it but the operator should be told
#[derive(Clone, Debug, PartialEq)]
pub struct ShortfallWarning {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub requested: f64,
    pub unfilled: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Recomputed {
    pub transactions: Vec<Transaction>,
    pub lots: Vec<Lot>,
    pub warnings: Vec<ShortfallWarning>,
}

struct Allocation {
    cogs: f64,
    unfilled: f64,
}

pub fn apply_transaction(
    ledger: &Ledger,
    txn: Transaction,
    epsilon: f64,
) -> Result<LedgerUpdate, CostingError> {
    validate(&txn)?;

    match txn.kind {
        TransactionKind::Purchase => Ok(apply_purchase(ledger, txn)),
        TransactionKind::Sale => {
            // a sale dated before the newest known transaction invalidates
            // already stamped costs, so replay the whole history instead of
            // patching lots in place
            if let Some(latest) = ledger.latest_date() {
                if txn.date < latest {
                    let mut history = ledger.transactions().to_vec();
                    history.push(txn);
                    let recomputed = recompute(history, epsilon);
                    return Ok(LedgerUpdate {
                        transactions: recomputed.transactions,
                        lots: recomputed.lots,
                    });
                }
            }
            apply_sale(ledger, txn, epsilon)
        }
    }
}

fn apply_purchase(ledger: &Ledger, txn: Transaction) -> LedgerUpdate {
    let mut lots = ledger.lots().to_vec();
    lots.push(Lot::open(&txn));
    // stable sort keeps a same-day lot behind the ones already open
    lots.sort_by_key(|lot| lot.date);

    let mut transactions = ledger.transactions().to_vec();
    transactions.push(txn);
    transactions.sort_by_key(|txn| txn.date);

    LedgerUpdate { transactions, lots }
}

fn apply_sale(
    ledger: &Ledger,
    mut txn: Transaction,
    epsilon: f64,
) -> Result<LedgerUpdate, CostingError> {
    // allocate against a working copy and commit only on full success, so a
    // rejected sale leaves the ledger untouched
    let mut lots = ledger.lots().to_vec();
    let allocation = allocate(&mut lots, &txn, epsilon);

    if allocation.unfilled > epsilon {
        return Err(CostingError::InsufficientStock {
            requested: txn.quantity,
            available: txn.quantity - allocation.unfilled,
        });
    }

    txn.cost_of_goods_sold = Some(allocation.cogs);
    txn.profit = Some(txn.revenue_basis() - allocation.cogs);

    let mut transactions = ledger.transactions().to_vec();
    transactions.push(txn);

    Ok(LedgerUpdate { transactions, lots })
}

// rebuild lots and sale costs from scratch; the one source of truth after
// any edit that may have broken chronological order
pub fn recompute(mut transactions: Vec<Transaction>, epsilon: f64) -> Recomputed {
    // sort_by_key is stable, so same-date transactions replay in the order
    // they were given
    transactions.sort_by_key(|txn| txn.date);

    let mut lots: Vec<Lot> = Vec::new();
    let mut replayed: Vec<Transaction> = Vec::with_capacity(transactions.len());
    let mut warnings: Vec<ShortfallWarning> = Vec::new();

    for mut txn in transactions {
        match txn.kind {
            TransactionKind::Purchase => {
                txn.cost_of_goods_sold = None;
                txn.profit = None;
                // replay order is ascending, so pushing keeps lots FIFO sorted
                lots.push(Lot::open(&txn));
                replayed.push(txn);
            }
            TransactionKind::Sale => {
                let allocation = allocate(&mut lots, &txn, epsilon);
                if allocation.unfilled > epsilon {
                    warn!(
                        transaction = %txn.id,
                        date = %txn.date,
                        requested = txn.quantity,
                        unfilled = allocation.unfilled,
                        "historical sale exceeds cumulative purchases, shortfall absorbed"
                    );
                    warnings.push(ShortfallWarning {
                        transaction_id: txn.id.clone(),
                        date: txn.date,
                        requested: txn.quantity,
                        unfilled: allocation.unfilled,
                    });
                }
                txn.cost_of_goods_sold = Some(allocation.cogs);
                txn.profit = Some(txn.revenue_basis() - allocation.cogs);
                replayed.push(txn);
            }
        }
    }

    Recomputed {
        transactions: replayed,
        lots,
        warnings,
    }
}

pub fn delete_transactions(ledger: &Ledger, ids: &[String], epsilon: f64) -> Recomputed {
    let remaining: Vec<Transaction> = ledger
        .transactions()
        .iter()
        .filter(|txn| !ids.iter().any(|id| *id == txn.id))
        .cloned()
        .collect();
    recompute(remaining, epsilon)
}

// walk lots oldest first, draining each before touching the next; shared by
// the incremental and the recompute path so both stamp identical costs
fn allocate(lots: &mut [Lot], sale: &Transaction, epsilon: f64) -> Allocation {
    let mut needed = sale.quantity;
    let mut cogs = 0.0;

    for lot in lots.iter_mut() {
        if needed <= 0.0 {
            break;
        }
        if lot.remaining_quantity <= 0.0 {
            continue;
        }

        let take = needed.min(lot.remaining_quantity);
        lot.remaining_quantity -= take;
        lot.total_revenue_allocated += take * sale.unit_rate;
        cogs += take * lot.cost_per_unit;
        needed -= take;

        // floor residue to an exact zero and stamp the close
        if lot.remaining_quantity < epsilon {
            lot.remaining_quantity = 0.0;
            lot.closed_date = Some(sale.date);
        }
    }

    Allocation {
        cogs,
        unfilled: needed.max(0.0),
    }
}

fn validate(txn: &Transaction) -> Result<(), CostingError> {
    if txn.id.is_empty() {
        return Err(CostingError::MalformedTransaction {
            reason: "transaction id must not be empty".to_string(),
        });
    }
    if !txn.quantity.is_finite() || txn.quantity <= 0.0 {
        return Err(CostingError::MalformedTransaction {
            reason: format!("quantity must be a positive number of grams, got {}", txn.quantity),
        });
    }
    if !txn.unit_rate.is_finite() || txn.unit_rate <= 0.0 {
        return Err(CostingError::MalformedTransaction {
            reason: format!("unit rate must be a positive amount, got {}", txn.unit_rate),
        });
    }
    Ok(())
}
