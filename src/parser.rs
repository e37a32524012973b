use std::error;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::ledger::costing;
use crate::ledger::{self, Ledger, Transaction, TransactionKind};

// one row of an imported transaction sheet; monetary columns are optional
// and derived from quantity and rate when the sheet leaves them blank
#[derive(Debug, Deserialize)]
struct SheetRow {
    date: NaiveDate,
    kind: String,
    party: String,
    quantity: f64,
    rate: f64,
    taxable_amount: Option<f64>,
    tax_amount: Option<f64>,
    total_amount: Option<f64>,
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub ledger: Ledger,
    pub imported: usize,
}

// rows are applied in sheet order through the costing engine, so an import
// behaves exactly like keying the transactions in one at a time
pub fn import_sheet(
    ledger: &Ledger,
    path: &str,
    epsilon: f64,
) -> Result<ImportOutcome, Box<dyn error::Error>> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut working = ledger.clone();
    let mut imported = 0;

    for (index, result) in reader.deserialize::<SheetRow>().enumerate() {
        let line = index + 2; // header occupies line 1
        let row = result.map_err(|err| format!("line {}: {}", line, err))?;
        let txn = row_to_transaction(row).map_err(|err| format!("line {}: {}", line, err))?;

        let update = costing::apply_transaction(&working, txn, epsilon)
            .map_err(|err| format!("line {}: {}", line, err))?;
        working.replace(update.transactions, update.lots);
        imported += 1;
    }

    info!(imported, path, "sheet imported");
    Ok(ImportOutcome {
        ledger: working,
        imported,
    })
}

fn row_to_transaction(row: SheetRow) -> Result<Transaction, String> {
    let kind = match row.kind.trim().to_uppercase().as_str() {
        "PURCHASE" => TransactionKind::Purchase,
        "SALE" => TransactionKind::Sale,
        other => return Err(format!("unknown transaction kind {:?}", other)),
    };

    let taxable_amount = row.taxable_amount.unwrap_or(row.quantity * row.rate);
    let tax_amount = row.tax_amount.unwrap_or(0.0);
    let total_amount = row.total_amount.unwrap_or(taxable_amount + tax_amount);

    Ok(Transaction {
        id: ledger::generate_id(),
        kind,
        date: row.date,
        party_name: row.party.trim().to_string(),
        quantity: row.quantity,
        unit_rate: row.rate,
        taxable_amount,
        tax_amount,
        total_amount,
        cost_of_goods_sold: None,
        profit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sheet(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    #[test]
    fn sheet_rows_flow_through_the_engine_in_order() {
        let file = sheet(
            "date,kind,party,quantity,rate,taxable_amount,tax_amount,total_amount\n\
             2024-03-01,PURCHASE,Ratanlal Refiners,10,6200,,,\n\
             2024-03-02,PURCHASE,Ratanlal Refiners,10,6400,,,\n\
             2024-03-03,SALE,Mehta Jewellers,15,6600,,,\n",
        );

        let outcome = import_sheet(
            &Ledger::new(),
            file.path().to_str().unwrap(),
            costing::DEFAULT_QUANTITY_EPSILON,
        )
        .unwrap();

        assert_eq!(outcome.imported, 3);
        let ledger = outcome.ledger;
        assert_eq!(ledger.transactions().len(), 3);

        let sale = ledger
            .transactions()
            .iter()
            .find(|txn| txn.is_sale())
            .unwrap();
        assert_eq!(sale.cost_of_goods_sold, Some(10.0 * 6200.0 + 5.0 * 6400.0));
        assert_eq!(sale.taxable_amount, 15.0 * 6600.0);

        let oldest = &ledger.lots()[0];
        assert_eq!(oldest.remaining_quantity, 0.0);
    }

    #[test]
    fn a_shortfall_row_aborts_the_import_with_its_line_number() {
        let file = sheet(
            "date,kind,party,quantity,rate,taxable_amount,tax_amount,total_amount\n\
             2024-03-01,PURCHASE,Ratanlal Refiners,10,6200,,,\n\
             2024-03-02,SALE,Mehta Jewellers,25,6600,,,\n",
        );

        let err = import_sheet(
            &Ledger::new(),
            file.path().to_str().unwrap(),
            costing::DEFAULT_QUANTITY_EPSILON,
        )
        .unwrap_err();

        assert!(err.to_string().starts_with("line 3:"));
        assert!(err.to_string().contains("insufficient stock"));
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let file = sheet(
            "date,kind,party,quantity,rate,taxable_amount,tax_amount,total_amount\n\
             2024-03-01,LOAN,Someone,10,6200,,,\n",
        );

        let err = import_sheet(
            &Ledger::new(),
            file.path().to_str().unwrap(),
            costing::DEFAULT_QUANTITY_EPSILON,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown transaction kind"));
    }
}
