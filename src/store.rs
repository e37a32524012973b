use std::error;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::{Ledger, Lot, Transaction};

pub const BACKUP_APP_TAG: &str = "BullionKeep";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    transactions: Vec<Transaction>,
    lots: Vec<Lot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupFile {
    pub app: String,
    pub timestamp: DateTime<Utc>,
    pub transactions: Vec<Transaction>,
    pub lots: Vec<Lot>,
}

pub struct Store {
    local_path: String,
    sync_url: Option<String>,
    client: reqwest::blocking::Client,
}

impl Store {
    pub fn new(local_path: &str, sync_url: Option<String>) -> Store {
        Store {
            local_path: local_path.to_string(),
            sync_url,
            client: reqwest::blocking::Client::new(),
        }
    }

    // try cloud, fall back to the local file, fall back to an empty ledger;
    // a fresh cloud copy refreshes the local backup on the way through
    pub fn fetch(&self) -> Ledger {
        if let Some(url) = &self.sync_url {
            match self.fetch_cloud(url) {
                Ok(snapshot) => {
                    let ledger = Ledger::from_parts(snapshot.transactions, snapshot.lots);
                    if let Err(err) = self.save_local(&ledger) {
                        warn!(error = %err, "could not refresh local backup from cloud");
                    }
                    return ledger;
                }
                Err(err) => {
                    warn!(error = %err, "cloud sync unavailable, switching to local mode");
                }
            }
        }

        match self.fetch_local() {
            Ok(Some(ledger)) => ledger,
            Ok(None) => Ledger::new(),
            Err(err) => {
                warn!(error = %err, path = %self.local_path, "local store unreadable, starting empty");
                Ledger::new()
            }
        }
    }

    // local write comes first so the data survives offline; the cloud push
    // is fire and forget and never fails the commit
    pub fn save(&self, ledger: &Ledger) {
        if let Err(err) = self.save_local(ledger) {
            warn!(error = %err, path = %self.local_path, "local save failed");
        }

        if let Some(url) = &self.sync_url {
            if let Err(err) = self.save_cloud(url, ledger) {
                warn!(error = %err, "background cloud save failed");
            }
        }
    }

    pub fn reset(&self) {
        if Path::new(&self.local_path).exists() {
            if let Err(err) = std::fs::remove_file(&self.local_path) {
                warn!(error = %err, path = %self.local_path, "could not remove local store");
            }
        }
        if let Some(url) = &self.sync_url {
            if let Err(err) = self.client.delete(url).send() {
                warn!(error = %err, "cloud reset failed");
            }
        }
        info!("store reset");
    }

    fn fetch_cloud(&self, url: &str) -> Result<Snapshot, Box<dyn error::Error>> {
        let snapshot = self
            .client
            .get(url)
            .send()?
            .error_for_status()?
            .json::<Snapshot>()?;
        Ok(snapshot)
    }

    fn save_cloud(&self, url: &str, ledger: &Ledger) -> Result<(), Box<dyn error::Error>> {
        let snapshot = Snapshot {
            transactions: ledger.transactions().to_vec(),
            lots: ledger.lots().to_vec(),
        };
        self.client
            .post(url)
            .json(&snapshot)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn fetch_local(&self) -> Result<Option<Ledger>, Box<dyn error::Error>> {
        if !Path::new(&self.local_path).exists() {
            return Ok(None);
        }
        let file = File::open(&self.local_path)?;
        let snapshot: Snapshot = serde_json::from_reader(file)?;
        Ok(Some(Ledger::from_parts(snapshot.transactions, snapshot.lots)))
    }

    fn save_local(&self, ledger: &Ledger) -> Result<(), Box<dyn error::Error>> {
        let snapshot = Snapshot {
            transactions: ledger.transactions().to_vec(),
            lots: ledger.lots().to_vec(),
        };
        serde_json::to_writer(&File::create(&self.local_path)?, &snapshot)?;
        Ok(())
    }
}

pub fn write_backup(ledger: &Ledger, path: &str) -> Result<(), Box<dyn error::Error>> {
    let backup = BackupFile {
        app: BACKUP_APP_TAG.to_string(),
        timestamp: Utc::now(),
        transactions: ledger.transactions().to_vec(),
        lots: ledger.lots().to_vec(),
    };
    serde_json::to_writer_pretty(&File::create(path)?, &backup)?;
    Ok(())
}

pub fn read_backup(path: &str) -> Result<BackupFile, Box<dyn error::Error>> {
    let file = File::open(path)?;
    let backup: BackupFile = serde_json::from_reader(file)?;
    if backup.app != BACKUP_APP_TAG {
        return Err(format!(
            "not a {} backup file (app tag was {:?})",
            BACKUP_APP_TAG, backup.app
        )
        .into());
    }
    Ok(backup)
}
