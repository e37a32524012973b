use std::error;
use serde::{Serialize, Deserialize};

use crate::ledger::costing::DEFAULT_QUANTITY_EPSILON;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_quantity_epsilon")]
    pub quantity_epsilon: f64,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default)]
    pub sync_url: Option<String>,
}

impl Config {
    pub fn new(config_path: &str) -> Result<Config, Box<dyn error::Error>> {
        let file = std::fs::File::open(config_path)?;
        let config: Config = ::serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            currency: default_currency(),
            quantity_epsilon: default_quantity_epsilon(),
            store_path: default_store_path(),
            sync_url: None,
        }
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_quantity_epsilon() -> f64 {
    DEFAULT_QUANTITY_EPSILON
}

fn default_store_path() -> String {
    "bullion_keep_data.json".to_string()
}
