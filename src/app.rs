use std::process;

use clap::{App as ClapApp, Arg, ArgMatches, SubCommand};

pub enum Command {
    Add(AddArgs),
    Import { path: String },
    Delete { ids: Vec<String> },
    Summary,
    Report { dir: String },
    Backup { path: String },
    Restore { path: String },
    Reset,
}

pub struct AddArgs {
    pub kind: String,
    pub date: String,
    pub party: String,
    pub quantity: f64,
    pub rate: f64,
    pub taxable_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub total_amount: Option<f64>,
}

pub struct App {
    pub config_path: String,
    pub command: Command,
}

impl App {
    pub fn new() -> App {
        let matches = ClapApp::new("BullionKeep")
            .version("0.1.0")
            .about("Tracks bullion purchases and sales with FIFO costing")
            .arg(Arg::with_name("config_path")
                .short("c")
                .long("config")
                .takes_value(true)
                .global(true)
                .help("Config file"))
            .subcommand(SubCommand::with_name("add")
                .about("Records a single purchase or sale")
                .arg(Arg::with_name("kind")
                    .long("kind")
                    .takes_value(true)
                    .required(true)
                    .possible_values(&["purchase", "sale"])
                    .help("Transaction kind"))
                .arg(Arg::with_name("date")
                    .long("date")
                    .takes_value(true)
                    .required(true)
                    .help("Transaction date, YYYY-MM-DD"))
                .arg(Arg::with_name("party")
                    .long("party")
                    .takes_value(true)
                    .required(true)
                    .help("Supplier or customer name"))
                .arg(Arg::with_name("quantity")
                    .long("quantity")
                    .takes_value(true)
                    .required(true)
                    .help("Grams of metal"))
                .arg(Arg::with_name("rate")
                    .long("rate")
                    .takes_value(true)
                    .required(true)
                    .help("Price per gram"))
                .arg(Arg::with_name("taxable")
                    .long("taxable")
                    .takes_value(true)
                    .help("Taxable amount, defaults to quantity x rate"))
                .arg(Arg::with_name("tax")
                    .long("tax")
                    .takes_value(true)
                    .help("Tax amount, defaults to 0"))
                .arg(Arg::with_name("total")
                    .long("total")
                    .takes_value(true)
                    .help("Invoice total, defaults to taxable plus tax")))
            .subcommand(SubCommand::with_name("import")
                .about("Imports a CSV sheet of transactions")
                .arg(Arg::with_name("input_path")
                    .short("i")
                    .long("input")
                    .takes_value(true)
                    .required(true)
                    .help("Transaction sheet to import")))
            .subcommand(SubCommand::with_name("delete")
                .about("Deletes transactions and recomputes the ledger")
                .arg(Arg::with_name("id")
                    .long("id")
                    .takes_value(true)
                    .multiple(true)
                    .required(true)
                    .help("Transaction id, may be given more than once")))
            .subcommand(SubCommand::with_name("summary")
                .about("Prints stock, valuation, and profit figures"))
            .subcommand(SubCommand::with_name("report")
                .about("Writes the CSV report set")
                .arg(Arg::with_name("output_dir")
                    .short("o")
                    .long("output")
                    .takes_value(true)
                    .default_value("reports")
                    .help("Directory to write reports into")))
            .subcommand(SubCommand::with_name("backup")
                .about("Writes a snapshot of the whole ledger")
                .arg(Arg::with_name("output_path")
                    .short("o")
                    .long("output")
                    .takes_value(true)
                    .required(true)
                    .help("Backup file to write")))
            .subcommand(SubCommand::with_name("restore")
                .about("Restores a snapshot, recomputing all derived state")
                .arg(Arg::with_name("input_path")
                    .short("i")
                    .long("input")
                    .takes_value(true)
                    .required(true)
                    .help("Backup file to read")))
            .subcommand(SubCommand::with_name("reset")
                .about("Clears the local store and the cloud copy"))
            .get_matches();

        let config_path = matches
            .value_of("config_path")
            .unwrap_or("config.yaml")
            .to_string();

        let command = match matches.subcommand() {
            ("add", Some(sub)) => Command::Add(AddArgs {
                kind: sub.value_of("kind").unwrap().to_string(),
                date: sub.value_of("date").unwrap().to_string(),
                party: sub.value_of("party").unwrap().to_string(),
                quantity: required_f64(sub, "quantity"),
                rate: required_f64(sub, "rate"),
                taxable_amount: optional_f64(sub, "taxable"),
                tax_amount: optional_f64(sub, "tax"),
                total_amount: optional_f64(sub, "total"),
            }),
            ("import", Some(sub)) => Command::Import {
                path: sub.value_of("input_path").unwrap().to_string(),
            },
            ("delete", Some(sub)) => Command::Delete {
                ids: sub
                    .values_of("id")
                    .unwrap()
                    .map(|id| id.to_string())
                    .collect(),
            },
            ("summary", _) => Command::Summary,
            ("report", Some(sub)) => Command::Report {
                dir: sub.value_of("output_dir").unwrap().to_string(),
            },
            ("backup", Some(sub)) => Command::Backup {
                path: sub.value_of("output_path").unwrap().to_string(),
            },
            ("restore", Some(sub)) => Command::Restore {
                path: sub.value_of("input_path").unwrap().to_string(),
            },
            ("reset", _) => Command::Reset,
            _ => {
                eprintln!("No command given; try --help");
                process::exit(1);
            }
        };

        App {
            config_path,
            command,
        }
    }
}

fn required_f64(matches: &ArgMatches, name: &str) -> f64 {
    let raw = matches.value_of(name).unwrap();
    raw.parse().unwrap_or_else(|_| {
        eprintln!("--{} expects a number, got {:?}", name, raw);
        process::exit(1);
    })
}

fn optional_f64(matches: &ArgMatches, name: &str) -> Option<f64> {
    matches.value_of(name).map(|raw| {
        raw.parse().unwrap_or_else(|_| {
            eprintln!("--{} expects a number, got {:?}", name, raw);
            process::exit(1);
        })
    })
}
