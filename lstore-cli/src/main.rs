//! In-process CLI driver for lstore-core: create tables, insert/update/
//! delete rows, and run select/sum/increment queries against an in-memory
//! `Database`, printing results to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lstore_core::config::StoreConfig;
use lstore_core::Database;

#[derive(Parser)]
#[command(name = "lstore")]
#[command(about = "In-memory columnar store with L-Store versioning")]
#[command(version)]
struct Cli {
    /// Page size in bytes for every table opened this run.
    #[arg(long, default_value = "4096")]
    page_size: usize,

    /// Cell width in bytes (signed, two's complement).
    #[arg(long, default_value = "8")]
    cell_width: usize,

    /// B+ tree minimum degree for every index created this run.
    #[arg(long, default_value = "128")]
    min_degree: usize,

    /// Store full-row snapshots on update instead of changed-columns only.
    #[arg(long)]
    cumulative: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// A script of commands to run, one per line, instead of a single
    /// subcommand (see README for the line grammar: create/insert/update/
    /// delete/select/sum/increment).
    #[arg(long)]
    script: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a table with `columns` data columns, primary key at
    /// `primary_key`.
    Create {
        name: String,
        columns: usize,
        primary_key: usize,
    },
    /// Insert one row of comma-separated integers.
    Insert { table: String, values: String },
    /// Print a row at its latest version, or `version` steps into its
    /// history (`0` = latest, negative = older).
    Select {
        table: String,
        key: i64,
        #[arg(default_value = "0")]
        version: i64,
    },
    /// Sum `column` over primary keys in `[start, end]`.
    Sum {
        table: String,
        start: i64,
        end: i64,
        column: usize,
        #[arg(default_value = "0")]
        version: i64,
    },
    /// Increment `column` by 1 for the row keyed by `key`.
    Increment { table: String, key: i64, column: usize },
    /// Delete the row keyed by `key`.
    Delete { table: String, key: i64 },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a tracing subscriber was already installed");
    }

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = StoreConfig {
        page_size: cli.page_size,
        cell_width: cli.cell_width,
        b_plus_tree_minimum_degree: cli.min_degree,
        lstore_is_cumulative: cli.cumulative,
        ..StoreConfig::default()
    };
    info!(page_size = cfg.page_size, cell_width = cfg.cell_width, "opening database");
    let mut db = Database::new(cfg);

    if let Some(script) = &cli.script {
        let contents = std::fs::read_to_string(script)?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            run_line(&mut db, line)?;
        }
        return Ok(());
    }

    match cli.command {
        Some(command) => dispatch(&mut db, command),
        None => {
            eprintln!("no command given (pass --script or a subcommand); see --help");
            Ok(())
        }
    }
}

fn run_line(db: &mut Database, line: &str) -> anyhow::Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let command = match parts.as_slice() {
        ["create", name, columns, primary_key] => Command::Create {
            name: name.to_string(),
            columns: columns.parse()?,
            primary_key: primary_key.parse()?,
        },
        ["insert", table, rest @ ..] => Command::Insert {
            table: table.to_string(),
            values: rest.join(","),
        },
        ["select", table, key] => Command::Select {
            table: table.to_string(),
            key: key.parse()?,
            version: 0,
        },
        ["select", table, key, version] => Command::Select {
            table: table.to_string(),
            key: key.parse()?,
            version: version.parse()?,
        },
        ["sum", table, start, end, column] => Command::Sum {
            table: table.to_string(),
            start: start.parse()?,
            end: end.parse()?,
            column: column.parse()?,
            version: 0,
        },
        ["increment", table, key, column] => Command::Increment {
            table: table.to_string(),
            key: key.parse()?,
            column: column.parse()?,
        },
        ["delete", table, key] => Command::Delete {
            table: table.to_string(),
            key: key.parse()?,
        },
        _ => anyhow::bail!("unrecognized script line: {line:?}"),
    };
    dispatch(db, command)
}

fn dispatch(db: &mut Database, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Create { name, columns, primary_key } => {
            db.create_table(&name, columns, primary_key)?;
            info!(table = %name, columns, primary_key, "table created");
            println!("created table {name} ({columns} columns, primary key {primary_key})");
        }
        Command::Insert { table, values } => {
            let values = parse_values(&values)?;
            let rid = db.get_table_mut(&table)?.insert(&values)?;
            tracing::debug!(table = %table, rid, "row inserted");
            println!("inserted rid {rid}");
        }
        Command::Select { table, key, version } => {
            let row = db.get_table_mut(&table)?.select_version(key, version)?;
            println!("{}", format_row(&row));
        }
        Command::Sum { table, start, end, column, version } => {
            let total = db
                .get_table_mut(&table)?
                .sum_version(start, end, column, version)?;
            println!("{total}");
        }
        Command::Increment { table, key, column } => {
            db.get_table_mut(&table)?.increment(key, column)?;
            tracing::debug!(table = %table, key, column, "column incremented");
            println!("incremented {table}[{key}].{column}");
        }
        Command::Delete { table, key } => {
            db.get_table_mut(&table)?.delete(key)?;
            tracing::debug!(table = %table, key, "row deleted");
            println!("deleted {table}[{key}]");
        }
    }
    Ok(())
}

fn parse_values(raw: &str) -> Result<Vec<i64>, std::num::ParseIntError> {
    raw.split(',').map(|v| v.trim().parse()).collect()
}

fn format_row(row: &[i64]) -> String {
    row.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}
