//! Command-line entry point.
//!
//! # Responsibility
//! - Wire a connection string to a person repository.
//! - Run the create-then-list walkthrough and print the stored rows.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use persondb_core::db::schema::ensure_users_table;
use persondb_core::{
    connect, default_log_level, init_logging, LogTarget, Person, PersonRepository, PersonStore,
    RepoConfig, SqlitePersonRepository,
};

const DEFAULT_DSN: &str = "path=persondb.sqlite3 mode=rwc connect_timeout=5 foreign_keys=on";

#[derive(Parser)]
#[command(name = "persondb")]
#[command(about = "Create a person record and list every stored person")]
#[command(version)]
struct Cli {
    /// Connection string: a database path or `key=value` pairs
    #[arg(long, env = "PERSONDB_DSN", default_value = DEFAULT_DSN)]
    dsn: String,
    /// Upper bound in seconds for each repository call
    #[arg(long, default_value_t = 5)]
    statement_timeout_secs: u64,
    /// trace|debug|info|warn|error (defaults by build mode)
    #[arg(long, env = "PERSONDB_LOG_LEVEL")]
    log_level: Option<String>,
    /// Write rolling log files here instead of stderr (absolute path)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn log_level(cli: &Cli) -> &str {
    cli.log_level.as_deref().unwrap_or(default_log_level())
}

fn run(cli: Cli) -> Result<()> {
    let level = log_level(&cli).to_owned();
    let target = cli.log_dir.map_or(LogTarget::Stderr, LogTarget::Directory);
    init_logging(&level, target).map_err(anyhow::Error::msg)?;

    let conn = connect(&cli.dsn).context("failed to connect to database")?;
    ensure_users_table(&conn).context("failed to prepare users table")?;

    let config =
        RepoConfig::with_statement_timeout(Duration::from_secs(cli.statement_timeout_secs));
    let repo = SqlitePersonRepository::with_config(conn, config)
        .context("failed to construct repository")?;

    repo.create(&Person::new(1, "Otabek", "otabek94_30@mail.ru"))
        .context("failed to create person 1")?;

    let people = repo.find().context("failed to list people")?;
    info!("event=cli_list module=cli status=ok count={}", people.len());
    for person in &people {
        println!("{}\t{}\t{}", person.id, person.name, person.email);
    }

    repo.close().context("failed to close database")?;
    Ok(())
}
