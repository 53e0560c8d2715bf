//! Psytrack command line.
//!
//! Usage:
//!   psytrack serve [--bind <addr>]
//!   psytrack import-patients <file.xlsx> [--aggressive] [--dry-run]
//!   psytrack import-doctors <file.xlsx> --district-id <id> [--dry-run]
//!   psytrack load-districts <file.json> --region-id <id> [--dry-run]
//!   psytrack create-account <username> --password <pw> [--full-name <name>]
//!   psytrack assign-role <username> <role> [--target-id <id>]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use psytrack_lib::authorization::{assign_role, RoleAssignment};
use psytrack_lib::config::{AppConfig, APP_VERSION};
use psytrack_lib::credentials::hash_password;
use psytrack_lib::db::repository::{get_account_by_username, insert_account};
use psytrack_lib::db::sqlite::open_database;
use psytrack_lib::import::{self, ImportOptions, ImportReport};

#[derive(Parser)]
#[command(name = "psytrack")]
#[command(version)]
#[command(about = "Psychiatric case-management records and examination monitoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (default from PSYTRACK_BIND or 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Import patients from a legacy workbook
    ImportPatients {
        file: PathBuf,

        /// Mark every imported patient as aggressive
        #[arg(long)]
        aggressive: bool,

        /// Validate everything, then roll back
        #[arg(long)]
        dry_run: bool,
    },

    /// Import doctors of one district from a workbook
    ImportDoctors {
        file: PathBuf,

        #[arg(long)]
        district_id: i64,

        #[arg(long)]
        dry_run: bool,
    },

    /// Load districts and neighborhoods from a JSON map
    LoadDistricts {
        /// JSON object: district name → list of neighborhood names
        file: PathBuf,

        #[arg(long)]
        region_id: i64,

        #[arg(long)]
        dry_run: bool,
    },

    /// Create a login account
    CreateAccount {
        username: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        full_name: Option<String>,
    },

    /// Give an account an administrative role
    AssignRole {
        username: String,

        role: RoleArg,

        /// District, region or neighborhood id the role is bound to
        #[arg(long)]
        target_id: Option<i64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    DistrictAdmin,
    RegionAdmin,
    NeighborhoodOfficer,
    /// Drop admin and officer links
    None,
}

impl RoleArg {
    fn assignment(self, target_id: Option<i64>) -> Result<RoleAssignment, String> {
        let target = || target_id.ok_or_else(|| "--target-id is required for this role".to_string());
        Ok(match self {
            RoleArg::DistrictAdmin => RoleAssignment::DistrictAdmin { district_id: target()? },
            RoleArg::RegionAdmin => RoleAssignment::RegionAdmin { region_id: target()? },
            RoleArg::NeighborhoodOfficer => RoleAssignment::NeighborhoodOfficer { neighborhood_id: target()? },
            RoleArg::None => RoleAssignment::None,
        })
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    psytrack_lib::init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, config: AppConfig) -> CliResult {
    match command {
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or(config.bind);
            tracing::info!("Psytrack starting v{APP_VERSION}");
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(psytrack_lib::api::serve(&config, addr))?;
        }
        Commands::ImportPatients { file, aggressive, dry_run } => {
            let conn = open_database(&config.db_path)?;
            let report = import::import_patients(&conn, &file, ImportOptions { aggressive, dry_run })?;
            print_report(&report);
        }
        Commands::ImportDoctors { file, district_id, dry_run } => {
            let conn = open_database(&config.db_path)?;
            print_report(&import::import_doctors(&conn, &file, district_id, dry_run)?);
        }
        Commands::LoadDistricts { file, region_id, dry_run } => {
            let conn = open_database(&config.db_path)?;
            print_report(&import::load_districts(&conn, &file, region_id, dry_run)?);
        }
        Commands::CreateAccount { username, password, full_name } => {
            let conn = open_database(&config.db_path)?;
            let id = insert_account(&conn, username.trim(), &hash_password(&password)?, full_name.as_deref(), None)?;
            println!("created account {username} (id {id})");
        }
        Commands::AssignRole { username, role, target_id } => {
            let assignment = role.assignment(target_id)?;
            let conn = open_database(&config.db_path)?;
            let account = get_account_by_username(&conn, &username)?
                .ok_or_else(|| format!("no account named {username}"))?;
            let role = assign_role(&conn, account.id, assignment)?;
            println!("{username} is now {}", role.kind());
        }
    }
    Ok(())
}

fn print_report(report: &ImportReport) {
    let verb = if report.dry_run { "would import" } else { "imported" };
    println!("{verb} {} rows", report.imported);
    for username in &report.created_accounts {
        println!("created account {username}; reset its password before use");
    }
}
