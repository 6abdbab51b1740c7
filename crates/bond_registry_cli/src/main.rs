//! `bond-registry` command-line entry point.
//!
//! # Responsibility
//! - Resolve database and logging configuration from flags and environment.
//! - Validate subscriber input before it reaches the core engine.
//! - Render results as JSON and map error classes to exit codes.
//!
//! # Exit codes
//! - `0` success.
//! - `1` server-fault class: store failures, corrupt records, bootstrap errors.
//! - `2` client-request class: bond exists / not found, invalid input.

mod cli;

use anyhow::{Context, Result};
use bond_registry_core::db::open_db;
use bond_registry_core::{
    default_log_level, init_logging, Bond, BondService, BondServiceError, RecordStore,
    SqliteRecordStore, Subscriber, SubscriberId, SubscriberValidationError,
};
use clap::Parser;
use cli::{Cli, Command, ListBy};
use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const EXIT_SERVER_FAULT: u8 = 1;
const EXIT_CLIENT_REQUEST: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(log_dir) = &cli.log_dir {
        let level = resolved_log_level(cli.log_level.as_deref());
        let log_dir = absolute(log_dir)?;
        init_logging(level, &log_dir.to_string_lossy()).map_err(anyhow::Error::msg)?;
    }

    if let Command::Ping = cli.command {
        println!("bond_registry_core ping={}", bond_registry_core::ping());
        println!("bond_registry_core version={}", bond_registry_core::core_version());
        return Ok(());
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open bond database `{}`", cli.db.display()))?;
    let service = BondService::new(SqliteRecordStore::new(&conn));
    info!(
        "event=cli_command module=cli status=start db={}",
        cli.db.display()
    );

    dispatch(&service, cli.command)
}

fn dispatch<S: RecordStore>(service: &BondService<S>, command: Command) -> Result<()> {
    match command {
        Command::Create(args) => {
            let bond = validated(args.into_bond())?;
            print_json(&service.create_bond(bond)?)
        }
        Command::Update(args) => {
            let keep_stored_subscribers = args.subscribers.is_empty();
            let mut bond = validated(args.into_bond())?;
            if keep_stored_subscribers {
                bond.subscribers = stored_subscribers(service, &bond.bond_id)?;
            }
            print_json(&service.update_bond(bond)?)
        }
        Command::Delete { bond_id } => {
            service.delete_bond(&bond_id)?;
            print_json(&serde_json::json!({ "deleted": bond_id }))
        }
        Command::Get { bond_id } => match service.get_bond(&bond_id)? {
            Some(bond) => print_json(&bond),
            None => Err(BondServiceError::BondNotFound { bond_id, sid: None }.into()),
        },
        Command::List { by, value } => {
            let bonds = match by {
                ListBy::HostCostCenter => service.get_bonds_by_host_cost_center(&value)?,
                ListBy::HostAccountId => service.get_bonds_by_host_account_id(&value)?,
                ListBy::SubCostCenter => service.get_bonds_by_sub_cost_center(&value)?,
                ListBy::SubAccountId => service.get_bonds_by_sub_account_id(&value)?,
            };
            print_json(&bonds)
        }
        Command::AddSubscriber {
            bond_id,
            sid,
            name,
            email,
        } => {
            let subscriber = Subscriber::new(sid, name, email);
            subscriber.validate()?;
            print_json(&service.add_subscriber(&bond_id, subscriber)?)
        }
        Command::RemoveSubscriber { bond_id, sid } => {
            print_json(&service.remove_subscriber(&bond_id, &sid)?)
        }
        Command::Ping => Ok(()),
    }
}

/// Subscribers currently stored on `bond_id`, for updates that leave them out.
fn stored_subscribers<S: RecordStore>(
    service: &BondService<S>,
    bond_id: &str,
) -> Result<BTreeMap<SubscriberId, Subscriber>, BondServiceError> {
    match service.get_bond(bond_id)? {
        Some(stored) => Ok(stored.subscribers),
        None => Err(BondServiceError::BondNotFound {
            bond_id: bond_id.to_string(),
            sid: None,
        }),
    }
}

fn validated(bond: Bond) -> Result<Bond, SubscriberValidationError> {
    for subscriber in bond.subscribers.values() {
        subscriber.validate()?;
    }
    Ok(bond)
}

fn resolved_log_level(requested: Option<&str>) -> &str {
    requested.unwrap_or(default_log_level())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<BondServiceError>() {
        return match err {
            BondServiceError::BondAlreadyExists { .. } | BondServiceError::BondNotFound { .. } => {
                EXIT_CLIENT_REQUEST
            }
            BondServiceError::Store(_) | BondServiceError::InvalidData(_) => EXIT_SERVER_FAULT,
        };
    }
    if err.downcast_ref::<SubscriberValidationError>().is_some() {
        return EXIT_CLIENT_REQUEST;
    }
    EXIT_SERVER_FAULT
}
