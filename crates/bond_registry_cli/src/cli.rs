//! Argument definitions for the `bond-registry` command.
//!
//! Parsing only; dispatch lives in `main.rs`.

use bond_registry_core::{Bond, Subscriber};
use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "bond-registry",
    version = env!("CARGO_PKG_VERSION"),
    about = "Manage charge-back bonds between host and subscriber accounts."
)]
pub(crate) struct Cli {
    /// SQLite database file holding the bond table.
    #[clap(long, env = "BOND_REGISTRY_DB", default_value = "bond_registry.sqlite3")]
    pub db: PathBuf,
    /// trace|debug|info|warn|error. Defaults to debug in debug builds, info otherwise.
    #[clap(long, env = "BOND_REGISTRY_LOG_LEVEL")]
    pub log_level: Option<String>,
    /// Directory for rolling log files. Logging is off when unset.
    #[clap(long, env = "BOND_REGISTRY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create a bond; fails if the bond id is taken.
    Create(BondArgs),
    /// Overwrite the fields of an existing bond.
    ///
    /// Without `--subscriber` the stored subscribers are kept.
    Update(BondArgs),
    /// Delete a bond. Succeeds when the bond is already gone.
    Delete {
        #[clap(value_parser = NonEmptyStringValueParser::new())]
        bond_id: String,
    },
    /// Print one bond.
    Get {
        #[clap(value_parser = NonEmptyStringValueParser::new())]
        bond_id: String,
    },
    /// List bonds sharing an account or cost center.
    List {
        #[clap(long, value_enum)]
        by: ListBy,
        value: String,
    },
    /// Add a subscriber to a bond, replacing one with the same sid.
    AddSubscriber {
        #[clap(value_parser = NonEmptyStringValueParser::new())]
        bond_id: String,
        #[clap(long)]
        sid: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        email: String,
    },
    /// Remove a subscriber from a bond.
    RemoveSubscriber {
        #[clap(value_parser = NonEmptyStringValueParser::new())]
        bond_id: String,
        sid: String,
    },
    /// Check that the core library is linked.
    Ping,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ListBy {
    HostCostCenter,
    HostAccountId,
    SubCostCenter,
    SubAccountId,
}

#[derive(clap::Args, Debug)]
pub(crate) struct BondArgs {
    #[clap(long, value_parser = NonEmptyStringValueParser::new())]
    pub bond_id: String,
    #[clap(long, value_parser = NonEmptyStringValueParser::new())]
    pub host_account_id: String,
    #[clap(long, value_parser = NonEmptyStringValueParser::new())]
    pub sub_account_id: String,
    #[clap(long, value_parser = NonEmptyStringValueParser::new())]
    pub host_cost_center: String,
    #[clap(long, value_parser = NonEmptyStringValueParser::new())]
    pub sub_cost_center: String,
    /// Subscriber as `sid,name,email`; repeat for several. On `update`,
    /// any given subscribers replace the stored set.
    #[clap(long = "subscriber", value_parser = parse_subscriber)]
    pub subscribers: Vec<Subscriber>,
}

impl BondArgs {
    pub fn into_bond(self) -> Bond {
        let bond = Bond::new(
            self.bond_id,
            self.host_account_id,
            self.sub_account_id,
            self.host_cost_center,
            self.sub_cost_center,
        );
        self.subscribers
            .into_iter()
            .fold(bond, Bond::with_subscriber_added)
    }
}

fn parse_subscriber(value: &str) -> Result<Subscriber, String> {
    let mut parts = value.splitn(3, ',').map(str::trim);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(sid), Some(name), Some(email)) => Ok(Subscriber::new(sid, name, email)),
        _ => Err(format!("expected `sid,name,email`, got `{value}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_subscriber, Cli, Command, ListBy};
    use clap::Parser;

    #[test]
    fn parses_subscriber_triplets() {
        let sub = parse_subscriber("u1, Ann Lee ,ann@example.com").unwrap();
        assert_eq!(sub.sid, "u1");
        assert_eq!(sub.name, "Ann Lee");
        assert_eq!(sub.email, "ann@example.com");
        assert!(parse_subscriber("u1,Ann").is_err());
    }

    #[test]
    fn create_collects_repeated_subscribers() {
        let cli = Cli::try_parse_from([
            "bond-registry",
            "--db",
            "/tmp/bonds.sqlite3",
            "create",
            "--bond-id",
            "b1",
            "--host-account-id",
            "H1",
            "--sub-account-id",
            "S1",
            "--host-cost-center",
            "red",
            "--sub-cost-center",
            "blue",
            "--subscriber",
            "u1,A,a@x.com",
            "--subscriber",
            "u2,B,b@x.com",
        ])
        .unwrap();

        let Command::Create(args) = cli.command else {
            panic!("expected create command");
        };
        let bond = args.into_bond();
        assert_eq!(bond.bond_id, "b1");
        assert_eq!(bond.subscribers.len(), 2);
    }

    #[test]
    fn list_requires_known_index() {
        let cli = Cli::try_parse_from(["bond-registry", "list", "--by", "sub-cost-center", "blue"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::List { by: ListBy::SubCostCenter, ref value } if value == "blue"
        ));

        assert!(Cli::try_parse_from(["bond-registry", "list", "--by", "colour", "blue"]).is_err());
    }

    #[test]
    fn empty_bond_id_is_rejected() {
        assert!(Cli::try_parse_from(["bond-registry", "get", ""]).is_err());
    }
}
