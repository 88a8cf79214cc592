use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use crate::core::ActionOnDestroy;
use crate::retry::DEFAULT_RETRY_TIMEOUT_SECS;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Bot or user token for the workspace
    #[arg(short = 't', long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Retry budget per remote operation, in seconds
    #[arg(long, env = "SLACK_RETRY_TIMEOUT", default_value_t = DEFAULT_RETRY_TIMEOUT_SECS)]
    pub retry_timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Commands {
    /// Reconcile every entity in a desired-state JSON document
    Apply { file: PathBuf },
    #[command(subcommand)]
    Lookup(LookupCommand),
    #[command(subcommand)]
    Destroy(DestroyCommand),
}

#[derive(Debug, Subcommand, Clone)]
pub enum LookupCommand {
    /// Find an account by email or by exact user name
    User(UserLookup),
    /// Find a conversation by id or by name
    Conversation {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Search private conversations (with --name)
        #[arg(long)]
        private: bool,
    },
    /// Find an enabled user group by id or by name
    Usergroup {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, ClapArgs, Clone)]
#[group(required = true, multiple = false)]
pub struct UserLookup {
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum DestroyCommand {
    Conversation {
        id: String,
        #[arg(long, value_enum, default_value_t = DestroyAction::Archive)]
        action: DestroyAction,
    },
    /// Disable a user group
    Usergroup { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DestroyAction {
    None,
    Archive,
}

impl From<DestroyAction> for ActionOnDestroy {
    fn from(action: DestroyAction) -> Self {
        match action {
            DestroyAction::None => ActionOnDestroy::None,
            DestroyAction::Archive => ActionOnDestroy::Archive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_parses_with_defaults() {
        let args = Args::try_parse_from([
            "slack-reconcile",
            "--token",
            "xoxb-1",
            "apply",
            "desired.json",
        ])
        .unwrap();
        assert_eq!(args.token, "xoxb-1");
        assert_eq!(args.retry_timeout, 60);
        assert!(matches!(
            args.command,
            Commands::Apply { ref file } if file.ends_with("desired.json")
        ));
    }

    #[test]
    fn user_lookup_needs_exactly_one_key() {
        let both = [
            "slack-reconcile",
            "-t",
            "x",
            "lookup",
            "user",
            "--email",
            "a@b.c",
            "--name",
            "a",
        ];
        assert!(Args::try_parse_from(both).is_err());
        assert!(Args::try_parse_from(["slack-reconcile", "-t", "x", "lookup", "user"]).is_err());
        let args = Args::try_parse_from([
            "slack-reconcile",
            "-t",
            "x",
            "lookup",
            "user",
            "--name",
            "alice",
        ])
        .unwrap();
        assert!(matches!(
            args.command,
            Commands::Lookup(LookupCommand::User(UserLookup {
                name: Some(_),
                email: None
            }))
        ));
    }

    #[test]
    fn destroy_conversation_defaults_to_archive() {
        let args =
            Args::try_parse_from(["slack-reconcile", "-t", "x", "destroy", "conversation", "C1"])
                .unwrap();
        match args.command {
            Commands::Destroy(DestroyCommand::Conversation { id, action }) => {
                assert_eq!(id, "C1");
                assert_eq!(ActionOnDestroy::from(action), ActionOnDestroy::Archive);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
