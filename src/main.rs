use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use slack_reconcile::{
    app::{apply, Manifest, Reconciler},
    cli::{Args, Commands, DestroyCommand, LookupCommand},
    config::ProviderConfig,
    core::{ConversationQuery, GroupQuery},
    remote::SlackHttpClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ProviderConfig::new(&args.token, Duration::from_secs(args.retry_timeout))?;
    let client = SlackHttpClient::new(&config.token).context("Failed to build HTTP client")?;
    let reconciler = Reconciler::new(Arc::new(client), config.retry);

    let cancel = reconciler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending operations");
            cancel.cancel();
        }
    });

    match args.command {
        Commands::Apply { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let manifest = Manifest::from_json(&text)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            info!(
                "Applying {} conversation(s) and {} usergroup(s) from {}",
                manifest.conversations.len(),
                manifest.usergroups.len(),
                file.display()
            );
            let report = apply(&reconciler, &manifest).await?;
            print_json(&report)?;
            if report.failures() > 0 {
                anyhow::bail!("{} entity(ies) failed to reconcile", report.failures());
            }
        }
        Commands::Lookup(LookupCommand::User(query)) => {
            let account = match (query.email, query.name) {
                (Some(email), _) => reconciler.user_by_email(&email).await?,
                (None, Some(name)) => reconciler.user_by_name(&name).await?,
                (None, None) => anyhow::bail!("either --email or --name is required"),
            };
            print_json(&account)?;
        }
        Commands::Lookup(LookupCommand::Conversation { id, name, private }) => {
            let query = match (id, name) {
                (Some(id), _) => ConversationQuery::Id(id),
                (None, Some(name)) => ConversationQuery::Name {
                    name,
                    is_private: private,
                },
                (None, None) => anyhow::bail!("either --id or --name is required"),
            };
            print_json(&reconciler.conversation(&query).await?)?;
        }
        Commands::Lookup(LookupCommand::Usergroup { id, name }) => {
            let query = match (id, name) {
                (Some(id), _) => GroupQuery::Id(id),
                (None, Some(name)) => GroupQuery::Name(name),
                (None, None) => anyhow::bail!("either --id or --name is required"),
            };
            print_json(&reconciler.usergroup(&query).await?)?;
        }
        Commands::Destroy(DestroyCommand::Conversation { id, action }) => {
            reconciler.destroy_conversation(&id, action.into()).await?;
        }
        Commands::Destroy(DestroyCommand::Usergroup { id }) => {
            reconciler.disable_group(&id).await?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{text}");
    Ok(())
}
