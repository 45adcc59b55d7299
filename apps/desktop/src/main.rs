use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, ClientCore};
use shared::{
    domain::{PermissionSet, ScreenKey},
    error::ErrorReport,
    protocol::{EventContext, ScreenEvent},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Permission held by the current user; repeatable.
    #[arg(long = "permission", global = true)]
    permissions: Vec<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the menu from a payload file as the current user sees it.
    Menu { file: PathBuf },
    /// List the screens with a registered contract.
    Screens,
    /// Run one screen event and print its result.
    Event {
        screen: String,
        /// load_data, refresh, load_more, submit, delete, back, or a custom id.
        event: String,
        /// Form field as name=value; repeatable.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        #[arg(long)]
        item_id: Option<String>,
    },
}

fn parse_field(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=value, got '{raw}'"))?;
    Ok((name.trim().to_string(), value.to_string()))
}

fn parse_event(id: &str) -> ScreenEvent {
    match id {
        "load_data" => ScreenEvent::LoadData,
        "refresh" => ScreenEvent::Refresh,
        "load_more" => ScreenEvent::LoadMore,
        "submit" => ScreenEvent::Submit,
        "delete" => ScreenEvent::Delete,
        "back" => ScreenEvent::Back,
        other => ScreenEvent::custom(other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, settings_error) = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .init();
    if let Some(err) = settings_error {
        warn!("ignoring settings file: {err:#}");
    }
    let cli = Cli::parse();

    let core = ClientCore::start(settings).await?;
    let permissions: PermissionSet = cli.permissions.iter().map(String::as_str).collect();
    core.set_permissions(permissions).await?;

    let outcome = run(&core, cli.command).await;
    core.shutdown().await?;
    outcome
}

async fn run(core: &ClientCore, command: Command) -> Result<()> {
    match command {
        Command::Menu { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read menu payload {}", file.display()))?;
            core.apply_menu_payload(&raw).await?;
            let snapshot = core.menu().snapshot().await?;
            info!(revision = snapshot.revision, "menu filtered");
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Screens => {
            for key in core.registry().screen_keys() {
                println!("{key}");
            }
        }
        Command::Event {
            screen,
            event,
            fields,
            item_id,
        } => {
            let screen_key = ScreenKey::new(screen);
            let mut context = EventContext::for_screen(screen_key.clone());
            for (name, value) in fields {
                context = context.with_field(name, value);
            }
            if let Some(item_id) = item_id {
                context = context.with_item_id(item_id);
            }

            match core
                .handle_screen_event(screen_key, parse_event(&event), context)
                .await
            {
                Ok(Some(result)) => println!("{}", serde_json::to_string_pretty(&result)?),
                Ok(None) => println!("null"),
                Err(err) => {
                    println!("{}", serde_json::to_string_pretty(&ErrorReport::from(&err))?);
                    return Err(err.into());
                }
            }
        }
    }
    Ok(())
}
