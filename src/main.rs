use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use shipment_registry::{
    config::Config,
    gateway::JsonRpcGateway,
    presenter::{Intent, Notification, PresentationAdapter, StatusLabels, user_message},
    registry::ShipmentRegistryClient,
    store::SyncStore,
};

#[derive(Debug, Parser)]
#[command(name = "shipment-registry", about = "View and create shipments on the ledger registry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load every shipment and print the dashboard
    List,
    /// Look up a single shipment by id
    Show { id: String },
    /// Create a shipment from the active account
    Create {
        #[arg(long)]
        receiver: String,
        #[arg(long)]
        product: String,
    },
    /// Interactive session keeping one local snapshot
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    let gateway = Arc::new(JsonRpcGateway::new(config.clone()));
    let registry = match ShipmentRegistryClient::connect(gateway).await {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            eprintln!("{}", user_message(&e));
            std::process::exit(1);
        }
    };

    println!("Network: {}", registry.connection().network_id);
    println!("Account: {}", registry.active_account());
    println!("================================");

    let store = Arc::new(SyncStore::new(registry));
    let adapter = PresentationAdapter::new(store, StatusLabels::new(config.status_labels.clone()));

    let ok = match cli.command {
        Command::List => {
            let notification = adapter.dispatch(Intent::Load).await;
            report(&notification);
            if !notification.is_error() {
                print!("{}", adapter.view());
            }
            !notification.is_error()
        }
        Command::Show { id } => {
            let notification = adapter.dispatch(Intent::Inspect { id }).await;
            report(&notification);
            !notification.is_error()
        }
        Command::Create { receiver, product } => {
            let notification = adapter
                .dispatch(Intent::Create {
                    receiver,
                    product_details: product,
                })
                .await;
            report(&notification);
            !notification.is_error()
        }
        Command::Shell => run_shell(&adapter).await?,
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

fn report(notification: &Notification) {
    if notification.is_error() {
        eprintln!("{}", notification);
    } else {
        println!("{}", notification);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Dispatch(Intent),
    View,
    Help,
    Quit,
    Unknown(String),
}

fn parse_shell_line(line: &str) -> Option<ShellCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match word {
        "load" => ShellCommand::Dispatch(Intent::Load),
        "view" => ShellCommand::View,
        "show" => ShellCommand::Dispatch(Intent::Inspect {
            id: rest.to_string(),
        }),
        "create" => {
            let (receiver, product_details) =
                rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            ShellCommand::Dispatch(Intent::Create {
                receiver: receiver.to_string(),
                product_details: product_details.trim().to_string(),
            })
        }
        "help" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => ShellCommand::Unknown(other.to_string()),
    };

    Some(command)
}

const SHELL_HELP: &str = "\
commands:
  load                          reload all shipments from the ledger
  view                          print the last loaded snapshot
  show <id>                     fetch one shipment
  create <receiver> <details>   create a shipment from the active account
  quit";

async fn run_shell(adapter: &PresentationAdapter) -> Result<bool> {
    println!("{}", SHELL_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(true);
        };

        match parse_shell_line(&line) {
            None => continue,
            Some(ShellCommand::Quit) => return Ok(true),
            Some(ShellCommand::Help) => println!("{}", SHELL_HELP),
            Some(ShellCommand::View) => print!("{}", adapter.view()),
            Some(ShellCommand::Unknown(word)) => {
                println!("unknown command {:?}, try `help`", word)
            }
            Some(ShellCommand::Dispatch(intent)) => {
                let load = intent == Intent::Load;
                let notification = adapter.dispatch(intent).await;
                report(&notification);
                if notification.fatal {
                    return Ok(false);
                }
                if load && !notification.is_error() {
                    print!("{}", adapter.view());
                }
            }
        }
    }
}
