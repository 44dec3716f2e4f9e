use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use lendit::config::Config;
use lendit::engine::{BookingFilter, Engine, EngineError};
use lendit::model::{ItemPatch, Ms, Page, UserId};
use lendit::store::{compact_if_due, InMemoryStore};

#[derive(Parser)]
#[command(name = "lendit", about = "Peer-to-peer item lending")]
struct Cli {
    /// Acting user.
    #[arg(long, global = true, env = "LENDIT_USER", default_value_t = 0)]
    user: UserId,

    #[arg(long, global = true, env = "LENDIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Reject creating or approving a booking that overlaps an already approved one.
    #[arg(long, global = true)]
    reject_overlaps: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(subcommand)]
    Item(ItemCommand),
    #[command(subcommand)]
    Booking(BookingCommand),
    #[command(subcommand)]
    Comment(CommentCommand),
    /// Rewrite the log down to the current state.
    Compact,
}

#[derive(Subcommand)]
enum ItemCommand {
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        unavailable: bool,
    },
    Update {
        id: Ulid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        available: Option<bool>,
    },
    Show {
        id: Ulid,
    },
    /// Items listed by the acting user.
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    Search {
        text: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum BookingCommand {
    Create {
        item: Ulid,
        /// Unix milliseconds.
        #[arg(long)]
        start: Ms,
        #[arg(long)]
        end: Ms,
    },
    Approve {
        id: Ulid,
        /// Reject instead of approving.
        #[arg(long)]
        reject: bool,
    },
    Show {
        id: Ulid,
    },
    List {
        #[arg(long, value_enum, default_value_t = Role::Booker)]
        role: Role,
        #[arg(long, default_value = "ALL")]
        state: BookingFilter,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum CommentCommand {
    Add { item: Ulid, text: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Booker,
    Owner,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long)]
    from: Option<usize>,
    #[arg(long)]
    size: Option<usize>,
}

impl PageArgs {
    fn page(&self) -> Option<Page> {
        match (self.from, self.size) {
            (None, None) => None,
            (from, size) => Some(Page::new(from.unwrap_or(0), size.unwrap_or(20))),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), EngineError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Storage(format!("encoding output: {e}")))?;
    println!("{out}");
    Ok(())
}

async fn run(engine: &Engine, user: UserId, command: Command) -> Result<(), EngineError> {
    match command {
        Command::Item(cmd) => match cmd {
            ItemCommand::Add {
                name,
                description,
                unavailable,
            } => print_json(&engine.create_item(user, name, description, !unavailable).await?),
            ItemCommand::Update {
                id,
                name,
                description,
                available,
            } => {
                let patch = ItemPatch {
                    name,
                    description,
                    available,
                };
                print_json(&engine.update_item(id, user, patch).await?)
            }
            ItemCommand::Show { id } => print_json(&engine.get_item(id, user).await?),
            ItemCommand::List { page } => {
                print_json(&engine.list_owner_items(user, page.page()).await?)
            }
            ItemCommand::Search { text, page } => {
                print_json(&engine.search_items(&text, page.page()).await?)
            }
        },
        Command::Booking(cmd) => match cmd {
            BookingCommand::Create { item, start, end } => {
                print_json(&engine.create_booking(user, item, start, end).await?)
            }
            BookingCommand::Approve { id, reject } => {
                print_json(&engine.approve_booking(id, user, !reject).await?)
            }
            BookingCommand::Show { id } => print_json(&engine.get_booking(id, user).await?),
            BookingCommand::List { role, state, page } => {
                let rows = match role {
                    Role::Booker => engine.list_booker_bookings(user, state, page.page()).await?,
                    Role::Owner => engine.list_owner_bookings(user, state, page.page()).await?,
                };
                print_json(&rows)
            }
        },
        Command::Comment(CommentCommand::Add { item, text }) => {
            print_json(&engine.add_comment(user, item, text).await?)
        }
        Command::Compact => engine.store().compact_wal().await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.reject_overlaps {
        config.engine.reject_overlaps = true;
    }

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        eprintln!("storage: cannot create {}: {e}", config.data_dir.display());
        return ExitCode::FAILURE;
    }
    let wal_path = config.wal_path();
    let store = match InMemoryStore::open(&wal_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("storage: cannot open {}: {e}", wal_path.display());
            return ExitCode::FAILURE;
        }
    };
    info!("data_dir: {}", config.data_dir.display());

    let engine = Engine::new(store.clone(), config.engine);
    match run(&engine, cli.user, cli.command).await {
        Ok(()) => {
            if compact_if_due(&store, config.compact_threshold).await {
                info!("compacted {}", wal_path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn reject_overlaps_help_covers_both_operations() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "reject_overlaps")
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        assert!(help.contains("creating"));
        assert!(help.contains("approving"));

        let cli = Cli::try_parse_from(["lendit", "--reject-overlaps", "compact"]).unwrap();
        assert!(cli.reject_overlaps);
    }
}
