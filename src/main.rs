//! # Corpus Bridge CLI (`cbr`)
//!
//! The `cbr` binary is the primary interface for Corpus Bridge. It provides
//! commands for database initialization, credential and store management,
//! content-event ingestion, backfill, search, chat, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! cbr --config ./config/cbr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cbr init` | Create the SQLite database and run schema migrations |
//! | `cbr status` | Show credential, store, model, and mirror status |
//! | `cbr credential set` | Store the provider API key (encrypted at rest) |
//! | `cbr store create` | Create the File Search store |
//! | `cbr model list` / `set` | Inspect or choose the generation model |
//! | `cbr types list` / `set` | Inspect or choose the indexable content types |
//! | `cbr ingest <file>` | Replay content events from a JSON file |
//! | `cbr backfill` | Push existing published content page by page |
//! | `cbr search "<query>"` | FTS autocomplete against the local mirror |
//! | `cbr chat` | Interactive grounded chat |
//! | `cbr token <action>` | Print the request token for an API action |
//! | `cbr serve` | Start the HTTP API server |
//! | `cbr purge` | Delete all local data |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! cbr init --config ./config/cbr.toml
//!
//! # Store the API key and create the remote store
//! cbr credential set --config ./config/cbr.toml
//! cbr store create --name WebsiteSearch --config ./config/cbr.toml
//!
//! # Choose which content types get pushed
//! cbr types set post page --config ./config/cbr.toml
//!
//! # Replay content events, then backfill the rest of the corpus
//! cbr ingest events.json --config ./config/cbr.toml
//! cbr backfill --all --config ./config/cbr.toml
//!
//! # Autocomplete and chat
//! cbr search "widget" --config ./config/cbr.toml
//! cbr chat --config ./config/cbr.toml
//!
//! # Start the HTTP API
//! cbr serve --config ./config/cbr.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use corpus_bridge::{admin, chat, config, ingest, migrate, search, server, sync};

/// Corpus Bridge CLI — sync CMS content into a Gemini File Search corpus
/// and serve AI search and chat on top of it.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cbr.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cbr",
    about = "Corpus Bridge — sync CMS content into a File Search corpus and serve AI search on top",
    version,
    long_about = "Corpus Bridge mirrors published CMS content into a local SQLite database, \
    transforms it to Markdown, and keeps a Gemini File Search store in lockstep as content is \
    saved and deleted. It serves FTS5-backed autocomplete and grounded chat answers with cited \
    sources via a CLI and an HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cbr.toml`. Database, server, provider, and
    /// sync settings are read from this file.
    #[arg(long, global = true, default_value = "./config/cbr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (content_items, remote_documents, settings, content_fts).
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Show credential, store, model, and mirror status.
    ///
    /// Reports whether an API key is stored, which File Search store and
    /// model are selected, the indexable content types, and how many items
    /// are mirrored and mapped to remote documents.
    Status,

    /// Manage the provider API key.
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },

    /// Manage the File Search store.
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Inspect or choose the generation model.
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Inspect or choose the indexable content types.
    ///
    /// Only items whose type is in this list are pushed to the File Search
    /// store. Items of other types are still mirrored locally.
    Types {
        #[command(subcommand)]
        action: TypesAction,
    },

    /// Replay content events from a JSON file.
    ///
    /// The file holds an array of `saved` / `deleted` events. Each event is
    /// applied the same way the HTTP `/events` endpoint applies it: the
    /// local mirror is updated and the remote store kept in lockstep.
    Ingest {
        /// Path to the events JSON file.
        file: PathBuf,
    },

    /// Push existing published content to the File Search store.
    ///
    /// Processes indexable published items page by page. Each item is
    /// transformed to Markdown and uploaded; a previously uploaded document
    /// for the same item is deleted first. Per-item failures are counted,
    /// not fatal.
    Backfill {
        /// Page to start from (1-based).
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Process every remaining page instead of stopping after one.
        #[arg(long)]
        all: bool,
    },

    /// Autocomplete search against the local mirror.
    ///
    /// Queries the FTS5 index over published, indexable content and prints
    /// up to ten matching titles with their URLs. The query must be
    /// between 3 and 50 characters.
    Search {
        /// The search query string.
        query: String,
    },

    /// Interactive grounded chat.
    ///
    /// Reads questions from stdin, answers them with the configured model
    /// grounded in the File Search store, and prints cited sources. An
    /// empty line exits.
    Chat,

    /// Print the request token for an HTTP API action.
    ///
    /// Actions: `search`, `chat`, `events`, `backfill`. Tokens are derived
    /// from the server secret; clients pass them in request bodies.
    Token {
        /// API action name.
        action: String,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// search, chat, events, and backfill endpoints.
    Serve,

    /// Delete all local data.
    ///
    /// Clears settings (including the encrypted API key), the content
    /// mirror, the FTS index, and the remote-document mappings. Remote
    /// documents are not touched.
    Purge {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// Credential management subcommands.
#[derive(Subcommand)]
enum CredentialAction {
    /// Store the provider API key, encrypted at rest.
    ///
    /// Reads the key from the argument if given, otherwise from stdin.
    Set {
        /// The API key. Omit to read from stdin.
        value: Option<String>,
    },
    /// Remove the stored API key.
    Clear,
}

/// Store management subcommands.
#[derive(Subcommand)]
enum StoreAction {
    /// Create a File Search store and record its name.
    ///
    /// Refuses to replace an existing store unless `--force` is given,
    /// since documents uploaded to the old store would be orphaned.
    Create {
        /// Display name for the store. A timestamp suffix is appended.
        #[arg(long, default_value = "WebsiteSearch")]
        name: String,

        /// Replace an already-configured store.
        #[arg(long)]
        force: bool,
    },
}

/// Model management subcommands.
#[derive(Subcommand)]
enum ModelAction {
    /// List available models, marking the selected one.
    List,
    /// Select the generation model.
    Set {
        /// Model name, as shown by `cbr model list`.
        name: String,
    },
}

/// Content-type management subcommands.
#[derive(Subcommand)]
enum TypesAction {
    /// List the indexable content types.
    List,
    /// Replace the indexable content types.
    Set {
        /// Type names (e.g. `post page`).
        types: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Status => {
            admin::run_status(&cfg).await?;
        }
        Commands::Credential { action } => match action {
            CredentialAction::Set { value } => {
                admin::run_credential_set(&cfg, value).await?;
            }
            CredentialAction::Clear => {
                admin::run_credential_clear(&cfg).await?;
            }
        },
        Commands::Store { action } => match action {
            StoreAction::Create { name, force } => {
                admin::run_store_create(&cfg, &name, force).await?;
            }
        },
        Commands::Model { action } => match action {
            ModelAction::List => {
                admin::run_model_list(&cfg).await?;
            }
            ModelAction::Set { name } => {
                admin::run_model_set(&cfg, &name).await?;
            }
        },
        Commands::Types { action } => match action {
            TypesAction::List => {
                admin::run_types_list(&cfg).await?;
            }
            TypesAction::Set { types } => {
                admin::run_types_set(&cfg, types).await?;
            }
        },
        Commands::Ingest { file } => {
            ingest::run_ingest(&cfg, &file).await?;
        }
        Commands::Backfill { page, all } => {
            sync::run_backfill(&cfg, page, all).await?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Token { action } => {
            admin::run_token(&cfg, &action)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Purge { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete all local data without --yes");
            }
            migrate::run_purge(&cfg).await?;
            println!("All local data deleted.");
        }
    }

    Ok(())
}
