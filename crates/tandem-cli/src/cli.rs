//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tandem - Compare two datasets and explain the differences
#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Dual-dataset insight engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tandem.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TANDEM_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Load a dataset from a JSON file
    ///
    /// The file holds one dataset: id, ownerId, name, schemaMapping,
    /// aiConfig and rows tagged with "_sourceGroup" ("groupA" or "groupB").
    Load {
        /// JSON dataset file
        #[arg(short, long)]
        file: PathBuf,

        /// Owner user id (overrides ownerId in the file)
        #[arg(long)]
        owner: Option<String>,

        /// Dataset id (overrides id in the file)
        #[arg(long)]
        id: Option<String>,
    },

    /// List datasets owned by a user
    Datasets {
        /// Owner user id
        #[arg(short, long)]
        user: String,
    },

    /// Generate insights for a dataset
    Insights {
        /// Dataset id
        dataset: String,

        /// Requesting user id
        #[arg(short, long)]
        user: String,

        /// Categorical filter as field=value1,value2 (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Ask the AI backend for a narrative comparison
    Summary {
        /// Dataset id
        dataset: String,

        /// Requesting user id
        #[arg(short, long)]
        user: String,

        /// Categorical filter as field=value1,value2 (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable API key authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, every API request needs a key from TANDEM_API_KEYS.
        #[arg(long)]
        no_auth: bool,
    },

    /// Manage AI prompts (list, show, path)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., generate_insights, summarize_dataset)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
