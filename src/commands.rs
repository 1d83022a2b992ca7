//! Command-line interface definition using `clap`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Write a starter configuration file and create the data directories.
    Init,

    /// Build the vector index from a folder of documents.
    ///
    /// Defaults to the configured documents directory when no folder is
    /// given. Running it again appends the folder's content to the index.
    Ingest {
        /// Folder to ingest instead of the configured documents directory.
        #[arg(long)]
        folder: Option<PathBuf>,
    },

    /// Add a single document to an existing index.
    Add {
        /// The file to index.
        file: PathBuf,
    },

    /// Ask one question and stream the answer.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question to be asked.
        question: String,

        /// Produce a structured report instead of a conversational answer.
        #[arg(long)]
        report: bool,

        /// Use the standard-tier model instead of the premium one.
        #[arg(long)]
        standard: bool,

        /// Session to continue; a fresh session is used when omitted.
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },

    /// Start an interactive question loop. Type 'exit' to leave.
    #[clap(name = "interactive", alias = "i")]
    Interactive {
        /// Use the standard-tier model instead of the premium one.
        #[arg(long)]
        standard: bool,

        /// Session to continue; a fresh session is used when omitted.
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },
}
