use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Extract Gmail messages to/from specific addresses into HTML, CSV and
/// attachment files.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbose logging (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Guided setup of Gmail API access (credentials.json + first login)
    Setup,
    /// Create a sample email_addresses.txt
    Init {
        /// Overwrite an existing file without asking
        #[arg(long)]
        force: bool,
    },
    /// Check credentials, token and address file
    Validate,
    /// Extract emails for every address in the address file
    Extract {
        /// Also download attachments
        #[arg(short, long)]
        attachments: bool,

        /// Address list to read instead of email_addresses.txt
        #[arg(long, value_name = "FILE")]
        addresses: Option<PathBuf>,

        /// Output directory instead of extracted_emails
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Delete the cached OAuth token
    Reset {
        /// Delete credentials.json as well, without asking
        #[arg(long)]
        all: bool,
    },
    /// Interactive menu (the default when no command is given)
    Menu,
}
