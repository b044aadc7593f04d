use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Keep track of the servers running on your machine")]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print all registered servers
    List {
        /// Print the registry as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Skip the reachability check
        #[arg(long, default_value_t = false)]
        no_probe: bool,
    },
    /// Register a new server
    Add {
        /// Host name (default: localhost)
        #[arg(long, default_value = "")]
        host: String,

        /// Display label (default: "Port <port>")
        #[arg(short, long, default_value = "")]
        label: String,

        /// Port, 1 to 65535
        #[arg(short, long)]
        port: String,

        /// Use https instead of http
        #[arg(long, default_value_t = false)]
        https: bool,
    },
    /// Delete a server
    Remove {
        /// Id of the server
        #[arg(value_parser)]
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Open a server in the browser
    Open {
        /// Id of the server
        #[arg(value_parser)]
        id: String,
    },
    /// Check which servers are answering
    Status,
    /// Write the registry as JSON
    Export {
        /// Target file, or "-" for stdout
        /// (default: ./localhost-manager-config.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the registry with servers from a JSON file
    Import {
        /// Source file, or "-" for stdin
        #[arg(value_parser)]
        file: PathBuf,

        /// Continue without asking when invalid servers are dropped
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Edit the registry as JSON in $VISUAL or $EDITOR
    Edit {
        /// Continue without asking when invalid servers are dropped
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
}
