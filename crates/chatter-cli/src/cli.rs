//! Command-line interface definitions and parsing

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Chatter2 chat server", long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Server name sent in the CONNECT acknowledgement
    #[arg(short, long)]
    pub name: Option<String>,

    /// Server id sent in PING replies
    #[arg(long)]
    pub id: Option<i64>,

    /// Disable server-sent heartbeat pings
    #[arg(long)]
    pub no_heartbeat: bool,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}
