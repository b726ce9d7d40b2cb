pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use client::ApiClient;

#[derive(Parser)]
#[command(name = "merilearn")]
#[command(about = "MeriLearn CLI - administer peer groups through the API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, env = "MERILEARN_API_URL", default_value = "http://localhost:3001", help = "API base URL")]
    pub server: String,

    #[arg(long, global = true, env = "MERILEARN_TOKEN", hide_env_values = true, help = "Bearer token for API calls")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Form, inspect and remove peer groups")]
    Groups {
        #[command(subcommand)]
        cmd: commands::groups::GroupCommands,
    },

    #[command(about = "Remote server status")]
    Server {
        #[command(subcommand)]
        cmd: commands::server::ServerCommands,
    },

    #[command(about = "Mint API tokens locally from JWT_SECRET")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json && !cli.text {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = ApiClient::new(&cli.server, cli.token.clone())?;

    match cli.command {
        Commands::Groups { cmd } => commands::groups::handle(cmd, &client, output_format).await,
        Commands::Server { cmd } => commands::server::handle(cmd, &client, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
    }
}
