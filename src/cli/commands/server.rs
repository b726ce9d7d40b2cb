use clap::Subcommand;
use reqwest::Method;
use serde_json::json;

use crate::cli::client::{unwrap_envelope, ApiClient};
use crate::cli::utils::output_data;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Check server health status from API /health endpoint")]
    Health,

    #[command(about = "Show server information from API root endpoint")]
    Info,
}

pub async fn handle(cmd: ServerCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Health => {
            // 503 still carries a body worth showing
            let reply = client.send(Method::GET, "/health", &[], None).await?;
            let healthy = reply.status.is_success();
            let status = reply.body["data"]["status"].as_str().unwrap_or("unknown").to_string();
            let summary = json!({
                "server": client.base_url().as_str(),
                "http_status": reply.status.as_u16(),
                "status": status,
            });
            output_data(output_format, &summary, |_| {
                format!("{} is {} (HTTP {})", client.base_url(), status, reply.status.as_u16())
            })?;
            if !healthy {
                anyhow::bail!("server reported {}", status);
            }
            Ok(())
        }
        ServerCommands::Info => {
            let reply = client.send(Method::GET, "/", &[], None).await?;
            let info = unwrap_envelope(reply)?;
            output_data(output_format, &info, |info| {
                format!(
                    "{} v{} ({})",
                    info["name"].as_str().unwrap_or("?"),
                    info["version"].as_str().unwrap_or("?"),
                    info["environment"].as_str().unwrap_or("?")
                )
            })
        }
    }
}
