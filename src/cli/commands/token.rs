use anyhow::{bail, Context};
use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_jwt, Claims, Role};
use crate::cli::utils::output_data;
use crate::cli::OutputFormat;
use crate::config;
use crate::groups::StudentId;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a signed token for a user id")]
    Issue {
        #[arg(long, help = "User id placed in the token subject")]
        user: i64,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "admin", help = "student | instructor | admin")]
        role: Role,
        #[arg(long, help = "Lifetime in hours (default: security.jwt_expiry_hours)")]
        hours: Option<u64>,
    },
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { user, email, role, hours } => {
            let security = &config::config().security;
            if security.jwt_secret.is_empty() {
                bail!("JWT_SECRET is not set");
            }
            let hours = hours.unwrap_or(security.jwt_expiry_hours);
            let claims = Claims::new(StudentId(user), email, role, hours);
            let token = generate_jwt(&claims, &security.jwt_secret).context("failed to sign token")?;

            let data = json!({
                "token": token,
                "user_id": user,
                "role": role,
                "expires_at": claims.exp,
            });
            output_data(output_format, &data, |_| token.clone())
        }
    }
}
