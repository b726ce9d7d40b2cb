use anyhow::bail;
use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::client::ApiClient;
use crate::cli::utils::{format_formation, format_group, format_group_list, output_data, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum GroupCommands {
    #[command(about = "Run grouping over eligible students (admin)")]
    Form {
        #[arg(long, help = "Only group students enrolled in this course")]
        course: Option<i64>,
        #[arg(long, help = "Students per group (default: server setting)")]
        size: Option<usize>,
    },

    #[command(about = "List peer groups with their rosters")]
    List {
        #[arg(long, help = "Filter by course")]
        course: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
    },

    #[command(about = "Show one peer group")]
    Show {
        #[arg(help = "Group id")]
        id: i64,
    },

    #[command(about = "Show the group of the token's user")]
    Mine,

    #[command(about = "Leave the token user's group")]
    Leave,

    #[command(about = "Delete one peer group (admin)")]
    Delete {
        #[arg(help = "Group id")]
        id: i64,
    },

    #[command(about = "Delete every peer group (admin)")]
    DeleteAll {
        #[arg(long, help = "Confirm the irreversible reset")]
        yes: bool,
    },
}

pub async fn handle(cmd: GroupCommands, client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        GroupCommands::Form { course, size } => {
            let mut body = json!({});
            if let Some(course) = course {
                body["course_id"] = json!(course);
            }
            if let Some(size) = size {
                body["group_size"] = json!(size);
            }
            let result = client.post("/api/root/peer-groups", body).await?;
            output_data(output_format, &result, format_formation)
        }
        GroupCommands::List { course, limit, offset } => {
            let query: Vec<(&str, String)> = [("course_id", course), ("limit", limit), ("offset", offset)]
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v.to_string())))
                .collect();
            let groups = client.get("/api/peer-groups", &query).await?;
            output_data(output_format, &groups, format_group_list)
        }
        GroupCommands::Show { id } => {
            let group = client.get(&format!("/api/peer-groups/{}", id), &[]).await?;
            output_data(output_format, &group, format_group)
        }
        GroupCommands::Mine => {
            let group = client.get("/api/peer-groups/me", &[]).await?;
            output_data(output_format, &group, format_group)
        }
        GroupCommands::Leave => {
            let removal = client.delete("/api/peer-groups/me").await?;
            let group = removal.get("group_id").map(Value::to_string).unwrap_or_default();
            output_success(output_format, &format!("Left peer group {}", group), Some(removal))
        }
        GroupCommands::Delete { id } => {
            let data = client.delete(&format!("/api/root/peer-groups/{}", id)).await?;
            output_success(output_format, &format!("Peer group {} deleted", id), Some(data))
        }
        GroupCommands::DeleteAll { yes } => {
            if !yes {
                bail!("refusing to delete every peer group without --yes");
            }
            let data = client.delete("/api/root/peer-groups").await?;
            let deleted = data.get("deleted").and_then(Value::as_u64).unwrap_or(0);
            output_success(output_format, &format!("Deleted {} peer group(s)", deleted), Some(data))
        }
    }
}
