use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let (Some(Value::Object(extra)), Some(object)) = (data, response.as_object_mut()) {
                object.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print `data` as pretty JSON, or through `render` for text output.
pub fn output_data(output_format: OutputFormat, data: &Value, render: impl Fn(&Value) -> String) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => println!("{}", render(data)),
    }
    Ok(())
}

fn person(value: &Value) -> String {
    let name = value.get("fullname").and_then(Value::as_str).unwrap_or("");
    let email = value.get("email").and_then(Value::as_str).unwrap_or("");
    let id = value.get("id").map(Value::to_string).unwrap_or_default();
    match (name.is_empty(), email.is_empty()) {
        (false, false) => format!("{} <{}>", name, email),
        (true, false) => format!("#{} <{}>", id, email),
        _ => format!("#{}", id),
    }
}

/// Text rendering of one group view.
pub fn format_group(group: &Value) -> String {
    let id = group.get("id").map(Value::to_string).unwrap_or_default();
    let name = group.get("name").and_then(Value::as_str).unwrap_or("?");
    let course = group.get("course_id").map(Value::to_string).unwrap_or_default();

    let mut out = format!("Group {} \"{}\" (course {})", id, name, course);
    match group.get("leader") {
        Some(leader) if !leader.is_null() => out.push_str(&format!("\n  Leader:  {}", person(leader))),
        _ => out.push_str("\n  Leader:  (none)"),
    }
    let members = group.get("members").and_then(Value::as_array).cloned().unwrap_or_default();
    out.push_str(&format!("\n  Members ({}):", members.len()));
    for member in &members {
        out.push_str(&format!("\n    - {}", person(member)));
    }
    out
}

pub fn format_group_list(groups: &Value) -> String {
    match groups.as_array() {
        Some(list) if !list.is_empty() => list.iter().map(format_group).collect::<Vec<_>>().join("\n\n"),
        _ => "No peer groups found".to_string(),
    }
}

/// Text summary of a grouping run.
pub fn format_formation(result: &Value) -> String {
    let groups = result.get("groups").and_then(Value::as_array).cloned().unwrap_or_default();
    let size = result.get("group_size").map(Value::to_string).unwrap_or_default();

    let mut out = if groups.is_empty() {
        "Not enough eligible students to form a new group.".to_string()
    } else {
        format!("Formed {} group(s) of {}", groups.len(), size)
    };
    for group in &groups {
        out.push_str(&format!(
            "\n  #{} {} (course {}, leader #{})",
            group.get("id").map(Value::to_string).unwrap_or_default(),
            group.get("name").and_then(Value::as_str).unwrap_or("?"),
            group.get("course_id").map(Value::to_string).unwrap_or_default(),
            group.get("leader_id").map(Value::to_string).unwrap_or_default(),
        ));
    }
    for course in result.get("courses").and_then(Value::as_array).into_iter().flatten() {
        out.push_str(&format!(
            "\n  course {}: {} eligible, {} group(s), {} left ungrouped [{}]",
            course.get("course_id").map(Value::to_string).unwrap_or_default(),
            course.get("eligible").map(Value::to_string).unwrap_or_default(),
            course.get("groups_formed").map(Value::to_string).unwrap_or_default(),
            course.get("ungrouped").map(Value::to_string).unwrap_or_default(),
            course.get("status").and_then(Value::as_str).unwrap_or("?"),
        ));
    }
    out
}
