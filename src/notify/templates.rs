//! Email templates for peer-group notifications.

use html_escape::encode_safe;
use std::collections::HashMap;

use super::NotificationError;

/// Sent to every member of a newly formed group.
pub const GROUP_ASSIGNED: &str = "peer-group-assigned";

/// Rendered message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Render `template` with `variables`. Missing variables render as empty strings.
pub fn render(template: &str, variables: &HashMap<String, String>) -> Result<EmailContent, NotificationError> {
    let var = |key: &str| variables.get(key).map(String::as_str).unwrap_or_default();

    match template {
        GROUP_ASSIGNED => Ok(group_assigned(
            var("fullname"),
            var("group_name"),
            var("leader_name"),
            var("member_count"),
        )),
        other => Err(NotificationError::UnknownTemplate(other.to_string())),
    }
}

fn group_assigned(fullname: &str, group_name: &str, leader_name: &str, member_count: &str) -> EmailContent {
    let greeting = if fullname.is_empty() { "Hello".to_string() } else { format!("Hi {}", fullname) };

    let text = format!(
        r#"{greeting},

You have been placed in the peer group "{group_name}" ({member_count} members).
Your group leader is {leader_name}.

Log in to MeriLearn to see your group and reach out to your peers.

--
The MeriLearn Team"#
    );

    // Names come from student profiles; only escaped copies reach the markup.
    let greeting = encode_safe(&greeting);
    let group_name_html = encode_safe(group_name);
    let leader_name = encode_safe(leader_name);
    let member_count = encode_safe(member_count);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; background: #f5f5f5; }}
        .card {{ max-width: 560px; margin: 40px auto; background: white; border-radius: 8px; padding: 32px; }}
        .group {{ font-size: 24px; font-weight: bold; color: #2563eb; text-align: center; padding: 16px; background: #f0f7ff; border-radius: 8px; }}
    </style>
</head>
<body>
    <div class="card">
        <p>{greeting},</p>
        <p>You have been placed in a peer group of {member_count}:</p>
        <div class="group">{group_name_html}</div>
        <p>Your group leader is <strong>{leader_name}</strong>.</p>
        <p>Log in to MeriLearn to see your group and reach out to your peers.</p>
    </div>
</body>
</html>"#
    );

    EmailContent {
        subject: format!("You've joined the peer group {}", group_name),
        text,
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("fullname".to_string(), "Ada Obi".to_string()),
            ("group_name".to_string(), "Neural-Socket".to_string()),
            ("leader_name".to_string(), "Tunde Ade".to_string()),
            ("member_count".to_string(), "4".to_string()),
        ])
    }

    #[test]
    fn group_assigned_mentions_group_and_leader() {
        let content = render(GROUP_ASSIGNED, &vars()).unwrap();
        assert!(content.subject.contains("Neural-Socket"));
        assert!(content.text.starts_with("Hi Ada Obi,"));
        assert!(content.text.contains("Tunde Ade"));
        assert!(content.html.contains("<div class=\"group\">Neural-Socket</div>"));
    }

    #[test]
    fn student_names_are_escaped_in_html() {
        let mut variables = vars();
        variables.insert("leader_name".to_string(), r#"<a href="http://evil">click</a>"#.to_string());
        variables.insert("fullname".to_string(), "<b>Ada</b>".to_string());

        let content = render(GROUP_ASSIGNED, &variables).unwrap();
        assert!(!content.html.contains("<a href"));
        assert!(!content.html.contains("<b>Ada</b>"));
        assert!(content.html.contains("&lt;a href="));
        assert!(content.html.contains("Hi &lt;b&gt;Ada&lt;"));
        // The plain-text part keeps the name as written.
        assert!(content.text.contains(r#"<a href="http://evil">click</a>"#));
    }

    #[test]
    fn missing_name_falls_back_to_generic_greeting() {
        let content = render(GROUP_ASSIGNED, &HashMap::new()).unwrap();
        assert!(content.text.starts_with("Hello,"));
    }

    #[test]
    fn unknown_template_is_rejected() {
        let err = render("reset-password", &vars()).unwrap_err();
        assert!(matches!(err, NotificationError::UnknownTemplate(name) if name == "reset-password"));
    }
}
