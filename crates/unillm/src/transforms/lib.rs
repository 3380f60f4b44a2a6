use serde_json::{Map, Value};

use crate::unified::{Message, Role};

pub trait ExtractText {
    fn extract_text(&self) -> String;
}

/// Split a `data:<mime>;base64,<data>` URL into its MIME type and payload.
/// Returns `None` for anything that does not follow that exact pattern.
pub fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (mime_type, data) = rest.split_once(";base64,")?;
    if mime_type.is_empty() || mime_type.contains(';') || data.is_empty() {
        return None;
    }
    Some((mime_type.to_string(), data.to_string()))
}

/// Text of every system-role message, in order, one per line.
pub fn collect_system_prompt(messages: &[Message]) -> Option<String> {
    let system: Vec<String> = messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.extract_text())
        .collect();

    if system.is_empty() {
        None
    } else {
        Some(system.join("\n"))
    }
}

/// Passthrough fields minus the keys the provider request already owns.
pub fn passthrough_without(passthrough: &Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    passthrough
        .iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_data_url() {
        assert_eq!(
            parse_data_url("data:image/png;base64,iVBORw0KGgo="),
            Some(("image/png".to_string(), "iVBORw0KGgo=".to_string()))
        );
        assert_eq!(parse_data_url("https://example.com/cat.png"), None);
        assert_eq!(parse_data_url("data:image/png,rawbytes"), None);
        assert_eq!(parse_data_url("data:;base64,AAAA"), None);
        assert_eq!(parse_data_url("data:image/png;base64,"), None);
    }

    #[test]
    fn test_collect_system_prompt_joins_in_order() {
        let messages = vec![
            Message::text(Role::System, "First."),
            Message::text(Role::User, "Hi"),
            Message::text(Role::System, "Second."),
        ];
        assert_eq!(
            collect_system_prompt(&messages),
            Some("First.\nSecond.".to_string())
        );
        assert_eq!(collect_system_prompt(&messages[1..2]), None);
    }

    #[test]
    fn test_passthrough_without_reserved() {
        let mut passthrough = Map::new();
        passthrough.insert("top_p".to_string(), json!(0.5));
        passthrough.insert("system".to_string(), json!("x"));
        let filtered = passthrough_without(&passthrough, &["system"]);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("top_p"));
    }
}
