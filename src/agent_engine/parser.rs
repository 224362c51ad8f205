// Model reply → ActionDescriptor.
use serde_json::{Map, Value};

use crate::agent_engine::action::{ActionDescriptor, ActionKind};
use crate::errors::{EyeControlError, EyeControlResult};

/// Extract the first well-formed JSON object from `text` and read it as an
/// action. Surrounding prose and markdown fences are ignored.
pub fn parse_action(text: &str) -> EyeControlResult<ActionDescriptor> {
    let obj = first_json_object(text).ok_or_else(|| EyeControlError::MalformedResponse {
        raw: text.to_string(),
    })?;
    Ok(descriptor_from_map(&obj))
}

/// Scan every `{` and return the first position where a complete object
/// deserializes.
fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    for (idx, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[idx..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            return Some(map);
        }
    }
    None
}

fn descriptor_from_map(args: &Map<String, Value>) -> ActionDescriptor {
    let action = args
        .get("action")
        .and_then(Value::as_str)
        .map(ActionKind::parse)
        .unwrap_or(ActionKind::Noop);

    ActionDescriptor {
        action,
        x: number(args.get("x")),
        y: number(args.get("y")),
        text: string(args.get("text")),
        key: string(args.get("key")),
        keys: keys(args.get("keys")),
        scroll: number(args.get("scroll")).map(|v| v.round() as i64),
        seconds: number(args.get("seconds")).map(|v| v.max(0.0)),
        target: string(args.get("target")),
        confidence: number(args.get("confidence")),
        why_short: string(args.get("why_short")),
    }
    .normalized()
}

/// Numbers sometimes arrive quoted ("0.5").
fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts `["ctrl","c"]` as well as `"ctrl+c"`; empty names are dropped.
fn keys(v: Option<&Value>) -> Option<Vec<String>> {
    let keys: Vec<String> = match v? {
        Value::Array(items) => items
            .iter()
            .filter_map(|k| k.as_str())
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        Value::String(s) => s
            .split('+')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        _ => return None,
    };
    if keys.is_empty() {
        None
    } else {
        Some(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_object() {
        let a = parse_action(r#"{"action":"CLICK","x":0.5,"y":0.5}"#).unwrap();
        assert_eq!(a, ActionDescriptor::click(0.5, 0.5));
    }

    #[test]
    fn skips_surrounding_prose_and_fences() {
        let raw = "Sure! Here is the action:\n```json\n{\"action\": \"type\", \"text\": \"hello\", \"why_short\": \"fill box\"}\n```\nGood luck.";
        let a = parse_action(raw).unwrap();
        assert_eq!(a.action, ActionKind::Type);
        assert_eq!(a.text.as_deref(), Some("hello"));
        assert_eq!(a.why_short.as_deref(), Some("fill box"));
    }

    #[test]
    fn skips_broken_brace_before_valid_object() {
        let raw = r#"Thinking {not json} then {"action":"PRESS","key":"Enter"}"#;
        let a = parse_action(raw).unwrap();
        assert_eq!(a, ActionDescriptor::press("Enter"));
    }

    #[test]
    fn no_object_is_malformed_and_keeps_raw_text() {
        match parse_action("I will click the OK button.") {
            Err(EyeControlError::MalformedResponse { raw }) => {
                assert_eq!(raw, "I will click the OK button.")
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn truncated_object_is_malformed() {
        assert!(matches!(
            parse_action(r#"{"action":"CLICK","x":0.5"#),
            Err(EyeControlError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn unknown_or_missing_action_is_noop() {
        assert_eq!(parse_action(r#"{"action":"DRAG"}"#).unwrap().action, ActionKind::Noop);
        assert_eq!(parse_action(r#"{"target":"x"}"#).unwrap().action, ActionKind::Noop);
        assert_eq!(parse_action(r#"{"action":42}"#).unwrap().action, ActionKind::Noop);
    }

    #[test]
    fn completion_token_maps_to_done() {
        assert_eq!(parse_action(r#"{"action":"BITTI"}"#).unwrap().action, ActionKind::Done);
    }

    #[test]
    fn lenient_numbers_and_hotkey_strings() {
        let a = parse_action(r#"{"action":"click","x":"0.3","y":0.7}"#).unwrap();
        assert_eq!(a.coordinates(), Some((0.3, 0.7)));

        let h = parse_action(r#"{"action":"HOTKEY","keys":"ctrl + shift + t"}"#).unwrap();
        assert_eq!(
            h.keys,
            Some(vec!["ctrl".to_string(), "shift".to_string(), "t".to_string()])
        );

        let s = parse_action(r#"{"action":"SCROLL","scroll":-2.6}"#).unwrap();
        assert_eq!(s.scroll, Some(-3));
    }
}
