use serde::{Deserialize, Serialize};

/// Every action kind the model may propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Click,
    DoubleClick,
    RightClick,
    Type,
    Press,
    Hotkey,
    Scroll,
    Wait,
    Noop,
    Done,
}

impl ActionKind {
    /// Case-insensitive lookup. Unknown names map to `Noop`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "CLICK" => Self::Click,
            "DOUBLE_CLICK" => Self::DoubleClick,
            "RIGHT_CLICK" => Self::RightClick,
            "TYPE" => Self::Type,
            "PRESS" => Self::Press,
            "HOTKEY" => Self::Hotkey,
            "SCROLL" => Self::Scroll,
            "WAIT" => Self::Wait,
            "DONE" | "BITTI" | "FINISH" | "COMPLETE" => Self::Done,
            _ => Self::Noop,
        }
    }

    pub fn needs_coordinates(self) -> bool {
        matches!(self, Self::Click | Self::DoubleClick | Self::RightClick)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "CLICK",
            Self::DoubleClick => "DOUBLE_CLICK",
            Self::RightClick => "RIGHT_CLICK",
            Self::Type => "TYPE",
            Self::Press => "PRESS",
            Self::Hotkey => "HOTKEY",
            Self::Scroll => "SCROLL",
            Self::Wait => "WAIT",
            Self::Noop => "NOOP",
            Self::Done => "DONE",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic UI action. Only the payload field matching `action` is kept
/// (see [`ActionDescriptor::normalized`]); `target`, `confidence` and
/// `why_short` are descriptive and survive for every kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// Positive scrolls up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_short: Option<String>,
}

impl ActionDescriptor {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            x: None,
            y: None,
            text: None,
            key: None,
            keys: None,
            scroll: None,
            seconds: None,
            target: None,
            confidence: None,
            why_short: None,
        }
    }

    pub fn click(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::new(ActionKind::Click)
        }
    }

    pub fn type_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(ActionKind::Type)
        }
    }

    pub fn press(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(ActionKind::Press)
        }
    }

    /// Drop payload fields that do not belong to `action`.
    pub fn normalized(mut self) -> Self {
        let kind = self.action;
        if !kind.needs_coordinates() {
            self.x = None;
            self.y = None;
        }
        if kind != ActionKind::Type {
            self.text = None;
        }
        if kind != ActionKind::Press {
            self.key = None;
        }
        if kind != ActionKind::Hotkey {
            self.keys = None;
        }
        if kind != ActionKind::Scroll {
            self.scroll = None;
        }
        if kind != ActionKind::Wait {
            self.seconds = None;
        }
        self
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }

    /// Names the payload this action cannot execute without, if it is absent.
    pub fn missing_payload(&self) -> Option<&'static str> {
        let blank = |s: &str| s.trim().is_empty();
        match self.action {
            ActionKind::Type if self.text.as_deref().map_or(true, str::is_empty) => Some("text"),
            ActionKind::Press if self.key.as_deref().map_or(true, blank) => Some("key"),
            ActionKind::Hotkey
                if self
                    .keys
                    .as_deref()
                    .map_or(true, |keys| keys.iter().all(|k| blank(k))) =>
            {
                Some("keys")
            }
            _ => None,
        }
    }

    /// Flat key/value record used in the model's history window.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "action": self.action.as_str() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_with_noop_fallback() {
        assert_eq!(ActionKind::parse("double_click"), ActionKind::DoubleClick);
        assert_eq!(ActionKind::parse(" Hotkey "), ActionKind::Hotkey);
        assert_eq!(ActionKind::parse("bitti"), ActionKind::Done);
        assert_eq!(ActionKind::parse("drag"), ActionKind::Noop);
        assert_eq!(ActionKind::parse(""), ActionKind::Noop);
    }

    #[test]
    fn normalized_keeps_only_matching_payload() {
        let mut raw = ActionDescriptor::type_text("hello");
        raw.x = Some(0.4);
        raw.key = Some("Enter".into());
        raw.target = Some("search box".into());
        let n = raw.normalized();
        assert_eq!(n.text.as_deref(), Some("hello"));
        assert!(n.x.is_none());
        assert!(n.key.is_none());
        assert_eq!(n.target.as_deref(), Some("search box"));
    }

    #[test]
    fn missing_payload_names_the_required_field() {
        assert_eq!(ActionDescriptor::new(ActionKind::Type).missing_payload(), Some("text"));
        assert_eq!(ActionDescriptor::type_text("").missing_payload(), Some("text"));
        assert_eq!(ActionDescriptor::press("  ").missing_payload(), Some("key"));
        let mut hotkey = ActionDescriptor::new(ActionKind::Hotkey);
        assert_eq!(hotkey.missing_payload(), Some("keys"));
        hotkey.keys = Some(vec!["ctrl".into(), "c".into()]);
        assert_eq!(hotkey.missing_payload(), None);
        assert_eq!(ActionDescriptor::type_text(" ").missing_payload(), None);
        assert_eq!(ActionDescriptor::new(ActionKind::Scroll).missing_payload(), None);
        assert_eq!(ActionDescriptor::new(ActionKind::Noop).missing_payload(), None);
    }

    #[test]
    fn serializes_as_flat_record() {
        let v = ActionDescriptor::click(0.5, 0.25).to_value();
        assert_eq!(v, serde_json::json!({"action": "CLICK", "x": 0.5, "y": 0.25}));
    }
}
