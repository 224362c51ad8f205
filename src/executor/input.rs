// ActionDescriptor → xdotool argv for an X11 sandbox.
use crate::agent_engine::action::{ActionDescriptor, ActionKind};
use crate::errors::{EyeControlError, EyeControlResult};

/// Screen size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl ScreenGeometry {
    /// Normalized point → pixel, clamped to the screen.
    pub fn to_physical(&self, x: f64, y: f64) -> (u32, u32) {
        let px = (x.clamp(0.0, 1.0) * self.width as f64).round() as u32;
        let py = (y.clamp(0.0, 1.0) * self.height as f64).round() as u32;
        (px.min(self.width.saturating_sub(1)), py.min(self.height.saturating_sub(1)))
    }

    /// Parse `xdotool getdisplaygeometry` output ("1280 800").
    pub fn parse(output: &str) -> Option<Self> {
        let mut parts = output.split_whitespace();
        let width = parts.next()?.parse().ok()?;
        let height = parts.next()?.parse().ok()?;
        Some(Self { width, height })
    }
}

/// One host-side step of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    /// Arguments for `xdotool` inside the sandbox.
    Xdotool(Vec<String>),
    Sleep(std::time::Duration),
}

/// Translate `action` into the commands that perform it. NOOP yields
/// nothing; DONE is never executed and is rejected.
pub fn plan_input(
    action: &ActionDescriptor,
    geometry: ScreenGeometry,
    max_wait_sec: f64,
) -> EyeControlResult<Vec<InputCommand>> {
    let cmds = match action.action {
        ActionKind::Click | ActionKind::DoubleClick | ActionKind::RightClick => {
            let (x, y) = action.coordinates().ok_or_else(|| {
                EyeControlError::Executor(format!("{} without coordinates", action.action))
            })?;
            let (px, py) = geometry.to_physical(x, y);
            let mut args = strings(&["mousemove", "--sync"]);
            args.push(px.to_string());
            args.push(py.to_string());
            match action.action {
                ActionKind::DoubleClick => args.extend(strings(&["click", "--repeat", "2", "--delay", "100", "1"])),
                ActionKind::RightClick => args.extend(strings(&["click", "3"])),
                _ => args.extend(strings(&["click", "1"])),
            }
            vec![InputCommand::Xdotool(args)]
        }
        ActionKind::Type => {
            let text = action.text.as_deref().unwrap_or_default();
            if text.is_empty() {
                return Err(EyeControlError::Executor("TYPE without text".into()));
            }
            let mut args = strings(&["type", "--delay", "50", "--"]);
            args.push(text.to_string());
            vec![InputCommand::Xdotool(args)]
        }
        ActionKind::Press => {
            let key = action
                .key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| EyeControlError::Executor("PRESS without key".into()))?;
            let mut args = strings(&["key", "--"]);
            args.push(parse_key_combo(key));
            vec![InputCommand::Xdotool(args)]
        }
        ActionKind::Hotkey => {
            let keys = action
                .keys
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| EyeControlError::Executor("HOTKEY without keys".into()))?;
            let combo = keys.iter().map(|k| map_key_name(k)).collect::<Vec<_>>().join("+");
            let mut args = strings(&["key", "--"]);
            args.push(combo);
            vec![InputCommand::Xdotool(args)]
        }
        ActionKind::Scroll => {
            let amount = action.scroll.unwrap_or(0);
            if amount == 0 {
                Vec::new()
            } else {
                // X11 wheel: button 4 scrolls up, 5 down
                let button = if amount > 0 { "4" } else { "5" };
                let mut args = strings(&["click", "--repeat"]);
                args.push(amount.unsigned_abs().to_string());
                args.push(button.to_string());
                vec![InputCommand::Xdotool(args)]
            }
        }
        ActionKind::Wait => {
            let secs = action.seconds.unwrap_or(1.0).clamp(0.0, max_wait_sec.max(0.0));
            vec![InputCommand::Sleep(std::time::Duration::from_secs_f64(secs))]
        }
        ActionKind::Noop => Vec::new(),
        ActionKind::Done => {
            return Err(EyeControlError::Executor("DONE is not an executable action".into()));
        }
    };
    Ok(cmds)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// "ctrl+c" → "ctrl+c", "Enter" → "Return", "cmd+shift+t" → "super+shift+t".
pub fn parse_key_combo(combo: &str) -> String {
    combo
        .split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(map_key_name)
        .collect::<Vec<_>>()
        .join("+")
}

/// Map common key names to X keysym names understood by xdotool.
pub fn map_key_name(name: &str) -> String {
    let mapped = match name.trim().to_lowercase().as_str() {
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "ctrl" | "control" => "ctrl",
        "alt" | "option" | "opt" => "alt",
        "shift" => "shift",
        "cmd" | "command" | "win" | "windows" | "super" | "meta" => "super",
        "tab" => "Tab",
        "space" | " " => "space",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "insert" | "ins" => "Insert",
        "up" | "arrowup" => "Up",
        "down" | "arrowdown" => "Down",
        "left" | "arrowleft" => "Left",
        "right" | "arrowright" => "Right",
        "home" => "Home",
        "end" => "End",
        "pageup" | "page_up" | "pgup" => "Prior",
        "pagedown" | "page_down" | "pgdn" => "Next",
        "capslock" => "Caps_Lock",
        "printscreen" | "print" => "Print",
        lower => {
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                if (1..=24).contains(&n) {
                    return format!("F{n}");
                }
            }
            // single characters and already-valid keysyms pass through
            return name.trim().to_string();
        }
    };
    mapped.to_string()
}
