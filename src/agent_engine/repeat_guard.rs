use crate::agent_engine::action::{ActionDescriptor, ActionKind};
use crate::agent_engine::history::HistoryEntry;

/// WAIT durations closer than this count as the same wait.
const WAIT_TOLERANCE_SEC: f64 = 0.05;

/// Stops a session when the model keeps proposing the same action.
#[derive(Debug, Clone, Copy)]
pub struct RepeatGuard {
    threshold: usize,
    coord_tolerance: f64,
}

impl RepeatGuard {
    pub fn new(threshold: usize, coord_tolerance: f64) -> Self {
        Self {
            threshold,
            coord_tolerance,
        }
    }

    /// Count the trailing run of executed entries equivalent to `candidate`
    /// (markers are skipped) and stop once it reaches the threshold.
    /// Pure: the same inputs always give the same verdict.
    pub fn check(&self, window: &[HistoryEntry], candidate: &ActionDescriptor) -> (bool, String) {
        let run = window
            .iter()
            .rev()
            .filter_map(HistoryEntry::as_executed)
            .take_while(|prev| self.equivalent(prev, candidate))
            .count();

        if run >= self.threshold {
            (
                true,
                format!(
                    "{} repeated {} times in a row ({})",
                    candidate.action,
                    run + 1,
                    describe(candidate)
                ),
            )
        } else {
            (false, String::new())
        }
    }

    pub fn equivalent(&self, a: &ActionDescriptor, b: &ActionDescriptor) -> bool {
        if a.action != b.action {
            return false;
        }
        match a.action {
            ActionKind::Click | ActionKind::DoubleClick | ActionKind::RightClick => {
                match (a.coordinates(), b.coordinates()) {
                    (Some((ax, ay)), Some((bx, by))) => {
                        (ax - bx).abs() <= self.coord_tolerance && (ay - by).abs() <= self.coord_tolerance
                    }
                    (None, None) => true,
                    _ => false,
                }
            }
            ActionKind::Type => a.text == b.text,
            ActionKind::Press => eq_ignore_case(a.key.as_deref(), b.key.as_deref()),
            ActionKind::Hotkey => match (&a.keys, &b.keys) {
                (Some(ak), Some(bk)) => {
                    ak.len() == bk.len() && ak.iter().zip(bk).all(|(x, y)| x.eq_ignore_ascii_case(y))
                }
                (None, None) => true,
                _ => false,
            },
            ActionKind::Scroll => a.scroll == b.scroll,
            ActionKind::Wait => match (a.seconds, b.seconds) {
                (Some(x), Some(y)) => (x - y).abs() <= WAIT_TOLERANCE_SEC,
                (None, None) => true,
                _ => false,
            },
            ActionKind::Noop | ActionKind::Done => true,
        }
    }
}

fn eq_ignore_case(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

fn describe(action: &ActionDescriptor) -> String {
    match action.action {
        ActionKind::Click | ActionKind::DoubleClick | ActionKind::RightClick => match action.coordinates() {
            Some((x, y)) => format!("at {x:.3},{y:.3}"),
            None => "no coordinates".into(),
        },
        ActionKind::Type => format!("text {:?}", action.text.as_deref().unwrap_or("")),
        ActionKind::Press => format!("key {:?}", action.key.as_deref().unwrap_or("")),
        ActionKind::Hotkey => format!("keys {}", action.keys.as_deref().unwrap_or_default().join("+")),
        ActionKind::Scroll => format!("scroll {}", action.scroll.unwrap_or(0)),
        ActionKind::Wait => format!("{}s", action.seconds.unwrap_or(0.0)),
        ActionKind::Noop | ActionKind::Done => "no payload".into(),
    }
}
