// Prompt text for the action oracle.

/// System prompt: action schema plus rules. `margin` is the configured
/// forbidden edge band so the model is told the same limit we enforce.
pub fn system_prompt(margin: f64) -> String {
    format!(
        "\
You are a reactive GUI agent.
Given OBJECTIVE, HISTORY (executed actions and rejected proposals), and a SCREENSHOT, decide the NEXT single action.

Return EXACTLY one JSON object. No extra text.
Schema:
{{
  \"action\": \"CLICK|DOUBLE_CLICK|RIGHT_CLICK|TYPE|PRESS|HOTKEY|SCROLL|WAIT|NOOP|DONE\",
  \"x\": 0.5,
  \"y\": 0.5,
  \"text\": \"\",
  \"key\": \"\",
  \"keys\": [\"\"],
  \"scroll\": 0,
  \"seconds\": 0.0,
  \"target\": \"short description\",
  \"confidence\": 0.0,
  \"why_short\": \"<=12 words\"
}}

Rules:
- Output ONLY valid JSON.
- x and y are fractions of the screen width and height (0.0 to 1.0).
- For CLICK/DOUBLE_CLICK/RIGHT_CLICK: set x,y.
- For TYPE: set text.
- For PRESS: set key.
- For HOTKEY: set keys list.
- For SCROLL: set scroll (positive=up, negative=down).
- For WAIT: set seconds.
- If the objective is complete, action MUST be DONE.
- Do NOT propose repeating the last executed action unless it clearly failed.
- HISTORY entries with action INVALID_COORDS, MALFORMED_RESPONSE or MISSING_PAYLOAD were rejected and NOT executed.
- Safety: Never output x or y within {margin} of edges."
    )
}

/// User turn text accompanying the screenshot.
pub fn user_prompt(objective: &str, history: &[serde_json::Value]) -> String {
    let history_json = serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string());
    format!(
        "OBJECTIVE: {objective}\n\
         HISTORY: {history_json}\n\
         Decide the NEXT action from the CURRENT screenshot."
    )
}
