//! Progress status rendering
//!
//! Pure function from relay state plus an animation frame to the short
//! progress line shown in the placeholder message. Called once per animation
//! tick and once per significant stream event, so it stays cheap: a couple
//! of small allocations per call, no I/O.

use crate::relay::RelayState;

/// Generic activity spinner
pub const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Tool-activity icons
pub const TOOL_FRAMES: &[&str] = &["🔧", "🛠️"];

/// Workflow-activity icons
pub const WORKFLOW_FRAMES: &[&str] = &["📋", "🗂️"];

/// Render the current progress line.
pub fn render_status(state: &RelayState, frame: u64) -> String {
    let kind = state.current_event_kind.as_str();
    let label = kind_label(kind);

    if kind.starts_with("tool") {
        if let Some(tool_name) = &state.active_tool_name {
            let icon = cycle(TOOL_FRAMES, frame);
            return format!("{icon} {label}: {tool_name}...");
        }
    }

    if kind.starts_with("workflow") {
        if let Some(step_name) = &state.active_step_name {
            let icon = cycle(WORKFLOW_FRAMES, frame);
            return format!("{icon} {label}: {step_name}...");
        }
    }

    if kind.contains("agent") {
        if let Some(agent_name) = &state.active_agent_name {
            let icon = cycle(SPINNER_FRAMES, frame);
            return format!("{icon} {label}: {agent_name}...");
        }
    }

    let icon = cycle(SPINNER_FRAMES, frame);
    format!("{icon} {label}...")
}

fn cycle(frames: &[&'static str], frame: u64) -> &'static str {
    frames[(frame % frames.len() as u64) as usize]
}

/// Turn an event kind into a human label: separators become spaces, words are
/// title-cased ("tool_call" -> "Tool Call").
fn kind_label(kind: &str) -> String {
    kind.split(|c| c == '_' || c == '-' || c == '.')
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
