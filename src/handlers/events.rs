//! Responder progress events
//!
//! The wire format from the responder API is a sequence of JSON objects
//! discriminated by a `type` field. This module turns that into a closed
//! tagged union with one explicit decoder, including the unwrap of workflow
//! step starts nested inside generic tool-output payloads. Unrecognized kinds
//! are preserved (not dropped) so the status renderer can still show them.

use serde_json::Value;

/// One progress event from a responder invocation
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A chunk of answer text
    TextDelta { text: String },
    /// A tool invocation started
    ToolCall { tool_name: String },
    /// Output from a tool; the payload may carry a nested workflow step start
    ToolOutput { payload: ToolOutputPayload },
    /// A named workflow began executing
    WorkflowStarted { workflow_name: String },
    /// A sub-agent took over the query
    AgentStarted { agent_name: String },
    /// Anything this version does not know about; passed through by kind
    Other { kind: String },
}

/// Payload of a tool-output event
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutputPayload {
    /// The tool output announces a workflow step starting
    WorkflowStepStarted { step_name: String },
    /// Any other tool output, kept as-is
    Opaque(Value),
}

impl ToolOutputPayload {
    /// Decode a raw payload by its `type` discriminator.
    pub fn decode(payload: Value) -> Self {
        let step_started = payload
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t == "workflow_step_started")
            .unwrap_or(false);

        if step_started {
            if let Some(step_name) = string_field(&payload, &["step_name", "name"]) {
                return ToolOutputPayload::WorkflowStepStarted { step_name };
            }
        }

        ToolOutputPayload::Opaque(payload)
    }

    /// Step name when this payload is a workflow step start.
    pub fn workflow_step(&self) -> Option<&str> {
        match self {
            ToolOutputPayload::WorkflowStepStarted { step_name } => Some(step_name),
            ToolOutputPayload::Opaque(_) => None,
        }
    }
}

impl AgentEvent {
    /// Decode one wire event by its `type` discriminator.
    ///
    /// Missing fields degrade to empty strings rather than errors: a garbled
    /// progress event should never kill the stream it arrived on.
    pub fn decode(value: &Value) -> AgentEvent {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("unknown");

        match kind {
            "text_delta" => AgentEvent::TextDelta {
                text: string_field(value, &["text", "delta"]).unwrap_or_default(),
            },
            "tool_call" => AgentEvent::ToolCall {
                tool_name: string_field(value, &["tool_name", "name"]).unwrap_or_default(),
            },
            "tool_output" => AgentEvent::ToolOutput {
                payload: ToolOutputPayload::decode(
                    value.get("payload").cloned().unwrap_or(Value::Null),
                ),
            },
            "workflow_started" | "workflow_execution_started" => AgentEvent::WorkflowStarted {
                workflow_name: string_field(value, &["workflow_name", "name"]).unwrap_or_default(),
            },
            "agent_started" | "agent_updated" => AgentEvent::AgentStarted {
                agent_name: string_field(value, &["agent_name", "name"]).unwrap_or_default(),
            },
            other => AgentEvent::Other {
                kind: other.to_string(),
            },
        }
    }

    /// The kind label shown by the status renderer.
    pub fn kind(&self) -> &str {
        match self {
            AgentEvent::TextDelta { .. } => "text_delta",
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolOutput { .. } => "tool_output",
            AgentEvent::WorkflowStarted { .. } => "workflow_started",
            AgentEvent::AgentStarted { .. } => "agent_started",
            AgentEvent::Other { kind } => kind,
        }
    }
}

fn string_field(value: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| value.get(name).and_then(Value::as_str))
        .map(str::to_string)
}
