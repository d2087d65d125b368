//! Payload template rendering.
//!
//! Templates are JSON text containing `{{dotted.path}}` placeholders.
//! Substitution is done with a small scanner that tracks JSON string
//! context, so a placeholder inside a quoted string splices escaped
//! string content while one outside splices a full JSON encoding.
//! Blind replace-into-text followed by a reparse would corrupt
//! payloads containing literal `{{` sequences; the scanner leaves any
//! text that is not a resolvable placeholder untouched.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::conditions::lookup_path;
use crate::error::ConfigError;
use crate::types::{Endpoint, Event};

/// Standard envelope used when no template is configured.
pub fn envelope(event: &Event, timestamp: DateTime<Utc>) -> Value {
    json!({
        "event": event.event_type,
        "timestamp": timestamp.to_rfc3339(),
        "data": event.payload,
    })
}

/// Render the delivery body for an endpoint.
///
/// Without a template the raw payload is wrapped in the standard
/// envelope. With one, placeholders are substituted from the payload
/// and the result reparsed; reparse failure is a configuration error
/// that must not be retried.
pub fn render_body(
    endpoint: &Endpoint,
    event: &Event,
    timestamp: DateTime<Utc>,
) -> Result<Value, ConfigError> {
    match &endpoint.template {
        None => Ok(envelope(event, timestamp)),
        Some(template) => render_template(template, &event.payload),
    }
}

/// Substitute `{{dotted.path}}` placeholders and reparse as JSON.
pub fn render_template(template: &str, payload: &Value) -> Result<Value, ConfigError> {
    let rendered = substitute(template, payload);
    serde_json::from_str(&rendered).map_err(|err| ConfigError::Template(err.to_string()))
}

fn substitute(template: &str, payload: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < template.len() {
        let rest = &template[i..];

        if !escaped && rest.starts_with("{{") {
            if let Some((value, consumed)) = resolve_placeholder(rest, payload) {
                out.push_str(&encode_value(value, in_string));
                i += consumed;
                continue;
            }
        }

        let Some(ch) = rest.chars().next() else { break };
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        }

        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

/// Match a `{{path}}` placeholder at the start of `rest` and resolve
/// it against the payload. Returns the resolved value and the byte
/// length of the placeholder, or `None` when the text is not a
/// resolvable placeholder and must pass through verbatim.
fn resolve_placeholder<'a>(rest: &str, payload: &'a Value) -> Option<(&'a Value, usize)> {
    let close = rest[2..].find("}}")?;
    let path = &rest[2..2 + close];
    if !is_valid_path(path) {
        return None;
    }
    let value = lookup_path(payload, path)?;
    Some((value, 2 + close + 2))
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('.')
        && !path.ends_with('.')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

fn encode_value(value: &Value, in_string: bool) -> String {
    if !in_string {
        return value.to_string();
    }

    // Inside a quoted string: splice string values raw (the template
    // already supplies the quotes) and everything else as its compact
    // JSON text, escaped as string content.
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match serde_json::to_string(&text) {
        Ok(quoted) if quoted.len() >= 2 => quoted[1..quoted.len() - 1].to_string(),
        _ => text,
    }
}
