//! Output rendering for command-line invocations.

use std::io::Write;

use serde_json::Value;

use crate::dispatch::Exchange;
use crate::error::RunError;
use crate::object::Reply;
use crate::spec::HttpMethod;

/// Write the outcome of one invocation to `out`.
///
/// Returns `false` when the invocation failed (non-2xx or transport error).
pub fn render_outcome(
    out: &mut dyn Write,
    reply: Option<&Reply>,
    exchange: Option<&Exchange>,
    quiet_post: bool,
) -> Result<bool, RunError> {
    let Some(reply) = reply else {
        match exchange.map(|e| &e.outcome) {
            Some(Ok(resp)) => {
                writeln!(out, "{} {}", resp.status.as_u16(), resp.status_message())
                    .map_err(RunError::Output)?;
                let text = resp.text();
                if !text.trim().is_empty() {
                    writeln!(out, "{}", text.trim_end()).map_err(RunError::Output)?;
                }
            }
            Some(Err(err)) => {
                writeln!(out, "error: {}", error_chain(err)).map_err(RunError::Output)?;
            }
            None => {}
        }
        return Ok(false);
    };

    let value = reply.value();
    if let Some(text) = single_text(value) {
        write_text(out, text)?;
        return Ok(true);
    }

    if quiet_post {
        if let Some(exchange) = exchange.filter(|e| e.method == HttpMethod::Post) {
            if let Ok(resp) = &exchange.outcome {
                writeln!(out, "{} {}", resp.status.as_u16(), resp.status_message())
                    .map_err(RunError::Output)?;
                return Ok(true);
            }
        }
    }

    match value {
        Value::String(text) => write_text(out, text)?,
        other => {
            let yaml = serde_yaml::to_string(other).map_err(RunError::Format)?;
            write_text(out, &yaml)?;
        }
    }
    Ok(true)
}

fn single_text(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    if map.len() != 1 {
        return None;
    }
    map.get("text")?.as_str()
}

fn write_text(out: &mut dyn Write, text: &str) -> Result<(), RunError> {
    if text.ends_with('\n') {
        out.write_all(text.as_bytes()).map_err(RunError::Output)
    } else {
        writeln!(out, "{text}").map_err(RunError::Output)
    }
}

/// `err` followed by each of its sources, joined by `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
