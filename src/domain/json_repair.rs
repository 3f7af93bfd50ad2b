//! Lenient parsing of JSON written by language models.

use crate::error::LlmError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Parse the JSON document inside a model answer, repairing the usual damage.
pub fn parse_model_json(text: &str) -> Result<Value, LlmError> {
    let body = strip_fences(text);

    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }

    let closed = close_unterminated_strings(body);
    if let Ok(value) = serde_json::from_str(&closed) {
        return Ok(value);
    }

    if let Ok(value) = json5::from_str::<Value>(&closed) {
        return Ok(value);
    }

    let balanced = balance_brackets(&closed);
    json5::from_str::<Value>(&balanced).map_err(|e| LlmError::InvalidResponse {
        provider: "model".to_string(),
        reason: format!("could not repair JSON: {}", e),
    })
}

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)(?:```|$)").unwrap())
}

fn strip_fences(text: &str) -> &str {
    match fence().captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// Lines with an odd number of unescaped quotes get a closing quote,
/// placed before a trailing comma if there is one.
fn close_unterminated_strings(text: &str) -> String {
    text.lines()
        .map(|line| {
            if unescaped_quotes(line) % 2 == 0 {
                return line.to_string();
            }
            let trimmed = line.trim_end();
            match trimmed.strip_suffix(',') {
                Some(head) => format!("{}\",", head),
                None => format!("{}\"", trimmed),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescaped_quotes(line: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in line.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => count += 1,
            _ => escaped = false,
        }
        if c != '\\' {
            escaped = false;
        }
    }
    count
}

/// Append the closers of every bracket left open outside string literals.
fn balance_brackets(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().trim_end_matches(',').to_string();
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
