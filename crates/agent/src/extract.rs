//! Tool-call extraction: turn one raw assistant reply into zero or more
//! calls.
//!
//! Backends disagree on how "call tool X" looks on the wire. The chain
//! tries each known encoding in a fixed order and stops at the first one
//! that yields a call:
//!
//! 1. the native structured `tool_calls` field
//! 2. `<tool_call>{"name": .., "arguments": {..}}</tool_call>` blocks
//! 3. `[TOOL_CALLS]` followed by a JSON array of `{name, arguments}`
//! 4. call syntax `name(key=value, ...)` for registered tool names, or a
//!    bare registered name such as `list_timers`
//!
//! Every extractor is a total function. A block that is recognised but
//! whose payload cannot be read still produces a call, carrying a
//! [`ToolError::Malformed`] instead of arguments, so the model hears about
//! its mistake rather than having the call silently dropped.

use regex_lite::Regex;
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;
use talkbot_core::error::ToolError;
use talkbot_core::message::Message;

/// The wire encoding a call was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFormat {
    Native,
    Tagged,
    Bracketed,
    CallSyntax,
}

impl CallFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallFormat::Native => "native",
            CallFormat::Tagged => "tagged",
            CallFormat::Bracketed => "bracketed",
            CallFormat::CallSyntax => "call_syntax",
        }
    }
}

/// One call as found in the reply, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedCall {
    /// Id supplied by the backend, if any
    pub id: Option<String>,
    pub name: String,
    /// Parsed arguments, or why they could not be parsed
    pub arguments: Result<Map<String, Value>, ToolError>,
    /// The arguments exactly as they should be echoed back on the wire
    pub raw_arguments: String,
}

impl ExtractedCall {
    fn parsed(id: Option<String>, name: String, arguments: Map<String, Value>) -> Self {
        let raw_arguments = Value::Object(arguments.clone()).to_string();
        Self {
            id,
            name,
            arguments: Ok(arguments),
            raw_arguments,
        }
    }

    fn malformed(name: String, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: None,
            arguments: Err(ToolError::Malformed {
                tool_name: name.clone(),
                reason: reason.into(),
            }),
            name,
            raw_arguments: raw.into(),
        }
    }
}

/// The calls found in a reply and the encoding they used.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub format: CallFormat,
    pub calls: Vec<ExtractedCall>,
}

/// Run the chain over one assistant reply. `None` means the reply is a
/// final answer.
pub fn extract(message: &Message, is_tool: impl Fn(&str) -> bool) -> Option<Extraction> {
    let native = native_calls(message);
    if !native.is_empty() {
        return Some(Extraction {
            format: CallFormat::Native,
            calls: native,
        });
    }

    let text = strip_thinking(&message.content);
    [
        (CallFormat::Tagged, tagged_calls(&text)),
        (CallFormat::Bracketed, bracketed_calls(&text)),
        (CallFormat::CallSyntax, call_syntax_calls(&text, &is_tool)),
    ]
    .into_iter()
    .find(|(_, calls)| !calls.is_empty())
    .map(|(format, calls)| Extraction { format, calls })
}

static THINK_CLOSED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").ok());
static THINK_OPEN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<think>.*").ok());

/// Remove `<think>...</think>` blocks, including one left unclosed at the
/// end of the reply.
pub fn strip_thinking(text: &str) -> String {
    let mut out = text.to_string();
    for re in [&THINK_CLOSED, &THINK_OPEN].into_iter().filter_map(|r| r.as_ref()) {
        out = re.replace_all(&out, "").into_owned();
    }
    out.trim().to_string()
}

// ── 1. native ──────────────────────────────────────────────────────────────

pub fn native_calls(message: &Message) -> Vec<ExtractedCall> {
    message
        .tool_calls
        .iter()
        .map(|tc| {
            let id = Some(tc.id.clone()).filter(|id| !id.is_empty());
            let mut call = match parse_argument_text(&tc.arguments) {
                Ok(arguments) => ExtractedCall {
                    id: None,
                    name: tc.name.clone(),
                    arguments: Ok(arguments),
                    raw_arguments: tc.arguments.clone(),
                },
                Err(reason) => ExtractedCall::malformed(tc.name.clone(), tc.arguments.clone(), reason),
            };
            call.id = id;
            call
        })
        .collect()
}

/// Arguments as a JSON object. Empty text means no arguments; a JSON
/// string holding an object is unwrapped once.
fn parse_argument_text(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON ({e})"))?;
    arguments_object(value)
}

fn arguments_object(value: Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err("arguments must be a JSON object".into()),
        },
        _ => Err("arguments must be a JSON object".into()),
    }
}

/// Read one `{name, arguments}` object, as used by both text encodings.
fn named_call(value: Value, raw: &str) -> ExtractedCall {
    let Value::Object(mut object) = value else {
        return ExtractedCall::malformed(String::new(), raw, "expected a JSON object");
    };
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    if name.is_empty() {
        return ExtractedCall::malformed(name, raw, "missing tool name");
    }
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|id| !id.is_empty());
    let arguments = object
        .remove("arguments")
        .or_else(|| object.remove("parameters"))
        .unwrap_or(Value::Null);
    match arguments_object(arguments) {
        Ok(arguments) => ExtractedCall::parsed(id, name, arguments),
        Err(reason) => ExtractedCall::malformed(name, raw, reason),
    }
}

static NAME_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""name"\s*:\s*"([^"]+)""#).ok());

/// Best-effort tool name from unparseable JSON, for the diagnostic.
fn salvage_name(raw: &str) -> String {
    NAME_FIELD
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

// ── 2. <tool_call> tags ────────────────────────────────────────────────────

static TOOL_CALL_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").ok());

pub fn tagged_calls(text: &str) -> Vec<ExtractedCall> {
    let Some(re) = TOOL_CALL_TAG.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|block| {
            let raw = block.as_str().trim();
            match serde_json::from_str::<Value>(raw) {
                Ok(value) => named_call(value, raw),
                Err(e) => ExtractedCall::malformed(
                    salvage_name(raw),
                    raw,
                    format!("tool call block is not valid JSON ({e})"),
                ),
            }
        })
        .collect()
}

// ── 3. [TOOL_CALLS] list ───────────────────────────────────────────────────

const TOOL_CALLS_MARKER: &str = "[TOOL_CALLS]";

pub fn bracketed_calls(text: &str) -> Vec<ExtractedCall> {
    let Some(start) = text.find(TOOL_CALLS_MARKER) else {
        return Vec::new();
    };
    let rest = text[start + TOOL_CALLS_MARKER.len()..].trim_start();

    // The array may be followed by more text; read exactly one JSON value.
    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Array(items))) => items
            .into_iter()
            .map(|item| {
                let raw = item.to_string();
                named_call(item, &raw)
            })
            .collect(),
        Some(Ok(single @ Value::Object(_))) => {
            let raw = single.to_string();
            vec![named_call(single, &raw)]
        }
        Some(Ok(_)) => vec![ExtractedCall::malformed(
            String::new(),
            rest,
            "expected a JSON array after [TOOL_CALLS]",
        )],
        Some(Err(e)) => vec![ExtractedCall::malformed(
            salvage_name(rest),
            rest,
            format!("tool call list is not valid JSON ({e})"),
        )],
        None => vec![ExtractedCall::malformed(
            String::new(),
            rest,
            "nothing follows [TOOL_CALLS]",
        )],
    }
}

// ── 4. name(key=value) ─────────────────────────────────────────────────────

static CALL_OPEN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b(\w+)\s*\(").ok());
static KEY_VALUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^,\s"']+))"#).ok()
});

pub fn call_syntax_calls(text: &str, is_tool: &impl Fn(&str) -> bool) -> Vec<ExtractedCall> {
    let trimmed = text.trim();
    let bare = trimmed.strip_suffix("()").unwrap_or(trimmed);
    if !bare.is_empty() && is_tool(bare) {
        return vec![ExtractedCall::parsed(None, bare.to_string(), Map::new())];
    }

    let Some(open) = CALL_OPEN.as_ref() else {
        return Vec::new();
    };
    let mut calls = Vec::new();
    let mut from = 0;
    while let Some(caps) = open.captures_at(text, from) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        from = whole.end();
        if !is_tool(name.as_str()) {
            continue;
        }
        let Some(close) = matching_paren(&text[whole.end()..]) else {
            calls.push(ExtractedCall::malformed(
                name.as_str().to_string(),
                &text[whole.end()..],
                "unclosed parenthesis",
            ));
            break;
        };
        let inner = &text[whole.end()..whole.end() + close];
        from = whole.end() + close + 1;
        calls.push(match keyword_arguments(inner) {
            Ok(arguments) => ExtractedCall::parsed(None, name.as_str().to_string(), arguments),
            Err(reason) => ExtractedCall::malformed(name.as_str().to_string(), inner, reason),
        });
    }
    calls
}

/// Offset of the `)` closing an already opened call, skipping quoted text
/// and nested parentheses.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') if depth == 0 => return Some(i),
            (None, ')') => depth -= 1,
            _ => {}
        }
    }
    None
}

fn keyword_arguments(inner: &str) -> Result<Map<String, Value>, String> {
    let mut arguments = Map::new();
    let Some(re) = KEY_VALUE.as_ref() else {
        return Ok(arguments);
    };

    let mut leftover = String::new();
    let mut last = 0;
    for caps in re.captures_iter(inner) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        leftover.push_str(&inner[last..whole.start()]);
        last = whole.end();
        let value = match (caps.get(2), caps.get(3), caps.get(4)) {
            (Some(quoted), _, _) | (None, Some(quoted), _) => Value::String(quoted.as_str().into()),
            (None, None, Some(bare)) => coerce_scalar(bare.as_str()),
            _ => Value::String(String::new()),
        };
        arguments.insert(key.as_str().to_string(), value);
    }
    leftover.push_str(&inner[last..]);

    let stray = leftover.replace(',', "");
    if stray.trim().is_empty() {
        Ok(arguments)
    } else {
        Err(format!("expected key=value arguments, found '{}'", stray.trim()))
    }
}

/// Unquoted values become integers, then floats, then plain strings.
fn coerce_scalar(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
