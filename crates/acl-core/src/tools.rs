//! Tools the agent can call.

use std::collections::BTreeMap;
use std::sync::Arc;

use acl_protocol::ToolSpec;
use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// A callable tool.
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Run the tool. The returned text is fed back to the model.
    fn call(&self, arguments: &Value) -> Result<String, ToolError>;
}

/// Tools available to an agent, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry the server runs with.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CurrentTime::new()));
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name, tool);
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn call(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.call(arguments)
    }
}

/// Reports the current date and time, optionally in a given timezone.
pub struct CurrentTime {
    clock: fn() -> DateTime<Utc>,
}

impl CurrentTime {
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// Use a fixed clock (tests).
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock }
    }
}

impl Default for CurrentTime {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CurrentTime {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "current_time".to_string(),
            description: "Get the current date and time in ISO 8601 format. \
                          Use this whenever the user asks for the current time or date."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "timezone": {
                        "type": "string",
                        "description": "Timezone: \"UTC\" (default), \"local\", a fixed offset such as \"+09:00\" or \"UTC+9\", or a zone such as \"Asia/Tokyo\"."
                    }
                }
            }),
        }
    }

    fn call(&self, arguments: &Value) -> Result<String, ToolError> {
        let timezone = match arguments.get("timezone") {
            None | Some(Value::Null) => "UTC",
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "timezone must be a string, got {other}"
                )))
            }
        };

        let now = (self.clock)();
        let offset = resolve_offset(timezone, now)?;
        Ok(now
            .with_timezone(&offset)
            .to_rfc3339_opts(SecondsFormat::Secs, false))
    }
}

/// Zones without daylight saving time, which a fixed offset represents exactly.
const NAMED_ZONES: &[(&str, i32)] = &[
    ("asia/tokyo", 9 * 3600),
    ("jst", 9 * 3600),
    ("asia/seoul", 9 * 3600),
    ("kst", 9 * 3600),
    ("asia/shanghai", 8 * 3600),
    ("asia/hong_kong", 8 * 3600),
    ("asia/singapore", 8 * 3600),
    ("asia/taipei", 8 * 3600),
    ("asia/kolkata", 5 * 3600 + 1800),
    ("ist", 5 * 3600 + 1800),
    ("asia/bangkok", 7 * 3600),
    ("asia/dubai", 4 * 3600),
    ("etc/utc", 0),
];

fn resolve_offset(timezone: &str, now: DateTime<Utc>) -> Result<FixedOffset, ToolError> {
    let unknown = || ToolError::UnknownTimezone(timezone.to_string());
    let tz = timezone.trim();
    let lower = tz.to_ascii_lowercase();

    match lower.as_str() {
        "" | "utc" | "z" | "gmt" => return FixedOffset::east_opt(0).ok_or_else(unknown),
        "local" => return Ok(now.with_timezone(&Local).fixed_offset().timezone()),
        _ => {}
    }

    if let Some((_, secs)) = NAMED_ZONES.iter().find(|(name, _)| *name == lower) {
        return FixedOffset::east_opt(*secs).ok_or_else(unknown);
    }

    let numeric = lower
        .strip_prefix("utc")
        .or_else(|| lower.strip_prefix("gmt"))
        .unwrap_or(&lower);
    let secs = parse_offset(numeric).ok_or_else(unknown)?;
    FixedOffset::east_opt(secs).ok_or_else(unknown)
}

/// Parse `+9`, `-05:30`, `+0900` into seconds east of UTC.
fn parse_offset(s: &str) -> Option<i32> {
    if !s.is_ascii() {
        return None;
    }
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    if hours.is_empty() || !hours.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}
