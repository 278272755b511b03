//! Core types shared by the manager, transports and services.

use crate::error::{RealtimeError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Opaque handle for one open channel, issued by the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelHandle(pub u64);

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of row change reported by the change feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// Which change kinds a subscription listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    Insert,
    Update,
    Delete,
    #[default]
    All,
}

impl EventScope {
    pub fn matches(self, kind: ChangeKind) -> bool {
        match self {
            EventScope::All => true,
            EventScope::Insert => kind == ChangeKind::Insert,
            EventScope::Update => kind == ChangeKind::Update,
            EventScope::Delete => kind == ChangeKind::Delete,
        }
    }

    /// Event name as the platform expects it in a channel request.
    pub fn as_str(self) -> &'static str {
        match self {
            EventScope::Insert => "INSERT",
            EventScope::Update => "UPDATE",
            EventScope::Delete => "DELETE",
            EventScope::All => "*",
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

/// A raw row-change message as delivered by the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangePayload {
    #[serde(default = "default_schema")]
    pub schema: String,

    pub table: String,

    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_timestamp: Option<String>,

    /// Row after the change (INSERT/UPDATE).
    #[serde(default)]
    pub new: Option<Value>,

    /// Row before the change (UPDATE/DELETE), if the table replicates it.
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangePayload {
    pub fn insert(table: impl Into<String>, new: Value) -> Self {
        Self {
            schema: default_schema(),
            table: table.into(),
            event_type: ChangeKind::Insert,
            commit_timestamp: None,
            new: Some(new),
            old: None,
        }
    }

    pub fn update(table: impl Into<String>, old: Value, new: Value) -> Self {
        Self {
            schema: default_schema(),
            table: table.into(),
            event_type: ChangeKind::Update,
            commit_timestamp: None,
            new: Some(new),
            old: Some(old),
        }
    }

    pub fn delete(table: impl Into<String>, old: Value) -> Self {
        Self {
            schema: default_schema(),
            table: table.into(),
            event_type: ChangeKind::Delete,
            commit_timestamp: None,
            new: None,
            old: Some(old),
        }
    }

    /// Parse a payload from its JSON wire form.
    pub fn from_json(text: &str) -> Result<Self> {
        let payload: ChangePayload = serde_json::from_str(text)?;
        if payload.table.is_empty() {
            return Err(RealtimeError::InvalidPayload("missing table".to_string()));
        }
        Ok(payload)
    }

    /// The new row, if present and not an empty object.
    pub fn new_row(&self) -> Option<&Value> {
        non_empty(self.new.as_ref())
    }

    /// The old row, if present and not an empty object.
    pub fn old_row(&self) -> Option<&Value> {
        non_empty(self.old.as_ref())
    }

    /// The row a filter applies to: the old row for deletes, otherwise the new one.
    pub fn record(&self) -> Option<&Value> {
        match self.event_type {
            ChangeKind::Delete => self.old_row(),
            _ => self.new_row(),
        }
    }

    /// Look up a column on [`record`](Self::record).
    pub fn field(&self, column: &str) -> Option<&Value> {
        self.record().and_then(|row| row.get(column))
    }
}

// The platform sends `{}` instead of null for a missing side.
fn non_empty(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Null) | None => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(v) => Some(v),
    }
}

/// Comparison operator of a row filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

impl FilterOp {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "eq" => FilterOp::Eq,
            "neq" => FilterOp::Neq,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "in" => FilterOp::In,
            _ => return None,
        })
    }

    fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::In => "in",
        }
    }
}

/// Row-level filter in the platform's `column=op.value` syntax,
/// e.g. `user_id=eq.u1` or `status=in.(active,pending)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowFilter {
    column: String,
    op: FilterOp,
    values: Vec<String>,
}

impl RowFilter {
    /// Shorthand for `column=eq.value`.
    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            values: vec![value.into()],
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn op(&self) -> FilterOp {
        self.op
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Whether the payload's row satisfies the filter. A missing row or
    /// column never matches.
    pub fn matches(&self, payload: &ChangePayload) -> bool {
        let Some(field) = payload.field(&self.column) else {
            return false;
        };
        let actual = scalar_text(field);

        match self.op {
            FilterOp::Eq => actual == self.values[0],
            FilterOp::Neq => actual != self.values[0],
            FilterOp::In => self.values.iter().any(|v| *v == actual),
            FilterOp::Lt => compare(&actual, &self.values[0]) == Ordering::Less,
            FilterOp::Lte => compare(&actual, &self.values[0]) != Ordering::Greater,
            FilterOp::Gt => compare(&actual, &self.values[0]) == Ordering::Greater,
            FilterOp::Gte => compare(&actual, &self.values[0]) != Ordering::Less,
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// Numeric when both sides parse as numbers, lexicographic otherwise.
fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

impl FromStr for RowFilter {
    type Err = RealtimeError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RealtimeError::InvalidFilter(s.to_string());

        let (column, rest) = s.split_once('=').ok_or_else(invalid)?;
        let column = column.trim();
        if column.is_empty() {
            return Err(invalid());
        }
        let (op, value) = rest.split_once('.').ok_or_else(invalid)?;
        let op = FilterOp::parse(op.trim()).ok_or_else(invalid)?;

        let values = if op == FilterOp::In {
            let inner = value
                .trim()
                .strip_prefix('(')
                .and_then(|v| v.strip_suffix(')'))
                .ok_or_else(invalid)?;
            inner
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect::<Vec<_>>()
        } else {
            vec![value.to_string()]
        };

        if values.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            column: column.to_string(),
            op,
            values,
        })
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            FilterOp::In => write!(
                f,
                "{}=in.({})",
                self.column,
                self.values.join(",")
            ),
            op => write!(f, "{}={}.{}", self.column, op.as_str(), self.values[0]),
        }
    }
}
