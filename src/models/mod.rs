use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

pub mod profile;
pub use profile::{SourceProfile, StrategyKind};

/// Exchange-qualified ticker, e.g. `RELIANCE.NS`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Build a symbol from user input, rejecting blank strings
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Symbol(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-name friendly form (`TCS.NS` -> `TCS_NS`)
    pub fn file_stem(&self) -> String {
        self.0.replace(['.', '/', '\\'], "_")
    }
}

/// Symbols from a list file: one per line, `#` starts a comment
pub fn parse_symbol_list(text: &str) -> Vec<Symbol> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .filter_map(Symbol::parse)
        .collect()
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::parse(value).expect("test symbols are never blank")
    }
}

/// Untyped payload returned by an acquisition strategy.
///
/// Expected, but not guaranteed, to carry a sequence of statement blocks
/// somewhere under an `annual` key.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload(Value);

impl RawPayload {
    pub fn new(value: Value) -> Self {
        RawPayload(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match &self.0 {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Follow a chain of object keys, e.g. `["data", "annual"]`
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter().try_fold(&self.0, |current, key| match current {
            Value::Object(map) => map.get(*key),
            _ => None,
        })
    }
}

/// Financial statement category of a block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKind {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    KeyStats,
    Other(String),
}

impl StatementKind {
    /// Map an upstream block label (`INCOME_STATEMENT`, `balance-sheet`, ...) to a kind
    pub fn from_label(label: &str) -> Self {
        let normalized = label
            .trim()
            .to_ascii_uppercase()
            .replace(['-', ' '], "_");

        match normalized.as_str() {
            "INCOME_STATEMENT" | "INCOME" => StatementKind::IncomeStatement,
            "BALANCE_SHEET" | "BALANCE_SHEET_STATEMENT" | "BALANCE" => StatementKind::BalanceSheet,
            "CASH_FLOW" | "CASH_FLOW_STATEMENT" | "CASHFLOW" => StatementKind::CashFlow,
            "KEY_STATS" | "KEY_METRICS" | "KEY_STATISTICS" => StatementKind::KeyStats,
            "" => StatementKind::Other("UNKNOWN".to_string()),
            _ => StatementKind::Other(label.trim().to_string()),
        }
    }

    /// Column prefix used for collision-set fields
    pub fn prefix(&self) -> String {
        match self {
            StatementKind::IncomeStatement => "IS_".to_string(),
            StatementKind::BalanceSheet => "BS_".to_string(),
            StatementKind::CashFlow => "CF_".to_string(),
            StatementKind::KeyStats => "KS_".to_string(),
            StatementKind::Other(kind) => format!("{}_", kind),
        }
    }
}

/// Sort position of a period key.
///
/// Dated keys come first; a bare fiscal year sits at its year end, after a
/// full date falling on the same day. Unparseable keys trail everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PeriodSort {
    Dated { day: NaiveDate, year_only: bool },
    Unparsed,
}

/// Canonical period identifier of a normalized row.
///
/// `2022-12-31` and `2022-12-31T00:00:00` both become the date `2022-12-31`;
/// `2022` stays a fiscal year ordered as `2022-12-31`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeriodKey {
    canonical: String,
    sort: PeriodSort,
}

impl PeriodKey {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(day) = trimmed
            .get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        {
            return PeriodKey {
                canonical: day.format("%Y-%m-%d").to_string(),
                sort: PeriodSort::Dated { day, year_only: false },
            };
        }

        if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
            if let Some(day) = trimmed
                .parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 12, 31))
            {
                return PeriodKey {
                    canonical: trimmed.to_string(),
                    sort: PeriodSort::Dated { day, year_only: true },
                };
            }
        }

        PeriodKey {
            canonical: trimmed.to_string(),
            sort: PeriodSort::Unparsed,
        }
    }

    /// Period identifier from a record field (`"2022-12-31"`, `"2022"` or `2022`)
    pub fn from_json(value: &Value) -> Option<Self> {
        let raw = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if raw.is_empty() {
            None
        } else {
            Some(PeriodKey::parse(&raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Calendar date the key sorts at, when it has one
    pub fn date(&self) -> Option<NaiveDate> {
        match self.sort {
            PeriodSort::Dated { day, .. } => Some(day),
            PeriodSort::Unparsed => None,
        }
    }

    pub fn is_fiscal_year(&self) -> bool {
        matches!(self.sort, PeriodSort::Dated { year_only: true, .. })
    }
}

impl Ord for PeriodKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort
            .cmp(&other.sort)
            .then_with(|| self.canonical.cmp(&other.canonical))
    }
}

impl PartialOrd for PeriodKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// One period of one symbol, flattened across statement kinds
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub period: PeriodKey,
    pub values: BTreeMap<String, Value>,
}

impl NormalizedRow {
    pub fn new(period: PeriodKey) -> Self {
        Self {
            period,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(column.into(), value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub checkpoint_path: String,
    pub checkpoint_every: usize,
    pub request_timeout_ms: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub source_profile_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            checkpoint_path: "financials_master.csv".to_string(),
            checkpoint_every: 10,
            request_timeout_ms: 10_000,
            min_delay_ms: 2_000,
            max_delay_ms: 4_000,
            source_profile_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Config::default();

        let config = Config {
            checkpoint_path: std::env::var("CHECKPOINT_PATH")
                .unwrap_or(defaults.checkpoint_path),
            checkpoint_every: std::env::var("CHECKPOINT_EVERY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.checkpoint_every),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            min_delay_ms: std::env::var("MIN_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_delay_ms),
            max_delay_ms: std::env::var("MAX_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
            source_profile_path: std::env::var("SOURCE_PROFILE_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        };

        if config.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("REQUEST_TIMEOUT_MS must be greater than zero"));
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}
