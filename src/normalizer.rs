//! Flatten statement blocks into one row per fiscal period.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::errors::NormalizeError;
use crate::models::{NormalizedRow, PeriodKey, RawPayload, StatementKind};

/// Record metadata that never becomes a column
pub const RESERVED_FIELDS: [&str; 9] = [
    "symbol",
    "reportedCurrency",
    "cik",
    "fillingDate",
    "acceptedDate",
    "calendarYear",
    "period",
    "link",
    "finalLink",
];

/// Fields every statement kind carries; kept per kind under a prefix
pub const COLLISION_FIELDS: [&str; 2] = ["link", "finalLink"];

/// Where the block list may live, checked in order
const BLOCK_PATHS: [&[&str]; 3] = [&["annual"], &["data", "annual"], &["financials", "annual"]];

/// A statement block borrowed from the payload
#[derive(Debug)]
pub struct StatementBlock<'a> {
    pub kind: StatementKind,
    pub records: &'a [Value],
}

impl<'a> StatementBlock<'a> {
    /// `{"type": "...", "data": [...]}`; `kind`/`records` are accepted as aliases
    pub fn from_value(value: &'a Value) -> Option<Self> {
        let block = value.as_object()?;
        let records = block
            .get("data")
            .or_else(|| block.get("records"))?
            .as_array()?;
        let label = block
            .get("type")
            .or_else(|| block.get("kind"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        Some(Self {
            kind: StatementKind::from_label(label),
            records,
        })
    }
}

/// Rows in first-seen order with O(1) lookup by period
#[derive(Default)]
struct RowAccumulator {
    rows: Vec<NormalizedRow>,
    index: HashMap<PeriodKey, usize>,
}

impl RowAccumulator {
    fn entry(&mut self, period: PeriodKey) -> &mut NormalizedRow {
        let next = self.rows.len();
        let position = *self.index.entry(period.clone()).or_insert(next);
        if position == next {
            self.rows.push(NormalizedRow::new(period));
        }
        &mut self.rows[position]
    }

    fn into_rows(self) -> Vec<NormalizedRow> {
        self.rows
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StatementNormalizer;

impl StatementNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Merge every block of `payload` into rows sorted by period.
    ///
    /// A bare field present in several blocks keeps the value of the block
    /// processed last.
    pub fn normalize(&self, payload: &RawPayload) -> Result<Vec<NormalizedRow>, NormalizeError> {
        let blocks = locate_blocks(payload).ok_or(NormalizeError::MissingStatements)?;
        let mut accumulator = RowAccumulator::default();

        for (block_index, raw_block) in blocks.iter().enumerate() {
            let Some(block) = StatementBlock::from_value(raw_block) else {
                debug!("Skipping malformed statement block #{}", block_index);
                continue;
            };

            for record in block.records {
                let Some(fields) = record.as_object() else {
                    debug!("Skipping non-object record in {:?} block", block.kind);
                    continue;
                };
                let Some(period) = period_of(fields) else {
                    debug!("Skipping {:?} record without date or calendarYear", block.kind);
                    continue;
                };

                let row = accumulator.entry(period);
                merge_record(row, &block.kind, fields);
            }
        }

        let mut rows = accumulator.into_rows();
        if rows.is_empty() {
            return Err(NormalizeError::NoRows);
        }

        rows.sort_by(|a, b| a.period.cmp(&b.period));
        Ok(rows)
    }
}

fn locate_blocks(payload: &RawPayload) -> Option<&Vec<Value>> {
    BLOCK_PATHS
        .iter()
        .find_map(|path| payload.lookup(path).and_then(Value::as_array))
}

fn period_of(fields: &Map<String, Value>) -> Option<PeriodKey> {
    fields
        .get("date")
        .and_then(PeriodKey::from_json)
        .or_else(|| fields.get("calendarYear").and_then(PeriodKey::from_json))
}

fn merge_record(row: &mut NormalizedRow, kind: &StatementKind, fields: &Map<String, Value>) {
    for (name, value) in fields {
        if name == "date" {
            continue;
        }
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            continue;
        }

        if COLLISION_FIELDS.contains(&name.as_str()) {
            row.insert(format!("{}{}", kind.prefix(), name), value.clone());
        } else if !RESERVED_FIELDS.contains(&name.as_str()) {
            row.insert(name.clone(), value.clone());
        }
    }
}

/// Ordering bucket of a column: the four statement prefixes, then other
/// prefixed collision columns, then plain metric names
fn column_group(column: &str) -> u8 {
    const PREFIXES: [&str; 4] = ["IS_", "BS_", "CF_", "KS_"];

    if let Some(group) = PREFIXES.iter().position(|p| column.starts_with(p)) {
        return group as u8;
    }
    let other_prefixed = COLLISION_FIELDS.iter().any(|field| {
        column
            .strip_suffix(field)
            .map_or(false, |head| head.len() > 1 && head.ends_with('_'))
    });
    if other_prefixed {
        4
    } else {
        5
    }
}

/// Order metric columns: statement groups first, alphabetical within a group.
///
/// `period` (and `symbol`) are key columns and are left out.
pub fn order_columns<'a, I>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let unique: BTreeSet<&str> = columns
        .into_iter()
        .filter(|c| *c != "period" && *c != "symbol")
        .collect();

    let mut ordered: Vec<String> = unique.into_iter().map(str::to_string).collect();
    ordered.sort_by(|a, b| {
        column_group(a)
            .cmp(&column_group(b))
            .then_with(|| a.cmp(b))
    });
    ordered
}

/// Table header for a set of rows: `period` then the ordered metric columns
pub fn column_order(rows: &[NormalizedRow]) -> Vec<String> {
    let mut header = vec!["period".to_string()];
    header.extend(order_columns(rows.iter().flat_map(NormalizedRow::columns)));
    header
}
