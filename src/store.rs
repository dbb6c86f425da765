//! Multi-symbol master table and its CSV checkpoint.

use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::models::{NormalizedRow, PeriodKey, Symbol};
use crate::normalizer::order_columns;

/// Rows per symbol, each symbol's rows sorted by period with unique keys
pub type MasterDataset = BTreeMap<Symbol, Vec<NormalizedRow>>;

const SYMBOL_COLUMN: &str = "symbol";
const PERIOD_COLUMN: &str = "period";

#[derive(Debug, Clone, Default)]
pub struct DatasetStore {
    dataset: MasterDataset,
}

impl From<MasterDataset> for DatasetStore {
    fn from(dataset: MasterDataset) -> Self {
        Self { dataset }
    }
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything held for `symbol` with `rows`.
    ///
    /// Applying the same rows twice leaves the store unchanged. Duplicate
    /// periods within `rows` keep the last occurrence.
    pub fn upsert(&mut self, symbol: Symbol, rows: Vec<NormalizedRow>) {
        let replaced = self.dataset.remove(&symbol).map_or(0, |old| old.len());

        let unique: BTreeMap<PeriodKey, NormalizedRow> = rows
            .into_iter()
            .map(|row| (row.period.clone(), row))
            .collect();
        if unique.is_empty() {
            debug!("Upsert for {} carried no rows; symbol removed", symbol);
            return;
        }

        debug!(
            "Upserting {} rows for {} (replacing {})",
            unique.len(),
            symbol,
            replaced
        );
        self.dataset.insert(symbol, unique.into_values().collect());
    }

    /// Rebuild a dataset from a checkpoint written by [`checkpoint_save`].
    ///
    /// A missing file is an empty dataset. Returns the dataset and the set of
    /// symbols it covers.
    ///
    /// [`checkpoint_save`]: DatasetStore::checkpoint_save
    pub fn load(path: impl AsRef<Path>) -> Result<(MasterDataset, BTreeSet<Symbol>), StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("📂 No checkpoint at {}, starting empty", path.display());
            return Ok((MasterDataset::new(), BTreeSet::new()));
        }

        let load_error = |source: csv::Error| StoreError::Load {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(load_error)?;
        let header: Vec<String> = reader
            .headers()
            .map_err(load_error)?
            .iter()
            .map(str::to_string)
            .collect();

        if header.len() < 2 || header[0] != SYMBOL_COLUMN || header[1] != PERIOD_COLUMN {
            return Err(StoreError::MalformedCheckpoint {
                path: path.to_path_buf(),
                reason: format!("expected header to start with symbol,period; got {:?}", header),
            });
        }

        let mut grouped: BTreeMap<Symbol, BTreeMap<PeriodKey, NormalizedRow>> = BTreeMap::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(load_error)?;

            let symbol = record.get(0).and_then(Symbol::parse);
            let period = record
                .get(1)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PeriodKey::parse);
            let (Some(symbol), Some(period)) = (symbol, period) else {
                warn!("Skipping checkpoint row {} without symbol or period", line + 2);
                continue;
            };

            let mut row = NormalizedRow::new(period.clone());
            for (column, cell) in header.iter().zip(record.iter()).skip(2) {
                if let Some(value) = parse_cell(cell) {
                    row.insert(column.clone(), value);
                }
            }
            grouped.entry(symbol).or_default().insert(period, row);
        }

        let dataset: MasterDataset = grouped
            .into_iter()
            .map(|(symbol, rows)| (symbol, rows.into_values().collect()))
            .collect();
        let symbols: BTreeSet<Symbol> = dataset.keys().cloned().collect();

        info!(
            "📂 Loaded checkpoint {}: {} symbols, {} rows",
            path.display(),
            symbols.len(),
            dataset.values().map(Vec::len).sum::<usize>()
        );
        Ok((dataset, symbols))
    }

    /// Atomically persist the full dataset.
    ///
    /// The table is written to a sibling temporary file, synced, then renamed
    /// over `path`, so readers see either the previous or the new checkpoint.
    pub fn checkpoint_save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        write_table_atomic(path, &self.columns(), self.iter())?;
        info!(
            "💾 Checkpoint saved to {} ({} symbols, {} rows)",
            path.display(),
            self.symbol_count(),
            self.row_count()
        );
        Ok(())
    }

    /// Write one symbol's rows as a standalone table.
    ///
    /// Returns `false` when the symbol is not in the dataset.
    pub fn export_symbol(&self, symbol: &Symbol, path: impl AsRef<Path>) -> Result<bool, StoreError> {
        let Some(rows) = self.dataset.get(symbol) else {
            return Ok(false);
        };

        let mut header = vec![SYMBOL_COLUMN.to_string(), PERIOD_COLUMN.to_string()];
        header.extend(order_columns(rows.iter().flat_map(NormalizedRow::columns)));

        write_table_atomic(path.as_ref(), &header, rows.iter().map(|row| (symbol, row)))?;
        Ok(true)
    }

    /// Write the full table to `out` in checkpoint layout
    pub fn write_csv<W: io::Write>(&self, out: W) -> io::Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        write_records(&mut writer, &self.columns(), self.iter())?;
        writer.flush()
    }

    /// Full table header: `symbol`, `period`, then metric columns in group order
    pub fn columns(&self) -> Vec<String> {
        let mut header = vec![SYMBOL_COLUMN.to_string(), PERIOD_COLUMN.to_string()];
        header.extend(order_columns(
            self.dataset
                .values()
                .flatten()
                .flat_map(NormalizedRow::columns),
        ));
        header
    }

    pub fn row_count(&self) -> usize {
        self.dataset.values().map(Vec::len).sum()
    }

    pub fn symbol_count(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.dataset.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.dataset.keys()
    }

    pub fn rows(&self, symbol: &Symbol) -> Option<&[NormalizedRow]> {
        self.dataset.get(symbol).map(Vec::as_slice)
    }

    /// Earliest and latest period across all symbols
    pub fn period_range(&self) -> Option<(&PeriodKey, &PeriodKey)> {
        let mut periods = self.dataset.values().flatten().map(|row| &row.period);
        let first = periods.next()?;
        Some(periods.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &NormalizedRow)> {
        self.dataset
            .iter()
            .flat_map(|(symbol, rows)| rows.iter().map(move |row| (symbol, row)))
    }

    pub fn into_dataset(self) -> MasterDataset {
        self.dataset
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "dataset.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_table_atomic<'a, I>(path: &Path, header: &[String], rows: I) -> Result<(), StoreError>
where
    I: Iterator<Item = (&'a Symbol, &'a NormalizedRow)>,
{
    let persist_error = |source: io::Error| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_error)?;
    }

    let tmp = temp_path_for(path);
    let result = write_table(&tmp, header, rows).and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = result {
        if tmp.exists() {
            let _ = fs::remove_file(&tmp);
        }
        return Err(persist_error(e));
    }
    Ok(())
}

fn write_table<'a, I>(tmp: &Path, header: &[String], rows: I) -> io::Result<()>
where
    I: Iterator<Item = (&'a Symbol, &'a NormalizedRow)>,
{
    let mut writer = csv::Writer::from_writer(File::create(tmp)?);
    write_records(&mut writer, header, rows)?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

fn write_records<'a, W, I>(writer: &mut csv::Writer<W>, header: &[String], rows: I) -> io::Result<()>
where
    W: io::Write,
    I: Iterator<Item = (&'a Symbol, &'a NormalizedRow)>,
{
    writer.write_record(header)?;

    for (symbol, row) in rows {
        let record = header.iter().map(|column| match column.as_str() {
            SYMBOL_COLUMN => symbol.to_string(),
            PERIOD_COLUMN => row.period.to_string(),
            other => row.get(other).map(render_cell).unwrap_or_default(),
        });
        writer.write_record(record)?;
    }
    Ok(())
}

/// CSV text for a scalar; null is an empty cell
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Best-effort typed value for a CSV cell; empty cells are absent
pub fn parse_cell(cell: &str) -> Option<Value> {
    if cell.is_empty() {
        return None;
    }
    if let Ok(int) = cell.parse::<i64>() {
        return Some(Value::from(int));
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Some(Value::Number(number));
    }
    match cell {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => Some(Value::String(cell.to_string())),
    }
}
