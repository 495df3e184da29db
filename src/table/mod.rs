// runtablesync/src/table/mod.rs
pub(crate) mod merge;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::errors::{AppError, Result};

pub use merge::merge_tables;

/// Identifier column of the workspace `sample` table.
pub const SAMPLE_ID_COLUMN: &str = "entity:sample_id";

/// A single table cell. `None` is a true null (e.g. a column the row never had).
pub type Cell = Option<String>;

/// Returns true when a cell carries no real data.
///
/// Upstream tables emit the literal sentinels `"None"` and `"nan"` for missing
/// values, so those count as absent alongside nulls and empty strings.
pub fn is_absent(cell: &Cell) -> bool {
    match cell.as_deref() {
        None => true,
        Some(value) => value.is_empty() || value == "None" || value == "nan",
    }
}

/// An ordered, column-addressed table of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RunTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| AppError::MissingColumn(name.to_string()))
    }

    /// Value of `column` in row `row`, if both exist and the cell is not null.
    #[cfg(test)]
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Appends a row given as `(column, value)` pairs.
    ///
    /// Columns the table has not seen yet are appended and back-filled with
    /// nulls; columns the record does not mention are null in the new row.
    pub fn push_record<I, K, V>(&mut self, record: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Cell>,
    {
        let mut row: Vec<Cell> = vec![None; self.columns.len()];
        for (column, value) in record {
            let column = column.into();
            let idx = match self.column_index(&column) {
                Some(idx) => idx,
                None => {
                    self.columns.push(column);
                    for existing in &mut self.rows {
                        existing.push(None);
                    }
                    row.push(None);
                    self.columns.len() - 1
                }
            };
            row[idx] = value.into();
        }
        self.rows.push(row);
    }

    pub(crate) fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Removes a column if present.
    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
    }

    /// Reorders columns so that `name` comes first, keeping the rest in order.
    pub fn move_column_first(&mut self, name: &str) -> Result<()> {
        let idx = self.require_column(name)?;
        if idx == 0 {
            return Ok(());
        }
        let column = self.columns.remove(idx);
        self.columns.insert(0, column);
        for row in &mut self.rows {
            let cell = row.remove(idx);
            row.insert(0, cell);
        }
        Ok(())
    }

    /// Reorders columns so that `name` comes last, if present.
    pub fn move_column_last(&mut self, name: &str) {
        let Some(idx) = self.column_index(name) else {
            return;
        };
        let column = self.columns.remove(idx);
        self.columns.push(column);
        for row in &mut self.rows {
            let cell = row.remove(idx);
            row.push(cell);
        }
    }

    /// Collapses rows sharing a value in `key` into one row.
    ///
    /// Rows are first stably sorted by the `sort_by` columns that exist in the
    /// table (nulls last). Each group then takes, per column, the first
    /// non-absent value in sorted order, or the first row's raw value when no
    /// row has one. Groups come out in ascending key order with `key` as the
    /// first column; rows whose key is absent follow unchanged.
    pub fn collapse_by(&self, key: &str, sort_by: &[&str]) -> Result<RunTable> {
        self.collapse_by_except(key, sort_by, &[])
    }

    /// Like [`RunTable::collapse_by`], but rows whose key is one of
    /// `passthrough` are treated like keyless rows and kept as they are.
    pub fn collapse_by_except(
        &self,
        key: &str,
        sort_by: &[&str],
        passthrough: &[&str],
    ) -> Result<RunTable> {
        let key_idx = self.require_column(key)?;
        let sort_idx: Vec<usize> = sort_by
            .iter()
            .filter_map(|column| self.column_index(column))
            .collect();

        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            sort_idx
                .iter()
                .map(|&c| compare_cells(&self.rows[a][c], &self.rows[b][c]))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut keyless = Vec::new();
        for idx in order {
            let cell = &self.rows[idx][key_idx];
            match cell.as_deref() {
                Some(value) if !is_absent(cell) && !passthrough.contains(&value) => {
                    groups.entry(value).or_default().push(idx)
                }
                _ => keyless.push(idx),
            }
        }

        let mut collapsed = RunTable {
            columns: self.columns.clone(),
            rows: Vec::with_capacity(groups.len() + keyless.len()),
        };
        for members in groups.values() {
            let candidates: Vec<&Vec<Cell>> = members.iter().map(|&i| &self.rows[i]).collect();
            collapsed.rows.push(first_populated(&candidates, self.columns.len()));
        }
        for idx in keyless {
            collapsed.rows.push(self.rows[idx].clone());
        }
        collapsed.move_column_first(key)?;
        Ok(collapsed)
    }
}

fn compare_cells(a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Per column, the first non-absent value across `candidates`; falls back to
/// the first candidate's cell.
fn first_populated(candidates: &[&Vec<Cell>], width: usize) -> Vec<Cell> {
    (0..width)
        .map(|c| {
            candidates
                .iter()
                .map(|row| &row[c])
                .find(|cell| !is_absent(cell))
                .or_else(|| candidates.first().map(|row| &row[c]))
                .cloned()
                .flatten()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(value: &str) -> Cell {
        Some(value.to_string())
    }

    #[test]
    fn test_is_absent_sentinels() {
        assert!(is_absent(&None));
        assert!(is_absent(&cell("")));
        assert!(is_absent(&cell("None")));
        assert!(is_absent(&cell("nan")));
        assert!(!is_absent(&cell("NA")));
        assert!(!is_absent(&cell("unknown")));
        assert!(!is_absent(&cell("0")));
    }

    #[test]
    fn test_push_record_backfills_new_columns() {
        let mut table = RunTable::new(["a"]);
        table.push_record([("a", cell("1"))]);
        table.push_record([("b", cell("2")), ("a", cell("3"))]);

        assert_eq!(table.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.rows()[0], vec![cell("1"), None]);
        assert_eq!(table.rows()[1], vec![cell("3"), cell("2")]);
    }

    #[test]
    fn test_move_column_first() -> anyhow::Result<()> {
        let mut table = RunTable::new(["x", "y", "id"]);
        table.push_record([("x", cell("1")), ("y", cell("2")), ("id", cell("A"))]);
        table.move_column_first("id")?;

        assert_eq!(table.columns()[0], "id");
        assert_eq!(table.columns()[1..], ["x".to_string(), "y".to_string()]);
        assert_eq!(table.rows()[0], vec![cell("A"), cell("1"), cell("2")]);
        Ok(())
    }

    #[test]
    fn test_move_column_first_missing_column() {
        let mut table = RunTable::new(["x"]);
        assert!(matches!(
            table.move_column_first("id"),
            Err(AppError::MissingColumn(c)) if c == "id"
        ));
    }

    #[test]
    fn test_drop_column() {
        let mut table = RunTable::new(["a", "b", "c"]);
        table.push_record([("a", cell("1")), ("b", cell("2")), ("c", cell("3"))]);
        table.drop_column("b");
        table.drop_column("missing");

        assert_eq!(table.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(table.rows()[0], vec![cell("1"), cell("3")]);
    }

    #[test]
    fn test_collapse_by_keeps_earliest_row_per_basename() -> anyhow::Result<()> {
        let mut table = RunTable::new(["id", "basename", "upload_date", "notes"]);
        table.push_record([
            ("id", cell("late")),
            ("basename", cell("run1")),
            ("upload_date", cell("2021-06-01")),
            ("notes", cell("later note")),
        ]);
        table.push_record([
            ("id", cell("early")),
            ("basename", cell("run1")),
            ("upload_date", cell("2021-05-01")),
            ("notes", cell("")),
        ]);
        table.push_record([
            ("id", cell("other")),
            ("basename", cell("run0")),
            ("upload_date", cell("2021-07-01")),
            ("notes", cell("x")),
        ]);

        let collapsed = table.collapse_by("basename", &["basename", "upload_date"])?;

        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed.columns()[0], "basename");
        assert_eq!(collapsed.get(0, "basename"), Some("run0"));
        assert_eq!(collapsed.get(1, "id"), Some("early"));
        assert_eq!(collapsed.get(1, "upload_date"), Some("2021-05-01"));
        // The earliest row had no note, so the later row fills it in.
        assert_eq!(collapsed.get(1, "notes"), Some("later note"));
        Ok(())
    }

    #[test]
    fn test_collapse_by_ignores_missing_sort_columns() -> anyhow::Result<()> {
        let mut table = RunTable::new(["id", "flow_cell_id"]);
        table.push_record([("id", cell("B")), ("flow_cell_id", cell("FAO1"))]);
        table.push_record([("id", cell("A")), ("flow_cell_id", cell("FAO1"))]);

        let collapsed = table.collapse_by("flow_cell_id", &["final_summary", "reference"])?;
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed.get(0, "id"), Some("B"));
        Ok(())
    }

    #[test]
    fn test_collapse_by_keeps_keyless_rows() -> anyhow::Result<()> {
        let mut table = RunTable::new(["id", "flow_cell_id"]);
        table.push_record([("id", cell("A")), ("flow_cell_id", cell(""))]);
        table.push_record([("id", cell("B")), ("flow_cell_id", None::<String>)]);
        table.push_record([("id", cell("C")), ("flow_cell_id", cell("FAO1"))]);

        let collapsed = table.collapse_by("flow_cell_id", &[])?;
        assert_eq!(collapsed.len(), 3);
        assert_eq!(collapsed.get(0, "id"), Some("C"));
        assert_eq!(collapsed.get(1, "id"), Some("A"));
        assert_eq!(collapsed.get(2, "id"), Some("B"));
        Ok(())
    }

    #[test]
    fn test_collapse_by_except_passes_listed_keys_through() -> anyhow::Result<()> {
        let mut table = RunTable::new(["id", "flow_cell_id"]);
        table.push_record([("id", cell("A")), ("flow_cell_id", cell("unknown"))]);
        table.push_record([("id", cell("B")), ("flow_cell_id", cell("unknown"))]);
        table.push_record([("id", cell("C")), ("flow_cell_id", cell("FAO1"))]);
        table.push_record([("id", cell("D")), ("flow_cell_id", cell("FAO1"))]);

        let collapsed = table.collapse_by_except("flow_cell_id", &[], &["unknown"])?;
        assert_eq!(collapsed.len(), 3);
        assert_eq!(collapsed.get(0, "id"), Some("C"));
        assert_eq!(collapsed.get(1, "id"), Some("A"));
        assert_eq!(collapsed.get(2, "id"), Some("B"));
        Ok(())
    }

    #[test]
    fn test_collapse_by_preserves_sentinel_when_nothing_populated() -> anyhow::Result<()> {
        let mut table = RunTable::new(["key", "v"]);
        table.push_record([("key", cell("k")), ("v", cell("None"))]);
        table.push_record([("key", cell("k")), ("v", cell("nan"))]);

        let collapsed = table.collapse_by("key", &[])?;
        assert_eq!(collapsed.get(0, "v"), Some("None"));
        Ok(())
    }
}
