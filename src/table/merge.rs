// runtablesync/src/table/merge.rs
use std::collections::HashMap;

use super::{Cell, RunTable, first_populated, is_absent};
use crate::errors::{AppError, Result};

/// Which side of the outer join a candidate row came from.
///
/// The variant order is the order candidates are consulted in when a key has
/// more than one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    OldOnly,
    NewOnly,
    Both,
}

/// Reconciles the previously stored table with a freshly scanned one.
///
/// Old and new rows are outer-joined on every column the two tables share, so
/// rows that agree everywhere collapse into one candidate. Candidates are then
/// grouped by `key`: a single candidate passes through untouched, otherwise
/// each column takes the first non-absent value (old rows first, then new
/// rows, then joined rows), or the empty string. The result has exactly one
/// row per key, with `key` as the first column.
///
/// Without an old table the new table is reduced on its own, which leaves it
/// unchanged when it is already unique by key.
pub fn merge_tables(old: Option<&RunTable>, new: &RunTable, key: &str) -> Result<RunTable> {
    if new.column_index(key).is_none() {
        return Err(AppError::MissingColumn(key.to_string()));
    }

    let (outer, sides) = match old {
        Some(old) => {
            if old.column_index(key).is_none() {
                return Err(AppError::MissingColumn(key.to_string()));
            }
            outer_join(old, new)
        }
        None => (new.clone(), vec![Side::NewOnly; new.len()]),
    };

    let key_idx = outer
        .column_index(key)
        .ok_or_else(|| AppError::MissingColumn(key.to_string()))?;

    let mut key_order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, row) in outer.rows.iter().enumerate() {
        let cell = &row[key_idx];
        match cell.as_deref() {
            Some(value) if !is_absent(cell) => {
                let members = groups.entry(value).or_insert_with(|| {
                    key_order.push(value);
                    Vec::new()
                });
                members.push(idx);
            }
            _ => tracing::warn!(row = idx, "Dropping row without a {} value", key),
        }
    }

    let width = outer.columns.len();
    let mut merged = RunTable::new(outer.columns.iter().cloned());
    for value in key_order {
        let mut members = groups.remove(value).unwrap_or_default();
        if let [single] = members.as_slice() {
            merged.push_row(outer.rows[*single].clone());
            continue;
        }

        members.sort_by_key(|&idx| sides[idx]);
        tracing::debug!(key = value, candidates = members.len(), "Resolving duplicate rows");
        let candidates: Vec<&Vec<Cell>> = members.iter().map(|&idx| &outer.rows[idx]).collect();
        let row = first_populated(&candidates, width)
            .into_iter()
            .map(|cell| if is_absent(&cell) { Some(String::new()) } else { cell })
            .collect();
        merged.push_row(row);
    }

    merged.move_column_first(key)?;
    Ok(merged)
}

/// Outer join on all shared columns; a null only matches a null.
///
/// Output columns are the old columns followed by the new-only ones. Old rows
/// keep their order (expanded in place when they match new rows), then the
/// unmatched new rows follow.
fn outer_join(old: &RunTable, new: &RunTable) -> (RunTable, Vec<Side>) {
    let shared: Vec<(usize, usize)> = old
        .columns
        .iter()
        .enumerate()
        .filter_map(|(oi, name)| new.column_index(name).map(|ni| (oi, ni)))
        .collect();
    let new_only: Vec<usize> = (0..new.columns.len())
        .filter(|ni| old.column_index(&new.columns[*ni]).is_none())
        .collect();

    let mut columns = old.columns.clone();
    columns.extend(new_only.iter().map(|&ni| new.columns[ni].clone()));
    let mut joined = RunTable::new(columns);
    let mut sides = Vec::new();

    let mut by_shared: HashMap<Vec<&Cell>, Vec<usize>> = HashMap::new();
    for (ni, row) in new.rows.iter().enumerate() {
        let join_key: Vec<&Cell> = shared.iter().map(|&(_, c)| &row[c]).collect();
        by_shared.entry(join_key).or_default().push(ni);
    }

    let mut matched = vec![false; new.rows.len()];
    for old_row in &old.rows {
        let join_key: Vec<&Cell> = shared.iter().map(|&(c, _)| &old_row[c]).collect();
        match by_shared.get(&join_key) {
            Some(matches) => {
                for &ni in matches {
                    matched[ni] = true;
                    let mut row = old_row.clone();
                    row.extend(new_only.iter().map(|&c| new.rows[ni][c].clone()));
                    joined.push_row(row);
                    sides.push(Side::Both);
                }
            }
            None => {
                let mut row = old_row.clone();
                row.extend(new_only.iter().map(|_| None));
                joined.push_row(row);
                sides.push(Side::OldOnly);
            }
        }
    }

    for (ni, new_row) in new.rows.iter().enumerate() {
        if matched[ni] {
            continue;
        }
        let mut row: Vec<Cell> = vec![None; old.columns.len()];
        for &(oi, c) in &shared {
            row[oi] = new_row[c].clone();
        }
        row.extend(new_only.iter().map(|&c| new_row[c].clone()));
        joined.push_row(row);
        sides.push(Side::NewOnly);
    }

    (joined, sides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SAMPLE_ID_COLUMN;

    fn table(columns: &[&str], rows: &[&[Option<&str>]]) -> RunTable {
        let mut t = RunTable::new(columns.iter().copied());
        for row in rows {
            t.push_record(
                columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.to_string(), v.map(str::to_string))),
            );
        }
        t
    }

    fn rows_for<'a>(t: &'a RunTable, key: &str) -> Vec<&'a Vec<Cell>> {
        t.rows()
            .iter()
            .filter(|row| row[0].as_deref() == Some(key))
            .collect()
    }

    #[test]
    fn test_merge_prefers_populated_values() -> anyhow::Result<()> {
        let old = table(&["id", "x", "y"], &[&[Some("A"), Some("1"), Some("")]]);
        let new = table(&["id", "x", "y"], &[&[Some("A"), Some(""), Some("2")]]);

        let merged = merge_tables(Some(&old), &new, "id")?;

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(0, "id"), Some("A"));
        assert_eq!(merged.get(0, "x"), Some("1"));
        assert_eq!(merged.get(0, "y"), Some("2"));
        Ok(())
    }

    #[test]
    fn test_merge_without_old_table_returns_new() -> anyhow::Result<()> {
        let new = table(
            &["id", "x"],
            &[&[Some("B"), Some("None")], &[Some("A"), Some("1")]],
        );

        let merged = merge_tables(None, &new, "id")?;
        assert_eq!(merged, new);
        Ok(())
    }

    #[test]
    fn test_merge_one_row_per_key() -> anyhow::Result<()> {
        let old = table(
            &["id", "x"],
            &[&[Some("A"), Some("1")], &[Some("B"), Some("2")]],
        );
        let new = table(
            &["id", "x"],
            &[&[Some("A"), Some("3")], &[Some("C"), Some("4")], &[Some("B"), Some("2")]],
        );

        let merged = merge_tables(Some(&old), &new, "id")?;

        assert_eq!(merged.len(), 3);
        for key in ["A", "B", "C"] {
            assert_eq!(rows_for(&merged, key).len(), 1, "key {key}");
        }
        // Both sides populated: the previously stored value wins.
        assert_eq!(rows_for(&merged, "A")[0][1].as_deref(), Some("1"));
        assert_eq!(rows_for(&merged, "C")[0][1].as_deref(), Some("4"));
        Ok(())
    }

    #[test]
    fn test_merge_treats_none_and_nan_as_absent() -> anyhow::Result<()> {
        let old = table(
            &["id", "x", "y"],
            &[&[Some("A"), Some("None"), Some("nan")]],
        );
        let new = table(&["id", "x", "y"], &[&[Some("A"), Some("7"), Some("8")]]);

        let merged = merge_tables(Some(&old), &new, "id")?;
        assert_eq!(merged.get(0, "x"), Some("7"));
        assert_eq!(merged.get(0, "y"), Some("8"));
        Ok(())
    }

    #[test]
    fn test_merge_all_absent_becomes_empty_string() -> anyhow::Result<()> {
        let old = table(&["id", "x", "y"], &[&[Some("A"), Some("None"), Some("1")]]);
        let new = table(&["id", "x", "y"], &[&[Some("A"), Some("nan"), Some("2")]]);

        let merged = merge_tables(Some(&old), &new, "id")?;
        assert_eq!(merged.get(0, "x"), Some(""));
        assert_eq!(merged.get(0, "y"), Some("1"));
        Ok(())
    }

    #[test]
    fn test_merge_identical_rows_pass_through() -> anyhow::Result<()> {
        let old = table(&["id", "x"], &[&[Some("A"), Some("None")]]);
        let new = table(&["id", "x"], &[&[Some("A"), Some("None")]]);

        let merged = merge_tables(Some(&old), &new, "id")?;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(0, "x"), Some("None"));
        Ok(())
    }

    #[test]
    fn test_merge_union_of_columns_with_identifier_first() -> anyhow::Result<()> {
        let old = table(
            &["reference", SAMPLE_ID_COLUMN],
            &[&[Some("hg38"), Some("A")]],
        );
        let new = table(
            &[SAMPLE_ID_COLUMN, "flow_cell_id"],
            &[&[Some("A"), Some("FAO1")], &[Some("B"), Some("FAO2")]],
        );

        let merged = merge_tables(Some(&old), &new, SAMPLE_ID_COLUMN)?;

        assert_eq!(
            merged.columns(),
            &[
                SAMPLE_ID_COLUMN.to_string(),
                "reference".to_string(),
                "flow_cell_id".to_string()
            ]
        );
        // Old and new rows for A share the key column, so they join into one row.
        let a = rows_for(&merged, "A");
        assert_eq!(a.len(), 1);
        assert_eq!(a[0][1].as_deref(), Some("hg38"));
        assert_eq!(a[0][2].as_deref(), Some("FAO1"));
        // B has no stored counterpart; its reference stays null.
        let b = rows_for(&merged, "B");
        assert_eq!(b[0][1], None);
        Ok(())
    }

    #[test]
    fn test_merge_keeps_information_from_both_sides() -> anyhow::Result<()> {
        let old = table(
            &["id", "notes", "sample_name"],
            &[&[Some("A"), Some("resequenced"), Some("unknown")]],
        );
        let new = table(
            &["id", "notes", "sample_name"],
            &[&[Some("A"), Some("none"), Some("patient7")]],
        );

        let merged = merge_tables(Some(&old), &new, "id")?;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(0, "notes"), Some("resequenced"));
        assert_eq!(merged.get(0, "sample_name"), Some("unknown"));
        Ok(())
    }

    #[test]
    fn test_merge_drops_rows_without_identifier() -> anyhow::Result<()> {
        let new = table(&["id", "x"], &[&[None, Some("1")], &[Some("A"), Some("2")]]);

        let merged = merge_tables(None, &new, "id")?;
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(0, "id"), Some("A"));
        Ok(())
    }

    #[test]
    fn test_merge_requires_identifier_column() {
        let new = table(&["x"], &[&[Some("1")]]);
        assert!(matches!(
            merge_tables(None, &new, "id"),
            Err(AppError::MissingColumn(_))
        ));

        let old = table(&["x"], &[&[Some("1")]]);
        let new = table(&["id"], &[&[Some("A")]]);
        assert!(merge_tables(Some(&old), &new, "id").is_err());
    }
}
