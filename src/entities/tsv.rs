// runtablesync/src/entities/tsv.rs
use serde_json::Value;

use super::client::Entity;
use crate::errors::Result;
use crate::table::{Cell, RunTable};

fn attribute_cell(value: &Value) -> Cell {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        // Entity references and attribute lists have no flat form; keep their JSON.
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Rebuilds a stored table from listed entities.
///
/// Attribute columns appear in first-seen order and the entity name becomes
/// `id_column`, appended last. Returns `None` when there are no entities.
pub fn table_from_entities(entities: &[Entity], id_column: &str) -> Option<RunTable> {
    if entities.is_empty() {
        return None;
    }
    let mut table = RunTable::new(Vec::<String>::new());
    for entity in entities {
        let attributes = entity
            .attributes
            .iter()
            .filter(|(name, _)| name.as_str() != id_column)
            .map(|(name, value)| (name.clone(), attribute_cell(value)));
        table.push_record(attributes.chain(std::iter::once((
            id_column.to_string(),
            Some(entity.name.clone()),
        ))));
    }
    table.move_column_last(id_column);
    Some(table)
}

/// Serialises a table as a tab-separated upload payload with a header row.
/// Nulls become empty fields.
pub fn to_tsv(table: &RunTable) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SAMPLE_ID_COLUMN;
    use serde_json::json;

    fn entity(name: &str, attributes: Value) -> anyhow::Result<Entity> {
        Ok(serde_json::from_value(json!({
            "name": name,
            "entityType": "sample",
            "attributes": attributes,
        }))?)
    }

    #[test]
    fn test_table_from_entities() -> anyhow::Result<()> {
        let entities = vec![
            entity("abc", json!({"flow_cell_id": "FAO1", "reads": 1200, "reference": null}))?,
            entity("def", json!({"flow_cell_id": "FAO2", "notes": "rerun", "tags": {"itemsType": "AttributeValue", "items": ["a"]}}))?,
        ];

        let table = table_from_entities(&entities, SAMPLE_ID_COLUMN).ok_or_else(|| anyhow::anyhow!("no table"))?;

        assert_eq!(
            table.columns(),
            &["flow_cell_id", "reads", "reference", "notes", "tags", SAMPLE_ID_COLUMN]
                .map(String::from)
        );
        assert_eq!(table.get(0, SAMPLE_ID_COLUMN), Some("abc"));
        assert_eq!(table.get(0, "reads"), Some("1200"));
        assert_eq!(table.get(0, "reference"), None);
        assert_eq!(table.get(0, "notes"), None);
        assert_eq!(table.get(1, "notes"), Some("rerun"));
        assert_eq!(
            table.get(1, "tags"),
            Some(r#"{"itemsType":"AttributeValue","items":["a"]}"#)
        );
        Ok(())
    }

    #[test]
    fn test_table_from_no_entities() {
        assert!(table_from_entities(&[], SAMPLE_ID_COLUMN).is_none());
    }

    #[test]
    fn test_to_tsv() -> anyhow::Result<()> {
        let mut table = RunTable::new([SAMPLE_ID_COLUMN, "flow_cell_id", "notes"]);
        table.push_record([
            (SAMPLE_ID_COLUMN, Some("abc".to_string())),
            ("flow_cell_id", Some("FAO1".to_string())),
            ("notes", None),
        ]);

        let tsv = to_tsv(&table)?;
        assert_eq!(tsv, "entity:sample_id\tflow_cell_id\tnotes\nabc\tFAO1\t\n");
        Ok(())
    }
}
