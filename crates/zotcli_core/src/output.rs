use anyhow::{Result, bail};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

pub const NO_DATA_MESSAGE: &str = "No data to display.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Keys,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "table" => Ok(Self::Table),
            "keys" => Ok(Self::Keys),
            other => bail!("unsupported output format: {other} (expected json|yaml|table|keys)"),
        }
    }
}

/// One table column: display header plus a dot path into each row object
/// (`data.name`, `meta.numItems`, ...).
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub path: &'static str,
}

impl Column {
    pub const fn new(header: &'static str, path: &'static str) -> Self {
        Self { header, path }
    }
}

/// Render heterogeneous API data into the requested format.
///
/// `columns` drives table layout; when empty, headers are derived from the
/// first object's keys. `key_field` is the field extracted per row for the
/// `keys` format, looked up in the object root and then its `data`
/// sub-object.
pub fn format_value(
    data: &Value,
    format: OutputFormat,
    columns: &[Column],
    key_field: &str,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(data)?),
        OutputFormat::Table => Ok(format_table(data, columns)),
        OutputFormat::Keys => Ok(format_keys(data, key_field)),
    }
}

pub fn format_table(data: &Value, columns: &[Column]) -> String {
    let rows = as_rows(data);
    if rows.is_empty() {
        return NO_DATA_MESSAGE.to_string();
    }

    let (headers, cells) = if !columns.is_empty() {
        let headers = columns
            .iter()
            .map(|column| column.header.to_string())
            .collect::<Vec<_>>();
        let cells = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| {
                        value_at_path(row, column.path)
                            .map(scalar_to_string)
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        (headers, cells)
    } else if let Some(object) = rows[0].as_object() {
        // No declared columns: derive them from the first object's keys.
        let headers = object.keys().cloned().collect::<Vec<_>>();
        let cells = rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|header| {
                        row.get(header)
                            .map(scalar_to_string)
                            .unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        (headers, cells)
    } else {
        // Scalar list.
        let cells = rows
            .iter()
            .map(|row| vec![scalar_to_string(row)])
            .collect::<Vec<_>>();
        (vec!["Value".to_string()], cells)
    };

    render_aligned(&headers, &cells)
}

pub fn format_keys(data: &Value, key_field: &str) -> String {
    let rows = as_rows(data);
    let mut keys = Vec::new();
    for row in rows {
        let value = match row {
            Value::Object(object) => object
                .get(key_field)
                .or_else(|| object.get("data").and_then(|data| data.get(key_field))),
            scalar => Some(scalar),
        };
        if let Some(value) = value {
            let rendered = scalar_to_string(value);
            if !rendered.is_empty() {
                keys.push(rendered);
            }
        }
    }
    keys.join("\n")
}

/// Walk a dot path through nested objects.
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn as_rows(data: &Value) -> Vec<&Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn render_aligned(headers: &[String], cells: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.width())
        .collect::<Vec<_>>();
    for row in cells {
        for (index, cell) in row.iter().enumerate() {
            if index < widths.len() {
                widths[index] = widths[index].max(cell.width());
            }
        }
    }

    let mut lines = Vec::with_capacity(cells.len() + 2);
    lines.push(render_row(headers, &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in cells {
        lines.push(render_row(row, &widths));
    }
    lines.join("\n")
}

fn render_row(cells: &[String], widths: &[usize]) -> String {
    let rendered = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let padding = width.saturating_sub(cell.width());
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    rendered.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_known_formats_only() {
        assert_eq!(OutputFormat::parse("JSON").expect("parse"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("yaml").expect("parse"), OutputFormat::Yaml);
        assert!(OutputFormat::parse("xml").is_err());
    }

    #[test]
    fn json_output_round_trips() {
        let data = json!([{"key": "ABC", "data": {"name": "Reading"}}]);
        let rendered =
            format_value(&data, OutputFormat::Json, &[], "key").expect("format");
        let parsed: Value = serde_json::from_str(&rendered).expect("valid JSON");
        assert_eq!(parsed, data);
    }

    #[test]
    fn yaml_output_is_valid_yaml() {
        let data = json!([{"tag": "biology", "meta": {"numItems": 3}}]);
        let rendered =
            format_value(&data, OutputFormat::Yaml, &[], "tag").expect("format");
        let parsed: Value = serde_yaml::from_str(&rendered).expect("valid YAML");
        assert_eq!(parsed, data);
    }

    #[test]
    fn table_columns_match_declared_headers() {
        let data = json!([
            {"key": "C1", "version": 10, "data": {"name": "First"}, "meta": {"numItems": 2}},
            {"key": "C2", "version": 11, "data": {"name": "Second"}}
        ]);
        let columns = [
            Column::new("Key", "key"),
            Column::new("Name", "data.name"),
            Column::new("Items", "meta.numItems"),
        ];
        let table = format_table(&data, &columns);
        let mut lines = table.lines();
        let header = lines.next().expect("header line");
        assert!(header.contains("Key"));
        assert!(header.contains("Name"));
        assert!(header.contains("Items"));
        let separator = lines.next().expect("separator line");
        assert!(separator.chars().all(|ch| ch == '-' || ch == ' '));
        let first = lines.next().expect("first row");
        assert!(first.contains("C1"));
        assert!(first.contains("First"));
        assert!(first.contains('2'));
        // Missing path renders as an empty cell, not a panic.
        let second = lines.next().expect("second row");
        assert!(second.contains("Second"));
    }

    #[test]
    fn table_over_empty_list_prints_placeholder() {
        assert_eq!(format_table(&json!([]), &[]), NO_DATA_MESSAGE);
    }

    #[test]
    fn table_without_columns_derives_headers_from_first_object() {
        let data = json!([{"name": "alpha", "count": 1}]);
        let table = format_table(&data, &[]);
        let header = table.lines().next().expect("header");
        assert!(header.contains("name"));
        assert!(header.contains("count"));
    }

    #[test]
    fn scalar_list_gets_a_value_column() {
        let table = format_table(&json!(["one", "two"]), &[]);
        assert!(table.starts_with("Value"));
        assert!(table.contains("one"));
        assert!(table.contains("two"));
    }

    #[test]
    fn keys_extraction_falls_back_to_data_subobject() {
        let data = json!([
            {"key": "TOP"},
            {"data": {"key": "NESTED"}},
            {"unrelated": true}
        ]);
        assert_eq!(format_keys(&data, "key"), "TOP\nNESTED");
    }

    #[test]
    fn keys_over_scalars_uses_values() {
        assert_eq!(format_keys(&json!(["a", "b"]), "key"), "a\nb");
    }

    #[test]
    fn keys_stringifies_numbers() {
        let data = json!([{"id": 5511}, {"id": 5512}]);
        assert_eq!(format_keys(&data, "id"), "5511\n5512");
    }

    #[test]
    fn value_at_path_walks_nested_objects() {
        let data = json!({"links": {"alternate": {"href": "https://example.org"}}});
        assert_eq!(
            value_at_path(&data, "links.alternate.href")
                .and_then(Value::as_str),
            Some("https://example.org")
        );
        assert!(value_at_path(&data, "links.missing.href").is_none());
    }
}
