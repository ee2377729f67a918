//! CSV rendering of aggregation rows, one line at a time.

use crate::errors::Result;
use crate::query::HeaderType;
use crate::workspace::{Cube, Record, RecordSet, SPLIT_DIMENSION_NAME};
use hyper::body::Bytes;
use serde_json::Value;

const SPLIT_HEADER: &str = "Matches Filters";

/// Header row for `header_type`, or `None` when no header row is written.
pub fn csv_header(
    header_type: HeaderType,
    labels: &[String],
    cube: &dyn Cube,
) -> Result<Option<Vec<String>>> {
    let header = match header_type {
        HeaderType::None => return Ok(None),
        HeaderType::Names => labels.to_vec(),
        HeaderType::Labels => labels
            .iter()
            .map(|label| human_label(label, cube))
            .collect::<Result<_>>()?,
    };

    if header.is_empty() {
        Ok(None)
    } else {
        Ok(Some(header))
    }
}

fn human_label(label: &str, cube: &dyn Cube) -> Result<String> {
    if label == SPLIT_DIMENSION_NAME {
        return Ok(SPLIT_HEADER.to_string());
    }

    let attributes = cube.get_attributes(&[label], true)?;
    // A column the cube does not describe keeps its raw name, so the header
    // always has one entry per column.
    Ok(attributes
        .first()
        .map(|attribute| attribute.display_label().to_string())
        .unwrap_or_else(|| label.to_string()))
}

/// Writes `records` projected onto `fields`, preceded by the optional header.
pub struct CsvGenerator {
    records: RecordSet,
    fields: Vec<String>,
    header: Option<Vec<String>>,
}

impl CsvGenerator {
    pub fn new(records: RecordSet, fields: Vec<String>, header: Option<Vec<String>>) -> Self {
        CsvGenerator {
            records,
            fields,
            header,
        }
    }

    /// Lines are produced as the records are pulled.
    pub fn rows(self) -> impl Iterator<Item = Bytes> + Send + 'static {
        let CsvGenerator {
            records,
            fields,
            header,
        } = self;

        let header = header.map(|header| {
            let mut line = String::new();
            write_row(&mut line, header.iter().map(|h| Some(h.as_str().into())));
            Bytes::from(line)
        });

        header.into_iter().chain(records.map(move |record| {
            let mut line = String::new();
            write_row(&mut line, project(&record, &fields));
            Bytes::from(line)
        }))
    }
}

fn project<'a>(
    record: &'a Record,
    fields: &'a [String],
) -> impl Iterator<Item = Option<std::borrow::Cow<'a, str>>> + 'a {
    fields
        .iter()
        .map(move |field| record.get(field.as_str()).and_then(field_text))
}

fn field_text(value: &Value) -> Option<std::borrow::Cow<'_, str>> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.as_str().into()),
        Value::Bool(b) => Some(b.to_string().into()),
        Value::Number(n) => Some(n.to_string().into()),
        nested => Some(nested.to_string().into()),
    }
}

fn write_row<'a, I>(line: &mut String, fields: I)
where
    I: Iterator<Item = Option<std::borrow::Cow<'a, str>>>,
{
    for (i, field) in fields.enumerate() {
        if i > 0 {
            line.push(',');
        }
        if let Some(field) = field {
            write_field(line, &field);
        }
    }
    line.push_str("\r\n");
}

fn write_field(line: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        line.push('"');
        line.push_str(&field.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(field);
    }
}
