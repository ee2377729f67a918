//! Incremental JSON encoding.
//!
//! A document is a tree of [`Node`]s. Eager values are serialized with
//! `serde_json`, lazy sequences are pulled one element at a time while the
//! response body is being written. The encoder never holds more than one
//! chunk of output in memory.

use crate::metrics_defs::JSON_RECORDS_TRUNCATED;
use crate::workspace::AggregationResult;
use hyper::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fmt;

/// Output is flushed once the buffer grows past this size.
const CHUNK_SIZE: usize = 8 * 1024;

const INDENT: &[u8] = b"    ";

pub enum Node {
    Value(Value),
    Object(Vec<(String, Node)>),
    /// Elements are produced on demand and subject to the record limit.
    Sequence(Box<dyn Iterator<Item = Node> + Send>),
}

impl Node {
    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
        I::IntoIter: Send + 'static,
    {
        Node::Sequence(Box::new(items.into_iter()))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Node)>) -> Self {
        Node::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Node::Value)
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Value(value)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Node::Object(entries) => f.debug_tuple("Object").field(entries).finish(),
            Node::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}

/// Builds the document served for an aggregation. `cells` stays lazy.
pub fn result_document(result: AggregationResult) -> Result<Node, serde_json::Error> {
    let cell = match &result.cell {
        Some(cell) => Node::from_serialize(cell.cuts())?,
        None => Node::Value(Value::Array(Vec::new())),
    };

    Ok(Node::object([
        ("summary", Node::Value(Value::Object(result.summary))),
        ("remainder", Node::Value(Value::Object(result.remainder))),
        (
            "cells",
            Node::sequence(result.cells.map(|record| Node::Value(Value::Object(record)))),
        ),
        ("total_cell_count", Node::from_serialize(&result.total_cell_count)?),
        ("aggregates", Node::from_serialize(&result.aggregates)?),
        ("cell", cell),
        ("levels", Node::from_serialize(&result.levels)?),
        ("attributes", Node::from_serialize(&result.attributes)?),
        ("has_split", Node::Value(Value::Bool(result.has_split))),
    ]))
}

enum Frame {
    Object {
        entries: std::vec::IntoIter<(String, Node)>,
        written: usize,
    },
    Sequence {
        items: Box<dyn Iterator<Item = Node> + Send>,
        written: usize,
    },
}

enum Step {
    Entry {
        key: Option<String>,
        node: Node,
        first: bool,
    },
    Close {
        bracket: u8,
        empty: bool,
        truncated: bool,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct JsonEncoder {
    record_limit: usize,
    pretty: bool,
}

impl JsonEncoder {
    /// `record_limit` of `0` writes every element.
    pub fn new(record_limit: usize, pretty: bool) -> Self {
        JsonEncoder {
            record_limit,
            pretty,
        }
    }

    pub fn encode(self, root: Node) -> JsonChunks {
        JsonChunks {
            encoder: self,
            root: Some(root),
            stack: Vec::new(),
            buffer: Vec::with_capacity(CHUNK_SIZE),
            failed: false,
        }
    }

    /// Encodes the whole document at once.
    pub fn encode_to_vec(self, root: Node) -> Vec<u8> {
        self.encode(root).flat_map(|chunk| chunk.to_vec()).collect()
    }
}

/// Chunks of encoded JSON, produced as they are pulled.
pub struct JsonChunks {
    encoder: JsonEncoder,
    root: Option<Node>,
    stack: Vec<Frame>,
    buffer: Vec<u8>,
    failed: bool,
}

impl JsonChunks {
    /// Advances the encoding by one node. Returns false once the document is done.
    fn step(&mut self) -> bool {
        if let Some(root) = self.root.take() {
            self.write_node(root);
            return true;
        }

        let limit = self.encoder.record_limit;
        let step = match self.stack.last_mut() {
            None => return false,
            Some(Frame::Object { entries, written }) => match entries.next() {
                Some((key, node)) => {
                    *written += 1;
                    Step::Entry {
                        key: Some(key),
                        node,
                        first: *written == 1,
                    }
                }
                None => Step::Close {
                    bracket: b'}',
                    empty: *written == 0,
                    truncated: false,
                },
            },
            Some(Frame::Sequence { items, written }) => {
                if limit > 0 && *written >= limit {
                    Step::Close {
                        bracket: b']',
                        empty: false,
                        truncated: true,
                    }
                } else {
                    match items.next() {
                        Some(node) => {
                            *written += 1;
                            Step::Entry {
                                key: None,
                                node,
                                first: *written == 1,
                            }
                        }
                        None => Step::Close {
                            bracket: b']',
                            empty: *written == 0,
                            truncated: false,
                        },
                    }
                }
            }
        };

        match step {
            Step::Entry { key, node, first } => {
                if !first {
                    self.buffer.push(b',');
                }
                self.newline(self.stack.len());
                if let Some(key) = key {
                    self.write_value(&Value::String(key));
                    let separator: &[u8] = if self.encoder.pretty { b": " } else { b":" };
                    self.buffer.extend_from_slice(separator);
                }
                self.write_node(node);
            }
            Step::Close {
                bracket,
                empty,
                truncated,
            } => {
                self.stack.pop();
                if truncated {
                    tracing::debug!(limit, "JSON sequence truncated at record limit");
                    shared::counter!(JSON_RECORDS_TRUNCATED).increment(1);
                }
                if !empty {
                    self.newline(self.stack.len());
                }
                self.buffer.push(bracket);
            }
        }
        true
    }

    fn write_node(&mut self, node: Node) {
        match node {
            Node::Value(value) => self.write_value(&value),
            Node::Object(entries) => {
                self.buffer.push(b'{');
                self.stack.push(Frame::Object {
                    entries: entries.into_iter(),
                    written: 0,
                });
            }
            Node::Sequence(items) => {
                self.buffer.push(b'[');
                self.stack.push(Frame::Sequence { items, written: 0 });
            }
        }
    }

    fn write_value(&mut self, value: &Value) {
        let encoded = if self.encoder.pretty {
            let mut encoded = Vec::new();
            let formatter = PrettyFormatter::with_indent(INDENT);
            let mut serializer = Serializer::with_formatter(&mut encoded, formatter);
            value.serialize(&mut serializer).map(|()| encoded)
        } else {
            serde_json::to_vec(value)
        };

        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(err) => {
                // Only possible for non-string map keys, which `Value` cannot hold
                tracing::error!(error = %err, "Failed to encode JSON value");
                self.failed = true;
                return;
            }
        };

        let depth = self.stack.len();
        if !self.encoder.pretty || depth == 0 {
            self.buffer.extend_from_slice(&encoded);
            return;
        }

        // Re-indent nested lines. Encoded strings never contain raw newlines.
        for byte in encoded {
            self.buffer.push(byte);
            if byte == b'\n' {
                for _ in 0..depth {
                    self.buffer.extend_from_slice(INDENT);
                }
            }
        }
    }

    fn newline(&mut self, depth: usize) {
        if self.encoder.pretty {
            self.buffer.push(b'\n');
            for _ in 0..depth {
                self.buffer.extend_from_slice(INDENT);
            }
        }
    }
}

impl Iterator for JsonChunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        while !self.failed && self.buffer.len() < CHUNK_SIZE {
            if !self.step() {
                break;
            }
        }

        if self.buffer.is_empty() {
            return None;
        }
        let chunk = std::mem::replace(&mut self.buffer, Vec::with_capacity(CHUNK_SIZE));
        Some(Bytes::from(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::{Cell, Cut};
    use crate::workspace::{Record, RecordSet};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn compact(node: Node) -> String {
        String::from_utf8(JsonEncoder::new(0, false).encode_to_vec(node)).unwrap()
    }

    fn numbers(count: i64) -> Node {
        Node::sequence((0..count).map(|i| Node::Value(json!(i))))
    }

    #[test]
    fn test_compact_encoding() {
        let doc = Node::object([
            ("name", Node::Value(json!("sales"))),
            ("values", numbers(3)),
            ("nested", Node::object([("a", Node::Value(json!({"b": [1, 2]})))])),
            ("empty", Node::object(Vec::<(String, Node)>::new())),
            ("none", numbers(0)),
        ]);
        assert_eq!(
            compact(doc),
            r#"{"name":"sales","values":[0,1,2],"nested":{"a":{"b":[1,2]}},"empty":{},"none":[]}"#
        );
    }

    #[test]
    fn test_pretty_encoding() {
        let doc = Node::object([
            ("values", numbers(2)),
            ("model", Node::Value(json!({"x": [1]}))),
            ("none", numbers(0)),
        ]);
        let encoded = String::from_utf8(JsonEncoder::new(0, true).encode_to_vec(doc)).unwrap();
        let expected = r#"{
    "values": [
        0,
        1
    ],
    "model": {
        "x": [
            1
        ]
    },
    "none": []
}"#;
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_pretty_and_compact_carry_the_same_data() {
        let doc = || {
            Node::object([
                ("cells", numbers(5)),
                ("summary", Node::Value(json!({"amount": 10.5, "label": "a, b"}))),
            ])
        };
        let pretty: Value =
            serde_json::from_slice(&JsonEncoder::new(0, true).encode_to_vec(doc())).unwrap();
        let compact: Value =
            serde_json::from_slice(&JsonEncoder::new(0, false).encode_to_vec(doc())).unwrap();
        assert_eq!(pretty, compact);
    }

    #[test]
    fn test_record_limit_truncates_lazy_sequences() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let cells = Node::sequence((0..100).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Node::Value(json!(i))
        }));
        let doc = Node::object([
            ("cells", cells),
            ("aggregates", Node::Value(json!(["a", "b", "c", "d"]))),
        ]);

        let encoded = JsonEncoder::new(3, false).encode_to_vec(doc);
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value["cells"], json!([0, 1, 2]));
        // Eager arrays are never truncated
        assert_eq!(value["aggregates"], json!(["a", "b", "c", "d"]));
        // Elements past the limit are never produced
        assert_eq!(pulled.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let value: Value =
            serde_json::from_slice(&JsonEncoder::new(0, false).encode_to_vec(numbers(2000)))
                .unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2000);
    }

    #[test]
    fn test_large_documents_are_chunked() {
        let doc = Node::sequence(
            (0..5000).map(|i| Node::Value(json!({"row": i, "label": "some padding text"}))),
        );
        let chunks: Vec<Bytes> = JsonEncoder::new(0, false).encode(doc).collect();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.to_vec()).collect();
        let value: Value = serde_json::from_slice(&joined).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 5000);
    }

    #[test]
    fn test_result_document() {
        let mut summary = Record::new();
        summary.insert("amount_sum".into(), json!(120));
        let mut row = Record::new();
        row.insert("date.year".into(), json!(2024));
        row.insert("amount_sum".into(), json!(120));

        let mut result = AggregationResult::new(
            RecordSet::new(vec![row]),
            vec!["date.year".into(), "amount_sum".into()],
        );
        result.summary = summary;
        result.total_cell_count = Some(1);
        result.aggregates = vec!["amount_sum".into()];
        result.levels.insert("date".into(), vec!["year".into()]);
        result.attributes = vec!["date.year".into()];
        result.cell = Some(Cell::new(None, vec![Cut::point("date", vec!["2024".into()])]));

        let value: Value =
            serde_json::from_slice(&JsonEncoder::new(0, false).encode_to_vec(result_document(result).unwrap()))
                .unwrap();

        assert_eq!(value["summary"], json!({"amount_sum": 120}));
        assert_eq!(value["remainder"], json!({}));
        assert_eq!(value["cells"], json!([{"date.year": 2024, "amount_sum": 120}]));
        assert_eq!(value["total_cell_count"], json!(1));
        assert_eq!(value["aggregates"], json!(["amount_sum"]));
        assert_eq!(value["levels"], json!({"date": ["year"]}));
        assert_eq!(value["attributes"], json!(["date.year"]));
        assert_eq!(value["has_split"], json!(false));
        assert_eq!(value["cell"][0]["type"], json!("point"));
        assert_eq!(value["cell"][0]["dimension"], json!("date"));
        assert_eq!(value["cell"][0]["path"], json!(["2024"]));
    }

    #[test]
    fn test_result_document_without_cell() {
        let result = AggregationResult::new(RecordSet::empty(), Vec::new());
        let encoded = JsonEncoder::new(0, false).encode_to_vec(result_document(result).unwrap());
        let value: Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value["cell"], json!([]));
        assert_eq!(value["cells"], json!([]));
        assert_eq!(value["total_cell_count"], Value::Null);
    }
}
