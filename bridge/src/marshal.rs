//! Result marshaling
//!
//! Turns an execution outcome into JSON rows keyed by column name.

use serde_json::{Map, Number, Value};

use crate::driver::{ExecutionOutcome, RowSet, SqlValue};

/// One row: column name to value, in declared column order
pub type RowMap = Map<String, Value>;

/// A marshaled outcome ready for transport
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Marshaled {
    /// Row payload; empty for statements without result columns
    pub data: Vec<RowMap>,
    /// Affected row count, reported outside the payload
    pub rows_affected: Option<u64>,
}

pub fn marshal(outcome: ExecutionOutcome) -> Marshaled {
    match outcome {
        ExecutionOutcome::Rows(set) => Marshaled {
            data: row_maps(set),
            rows_affected: None,
        },
        ExecutionOutcome::Affected(count) => Marshaled {
            data: Vec::new(),
            rows_affected: Some(count),
        },
    }
}

/// Zip each row with the column names
///
/// When two columns share a name the later value wins; the key keeps the
/// position of its first occurrence.
pub fn row_maps(set: RowSet) -> Vec<RowMap> {
    let RowSet { columns, rows } = set;
    rows.into_iter()
        .map(|cells| {
            let mut row = RowMap::with_capacity(columns.len());
            for (name, cell) in columns.iter().zip(cells) {
                row.insert(name.clone(), to_json(cell));
            }
            row
        })
        .collect()
}

/// Convert one cell, stringifying values JSON cannot carry natively
pub fn to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(hex_literal(&bytes)),
        SqlValue::Decimal(digits) => Value::String(digits),
        SqlValue::Timestamp(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode_upper(bytes))
}
