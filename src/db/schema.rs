//! Table layouts and pre-write validation.
//!
//! Every bulk write (Postgres or in-memory) goes through
//! [`TableSchema::validate`] first. A single bad value rejects the whole
//! batch, so a batch is either written completely or not at all.

use num_bigint::BigInt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    /// Arbitrary-precision integer (`NUMERIC`)
    Numeric,
    /// 64-bit integer (`BIGINT`)
    BigInt,
    /// `DOUBLE PRECISION`
    Double,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

/// Write mode of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    /// Append-only history
    Append,
    /// Upsert where a repeated key is a no-op
    Ignore(&'static str),
    /// Upsert where a repeated key overwrites the row
    Replace(&'static str),
}

#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub conflict: Conflict,
}

/// A validated value, ready to be bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    /// Canonical decimal string of a `NUMERIC` value
    Numeric(String),
    BigInt(i64),
    Double(f64),
}

pub type Row = Vec<Cell>;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{table}: row {row} is not a JSON object")]
    NotAnObject { table: &'static str, row: usize },
    #[error("{table}: row {row} is missing column `{column}`")]
    MissingColumn {
        table: &'static str,
        row: usize,
        column: &'static str,
    },
    #[error("{table}: row {row} column `{column}` expects {expected:?}, got {value}")]
    InvalidValue {
        table: &'static str,
        row: usize,
        column: &'static str,
        expected: ColumnType,
        value: String,
    },
    #[error("{table}: failed to serialize record: {source}")]
    Serialize {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl TableSchema {
    /// Validate every row of a batch against the column types.
    ///
    /// Returns the typed cells in column order, or the first violation.
    pub fn validate(&self, rows: &[Value]) -> Result<Vec<Row>, SchemaError> {
        rows.iter()
            .enumerate()
            .map(|(index, value)| self.validate_row(index, value))
            .collect()
    }

    fn validate_row(&self, index: usize, value: &Value) -> Result<Row, SchemaError> {
        let object = value.as_object().ok_or(SchemaError::NotAnObject {
            table: self.name,
            row: index,
        })?;

        self.columns
            .iter()
            .map(|column| {
                let raw = object.get(column.name).filter(|v| !v.is_null()).ok_or(
                    SchemaError::MissingColumn {
                        table: self.name,
                        row: index,
                        column: column.name,
                    },
                )?;
                to_cell(column.ty, raw).ok_or_else(|| SchemaError::InvalidValue {
                    table: self.name,
                    row: index,
                    column: column.name,
                    expected: column.ty,
                    value: raw.to_string(),
                })
            })
            .collect()
    }

    /// Conflict key column, if the table is an upsert table.
    pub fn conflict_key(&self) -> Option<&'static str> {
        match self.conflict {
            Conflict::Append => None,
            Conflict::Ignore(key) | Conflict::Replace(key) => Some(key),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

fn to_cell(ty: ColumnType, value: &Value) -> Option<Cell> {
    match ty {
        ColumnType::Text => match value {
            Value::String(s) => Some(Cell::Text(s.clone())),
            Value::Number(n) => Some(Cell::Text(n.to_string())),
            Value::Bool(b) => Some(Cell::Text(b.to_string())),
            _ => None,
        },
        ColumnType::Numeric => {
            let parsed = match value {
                Value::String(s) => BigInt::from_str(s.trim()).ok()?,
                Value::Number(n) if n.is_i64() || n.is_u64() => BigInt::from_str(&n.to_string()).ok()?,
                _ => return None,
            };
            Some(Cell::Numeric(parsed.to_string()))
        },
        ColumnType::BigInt => match value {
            Value::Number(n) => n.as_i64().map(Cell::BigInt),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Cell::BigInt),
            _ => None,
        },
        ColumnType::Double => {
            let parsed = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            parsed.is_finite().then_some(Cell::Double(parsed))
        },
    }
}

/// A persisted record bound to its table layout.
///
/// Field names of the serialized record are the column names.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn schema() -> &'static TableSchema;
}

/// Serialize records into JSON rows for [`TableSchema::validate`].
pub fn to_rows<R: Record>(records: &[R]) -> Result<Vec<Value>, SchemaError> {
    records
        .iter()
        .map(|record| {
            serde_json::to_value(record).map_err(|source| SchemaError::Serialize {
                table: R::schema().name,
                source,
            })
        })
        .collect()
}

// ============================================
// Tables
// ============================================

use ColumnType::{BigInt as Int8, Double, Numeric, Text};

pub static SWAP_OPERATIONS: TableSchema = TableSchema {
    name: "swap_ops_data",
    columns: &[
        col("unique_key", Text),
        col("txhash", Text),
        col("txheight", Int8),
        col("timestamp", Int8),
        col("pair_addr", Text),
        col("sender", Text),
        col("offer_denom", Text),
        col("offer_amount", Numeric),
        col("ask_denom", Text),
        col("return_amount", Numeric),
        col("tax_amount", Numeric),
        col("commission_amount", Numeric),
        col("spread_amount", Numeric),
        col("volume_usdt", Numeric),
        col("commission_usdt", Numeric),
    ],
    conflict: Conflict::Append,
};

pub static LIQUIDITY_OPERATIONS: TableSchema = TableSchema {
    name: "lp_ops_data",
    columns: &[
        col("unique_key", Text),
        col("txhash", Text),
        col("txheight", Int8),
        col("timestamp", Int8),
        col("pair_addr", Text),
        col("tx_creator", Text),
        col("op_type", Text),
        col("first_token_denom", Text),
        col("first_token_amount", Numeric),
        col("second_token_denom", Text),
        col("second_token_amount", Numeric),
        col("lp_share", Numeric),
        col("first_token_lp", Numeric),
        col("second_token_lp", Numeric),
        col("tax_rate", Numeric),
    ],
    conflict: Conflict::Append,
};

pub static SWAP_OHLCV: TableSchema = TableSchema {
    name: "swap_ohlcv",
    columns: &[
        col("unique_key", Text),
        col("pair", Text),
        col("timestamp", Int8),
        col("txheight", Int8),
        col("open", Double),
        col("high", Double),
        col("low", Double),
        col("close", Double),
        col("volume", Numeric),
    ],
    conflict: Conflict::Append,
};

pub static STAKING_OPERATIONS: TableSchema = TableSchema {
    name: "stakings",
    columns: &[
        col("unique_key", Text),
        col("txhash", Text),
        col("txheight", Int8),
        col("timestamp", Int8),
        col("staker_address", Text),
        col("staking_asset_denom", Text),
        col("stake_amount", Numeric),
        col("stake_amount_in_usdt", Numeric),
    ],
    conflict: Conflict::Append,
};

pub static EARNING_OPERATIONS: TableSchema = TableSchema {
    name: "earnings",
    columns: &[
        col("unique_key", Text),
        col("txhash", Text),
        col("txheight", Int8),
        col("timestamp", Int8),
        col("staker_address", Text),
        col("staking_asset_denom", Text),
        col("reward_asset_denom", Text),
        col("earn_amount", Numeric),
        col("earn_amount_in_usdt", Numeric),
    ],
    conflict: Conflict::Append,
};

pub static POOL_AMOUNT_HISTORY: TableSchema = TableSchema {
    name: "pool_amount_history",
    columns: &[
        col("unique_key", Text),
        col("pair_addr", Text),
        col("offer_pool_amount", Numeric),
        col("ask_pool_amount", Numeric),
        col("total_share", Numeric),
        col("height", Int8),
        col("timestamp", Int8),
    ],
    conflict: Conflict::Ignore("unique_key"),
};

pub static POOL_APR: TableSchema = TableSchema {
    name: "pool_apr",
    columns: &[
        col("unique_key", Text),
        col("pair_addr", Text),
        col("total_supply", Numeric),
        col("total_bond_amount", Numeric),
        col("reward_per_sec", Text),
        col("apr", Double),
        col("height", Int8),
        col("timestamp", Int8),
    ],
    conflict: Conflict::Ignore("unique_key"),
};

pub static PAIR_INFOS: TableSchema = TableSchema {
    name: "pair_infos",
    columns: &[
        col("pair_addr", Text),
        col("first_asset_info", Text),
        col("second_asset_info", Text),
        col("commission_rate", Text),
        col("liquidity_addr", Text),
        col("oracle_addr", Text),
        col("symbols", Text),
    ],
    conflict: Conflict::Replace("pair_addr"),
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lp_row(amount: Value) -> Value {
        json!({
            "unique_key": "1-orai-1-usdt-1",
            "txhash": "ABC",
            "txheight": 1,
            "timestamp": 1,
            "pair_addr": "orai1pair",
            "tx_creator": "orai1creator",
            "op_type": "provide",
            "first_token_denom": "orai",
            "first_token_amount": amount,
            "second_token_denom": "usdt",
            "second_token_amount": "1",
            "lp_share": "1",
            "first_token_lp": "1",
            "second_token_lp": "1",
            "tax_rate": "0",
        })
    }

    #[test]
    fn test_validate_accepts_string_and_integer_amounts() {
        let rows = LIQUIDITY_OPERATIONS
            .validate(&[lp_row(json!("123456789012345678901234567890")), lp_row(json!(7))])
            .unwrap();
        assert_eq!(rows.len(), 2);
        let idx = LIQUIDITY_OPERATIONS.column_index("first_token_amount").unwrap();
        assert_eq!(rows[0][idx], Cell::Numeric("123456789012345678901234567890".to_string()));
        assert_eq!(rows[1][idx], Cell::Numeric("7".to_string()));
    }

    #[test]
    fn test_validate_rejects_non_numeric_amount() {
        let err = LIQUIDITY_OPERATIONS
            .validate(&[lp_row(json!("1")), lp_row(json!("abcd")), lp_row(json!("2"))])
            .unwrap_err();
        match err {
            SchemaError::InvalidValue { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "first_token_amount");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_rejects_fractional_numeric_and_missing_column() {
        assert!(LIQUIDITY_OPERATIONS.validate(&[lp_row(json!(1.5))]).is_err());

        let mut row = lp_row(json!("1"));
        row.as_object_mut().unwrap().remove("txhash");
        assert!(matches!(
            LIQUIDITY_OPERATIONS.validate(&[row]),
            Err(SchemaError::MissingColumn { column: "txhash", .. })
        ));
    }

    #[test]
    fn test_conflict_keys() {
        assert_eq!(SWAP_OPERATIONS.conflict_key(), None);
        assert_eq!(POOL_AMOUNT_HISTORY.conflict_key(), Some("unique_key"));
        assert_eq!(PAIR_INFOS.conflict_key(), Some("pair_addr"));
    }
}
