//! # Private Payloads
//!
//! Some operators carry data that is not a reference to another group: the datum of a
//! constant, the target type of a cast, the columns produced by a projection. This data is
//! stored as a `Private` value, interned in the memo's private store, and referenced from
//! the expression record by a `PrivateId`. Interning makes equality of privates an integer
//! comparison.

use crate::metadata::ColumnId;
use crate::operator::Operator;
use crate::types::{Datum, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanPrivate {
    pub table: String,
    pub cols: Vec<ColumnId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupByPrivate {
    pub grouping: Vec<ColumnId>,
    /// One output column per aggregation in the list.
    pub aggs: Vec<ColumnId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExistsPrivate {
    /// Set once a row limit has been introduced under the exists, so the rule that adds
    /// the limit does not fire again on its own output.
    #[serde(default)]
    pub limited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayFlattenPrivate {
    /// Column of the subquery that supplies the array elements.
    pub input_col: ColumnId,
    /// Column that holds the aggregated array if the subquery is decorrelated.
    pub output_col: ColumnId,
}

/// Auxiliary payload attached to an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Private {
    Column(ColumnId),
    Datum(Datum),
    Type(Type),
    Locale(String),
    Comparison(Operator),
    Columns(Vec<ColumnId>),
    Scan(ScanPrivate),
    GroupBy(GroupByPrivate),
    Exists(ExistsPrivate),
    ArrayFlatten(ArrayFlattenPrivate),
}

impl Private {
    pub fn as_column(&self) -> Option<ColumnId> {
        match self {
            Private::Column(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_datum(&self) -> Option<&Datum> {
        match self {
            Private::Datum(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Private::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_locale(&self) -> Option<&str> {
        match self {
            Private::Locale(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_comparison(&self) -> Option<Operator> {
        match self {
            Private::Comparison(op) => Some(*op),
            _ => None,
        }
    }

    pub fn as_columns(&self) -> Option<&[ColumnId]> {
        match self {
            Private::Columns(cols) => Some(cols),
            _ => None,
        }
    }

    pub fn as_exists(&self) -> Option<ExistsPrivate> {
        match self {
            Private::Exists(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for Private {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Private::Column(c) => write!(f, "{}", c),
            Private::Datum(d) => write!(f, "{}", d),
            Private::Type(t) => write!(f, "{}", t),
            Private::Locale(l) => write!(f, "{}", l),
            Private::Comparison(op) => write!(f, "{}", op),
            Private::Columns(cols) => write_cols(f, cols),
            Private::Scan(s) => {
                write!(f, "{} ", s.table)?;
                write_cols(f, &s.cols)
            }
            Private::GroupBy(g) => {
                write!(f, "grouping=")?;
                write_cols(f, &g.grouping)?;
                write!(f, " aggs=")?;
                write_cols(f, &g.aggs)
            }
            Private::Exists(e) => write!(f, "limited={}", e.limited),
            Private::ArrayFlatten(a) => write!(f, "input={} output={}", a.input_col, a.output_col),
        }
    }
}

fn write_cols(f: &mut fmt::Formatter<'_>, cols: &[ColumnId]) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in cols.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, ")")
}
