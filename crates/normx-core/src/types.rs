//! # Types and Constant Values
//!
//! `Type` is the static type of a scalar expression and `Datum` is a constant value. Both
//! are stored as private payloads, so they must be `Eq + Hash` to be interned. Floats are
//! wrapped in `OrderedFloat` for that reason, and JSON values are held as canonical text
//! (objects with sorted keys) rather than as `serde_json::Value`.
//!
//! Datums also carry a total order (derived). Membership lists are normalized by sorting on
//! it. Only values of the same type are ever compared in practice, and within one type the
//! order is the natural one.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of a scalar expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    /// Type of an untyped NULL.
    Unknown,
    Bool,
    Int,
    Float,
    String,
    /// String with a collation locale attached (e.g. `'a' COLLATE de`).
    CollatedString(String),
    Jsonb,
    Array(Box<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn array_of(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "unknown"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::String => write!(f, "string"),
            Type::CollatedString(locale) => write!(f, "collatedstring{{{}}}", locale),
            Type::Jsonb => write!(f, "jsonb"),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Tuple(fields) => {
                write!(f, "tuple{{")?;
                for (i, t) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datum {
    /// NULL inside a composite value. Top-level NULLs are `Null` expressions instead.
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    CollatedString { value: String, locale: String },
    /// Canonical JSON text. Build with [`Datum::json`] to keep it canonical.
    Json(String),
    Array { elem: Type, items: Vec<Datum> },
    Tuple(Vec<Datum>),
}

/// 2^63, the first float past `i64::MAX`.
const I64_END: f64 = 9_223_372_036_854_775_808.0;

impl Datum {
    pub fn float(v: f64) -> Datum {
        Datum::Float(OrderedFloat(v))
    }

    /// Build a JSON datum. `serde_json` maps keep their keys sorted, so equal documents
    /// always serialize to the same text.
    pub fn json(value: serde_json::Value) -> Datum {
        Datum::Json(value.to_string())
    }

    /// The single representation of this value. JSON text, including JSON nested in
    /// arrays and tuples, is re-serialized with sorted keys. Text that does not parse is
    /// kept as given.
    pub fn canonical(self) -> Datum {
        match self {
            Datum::Json(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => Datum::json(value),
                Err(_) => Datum::Json(text),
            },
            Datum::Array { elem, items } => Datum::Array {
                elem,
                items: items.into_iter().map(Datum::canonical).collect(),
            },
            Datum::Tuple(items) => Datum::Tuple(items.into_iter().map(Datum::canonical).collect()),
            other => other,
        }
    }

    /// Parse the JSON text back into a value. Returns `None` for non-JSON datums.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        match self {
            Datum::Json(text) => serde_json::from_str(text).ok(),
            _ => None,
        }
    }

    /// The static type of this value.
    pub fn ty(&self) -> Type {
        match self {
            Datum::Null => Type::Unknown,
            Datum::Bool(_) => Type::Bool,
            Datum::Int(_) => Type::Int,
            Datum::Float(_) => Type::Float,
            Datum::String(_) => Type::String,
            Datum::CollatedString { locale, .. } => Type::CollatedString(locale.clone()),
            Datum::Json(_) => Type::Jsonb,
            Datum::Array { elem, .. } => Type::array_of(elem.clone()),
            Datum::Tuple(items) => Type::Tuple(items.iter().map(Datum::ty).collect()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Convert to `target` only if no information is lost. Returns `None` when the value
    /// would change (e.g. `2.5` to int) or when there is no conversion at all.
    pub fn convert(&self, target: &Type) -> Option<Datum> {
        if self.ty() == *target || self.is_null() {
            return Some(self.clone());
        }
        match (self, target) {
            (Datum::Int(v), Type::Float) => {
                // `as i64` saturates, so values that round up to 2^63 must be rejected first.
                let f = *v as f64;
                (f < I64_END && f as i64 == *v).then(|| Datum::float(f))
            }
            (Datum::Float(v), Type::Int) => {
                let f = v.into_inner();
                let in_range = f >= -I64_END && f < I64_END;
                (f.fract() == 0.0 && in_range).then(|| Datum::Int(f as i64))
            }
            (Datum::String(s), Type::CollatedString(locale)) => Some(Datum::CollatedString {
                value: s.clone(),
                locale: locale.clone(),
            }),
            (Datum::CollatedString { value, .. }, Type::String) => Some(Datum::String(value.clone())),
            (Datum::Array { items, .. }, Type::Array(elem)) => {
                let items = items
                    .iter()
                    .map(|d| d.convert(elem))
                    .collect::<Option<Vec<_>>>()?;
                Some(Datum::Array {
                    elem: (**elem).clone(),
                    items,
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Bool(v) => write!(f, "{}", v),
            Datum::Int(v) => write!(f, "{}", v),
            Datum::Float(v) => write!(f, "{:?}", v.into_inner()),
            Datum::String(s) => write!(f, "'{}'", s),
            Datum::CollatedString { value, locale } => write!(f, "'{}' COLLATE {}", value, locale),
            Datum::Json(text) => write!(f, "'{}'", text),
            Datum::Array { items, .. } => {
                write!(f, "ARRAY[")?;
                for (i, d) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", d)?;
                }
                write!(f, "]")
            }
            Datum::Tuple(items) => {
                write!(f, "(")?;
                for (i, d) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", d)?;
                }
                write!(f, ")")
            }
        }
    }
}
