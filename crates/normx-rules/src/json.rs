//! # JSON Rules
//!
//! Field access followed by a comparison is rewritten into one containment test against
//! a single-key object, which an inverted index can serve directly:
//!
//! ```text
//! j->'a' = '1'          =>  j @> '{"a": 1}'
//! j->'a' @> '[1, 2]'    =>  j @> '{"a": [1, 2]}'
//! ```
//!
//! Equality is only equivalent to containment when the right-hand side is a JSON scalar,
//! and containment only distributes through the field access when it is an object or an
//! array. Each rule guards on exactly one of the two.

use crate::funcs::{self, IS_CONST, IS_STRING_CONST};
use normx_core::error::{OptError, Result};
use normx_core::memo::Memo;
use normx_core::operator::Operator;
use normx_core::pattern::{Bindings, Pattern};
use normx_core::private::Private;
use normx_core::rule::{Guard, PrivateTemplate, PrivateTransform, Rule, Template};
use normx_core::types::Datum;
use serde_json::{Map, Value};

/// `<op> (FetchVal $json $key) $right`.
fn field_access(op: Operator) -> Pattern {
    Pattern::op(op).children(vec![
        Pattern::op(Operator::FetchVal).children(vec![
            Pattern::var("json"),
            Pattern::bind("key", Pattern::is(IS_STRING_CONST)),
        ]),
        Pattern::bind("right", Pattern::is(IS_CONST)),
    ])
}

fn right_json(memo: &Memo, b: &Bindings) -> Result<Option<Value>> {
    Ok(funcs::bound_datum(memo, b, "right")?.json_value())
}

fn is_json_scalar(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(matches!(
        right_json(memo, b)?,
        Some(v) if !v.is_object() && !v.is_array()
    ))
}

fn is_json_container(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(matches!(
        right_json(memo, b)?,
        Some(v) if v.is_object() || v.is_array()
    ))
}

/// `{key: right}` as a JSON datum.
fn single_key_object(memo: &Memo, b: &Bindings) -> Result<Private> {
    let Datum::String(key) = funcs::bound_datum(memo, b, "key")? else {
        return Err(OptError::internal(format!("{}: key is not a string", b.rule())));
    };
    let value = right_json(memo, b)?
        .ok_or_else(|| OptError::internal(format!("{}: right side is not JSON", b.rule())))?;
    let mut object = Map::new();
    object.insert(key, value);
    Ok(Private::Datum(Datum::json(Value::Object(object))))
}

fn contains_single_key() -> Template {
    Template::construct(
        Operator::Contains,
        vec![
            Template::bound("json"),
            Template::construct(Operator::Const, vec![]).with_private(PrivateTemplate::Transform(
                PrivateTransform::new("MakeSingleKeyJSONObject", single_key_object),
            )),
        ],
    )
}

pub struct NormalizeJSONFieldAccess;

impl Rule for NormalizeJSONFieldAccess {
    fn name(&self) -> &'static str {
        "NormalizeJSONFieldAccess"
    }

    fn pattern(&self) -> Pattern {
        field_access(Operator::Eq)
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("IsJSONScalar", is_json_scalar)]
    }

    fn replace(&self) -> Template {
        contains_single_key()
    }
}

pub struct NormalizeJSONContains;

impl Rule for NormalizeJSONContains {
    fn name(&self) -> &'static str {
        "NormalizeJSONContains"
    }

    fn pattern(&self) -> Pattern {
        field_access(Operator::Contains)
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("IsJSONContainer", is_json_container)]
    }

    fn replace(&self) -> Template {
        contains_single_key()
    }
}
