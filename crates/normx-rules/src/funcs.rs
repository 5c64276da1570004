//! # Shared Rule Helpers
//!
//! Predicates, guards and small constructors referenced by more than one rule family.
//! Every function here is pure with respect to the memo it reads; the constructors only
//! append to it.

use normx_core::error::{OptError, Result};
use normx_core::expr::{GroupId, Operands};
use normx_core::memo::Memo;
use normx_core::operator::Operator;
use normx_core::pattern::{Bindings, Predicate};
use normx_core::private::Private;
use normx_core::types::{Datum, Type};

fn op_of(memo: &Memo, group: GroupId) -> Operator {
    memo.normalized_expr(group).operator()
}

fn is_variable(memo: &Memo, g: GroupId) -> bool {
    op_of(memo, g) == Operator::Variable
}

fn is_const_valued(memo: &Memo, g: GroupId) -> bool {
    memo.scalar_props(g).map_or(false, |p| p.is_constant())
}

fn is_const_datum(memo: &Memo, g: GroupId) -> bool {
    op_of(memo, g).is_const_datum()
}

fn is_const(memo: &Memo, g: GroupId) -> bool {
    op_of(memo, g) == Operator::Const
}

fn is_null(memo: &Memo, g: GroupId) -> bool {
    op_of(memo, g) == Operator::Null
}

fn is_string_const(memo: &Memo, g: GroupId) -> bool {
    matches!(const_datum(memo, g), Some(Datum::String(_)))
}

fn has_zero_rows(memo: &Memo, g: GroupId) -> bool {
    memo.relational_props(g)
        .map_or(false, |p| p.cardinality.is_zero())
}

fn is_correlated(memo: &Memo, g: GroupId) -> bool {
    memo.relational_props(g).map_or(false, |p| p.is_correlated())
}

pub const IS_VARIABLE: Predicate = Predicate::new("IsVariable", is_variable);
/// No free column references and no subquery.
pub const IS_CONST_VALUED: Predicate = Predicate::new("IsConstValued", is_const_valued);
/// A constant leaf: `Const`, `Null`, `True` or `False`.
pub const IS_CONST_DATUM: Predicate = Predicate::new("IsConstDatum", is_const_datum);
pub const IS_CONST: Predicate = Predicate::new("IsConst", is_const);
pub const IS_NULL: Predicate = Predicate::new("IsNull", is_null);
pub const IS_STRING_CONST: Predicate = Predicate::new("IsStringConst", is_string_const);
/// A relation that is statically known to produce no rows.
pub const HAS_ZERO_ROWS: Predicate = Predicate::new("HasZeroRows", has_zero_rows);
/// A relation with references to an enclosing scope.
pub const IS_CORRELATED: Predicate = Predicate::new("IsCorrelated", is_correlated);

/// The value of a constant leaf. `Null` maps to `Datum::Null`; non-constants to `None`.
pub fn const_datum(memo: &Memo, group: GroupId) -> Option<Datum> {
    let rec = memo.normalized_expr(group);
    match rec.operator() {
        Operator::Const => rec.private(memo).and_then(Private::as_datum).cloned(),
        Operator::Null => Some(Datum::Null),
        Operator::True => Some(Datum::Bool(true)),
        Operator::False => Some(Datum::Bool(false)),
        _ => None,
    }
}

/// Like [`const_datum`] for a bound group, failing if it is not a constant leaf.
pub fn bound_datum(memo: &Memo, bindings: &Bindings, name: &str) -> Result<Datum> {
    let group = bindings.group(name)?;
    const_datum(memo, group).ok_or_else(|| {
        OptError::internal(format!(
            "rule {}: `{}` ({}) is not a constant",
            bindings.rule(),
            name,
            group
        ))
    })
}

/// The shape of a constant leaf holding `datum`, typed `ty` if it is NULL.
pub fn datum_shape(memo: &mut Memo, datum: Datum, ty: &Type) -> Operands {
    let private = match datum {
        Datum::Bool(_) => None,
        Datum::Null => Some(Private::Type(ty.clone())),
        datum => Some(Private::Datum(datum)),
    };
    match private {
        Some(value) => Operands::new().private(memo.intern_private(value)),
        None => Operands::new(),
    }
}

/// Operator of the constant leaf holding `datum`.
pub fn datum_op(datum: &Datum) -> Operator {
    match datum {
        Datum::Null => Operator::Null,
        Datum::Bool(true) => Operator::True,
        Datum::Bool(false) => Operator::False,
        _ => Operator::Const,
    }
}

/// Construct the constant leaf holding `datum`.
pub fn construct_datum(memo: &mut Memo, datum: Datum, ty: &Type) -> Result<GroupId> {
    let op = datum_op(&datum);
    let operands = datum_shape(memo, datum, ty);
    memo.construct(op, operands)
}

/// Items of a list bound under `name`.
pub fn bound_items(memo: &Memo, bindings: &Bindings, name: &str) -> Result<Vec<GroupId>> {
    Ok(memo.lookup_list(bindings.list(name)?).to_vec())
}

/// The type a private bound under `name` holds.
pub fn bound_type(memo: &Memo, bindings: &Bindings, name: &str) -> Result<Type> {
    bindings
        .private(memo, name)?
        .as_type()
        .cloned()
        .ok_or_else(|| OptError::internal(format!("rule {}: `{}` is not a type", bindings.rule(), name)))
}

/// Type of the group bound under `name`, as a private.
pub fn type_of_bound(memo: &Memo, bindings: &Bindings, name: &str) -> Result<Private> {
    Ok(Private::Type(memo.type_of(bindings.group(name)?)?.clone()))
}

/// Private for `Null(bool)`.
pub fn bool_type(_: &Memo, _: &Bindings) -> Result<Private> {
    Ok(Private::Type(Type::Bool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_predicates() {
        let mut memo = Memo::new();
        let x = memo.metadata_mut().add_column("x", Type::Int);
        let var = memo.variable(x).unwrap();
        let five = memo.constant(Datum::Int(5)).unwrap();
        let null = memo.null(Type::Int).unwrap();
        let plus = memo.binary(Operator::Plus, five, five).unwrap();

        assert!((IS_VARIABLE.test)(&memo, var));
        assert!(!(IS_CONST_VALUED.test)(&memo, var));
        assert!((IS_CONST_VALUED.test)(&memo, plus));
        assert!(!(IS_CONST_DATUM.test)(&memo, plus));
        assert!((IS_CONST_DATUM.test)(&memo, null));
        assert!((IS_NULL.test)(&memo, null));

        assert_eq!(const_datum(&memo, five), Some(Datum::Int(5)));
        assert_eq!(const_datum(&memo, null), Some(Datum::Null));
        assert_eq!(const_datum(&memo, var), None);
    }

    #[test]
    fn test_construct_datum_uses_canonical_leaves() {
        let mut memo = Memo::new();
        let t = construct_datum(&mut memo, Datum::Bool(true), &Type::Bool).unwrap();
        assert_eq!(t, memo.bool_const(true).unwrap());
        let n = construct_datum(&mut memo, Datum::Null, &Type::Int).unwrap();
        assert_eq!(n, memo.null(Type::Int).unwrap());
        let s = construct_datum(&mut memo, Datum::String("a".into()), &Type::String).unwrap();
        assert_eq!(s, memo.constant(Datum::String("a".into())).unwrap());
    }
}
