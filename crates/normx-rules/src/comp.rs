//! # Comparison Rules
//!
//! Canonical operand order for comparisons and commutative arithmetic, self-comparison
//! folding, and pushing a type conversion into the constant side of a comparison.
//!
//! ## Canonical Order
//!
//! Variables go on the left. Constant-valued operands (no free column references, no
//! subquery) go on the right. Inequalities flip their operator when their operands swap
//! (`5 < x` becomes `x > 5`). Later rules only need to handle the canonical arrangement.
//!
//! ## Null Semantics of Self-Comparison
//!
//! `x = x` is not simply `true`: it is NULL when `x` is NULL. The rewrite keeps that:
//! `x IS NOT NULL OR NULL` is true for non-null `x` and NULL otherwise.

use crate::funcs::{self, IS_CONST, IS_CONST_VALUED, IS_VARIABLE};
use normx_core::error::{OptError, Result};
use normx_core::memo::Memo;
use normx_core::operator::Operator;
use normx_core::pattern::{Bindings, Pattern};
use normx_core::private::Private;
use normx_core::rule::{Guard, PrivateTemplate, PrivateTransform, Rule, Template};
use normx_core::types::Datum;

const INEQUALITIES: &[Operator] = &[Operator::Lt, Operator::Le, Operator::Gt, Operator::Ge];
const EQUALITIES: &[Operator] = &[Operator::Eq, Operator::Ne, Operator::Is, Operator::IsNot];
const COMMUTATIVE: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Is,
    Operator::IsNot,
    Operator::Plus,
    Operator::Mult,
];
const COMPARISONS: &[Operator] = &[
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
];

/// `left op right` with `left` matching `left` and `right` matching `right`.
fn binary(ops: &'static [Operator], left: Pattern, right: Pattern) -> Pattern {
    Pattern::one_of(ops).children(vec![
        Pattern::bind("left", left),
        Pattern::bind("right", right),
    ])
}

fn swapped() -> [Template; 2] {
    [Template::bound("right"), Template::bound("left")]
}

/// `5 < x` to `x > 5`: a variable moves left of a non-variable.
pub struct CommuteVarInequality;

impl Rule for CommuteVarInequality {
    fn name(&self) -> &'static str {
        "CommuteVarInequality"
    }

    fn pattern(&self) -> Pattern {
        binary(
            INEQUALITIES,
            Pattern::not(Pattern::is(IS_VARIABLE)),
            Pattern::is(IS_VARIABLE),
        )
    }

    fn replace(&self) -> Template {
        Template::commuted(swapped().into())
    }
}

/// `5 < x + 1` to `x + 1 > 5`: a constant-valued operand moves right.
pub struct CommuteConstInequality;

impl Rule for CommuteConstInequality {
    fn name(&self) -> &'static str {
        "CommuteConstInequality"
    }

    fn pattern(&self) -> Pattern {
        binary(
            INEQUALITIES,
            Pattern::is(IS_CONST_VALUED),
            Pattern::not(Pattern::is(IS_CONST_VALUED)),
        )
    }

    fn replace(&self) -> Template {
        Template::commuted(swapped().into())
    }
}

/// `y + 1 = x` to `x = y + 1`.
pub struct CommuteVar;

impl Rule for CommuteVar {
    fn name(&self) -> &'static str {
        "CommuteVar"
    }

    fn pattern(&self) -> Pattern {
        binary(
            EQUALITIES,
            Pattern::not(Pattern::is(IS_VARIABLE)),
            Pattern::is(IS_VARIABLE),
        )
    }

    fn replace(&self) -> Template {
        Template::matched(swapped().into())
    }
}

/// `5 = x + 1` to `x + 1 = 5`, and likewise for `+` and `*`.
pub struct CommuteConst;

impl Rule for CommuteConst {
    fn name(&self) -> &'static str {
        "CommuteConst"
    }

    fn pattern(&self) -> Pattern {
        binary(
            COMMUTATIVE,
            Pattern::is(IS_CONST_VALUED),
            Pattern::not(Pattern::is(IS_CONST_VALUED)),
        )
    }

    fn replace(&self) -> Template {
        Template::matched(swapped().into())
    }
}

fn same_variable(_: &Memo, b: &Bindings) -> Result<bool> {
    Ok(b.group("left")? == b.group("right")?)
}

fn type_of_left(memo: &Memo, b: &Bindings) -> Result<Private> {
    funcs::type_of_bound(memo, b, "left")
}

fn null_of(op: Operator, transform: PrivateTransform) -> Template {
    Template::construct(op, vec![]).with_private(PrivateTemplate::Transform(transform))
}

/// `<op>(x, NULL::type(x)) <join> NULL::bool`.
fn null_aware(join: Operator, test: Operator) -> Template {
    Template::construct(
        join,
        vec![
            Template::construct(
                test,
                vec![
                    Template::bound("left"),
                    null_of(Operator::Null, PrivateTransform::new("TypeOf", type_of_left)),
                ],
            ),
            null_of(Operator::Null, PrivateTransform::new("BoolType", funcs::bool_type)),
        ],
    )
}

/// `x = x`, `x <= x`, `x >= x` to `x IS NOT NULL OR NULL`.
pub struct SimplifySameVarEqualities;

impl Rule for SimplifySameVarEqualities {
    fn name(&self) -> &'static str {
        "SimplifySameVarEqualities"
    }

    fn pattern(&self) -> Pattern {
        binary(
            &[Operator::Eq, Operator::Le, Operator::Ge],
            Pattern::is(IS_VARIABLE),
            Pattern::is(IS_VARIABLE),
        )
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("SameVariable", same_variable)]
    }

    fn replace(&self) -> Template {
        null_aware(Operator::Or, Operator::IsNot)
    }
}

/// `x != x`, `x < x`, `x > x` to `x IS NULL AND NULL`.
pub struct SimplifySameVarInequalities;

impl Rule for SimplifySameVarInequalities {
    fn name(&self) -> &'static str {
        "SimplifySameVarInequalities"
    }

    fn pattern(&self) -> Pattern {
        binary(
            &[Operator::Ne, Operator::Lt, Operator::Gt],
            Pattern::is(IS_VARIABLE),
            Pattern::is(IS_VARIABLE),
        )
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("SameVariable", same_variable)]
    }

    fn replace(&self) -> Template {
        null_aware(Operator::And, Operator::Is)
    }
}

/// The constant of `Cast(c, t)` converted to the left operand's type, if `c -> t -> left`
/// loses nothing and converting back yields the same `t` value.
fn unified_const(memo: &Memo, b: &Bindings) -> Result<Option<Datum>> {
    let target = funcs::bound_type(memo, b, "cast_type")?;
    let left_ty = memo.type_of(b.group("left")?)?;
    if *left_ty == target {
        return Ok(None);
    }
    let datum = funcs::bound_datum(memo, b, "const")?;
    let Some(cast) = datum.convert(&target) else {
        return Ok(None);
    };
    let Some(unified) = cast.convert(left_ty) else {
        return Ok(None);
    };
    Ok((unified.convert(&target).as_ref() == Some(&cast)).then_some(unified))
}

fn can_unify(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(unified_const(memo, b)?.is_some())
}

fn unify(memo: &Memo, b: &Bindings) -> Result<Private> {
    let datum = unified_const(memo, b)?
        .ok_or_else(|| OptError::internal("UnifyComparisonTypes: guard bypassed"))?;
    Ok(Private::Datum(datum))
}

/// `x = CAST(5 AS float)` with `x: int` to `x = 5`.
pub struct UnifyComparisonTypes;

impl Rule for UnifyComparisonTypes {
    fn name(&self) -> &'static str {
        "UnifyComparisonTypes"
    }

    fn pattern(&self) -> Pattern {
        binary(
            COMPARISONS,
            Pattern::not(Pattern::is(IS_CONST_VALUED)),
            Pattern::op(Operator::Cast)
                .children(vec![Pattern::bind("const", Pattern::is(IS_CONST))])
                .with_private("cast_type"),
        )
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("LosslessConversion", can_unify)]
    }

    fn replace(&self) -> Template {
        Template::matched(vec![
            Template::bound("left"),
            Template::construct(Operator::Const, vec![])
                .with_private(PrivateTemplate::Transform(PrivateTransform::new("Unify", unify))),
        ])
    }
}
