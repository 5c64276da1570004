//! # Scalar Simplification Rules
//!
//! Coalesce folding, cast elision, collation folding, membership-list canonicalization
//! and constant CASE folding.

use crate::funcs::{self, IS_CONST_DATUM, IS_NULL};
use normx_core::error::{OptError, Result};
use normx_core::expr::{GroupId, Operands};
use normx_core::memo::Memo;
use normx_core::operator::Operator;
use normx_core::pattern::{Bindings, ListPattern, Pattern, Predicate};
use normx_core::private::Private;
use normx_core::rule::{
    Guard, PrivateTemplate, PrivateTransform, Rule, Shape, Template,
};
use normx_core::types::{Datum, Type};

/// `COALESCE(x)` to `x`.
pub struct EliminateCoalesce;

impl Rule for EliminateCoalesce {
    fn name(&self) -> &'static str {
        "EliminateCoalesce"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::Coalesce).list(ListPattern::exact(vec![Pattern::var("item")]))
    }

    fn replace(&self) -> Template {
        Template::bound("item")
    }
}

/// Drop leading NULLs. Stops at the first item that is not a constant, because its
/// value may still turn out to be NULL.
fn simplify_coalesce(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let items = funcs::bound_items(memo, b, "args")?;
    for (i, item) in items.iter().enumerate() {
        let op = memo.normalized_expr(*item).operator();
        if op == Operator::Null {
            continue;
        }
        if op.is_const_datum() {
            return Ok(Shape::Group(*item));
        }
        let rest = &items[i..];
        if rest.len() == 1 {
            return Ok(Shape::Group(*item));
        }
        let list = memo.intern_list(rest);
        return Ok(Shape::Expr(Operator::Coalesce, Operands::new().list(list)));
    }

    // Every item is NULL.
    let mut ty = Type::Unknown;
    for item in &items {
        let item_ty = memo.type_of(*item)?;
        if *item_ty != Type::Unknown {
            ty = item_ty.clone();
            break;
        }
    }
    let private = memo.intern_private(Private::Type(ty));
    Ok(Shape::Expr(Operator::Null, Operands::new().private(private)))
}

/// `COALESCE(NULL, NULL, 1, x)` to `1`, `COALESCE(NULL, x, y)` to `COALESCE(x, y)`.
pub struct SimplifyCoalesce;

impl Rule for SimplifyCoalesce {
    fn name(&self) -> &'static str {
        "SimplifyCoalesce"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::Coalesce).list(ListPattern::bind(
            "args",
            ListPattern::prefix(vec![Pattern::is(IS_CONST_DATUM), Pattern::Any]),
        ))
    }

    fn replace(&self) -> Template {
        Template::transform("SimplifyCoalesce", simplify_coalesce)
    }
}

fn has_target_type(memo: &Memo, b: &Bindings) -> Result<bool> {
    let target = funcs::bound_type(memo, b, "type")?;
    Ok(*memo.type_of(b.group("input")?)? == target)
}

/// `CAST(x AS t)` where `x` already has type `t`.
pub struct EliminateCast;

impl Rule for EliminateCast {
    fn name(&self) -> &'static str {
        "EliminateCast"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::Cast)
            .children(vec![Pattern::var("input")])
            .with_private("type")
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("HasTargetType", has_target_type)]
    }

    fn replace(&self) -> Template {
        Template::bound("input")
    }
}

fn is_string_value(memo: &Memo, g: GroupId) -> bool {
    matches!(
        funcs::const_datum(memo, g),
        Some(Datum::String(_)) | Some(Datum::CollatedString { .. })
    )
}

fn collated(memo: &Memo, b: &Bindings) -> Result<Private> {
    let locale = b
        .private(memo, "locale")?
        .as_locale()
        .ok_or_else(|| OptError::internal("FoldCollate: private is not a locale"))?
        .to_string();
    let value = match funcs::bound_datum(memo, b, "input")? {
        Datum::String(value) | Datum::CollatedString { value, .. } => value,
        other => {
            return Err(OptError::internal(format!(
                "FoldCollate: {} is not a string",
                other
            )))
        }
    };
    Ok(Private::Datum(Datum::CollatedString { value, locale }))
}

/// `'a' COLLATE de` to a collated string constant.
pub struct FoldCollate;

impl Rule for FoldCollate {
    fn name(&self) -> &'static str {
        "FoldCollate"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::Collate)
            .children(vec![Pattern::bind(
                "input",
                Pattern::is(IS_STRING_VALUE),
            )])
            .with_private("locale")
    }

    fn replace(&self) -> Template {
        Template::construct(Operator::Const, vec![])
            .with_private(PrivateTemplate::Transform(PrivateTransform::new("Collate", collated)))
    }
}

const IS_STRING_VALUE: Predicate = Predicate::new("IsStringValue", is_string_value);

/// Constant tuple items paired with their values.
fn const_items(memo: &Memo, b: &Bindings) -> Result<Vec<(Datum, GroupId)>> {
    funcs::bound_items(memo, b, "items")?
        .into_iter()
        .map(|g| {
            funcs::const_datum(memo, g)
                .map(|d| (d, g))
                .ok_or_else(|| OptError::internal(format!("{}: {} is not a constant", b.rule(), g)))
        })
        .collect()
}

fn not_sorted_and_deduped(memo: &Memo, b: &Bindings) -> Result<bool> {
    let items = const_items(memo, b)?;
    Ok(!items.windows(2).all(|w| w[0].0 < w[1].0))
}

fn sorted_tuple(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let mut items = const_items(memo, b)?;
    items.sort_by(|a, b| a.0.cmp(&b.0));
    items.dedup_by(|a, b| a.0 == b.0);
    let groups: Vec<GroupId> = items.into_iter().map(|(_, g)| g).collect();
    let list = memo.intern_list(&groups);
    Ok(Shape::Expr(Operator::Tuple, Operands::new().list(list)))
}

/// `x IN (3, 1, 3)` to `x IN (1, 3)`.
pub struct NormalizeInConst;

impl Rule for NormalizeInConst {
    fn name(&self) -> &'static str {
        "NormalizeInConst"
    }

    fn pattern(&self) -> Pattern {
        Pattern::one_of(&[Operator::In, Operator::NotIn]).children(vec![
            Pattern::var("left"),
            Pattern::op(Operator::Tuple).list(ListPattern::bind(
                "items",
                ListPattern::each(Pattern::is(IS_CONST_DATUM)),
            )),
        ])
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("IsNotSortedAndDeduped", not_sorted_and_deduped)]
    }

    fn replace(&self) -> Template {
        Template::matched(vec![
            Template::bound("left"),
            Template::transform("ConstructSortedUniqueList", sorted_tuple),
        ])
    }
}

/// `x IN (NULL)` to `NULL::bool`.
pub struct FoldInNull;

impl Rule for FoldInNull {
    fn name(&self) -> &'static str {
        "FoldInNull"
    }

    fn pattern(&self) -> Pattern {
        Pattern::one_of(&[Operator::In, Operator::NotIn]).children(vec![
            Pattern::Any,
            Pattern::op(Operator::Tuple).list(ListPattern::exact(vec![Pattern::is(IS_NULL)])),
        ])
    }

    fn replace(&self) -> Template {
        Template::construct(Operator::Null, vec![])
            .with_private(PrivateTemplate::Transform(PrivateTransform::new("BoolType", funcs::bool_type)))
    }
}

/// Prune branches whose constant condition differs from the constant input. The first
/// branch that matches ends the CASE: it becomes the result, or the new ELSE when
/// non-constant branches precede it.
fn fold_case(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let input = b.group("input")?;
    let else_value = b.group("else")?;
    let value = funcs::bound_datum(memo, b, "input")?;
    let whens = funcs::bound_items(memo, b, "whens")?;

    let mut kept = Vec::with_capacity(whens.len());
    let mut result = else_value;
    for when in whens {
        let rec = *memo.normalized_expr(when);
        if rec.operator() != Operator::When {
            return Err(OptError::internal(format!(
                "CASE branch {} is {}, not When",
                when,
                rec.operator()
            )));
        }
        let condition = rec.fixed_child(0);
        match funcs::const_datum(memo, condition) {
            Some(cond) => {
                // NULL never equals anything, including NULL.
                if !value.is_null() && cond == value {
                    result = rec.fixed_child(1);
                    break;
                }
            }
            None => kept.push(when),
        }
    }

    if kept.is_empty() {
        return Ok(Shape::Group(result));
    }
    let list = memo.intern_list(&kept);
    Ok(Shape::Expr(
        Operator::Case,
        Operands::new().child(input).child(result).list(list),
    ))
}

/// `CASE 1 WHEN 2 THEN a WHEN 1 THEN b ELSE c END` to `b`.
pub struct SimplifyCaseWhenConstValue;

impl Rule for SimplifyCaseWhenConstValue {
    fn name(&self) -> &'static str {
        "SimplifyCaseWhenConstValue"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::Case)
            .children(vec![
                Pattern::bind("input", Pattern::is(IS_CONST_DATUM)),
                Pattern::var("else"),
            ])
            .list(ListPattern::bind(
                "whens",
                ListPattern::contains(
                    Pattern::op(Operator::When)
                        .children(vec![Pattern::is(IS_CONST_DATUM), Pattern::Any]),
                ),
            ))
    }

    fn replace(&self) -> Template {
        Template::transform("SimplifyWhens", fold_case)
    }
}
