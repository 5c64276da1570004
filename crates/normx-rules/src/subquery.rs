//! # Subquery Rules
//!
//! `x = ANY (VALUES ...)` and `x = ANY (ARRAY[...])` are turned into scalar comparisons
//! over a literal tuple, and from there into a plain `IN`. A correlated `ARRAY(subquery)`
//! becomes an aggregation so the later decorrelation pass can treat it like any other
//! scalar subquery.

use crate::funcs::{self, IS_CORRELATED};
use normx_core::error::{OptError, Result};
use normx_core::expr::{GroupId, Operands};
use normx_core::memo::Memo;
use normx_core::operator::Operator;
use normx_core::pattern::{Bindings, ListPattern, Pattern, Predicate};
use normx_core::private::{ArrayFlattenPrivate, Private};
use normx_core::rule::{Guard, Rule, Shape, Template};
use normx_core::types::{Datum, Type};

fn columns<'m>(memo: &'m Memo, b: &Bindings, name: &str) -> Result<&'m [normx_core::ColumnId]> {
    b.private(memo, name)?
        .as_columns()
        .ok_or_else(|| OptError::internal(format!("{}: `{}` is not a column list", b.rule(), name)))
}

/// Element `index` of every row of the Values bound under `rows`.
fn values_column(memo: &Memo, b: &Bindings, index: usize) -> Result<Vec<GroupId>> {
    funcs::bound_items(memo, b, "rows")?
        .into_iter()
        .map(|row| {
            memo.normalized_expr(row)
                .try_child_group(memo, index)
                .ok_or_else(|| OptError::internal(format!("{}: row {} is too short", b.rule(), row)))
        })
        .collect()
}

/// `AnyScalar(scalar, Tuple(items), cmp)`.
fn any_scalar(memo: &mut Memo, b: &Bindings, items: &[GroupId]) -> Result<Shape> {
    let list = memo.intern_list(items);
    let tuple = memo.construct(Operator::Tuple, Operands::new().list(list))?;
    Ok(Shape::Expr(
        Operator::AnyScalar,
        Operands::new()
            .child(b.group("scalar")?)
            .child(tuple)
            .private(b.private_id("cmp")?),
    ))
}

/// `Any` over `input` compared with a bound scalar.
fn any_over(input: Pattern) -> Pattern {
    Pattern::op(Operator::Any)
        .children(vec![input, Pattern::var("scalar")])
        .with_private("cmp")
}

fn values() -> Pattern {
    Pattern::op(Operator::Values)
        .list(ListPattern::bind("rows", ListPattern::Any))
        .with_private("values_cols")
}

fn single_column(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(columns(memo, b, "values_cols")?.len() == 1)
}

fn inline_single_col(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let items = values_column(memo, b, 0)?;
    any_scalar(memo, b, &items)
}

/// `x = ANY (VALUES (1), (2))` to `x = ANY (1, 2)`.
pub struct InlineAnyValuesSingleCol;

impl Rule for InlineAnyValuesSingleCol {
    fn name(&self) -> &'static str {
        "InlineAnyValuesSingleCol"
    }

    fn pattern(&self) -> Pattern {
        any_over(values())
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("HasSingleColumn", single_column)]
    }

    fn replace(&self) -> Template {
        Template::transform("InlineValues", inline_single_col)
    }
}

/// Position of the projected variable among the Values columns.
fn projected_index(memo: &Memo, b: &Bindings) -> Result<Option<usize>> {
    let col = b
        .private(memo, "col")?
        .as_column()
        .ok_or_else(|| OptError::internal(format!("{}: `col` is not a column", b.rule())))?;
    Ok(columns(memo, b, "values_cols")?.iter().position(|c| *c == col))
}

fn projects_values_column(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(projected_index(memo, b)?.is_some())
}

fn inline_multi_col(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let index = projected_index(memo, b)?
        .ok_or_else(|| OptError::internal("InlineAnyValuesMultiCol: guard bypassed"))?;
    let items = values_column(memo, b, index)?;
    any_scalar(memo, b, &items)
}

/// `x = ANY (SELECT b FROM (VALUES (1, 2), (3, 4)) v(a, b))` to `x = ANY (2, 4)`.
pub struct InlineAnyValuesMultiCol;

impl Rule for InlineAnyValuesMultiCol {
    fn name(&self) -> &'static str {
        "InlineAnyValuesMultiCol"
    }

    fn pattern(&self) -> Pattern {
        any_over(
            Pattern::op(Operator::Project)
                .children(vec![values()])
                .list(ListPattern::exact(vec![
                    Pattern::op(Operator::Variable).with_private("col")
                ])),
        )
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("ProjectsValuesColumn", projects_values_column)]
    }

    fn replace(&self) -> Template {
        Template::transform("InlineValuesColumn", inline_multi_col)
    }
}

fn is_array_const(memo: &Memo, g: GroupId) -> bool {
    matches!(funcs::const_datum(memo, g), Some(Datum::Array { .. }))
}

const IS_ARRAY_CONST: Predicate = Predicate::new("IsArrayConst", is_array_const);

fn array_to_tuple(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let Datum::Array { elem, items } = funcs::bound_datum(memo, b, "array")? else {
        return Err(OptError::internal("SimplifyAnyScalarArray: not an array"));
    };
    let mut groups = Vec::with_capacity(items.len());
    for item in items {
        groups.push(funcs::construct_datum(memo, item, &elem)?);
    }
    any_scalar(memo, b, &groups)
}

/// `x = ANY (ARRAY[1, 2])` to `x = ANY (1, 2)`.
pub struct SimplifyAnyScalarArray;

impl Rule for SimplifyAnyScalarArray {
    fn name(&self) -> &'static str {
        "SimplifyAnyScalarArray"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::AnyScalar)
            .children(vec![
                Pattern::var("scalar"),
                Pattern::bind("array", Pattern::is(IS_ARRAY_CONST)),
            ])
            .with_private("cmp")
    }

    fn replace(&self) -> Template {
        Template::transform("ArrayToTuple", array_to_tuple)
    }
}

fn is_equality(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(b.private(memo, "cmp")?.as_comparison() == Some(Operator::Eq))
}

/// `x = ANY (1, 2)` to `x IN (1, 2)`.
pub struct SimplifyEqualsAnyTuple;

impl Rule for SimplifyEqualsAnyTuple {
    fn name(&self) -> &'static str {
        "SimplifyEqualsAnyTuple"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::AnyScalar)
            .children(vec![
                Pattern::var("scalar"),
                Pattern::bind("tuple", Pattern::op(Operator::Tuple)),
            ])
            .with_private("cmp")
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("IsEquality", is_equality)]
    }

    fn replace(&self) -> Template {
        Template::construct(
            Operator::In,
            vec![Template::bound("scalar"), Template::bound("tuple")],
        )
    }
}

fn flatten_private(memo: &Memo, b: &Bindings) -> Result<ArrayFlattenPrivate> {
    match b.private(memo, "flatten")? {
        Private::ArrayFlatten(p) => Ok(*p),
        _ => Err(OptError::internal(format!("{}: not an array flatten private", b.rule()))),
    }
}

fn element_type(memo: &Memo, b: &Bindings) -> Result<Type> {
    let p = flatten_private(memo, b)?;
    Ok(memo.metadata().column_type(p.input_col)?.clone())
}

fn is_scalar_element(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(!matches!(element_type(memo, b)?, Type::Array(_) | Type::Tuple(_)))
}

/// `ArrayFlatten(input)` to
/// `Subquery(ScalarGroupBy(input, [ArrayAgg(input_col)]))`, wrapped in
/// `COALESCE(.., ARRAY[])` when `input` may be empty.
fn flatten_to_agg(memo: &mut Memo, b: &Bindings) -> Result<Shape> {
    let p = flatten_private(memo, b)?;
    let elem = element_type(memo, b)?;
    let input = b.group("input")?;

    let var = memo.variable(p.input_col)?;
    let agg = memo.unary(Operator::ArrayAgg, var)?;
    let aggs = memo.intern_list(&[agg]);
    let cols = memo.intern_private(Private::Columns(vec![p.output_col]));
    let group_by = memo.construct(
        Operator::ScalarGroupBy,
        Operands::new().child(input).list(aggs).private(cols),
    )?;

    let col = memo.intern_private(Private::Column(p.output_col));
    let subquery = Operands::new().child(group_by).private(col);
    if !memo.relational_props(input)?.cardinality.can_be_empty() {
        return Ok(Shape::Expr(Operator::Subquery, subquery));
    }

    let subquery = memo.construct(Operator::Subquery, subquery)?;
    let empty = memo.constant(Datum::Array { elem, items: Vec::new() })?;
    let list = memo.intern_list(&[subquery, empty]);
    Ok(Shape::Expr(Operator::Coalesce, Operands::new().list(list)))
}

/// Decorrelation-friendly form of a correlated `ARRAY(subquery)`.
pub struct NormalizeArrayFlattenToAgg;

impl Rule for NormalizeArrayFlattenToAgg {
    fn name(&self) -> &'static str {
        "NormalizeArrayFlattenToAgg"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::ArrayFlatten)
            .children(vec![Pattern::bind("input", Pattern::is(IS_CORRELATED))])
            .with_private("flatten")
    }

    fn guards(&self) -> Vec<Guard> {
        vec![Guard::new("IsScalarElement", is_scalar_element)]
    }

    fn replace(&self) -> Template {
        Template::transform("ArrayFlattenToAgg", flatten_to_agg)
    }
}
