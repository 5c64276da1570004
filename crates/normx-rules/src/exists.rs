//! # Exists Rules
//!
//! An existence check only cares whether its input produces at least one row. Wrappers
//! that never change that are stripped, a statically empty input folds to `false`, and an
//! uncorrelated input gets a one-row limit so execution can stop at the first row.
//!
//! ## The `limited` Marker
//!
//! `IntroduceExistsLimit` produces an `Exists` over a `Limit`, which would match its own
//! pattern again. It sets `ExistsPrivate::limited` on its output and only fires when the
//! flag is clear. `EliminateExistsLimit` removes a limit over a correlated input (where
//! it would block decorrelation) and leaves the flag as it is, so the limit is never
//! reintroduced on the same input.

use crate::funcs::{HAS_ZERO_ROWS, IS_CORRELATED};
use normx_core::error::{OptError, Result};
use normx_core::memo::Memo;
use normx_core::operator::Operator;
use normx_core::pattern::{Bindings, Pattern};
use normx_core::private::{ExistsPrivate, Private};
use normx_core::rule::{Guard, PrivateTemplate, PrivateTransform, Rule, Template};
use normx_core::types::Datum;

/// `Exists` over `input`, with its private bound as `private`.
fn exists_over(input: Pattern) -> Pattern {
    Pattern::op(Operator::Exists)
        .children(vec![input])
        .with_private("private")
}

/// `Exists $input` keeping the matched private.
fn exists_of_input() -> Template {
    Template::construct(Operator::Exists, vec![Template::bound("input")])
        .with_private(PrivateTemplate::Bound("private"))
}

/// `EXISTS (<no rows>)` to `false`.
pub struct EliminateEmptyExists;

impl Rule for EliminateEmptyExists {
    fn name(&self) -> &'static str {
        "EliminateEmptyExists"
    }

    fn pattern(&self) -> Pattern {
        Pattern::op(Operator::Exists).children(vec![Pattern::is(HAS_ZERO_ROWS)])
    }

    fn replace(&self) -> Template {
        Template::construct(Operator::False, vec![])
    }
}

/// A projection never changes the number of rows.
pub struct EliminateExistsProject;

impl Rule for EliminateExistsProject {
    fn name(&self) -> &'static str {
        "EliminateExistsProject"
    }

    fn pattern(&self) -> Pattern {
        exists_over(Pattern::op(Operator::Project).children(vec![Pattern::var("input")]))
    }

    fn replace(&self) -> Template {
        exists_of_input()
    }
}

/// A grouping produces a row exactly when its input does.
pub struct EliminateExistsGroupBy;

impl Rule for EliminateExistsGroupBy {
    fn name(&self) -> &'static str {
        "EliminateExistsGroupBy"
    }

    fn pattern(&self) -> Pattern {
        exists_over(Pattern::op(Operator::GroupBy).children(vec![Pattern::var("input")]))
    }

    fn replace(&self) -> Template {
        exists_of_input()
    }
}

fn exists_private(memo: &Memo, b: &Bindings) -> Result<ExistsPrivate> {
    b.private(memo, "private")?
        .as_exists()
        .ok_or_else(|| OptError::internal(format!("{}: private is not an exists private", b.rule())))
}

fn not_limited(memo: &Memo, b: &Bindings) -> Result<bool> {
    Ok(!exists_private(memo, b)?.limited)
}

fn can_have_many_rows(memo: &Memo, b: &Bindings) -> Result<bool> {
    let props = memo.relational_props(b.group("input")?)?;
    Ok(!props.cardinality.is_at_most_one())
}

fn limited(memo: &Memo, b: &Bindings) -> Result<Private> {
    let mut private = exists_private(memo, b)?;
    private.limited = true;
    Ok(Private::Exists(private))
}

/// `EXISTS (r)` to `EXISTS (r LIMIT 1)` for an uncorrelated `r`.
pub struct IntroduceExistsLimit;

impl Rule for IntroduceExistsLimit {
    fn name(&self) -> &'static str {
        "IntroduceExistsLimit"
    }

    fn pattern(&self) -> Pattern {
        exists_over(Pattern::bind("input", Pattern::not(Pattern::is(IS_CORRELATED))))
    }

    fn guards(&self) -> Vec<Guard> {
        vec![
            Guard::new("IsNotLimited", not_limited),
            Guard::new("CanHaveManyRows", can_have_many_rows),
        ]
    }

    fn replace(&self) -> Template {
        let one = Template::construct(Operator::Const, vec![])
            .with_private(PrivateTemplate::Value(Private::Datum(Datum::Int(1))));
        Template::construct(
            Operator::Exists,
            vec![Template::construct(
                Operator::Limit,
                vec![Template::bound("input"), one],
            )],
        )
        .with_private(PrivateTemplate::Transform(
            PrivateTransform::new("MarkLimited", limited),
        ))
    }
}

/// `EXISTS (r LIMIT n)` to `EXISTS (r)` for a correlated `r`.
pub struct EliminateExistsLimit;

impl Rule for EliminateExistsLimit {
    fn name(&self) -> &'static str {
        "EliminateExistsLimit"
    }

    fn pattern(&self) -> Pattern {
        exists_over(Pattern::op(Operator::Limit).children(vec![
            Pattern::bind("input", Pattern::is(IS_CORRELATED)),
            Pattern::Any,
        ]))
    }

    fn replace(&self) -> Template {
        exists_of_input()
    }
}
