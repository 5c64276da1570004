//! # Built-in Normalization Rules
//!
//! This crate provides the default rule set applied by [`Memo::construct`]. Every rule
//! rewrites an expression into an equivalent, more canonical one, so the memo only ever
//! stores the normalized form. Rules are grouped by the operators they rewrite:
//!
//! ## Comparisons (`comp`)
//!
//! - **`CommuteVarInequality`**, **`CommuteConstInequality`**: Put variables left and
//!   constant-valued operands right in `<`, `<=`, `>`, `>=`, flipping the operator.
//! - **`CommuteVar`**, **`CommuteConst`**: The same for `=`, `!=`, `IS`, `IS NOT`, and for
//!   the commutative arithmetic operators.
//! - **`SimplifySameVarEqualities`**, **`SimplifySameVarInequalities`**: Fold `x op x`
//!   into a null-aware form.
//! - **`UnifyComparisonTypes`**: Move a lossless cast from the constant side into the
//!   constant itself.
//!
//! ## JSON (`json`)
//!
//! - **`NormalizeJSONFieldAccess`**, **`NormalizeJSONContains`**: Turn a comparison on a
//!   JSON field into a containment test on the whole document.
//!
//! ## Scalars (`scalar`)
//!
//! - **`EliminateCoalesce`**, **`SimplifyCoalesce`**: Drop leading NULLs and stop at the
//!   first constant.
//! - **`EliminateCast`**: Remove a cast to the type the input already has.
//! - **`FoldCollate`**: Evaluate `COLLATE` over a string constant.
//! - **`NormalizeInConst`**: Sort and de-duplicate a constant `IN` list.
//! - **`FoldInNull`**: `x IN (NULL)` is NULL.
//! - **`SimplifyCaseWhenConstValue`**: Resolve `WHEN` branches against a constant input.
//!
//! ## Existence checks (`exists`)
//!
//! - **`EliminateEmptyExists`**, **`EliminateExistsProject`**, **`EliminateExistsGroupBy`**,
//!   **`IntroduceExistsLimit`**, **`EliminateExistsLimit`**.
//!
//! ## Subqueries (`subquery`)
//!
//! - **`InlineAnyValuesSingleCol`**, **`InlineAnyValuesMultiCol`**,
//!   **`SimplifyAnyScalarArray`**, **`SimplifyEqualsAnyTuple`**,
//!   **`NormalizeArrayFlattenToAgg`**.
//!
//! Rules for the same operator are tried in the order they are added below; the first one
//! whose pattern and guards pass is the one that fires.
//!
//! [`Memo::construct`]: normx_core::memo::Memo::construct

pub mod comp;
pub mod exists;
pub mod funcs;
pub mod json;
pub mod scalar;
pub mod subquery;

use normx_core::rule::RuleSet;
use std::sync::Arc;
use tracing::debug;

/// Create the default rule set with all built-in rules.
///
/// The set is immutable once built and can be shared by any number of memos.
pub fn default_rule_set() -> Arc<RuleSet> {
    let mut rules = RuleSet::new();

    // Canonical operand order first: later rules only match the canonical arrangement.
    rules.add_rule(Box::new(comp::CommuteVarInequality));
    rules.add_rule(Box::new(comp::CommuteConstInequality));
    rules.add_rule(Box::new(comp::CommuteVar));
    rules.add_rule(Box::new(comp::CommuteConst));
    rules.add_rule(Box::new(comp::SimplifySameVarEqualities));
    rules.add_rule(Box::new(comp::SimplifySameVarInequalities));
    rules.add_rule(Box::new(comp::UnifyComparisonTypes));

    rules.add_rule(Box::new(json::NormalizeJSONFieldAccess));
    rules.add_rule(Box::new(json::NormalizeJSONContains));

    rules.add_rule(Box::new(scalar::EliminateCoalesce));
    rules.add_rule(Box::new(scalar::SimplifyCoalesce));
    rules.add_rule(Box::new(scalar::EliminateCast));
    rules.add_rule(Box::new(scalar::FoldCollate));
    rules.add_rule(Box::new(scalar::NormalizeInConst));
    rules.add_rule(Box::new(scalar::FoldInNull));
    rules.add_rule(Box::new(scalar::SimplifyCaseWhenConstValue));

    rules.add_rule(Box::new(exists::EliminateEmptyExists));
    rules.add_rule(Box::new(exists::EliminateExistsProject));
    rules.add_rule(Box::new(exists::EliminateExistsGroupBy));
    rules.add_rule(Box::new(exists::IntroduceExistsLimit));
    rules.add_rule(Box::new(exists::EliminateExistsLimit));

    rules.add_rule(Box::new(subquery::InlineAnyValuesSingleCol));
    rules.add_rule(Box::new(subquery::InlineAnyValuesMultiCol));
    rules.add_rule(Box::new(subquery::SimplifyAnyScalarArray));
    rules.add_rule(Box::new(subquery::SimplifyEqualsAnyTuple));
    rules.add_rule(Box::new(subquery::NormalizeArrayFlattenToAgg));

    debug!(rules = rules.len(), "built default rule set");
    Arc::new(rules)
}
