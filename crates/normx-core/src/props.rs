//! # Logical Properties
//!
//! Logical properties are shared by every expression in a group because they describe
//! *what* the group computes, not how. They are derived once, when the group is created,
//! from the operator, its private, and the properties of its child groups.
//!
//! Normalization rules consult them in their guards. A rule can check "is this scalar
//! constant-valued", "is this subquery correlated" or "can this relation produce zero
//! rows" without walking the subtree again.

use crate::error::{OptError, Result};
use crate::expr::{ExprRecord, GroupId};
use crate::memo::Memo;
use crate::metadata::ColSet;
use crate::operator::Operator;
use crate::private::Private;
use crate::types::{Datum, Type};

/// Bounds on the number of rows a relation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u64,
    /// `None` means unbounded.
    pub max: Option<u64>,
}

impl Cardinality {
    pub const ANY: Cardinality = Cardinality { min: 0, max: None };
    pub const ZERO: Cardinality = Cardinality {
        min: 0,
        max: Some(0),
    };

    pub fn exactly(n: u64) -> Self {
        Self { min: n, max: Some(n) }
    }

    /// The relation is statically known to produce no rows.
    pub fn is_zero(&self) -> bool {
        self.max == Some(0)
    }

    pub fn is_at_most_one(&self) -> bool {
        matches!(self.max, Some(m) if m <= 1)
    }

    pub fn can_be_empty(&self) -> bool {
        self.min == 0
    }

    /// Clamp both bounds to at most `k` rows.
    pub fn limit(self, k: u64) -> Self {
        Self {
            min: self.min.min(k),
            max: Some(self.max.map_or(k, |m| m.min(k))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarProps {
    pub ty: Type,
    /// Columns referenced by the expression that it does not bind itself.
    pub outer_cols: ColSet,
    pub has_subquery: bool,
}

impl ScalarProps {
    /// Constant-valued: no free references to outer rows and no subquery. Such an
    /// expression evaluates to the same value for every row.
    pub fn is_constant(&self) -> bool {
        self.outer_cols.is_empty() && !self.has_subquery
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalProps {
    pub output_cols: ColSet,
    /// Columns referenced from an enclosing scope. Non-empty means correlated.
    pub outer_cols: ColSet,
    pub cardinality: Cardinality,
}

impl RelationalProps {
    pub fn is_correlated(&self) -> bool {
        !self.outer_cols.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalProps {
    Scalar(ScalarProps),
    Relational(RelationalProps),
}

impl LogicalProps {
    pub fn as_scalar(&self) -> Option<&ScalarProps> {
        match self {
            LogicalProps::Scalar(p) => Some(p),
            LogicalProps::Relational(_) => None,
        }
    }

    pub fn as_relational(&self) -> Option<&RelationalProps> {
        match self {
            LogicalProps::Relational(p) => Some(p),
            LogicalProps::Scalar(_) => None,
        }
    }

    pub fn outer_cols(&self) -> &ColSet {
        match self {
            LogicalProps::Scalar(p) => &p.outer_cols,
            LogicalProps::Relational(p) => &p.outer_cols,
        }
    }
}

/// Derive the properties of a record whose children are already memoized.
pub(crate) fn derive(memo: &Memo, rec: &ExprRecord) -> Result<LogicalProps> {
    let op = rec.operator();
    if op.is_relational() {
        derive_relational(memo, rec).map(LogicalProps::Relational)
    } else {
        derive_scalar(memo, rec).map(LogicalProps::Scalar)
    }
}

fn scalar_child(memo: &Memo, group: GroupId) -> Result<&ScalarProps> {
    memo.try_props(group)?
        .as_scalar()
        .ok_or_else(|| OptError::internal(format!("{} is not a scalar group", group)))
}

fn relational_child(memo: &Memo, group: GroupId) -> Result<&RelationalProps> {
    memo.try_props(group)?
        .as_relational()
        .ok_or_else(|| OptError::internal(format!("{} is not a relational group", group)))
}

fn private<'m>(memo: &'m Memo, rec: &ExprRecord) -> Result<&'m Private> {
    rec.private(memo).ok_or(OptError::MissingOperand {
        op: rec.operator(),
        operand: "private",
    })
}

fn wrong_private(op: Operator, expected: &'static str) -> OptError {
    OptError::WrongPrivate { op, expected }
}

fn derive_scalar(memo: &Memo, rec: &ExprRecord) -> Result<ScalarProps> {
    let op = rec.operator();

    // Subquery operators take relational inputs and are handled separately.
    match op {
        Operator::Exists | Operator::Subquery | Operator::ArrayFlatten | Operator::Any => {
            return derive_subquery(memo, rec)
        }
        _ => {}
    }

    let children = rec.children(memo);
    let mut outer_cols = ColSet::new();
    let mut has_subquery = false;
    let mut child_types = Vec::with_capacity(children.len());
    for child in &children {
        let props = scalar_child(memo, *child)?;
        outer_cols.extend(props.outer_cols.iter().copied());
        has_subquery |= props.has_subquery;
        child_types.push(props.ty.clone());
    }

    let ty = match op {
        Operator::Variable => {
            let col = private(memo, rec)?
                .as_column()
                .ok_or_else(|| wrong_private(op, "column"))?;
            outer_cols.insert(col);
            memo.metadata().column_type(col)?.clone()
        }
        Operator::Const => private(memo, rec)?
            .as_datum()
            .ok_or_else(|| wrong_private(op, "datum"))?
            .ty(),
        Operator::Null | Operator::Array | Operator::Cast => private(memo, rec)?
            .as_type()
            .ok_or_else(|| wrong_private(op, "type"))?
            .clone(),
        Operator::Collate => {
            let locale = private(memo, rec)?
                .as_locale()
                .ok_or_else(|| wrong_private(op, "locale"))?;
            Type::CollatedString(locale.to_string())
        }
        Operator::AnyScalar => {
            private(memo, rec)?
                .as_comparison()
                .filter(|cmp| cmp.is_comparison())
                .ok_or_else(|| wrong_private(op, "comparison"))?;
            Type::Bool
        }
        Operator::Tuple => Type::Tuple(child_types),
        Operator::Plus | Operator::Minus | Operator::Mult => {
            first_known(child_types.iter()).unwrap_or(Type::Unknown)
        }
        Operator::FetchVal => Type::Jsonb,
        Operator::Coalesce => first_known(child_types.iter()).unwrap_or(Type::Unknown),
        // Children: input, else, then the When list. Prefer the else type, then the
        // first branch type.
        Operator::Case => {
            if let Some(list) = rec.list_id() {
                for &branch in memo.lookup_list(list) {
                    let branch_op = memo.normalized_expr(branch).operator();
                    if branch_op != Operator::When {
                        return Err(OptError::internal(format!(
                            "CASE branch {} is {}, not When",
                            branch, branch_op
                        )));
                    }
                }
            }
            first_known(child_types.iter().skip(1)).unwrap_or(Type::Unknown)
        }
        Operator::When => child_types[1].clone(),
        Operator::ArrayAgg => Type::array_of(child_types[0].clone()),
        Operator::ConstAgg => child_types[0].clone(),
        Operator::CountRows => Type::Int,
        _ => Type::Bool,
    };

    Ok(ScalarProps {
        ty,
        outer_cols,
        has_subquery,
    })
}

fn first_known<'a>(mut types: impl Iterator<Item = &'a Type>) -> Option<Type> {
    types.find(|t| **t != Type::Unknown).cloned()
}

fn derive_subquery(memo: &Memo, rec: &ExprRecord) -> Result<ScalarProps> {
    let op = rec.operator();
    let input = relational_child(memo, rec.fixed_child(0))?;
    let mut outer_cols = input.outer_cols.clone();

    let ty = match op {
        Operator::Exists => {
            private(memo, rec)?
                .as_exists()
                .ok_or_else(|| wrong_private(op, "exists"))?;
            Type::Bool
        }
        Operator::Subquery => {
            let col = private(memo, rec)?
                .as_column()
                .ok_or_else(|| wrong_private(op, "column"))?;
            memo.metadata().column_type(col)?.clone()
        }
        Operator::ArrayFlatten => match private(memo, rec)? {
            Private::ArrayFlatten(p) => Type::array_of(memo.metadata().column_type(p.input_col)?.clone()),
            _ => return Err(wrong_private(op, "array flatten")),
        },
        Operator::Any => {
            private(memo, rec)?
                .as_comparison()
                .filter(|cmp| cmp.is_comparison())
                .ok_or_else(|| wrong_private(op, "comparison"))?;
            let scalar = scalar_child(memo, rec.fixed_child(1))?;
            outer_cols.extend(scalar.outer_cols.iter().copied());
            Type::Bool
        }
        _ => return Err(OptError::internal(format!("{} is not a subquery operator", op))),
    };

    Ok(ScalarProps {
        ty,
        outer_cols,
        has_subquery: true,
    })
}

/// Outer columns of `input` plus the columns `scalars` reference that `input` does not
/// produce.
fn merge_outer(memo: &Memo, input: &RelationalProps, scalars: &[GroupId]) -> Result<ColSet> {
    let mut outer = input.outer_cols.clone();
    for group in scalars {
        let props = scalar_child(memo, *group)?;
        outer.extend(
            props
                .outer_cols
                .iter()
                .filter(|c| !input.output_cols.contains(c))
                .copied(),
        );
    }
    Ok(outer)
}

fn derive_relational(memo: &Memo, rec: &ExprRecord) -> Result<RelationalProps> {
    let op = rec.operator();
    let list: Vec<GroupId> = rec
        .list_id()
        .map(|id| memo.lookup_list(id).to_vec())
        .unwrap_or_default();

    match op {
        Operator::Scan => match private(memo, rec)? {
            Private::Scan(scan) => Ok(RelationalProps {
                output_cols: scan.cols.iter().copied().collect(),
                outer_cols: ColSet::new(),
                cardinality: Cardinality::ANY,
            }),
            _ => Err(wrong_private(op, "scan")),
        },
        Operator::Values => {
            let cols = private(memo, rec)?
                .as_columns()
                .ok_or_else(|| wrong_private(op, "columns"))?;
            let mut outer_cols = ColSet::new();
            for row in &list {
                outer_cols.extend(scalar_child(memo, *row)?.outer_cols.iter().copied());
            }
            Ok(RelationalProps {
                output_cols: cols.iter().copied().collect(),
                outer_cols,
                cardinality: Cardinality::exactly(list.len() as u64),
            })
        }
        Operator::Select => {
            let input = relational_child(memo, rec.fixed_child(0))?;
            let filter = rec.fixed_child(1);
            let cardinality = match memo.normalized_expr(filter).operator() {
                Operator::False | Operator::Null => Cardinality::ZERO,
                Operator::True => input.cardinality,
                _ => Cardinality {
                    min: 0,
                    max: input.cardinality.max,
                },
            };
            Ok(RelationalProps {
                output_cols: input.output_cols.clone(),
                outer_cols: merge_outer(memo, input, &[filter])?,
                cardinality,
            })
        }
        Operator::Project => {
            let input = relational_child(memo, rec.fixed_child(0))?;
            let cols = private(memo, rec)?
                .as_columns()
                .ok_or_else(|| wrong_private(op, "columns"))?;
            if cols.len() != list.len() {
                return Err(OptError::internal(format!(
                    "project has {} projections but {} output columns",
                    list.len(),
                    cols.len()
                )));
            }
            Ok(RelationalProps {
                output_cols: cols.iter().copied().collect(),
                outer_cols: merge_outer(memo, input, &list)?,
                cardinality: input.cardinality,
            })
        }
        Operator::GroupBy => {
            let input = relational_child(memo, rec.fixed_child(0))?;
            let Private::GroupBy(group_by) = private(memo, rec)? else {
                return Err(wrong_private(op, "group by"));
            };
            let output_cols = group_by
                .grouping
                .iter()
                .chain(group_by.aggs.iter())
                .copied()
                .collect();
            Ok(RelationalProps {
                output_cols,
                outer_cols: merge_outer(memo, input, &list)?,
                cardinality: Cardinality {
                    min: input.cardinality.min.min(1),
                    max: input.cardinality.max,
                },
            })
        }
        Operator::ScalarGroupBy => {
            let input = relational_child(memo, rec.fixed_child(0))?;
            let cols = private(memo, rec)?
                .as_columns()
                .ok_or_else(|| wrong_private(op, "columns"))?;
            Ok(RelationalProps {
                output_cols: cols.iter().copied().collect(),
                outer_cols: merge_outer(memo, input, &list)?,
                cardinality: Cardinality::exactly(1),
            })
        }
        Operator::Limit => {
            let input = relational_child(memo, rec.fixed_child(0))?;
            let count = rec.fixed_child(1);
            let count_expr = memo.normalized_expr(count);
            let cardinality = match count_expr.private(memo).and_then(Private::as_datum) {
                Some(Datum::Int(k)) if count_expr.operator() == Operator::Const && *k >= 0 => {
                    input.cardinality.limit(*k as u64)
                }
                _ => Cardinality {
                    min: 0,
                    max: input.cardinality.max,
                },
            };
            Ok(RelationalProps {
                output_cols: input.output_cols.clone(),
                outer_cols: merge_outer(memo, input, &[count])?,
                cardinality,
            })
        }
        _ => Err(OptError::internal(format!("{} is not a relational operator", op))),
    }
}
