//! # Errors
//!
//! Construction and rewriting are deterministic, so nothing here is retryable. Errors fall
//! into two classes:
//!
//! - **Internal** errors are contract violations: an operand list that disagrees with the
//!   operator's layout, a rule template that references an unbound name, a rewrite chain that
//!   never reaches a fixpoint. They abort compilation of the current query. Other queries are
//!   unaffected because each compilation owns its own memo.
//!
//! - **Unimplemented** errors are expected. A front-end raises one when it recognizes a shape
//!   the optimizer does not support yet, and callers report it as a feature gap.

use crate::expr::GroupId;
use crate::operator::Operator;

pub type Result<T> = std::result::Result<T, OptError>;

/// Errors raised while memoizing or normalizing expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptError {
    /// The number of fixed children does not match the operator's layout.
    #[error("operator {op} expects {expected} fixed children, got {actual}")]
    ArityMismatch {
        op: Operator,
        expected: usize,
        actual: usize,
    },
    /// A list or private operand was supplied for an operator that has none.
    #[error("operator {op} does not take a {operand} operand")]
    UnexpectedOperand { op: Operator, operand: &'static str },
    /// A list or private operand required by the layout was not supplied.
    #[error("operator {op} requires a {operand} operand")]
    MissingOperand { op: Operator, operand: &'static str },
    /// The private payload has the wrong variant for the operator.
    #[error("operator {op} expects a {expected} private")]
    WrongPrivate { op: Operator, expected: &'static str },
    /// A group id that was never allocated by this memo.
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    /// A column id or name that is not registered in the metadata.
    #[error("unknown column {0}")]
    UnknownColumn(String),
    /// A rule guard or template referenced a name the pattern never bound.
    #[error("rule {rule} references unbound name `{name}`")]
    UnboundName { rule: String, name: String },
    /// A single construct call rewrote more times than the configured cap.
    #[error("normalization of {op} did not reach a fixpoint after {limit} rewrites (last rule: {rule})")]
    RewriteLimit {
        op: Operator,
        rule: String,
        limit: usize,
    },
    /// Templates re-entered construct more deeply than the configured cap.
    #[error("construct nesting exceeded depth {0}")]
    DepthLimit(usize),
    /// An alternate expression is already interned in another group.
    #[error("expression {op} already belongs to group {existing}, cannot add it to group {target}")]
    DuplicateExpr {
        op: Operator,
        existing: GroupId,
        target: GroupId,
    },
    /// Any other violated invariant.
    #[error("internal error: {0}")]
    Internal(String),
    /// A construct the surrounding system does not support yet.
    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

impl OptError {
    pub fn internal(msg: impl Into<String>) -> Self {
        OptError::Internal(msg.into())
    }

    pub fn unimplemented(what: impl Into<String>) -> Self {
        OptError::Unimplemented(what.into())
    }

    /// True for feature gaps that should be reported to the end user as such.
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, OptError::Unimplemented(_))
    }

    /// True for contract violations (bugs in a caller, the layout table or the rule table).
    pub fn is_internal(&self) -> bool {
        !self.is_unimplemented()
    }
}
