//! # normx-core: Memo and Normalization Engine
//!
//! This crate implements the expression memo of a cost-based query optimizer together with
//! the rule engine that normalizes every expression as it is constructed. Each query
//! compilation owns one `Memo`: the binder hands over a bound tree, the memo interns it
//! bottom-up, and every node is rewritten to its canonical form before it is stored.
//!
//! ## Module Overview
//!
//! - **`operator`**: The closed operator set and the bit-packed operand layout table.
//! - **`expr`**: Fixed-size expression records, group/list/private ids, operands.
//! - **`intern`**: Content-addressed stores for child lists and private payloads.
//! - **`memo`**: Groups, the fingerprint index, and construction limits.
//! - **`norm`**: `Memo::construct`, the match / guard / rewrite loop.
//! - **`pattern`**: Declarative patterns and bindings matched against candidates.
//! - **`rule`**: The `Rule` trait, templates, and the operator-indexed `RuleSet`.
//! - **`replace`**: The operator-agnostic child replacement traversal.
//! - **`props`**: Logical properties derived once per group.
//! - **`tree`**: The serializable bound-tree format and `build`/`extract`.
//! - **`format`**: Indented text rendering of normalized expressions.
//! - **`types`**, **`private`**, **`metadata`**: Datums, operator payloads, column registry.
//! - **`error`**: `OptError` and the internal/unimplemented split.

pub mod error;
pub mod expr;
pub mod format;
pub mod intern;
pub mod memo;
pub mod metadata;
pub mod norm;
pub mod operator;
pub mod pattern;
pub mod private;
pub mod props;
pub mod replace;
pub mod rule;
pub mod tree;
pub mod types;

pub use error::{OptError, Result};
pub use expr::{ExprId, ExprOrdinal, ExprRecord, GroupId, ListId, Operands, PrivateId};
pub use memo::{Memo, NormStats, NormalizeConfig};
pub use metadata::{ColumnId, Metadata};
pub use operator::{OpClass, Operator};
pub use private::Private;
pub use tree::Tree;
pub use types::{Datum, Type};
