//! # Operators and the Operand Layout Table
//!
//! `Operator` is the closed set of expression kinds the memo can hold. Each operator has a
//! fixed *layout* describing how its operands are packed into the slots of an
//! [`ExprRecord`](crate::expr::ExprRecord):
//!
//! ```text
//!   slot:   0 .. fixed_count-1      fixed children (group ids)
//!           fixed_count, +1         list offset, list length       (if the op has a list)
//!           next                    private id                     (if the op has a private)
//! ```
//!
//! The layout is bit-packed into a single byte (`OpLayout`):
//!
//! - bits 0-1: number of fixed children (at most 3)
//! - bits 2-4: 0 if there is no list, otherwise 1 + slot of the list offset. The list length
//!   lives in the slot after the offset.
//! - bits 5-7: 0 if there is no private, otherwise 1 + slot of the private id.
//!
//! The whole table is generated from the single `operators!` declaration below. Adding an
//! operator there is the only step needed to make it storable, matchable and printable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of `u32` operand slots in every expression record.
pub const MAX_OPERANDS: usize = 4;

/// Bit-packed operand layout of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpLayout(u8);

impl OpLayout {
    /// Compute the layout for an operator with `fixed` children and optional list/private,
    /// assigning slots in order: fixed children, list (two slots), private.
    pub const fn from_shape(fixed: u8, has_list: bool, has_private: bool) -> OpLayout {
        let list = if has_list { fixed + 1 } else { 0 };
        let next_slot = if has_list { fixed + 2 } else { fixed };
        let private = if has_private { next_slot + 1 } else { 0 };
        OpLayout(fixed | (list << 2) | (private << 5))
    }

    pub const fn fixed_count(self) -> usize {
        (self.0 & 0b11) as usize
    }

    /// 0 if there is no list, otherwise 1 + slot of the list offset.
    pub const fn list(self) -> usize {
        ((self.0 >> 2) & 0b111) as usize
    }

    /// 0 if there is no private, otherwise 1 + slot of the private id.
    pub const fn private(self) -> usize {
        ((self.0 >> 5) & 0b111) as usize
    }

    pub const fn has_list(self) -> bool {
        self.list() != 0
    }

    pub const fn has_private(self) -> bool {
        self.private() != 0
    }

    /// Number of slots actually used.
    pub const fn slots_used(self) -> usize {
        let mut used = self.fixed_count();
        if self.has_list() {
            used += 2;
        }
        if self.has_private() {
            used += 1;
        }
        used
    }
}

/// Whether an operator produces a scalar value or a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpClass {
    Scalar,
    Relational,
}

macro_rules! operators {
    ($( $(#[$doc:meta])* $name:ident => $class:ident ($fixed:expr, list: $list:expr, private: $private:expr) ),* $(,)?) => {
        /// Closed set of expression kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Operator {
            $( $(#[$doc])* $name ),*
        }

        /// Operand layout of every operator, indexed by `Operator as usize`.
        pub static OP_LAYOUT_TABLE: &[OpLayout] = &[
            $( OpLayout::from_shape($fixed, $list, $private) ),*
        ];

        impl Operator {
            /// Every operator in declaration order.
            pub const ALL: &'static [Operator] = &[ $( Operator::$name ),* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Operator::$name => stringify!($name) ),*
                }
            }

            pub fn class(self) -> OpClass {
                match self {
                    $( Operator::$name => OpClass::$class ),*
                }
            }

            /// Look up an operator by its name (case-insensitive, underscores ignored).
            pub fn from_name(name: &str) -> Option<Operator> {
                let wanted: String = name
                    .chars()
                    .filter(|c| *c != '_')
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                Operator::ALL
                    .iter()
                    .copied()
                    .find(|op| op.name().to_ascii_lowercase() == wanted)
            }
        }
    };
}

operators! {
    // ----- Scalar leaves -----
    /// Reference to a column (private: column id).
    Variable => Scalar(0, list: false, private: true),
    /// Non-null constant (private: datum).
    Const => Scalar(0, list: false, private: true),
    /// Typed NULL (private: type).
    Null => Scalar(0, list: false, private: true),
    True => Scalar(0, list: false, private: false),
    False => Scalar(0, list: false, private: false),

    // ----- Scalar composites -----
    Tuple => Scalar(0, list: true, private: false),
    /// Array constructor (private: array type).
    Array => Scalar(0, list: true, private: true),
    And => Scalar(2, list: false, private: false),
    Or => Scalar(2, list: false, private: false),
    Not => Scalar(1, list: false, private: false),
    Eq => Scalar(2, list: false, private: false),
    Ne => Scalar(2, list: false, private: false),
    Lt => Scalar(2, list: false, private: false),
    Le => Scalar(2, list: false, private: false),
    Gt => Scalar(2, list: false, private: false),
    Ge => Scalar(2, list: false, private: false),
    Is => Scalar(2, list: false, private: false),
    IsNot => Scalar(2, list: false, private: false),
    In => Scalar(2, list: false, private: false),
    NotIn => Scalar(2, list: false, private: false),
    /// JSON containment (`@>`).
    Contains => Scalar(2, list: false, private: false),
    Plus => Scalar(2, list: false, private: false),
    Minus => Scalar(2, list: false, private: false),
    Mult => Scalar(2, list: false, private: false),
    /// JSON field access (`->`).
    FetchVal => Scalar(2, list: false, private: false),
    /// Type conversion (private: target type).
    Cast => Scalar(1, list: false, private: true),
    /// Attach a collation (private: locale).
    Collate => Scalar(1, list: false, private: true),
    Coalesce => Scalar(0, list: true, private: false),
    /// `CASE input WHEN .. THEN .. ELSE else END`. Children: input, else. List: `When`s.
    Case => Scalar(2, list: true, private: false),
    /// Children: condition, value.
    When => Scalar(2, list: false, private: false),
    /// `left <cmp> ANY (tuple or array)` (private: comparison operator).
    AnyScalar => Scalar(2, list: false, private: true),

    // ----- Subquery scalars -----
    /// Private: exists flags.
    Exists => Scalar(1, list: false, private: true),
    /// Scalar subquery returning one column (private: column id).
    Subquery => Scalar(1, list: false, private: true),
    /// `scalar <cmp> ANY (subquery)`. Children: input relation, scalar.
    Any => Scalar(2, list: false, private: true),
    /// `ARRAY(subquery)` (private: input and output columns).
    ArrayFlatten => Scalar(1, list: false, private: true),

    // ----- Aggregates -----
    ArrayAgg => Scalar(1, list: false, private: false),
    ConstAgg => Scalar(1, list: false, private: false),
    CountRows => Scalar(0, list: false, private: false),

    // ----- Relational -----
    /// Private: table name and output columns.
    Scan => Relational(0, list: false, private: true),
    /// List: one `Tuple` per row. Private: output columns.
    Values => Relational(0, list: true, private: true),
    /// Children: input, filter.
    Select => Relational(2, list: false, private: false),
    /// List: projections. Private: output columns, one per projection.
    Project => Relational(1, list: true, private: true),
    /// List: aggregations. Private: grouping and aggregate columns.
    GroupBy => Relational(1, list: true, private: true),
    /// Aggregation without grouping columns; always one row. Private: aggregate columns.
    ScalarGroupBy => Relational(1, list: true, private: true),
    /// Children: input, row count.
    Limit => Relational(2, list: false, private: false),
}

impl Operator {
    /// The operand layout of this operator.
    pub fn layout(self) -> OpLayout {
        OP_LAYOUT_TABLE[self as usize]
    }

    pub fn is_scalar(self) -> bool {
        self.class() == OpClass::Scalar
    }

    pub fn is_relational(self) -> bool {
        self.class() == OpClass::Relational
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::Ne
                | Operator::Lt
                | Operator::Le
                | Operator::Gt
                | Operator::Ge
                | Operator::Is
                | Operator::IsNot
                | Operator::In
                | Operator::NotIn
                | Operator::Contains
        )
    }

    /// Whether this operator is one of the constant leaf operators.
    pub fn is_const_datum(self) -> bool {
        matches!(
            self,
            Operator::Const | Operator::Null | Operator::True | Operator::False
        )
    }

    /// The operator to use when the two operands of a binary operator are swapped.
    ///
    /// Symmetric operators map to themselves and ordering comparisons to their mirror.
    /// Returns `None` for operators whose operands cannot be swapped.
    pub fn commuted(self) -> Option<Operator> {
        match self {
            Operator::Eq
            | Operator::Ne
            | Operator::Is
            | Operator::IsNot
            | Operator::Plus
            | Operator::Mult
            | Operator::And
            | Operator::Or => Some(self),
            Operator::Lt => Some(Operator::Gt),
            Operator::Le => Some(Operator::Ge),
            Operator::Gt => Some(Operator::Lt),
            Operator::Ge => Some(Operator::Le),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_table_covers_all_operators() {
        assert_eq!(OP_LAYOUT_TABLE.len(), Operator::ALL.len());
        for (i, op) in Operator::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
            let layout = op.layout();
            assert!(layout.fixed_count() <= 3);
            assert!(layout.slots_used() <= MAX_OPERANDS, "{} overflows", op);
        }
    }

    #[test]
    fn test_layout_decoding() {
        let eq = Operator::Eq.layout();
        assert_eq!((eq.fixed_count(), eq.list(), eq.private()), (2, 0, 0));

        // Case: input, else, then list offset in slot 2 and length in slot 3.
        let case = Operator::Case.layout();
        assert_eq!((case.fixed_count(), case.list(), case.private()), (2, 3, 0));

        // Project: input, list in slots 1-2, private in slot 3.
        let project = Operator::Project.layout();
        assert_eq!(
            (project.fixed_count(), project.list(), project.private()),
            (1, 2, 4)
        );

        let var = Operator::Variable.layout();
        assert_eq!((var.fixed_count(), var.list(), var.private()), (0, 0, 1));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Operator::from_name("Eq"), Some(Operator::Eq));
        assert_eq!(Operator::from_name("is_not"), Some(Operator::IsNot));
        assert_eq!(Operator::from_name("array_flatten"), Some(Operator::ArrayFlatten));
        assert_eq!(Operator::from_name("window"), None);
    }

    #[test]
    fn test_commuted() {
        assert_eq!(Operator::Lt.commuted(), Some(Operator::Gt));
        assert_eq!(Operator::Eq.commuted(), Some(Operator::Eq));
        assert_eq!(Operator::Minus.commuted(), None);
    }
}
