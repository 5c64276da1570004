//! # Expression Records
//!
//! An `ExprRecord` is the memo's representation of one expression node: an operator tag
//! plus [`MAX_OPERANDS`] `u32` slots. Slots hold only small integer ids (child groups,
//! a list reference, a private reference) and are interpreted through the operator's
//! [`OpLayout`](crate::operator::OpLayout). Children are never owned or embedded.
//!
//! Because a record is small, `Copy`, and free of pointers, it is its own fingerprint: two
//! records with identical bytes denote the identical expression, and the memo uses the
//! record directly as the key of its deduplication index.
//!
//! ## Logical children
//!
//! `child_count()` and `child_group(n)` present the fixed children and the list elements as
//! one sequence, so callers that only walk children need not know which operators have
//! lists. The private is never a child.

use crate::error::{OptError, Result};
use crate::memo::Memo;
use crate::operator::{Operator, MAX_OPERANDS};
use crate::private::Private;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a memo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Position of an expression within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprOrdinal(pub u16);

impl ExprOrdinal {
    /// Ordinal of the normalized expression of every group.
    pub const NORMALIZED: ExprOrdinal = ExprOrdinal(0);
}

/// Identifies one expression: its group plus its ordinal in that group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExprId {
    pub group: GroupId,
    pub ordinal: ExprOrdinal,
}

impl ExprId {
    /// Id of the normalized expression of `group`.
    pub fn normalized(group: GroupId) -> Self {
        Self {
            group,
            ordinal: ExprOrdinal::NORMALIZED,
        }
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.ordinal.0)
    }
}

/// Reference to an interned list of group ids: a slice of the memo's list store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ListId {
    pub offset: u32,
    pub len: u32,
}

impl ListId {
    pub const EMPTY: ListId = ListId { offset: 0, len: 0 };
}

/// Reference to an interned private value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateId(pub u32);

/// Already-memoized operands of an expression that has not been interned yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operands {
    /// Fixed children, in slot order.
    pub children: Vec<GroupId>,
    pub list: Option<ListId>,
    pub private: Option<PrivateId>,
}

impl Operands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(mut self, group: GroupId) -> Self {
        self.children.push(group);
        self
    }

    pub fn children(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.children.extend(groups);
        self
    }

    pub fn list(mut self, list: ListId) -> Self {
        self.list = Some(list);
        self
    }

    pub fn private(mut self, private: PrivateId) -> Self {
        self.private = Some(private);
        self
    }
}

/// Memoized expression: operator plus packed operand slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprRecord {
    op: Operator,
    state: [u32; MAX_OPERANDS],
}

/// A record is its own content key.
pub type Fingerprint = ExprRecord;

impl ExprRecord {
    /// Pack `operands` according to the layout of `op`.
    ///
    /// Fails if the operands disagree with the layout: wrong number of fixed children, a
    /// missing list or private, or one supplied where the operator has none.
    pub fn new(op: Operator, operands: &Operands) -> Result<Self> {
        let layout = op.layout();
        if operands.children.len() != layout.fixed_count() {
            return Err(OptError::ArityMismatch {
                op,
                expected: layout.fixed_count(),
                actual: operands.children.len(),
            });
        }

        let mut state = [0u32; MAX_OPERANDS];
        for (slot, child) in operands.children.iter().enumerate() {
            state[slot] = child.0;
        }

        match (layout.list(), operands.list) {
            (0, None) => {}
            (0, Some(_)) => return Err(OptError::UnexpectedOperand { op, operand: "list" }),
            (_, None) => return Err(OptError::MissingOperand { op, operand: "list" }),
            (list, Some(id)) => {
                state[list - 1] = id.offset;
                state[list] = id.len;
            }
        }

        match (layout.private(), operands.private) {
            (0, None) => {}
            (0, Some(_)) => {
                return Err(OptError::UnexpectedOperand {
                    op,
                    operand: "private",
                })
            }
            (_, None) => {
                return Err(OptError::MissingOperand {
                    op,
                    operand: "private",
                })
            }
            (private, Some(id)) => state[private - 1] = id.0,
        }

        Ok(Self { op, state })
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn fingerprint(&self) -> Fingerprint {
        *self
    }

    /// Number of fixed children (excluding list elements).
    pub fn fixed_count(&self) -> usize {
        self.op.layout().fixed_count()
    }

    /// Number of logical children: fixed children plus list length.
    pub fn child_count(&self) -> usize {
        let layout = self.op.layout();
        match layout.list() {
            0 => layout.fixed_count(),
            list => layout.fixed_count() + self.state[list] as usize,
        }
    }

    /// The nth fixed child.
    ///
    /// # Panics
    ///
    /// Panics if `nth` is not below the operator's fixed child count.
    pub fn fixed_child(&self, nth: usize) -> GroupId {
        assert!(
            nth < self.fixed_count(),
            "fixed child {} out of range for {}",
            nth,
            self.op
        );
        GroupId(self.state[nth])
    }

    /// The group of the nth logical child, spanning fixed children then list elements.
    ///
    /// # Panics
    ///
    /// Panics if `nth >= child_count()`. That can only happen if the caller and the layout
    /// table disagree about the operator's shape, which is a bug.
    pub fn child_group(&self, memo: &Memo, nth: usize) -> GroupId {
        match self.try_child_group(memo, nth) {
            Some(group) => group,
            None => panic!(
                "child index {} out of range for {} with {} children",
                nth,
                self.op,
                self.child_count()
            ),
        }
    }

    /// Like [`child_group`](Self::child_group) but returns `None` when out of range.
    pub fn try_child_group(&self, memo: &Memo, nth: usize) -> Option<GroupId> {
        let fixed = self.fixed_count();
        if nth < fixed {
            return Some(GroupId(self.state[nth]));
        }
        let list = self.list_id()?;
        memo.lookup_list(list).get(nth - fixed).copied()
    }

    /// All logical children in order.
    pub fn children(&self, memo: &Memo) -> Vec<GroupId> {
        let mut children: Vec<GroupId> = (0..self.fixed_count())
            .map(|i| GroupId(self.state[i]))
            .collect();
        if let Some(list) = self.list_id() {
            children.extend_from_slice(memo.lookup_list(list));
        }
        children
    }

    pub fn list_id(&self) -> Option<ListId> {
        match self.op.layout().list() {
            0 => None,
            list => Some(ListId {
                offset: self.state[list - 1],
                len: self.state[list],
            }),
        }
    }

    pub fn private_id(&self) -> Option<PrivateId> {
        match self.op.layout().private() {
            0 => None,
            private => Some(PrivateId(self.state[private - 1])),
        }
    }

    /// The private payload, if the operator has one.
    pub fn private<'m>(&self, memo: &'m Memo) -> Option<&'m Private> {
        self.private_id().map(|id| memo.lookup_private(id))
    }

    /// Unpack the slots back into operands.
    pub fn operands(&self) -> Operands {
        Operands {
            children: (0..self.fixed_count())
                .map(|i| GroupId(self.state[i]))
                .collect(),
            list: self.list_id(),
            private: self.private_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_unpack() {
        let operands = Operands::new()
            .child(GroupId(4))
            .child(GroupId(9))
            .list(ListId { offset: 3, len: 2 });
        let case = ExprRecord::new(Operator::Case, &operands).unwrap();
        assert_eq!(case.operator(), Operator::Case);
        assert_eq!(case.fixed_child(1), GroupId(9));
        assert_eq!(case.child_count(), 4);
        assert_eq!(case.list_id(), Some(ListId { offset: 3, len: 2 }));
        assert_eq!(case.private_id(), None);
        assert_eq!(case.operands(), operands);
    }

    #[test]
    fn test_identical_operands_identical_fingerprint() {
        let a = ExprRecord::new(
            Operator::Cast,
            &Operands::new().child(GroupId(1)).private(PrivateId(7)),
        )
        .unwrap();
        let b = ExprRecord::new(
            Operator::Cast,
            &Operands::new().child(GroupId(1)).private(PrivateId(7)),
        )
        .unwrap();
        let c = ExprRecord::new(
            Operator::Cast,
            &Operands::new().child(GroupId(1)).private(PrivateId(8)),
        )
        .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_layout_violations() {
        let err = ExprRecord::new(Operator::Eq, &Operands::new().child(GroupId(1))).unwrap_err();
        assert!(matches!(err, OptError::ArityMismatch { expected: 2, actual: 1, .. }));

        let err = ExprRecord::new(Operator::Variable, &Operands::new()).unwrap_err();
        assert!(matches!(err, OptError::MissingOperand { operand: "private", .. }));

        let err = ExprRecord::new(Operator::True, &Operands::new().list(ListId::EMPTY)).unwrap_err();
        assert!(matches!(err, OptError::UnexpectedOperand { operand: "list", .. }));
    }
}
