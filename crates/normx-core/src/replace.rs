//! # Generic Replace Traversal
//!
//! A single operator-agnostic routine that rebuilds an expression with some of its
//! children substituted. Because it works purely from the layout table it needs no
//! per-operator code, and every rewriting pass outside the rule engine can be built on it.
//!
//! The callback sees each fixed child and then each list element, in order. The private
//! is carried over untouched. If no list element changes, the original list reference is
//! reused, so an identity callback reproduces the record bit for bit.

use crate::error::Result;
use crate::expr::{ExprRecord, GroupId, Operands};
use crate::memo::Memo;
use tracing::trace;

impl ExprRecord {
    /// Operands of this record with every child mapped through `f`.
    pub fn replace_operands<F>(&self, memo: &mut Memo, mut f: F) -> Result<Operands>
    where
        F: FnMut(&mut Memo, GroupId) -> Result<GroupId>,
    {
        let mut operands = self.operands();
        for child in operands.children.iter_mut() {
            *child = f(memo, *child)?;
        }

        if let Some(list) = operands.list {
            let items = memo.lookup_list(list).to_vec();
            let mut replaced = Vec::with_capacity(items.len());
            for item in &items {
                replaced.push(f(memo, *item)?);
            }
            if replaced != items {
                operands.list = Some(memo.intern_list(&replaced));
            }
        }

        Ok(operands)
    }

    /// A record of the same operator and private with every child mapped through `f`.
    ///
    /// The result is not interned.
    pub fn replace<F>(&self, memo: &mut Memo, f: F) -> Result<ExprRecord>
    where
        F: FnMut(&mut Memo, GroupId) -> Result<GroupId>,
    {
        let operands = self.replace_operands(memo, f)?;
        ExprRecord::new(self.operator(), &operands)
    }
}

impl Memo {
    /// Rebuild the normalized member of `group` with its children mapped through `f`.
    ///
    /// The rebuilt shape goes through [`Memo::construct`], so rules get a chance to fire
    /// on it. If nothing changed the original group is returned.
    pub fn replace_children<F>(&mut self, group: GroupId, f: F) -> Result<GroupId>
    where
        F: FnMut(&mut Memo, GroupId) -> Result<GroupId>,
    {
        let rec = *self.try_group(group)?.normalized();
        let operands = rec.replace_operands(self, f)?;
        if operands == rec.operands() {
            return Ok(group);
        }
        self.construct(rec.operator(), operands)
    }

    /// Replace every occurrence of group `from` under `root` by group `to` and return
    /// the re-normalized root.
    pub fn substitute(&mut self, root: GroupId, from: GroupId, to: GroupId) -> Result<GroupId> {
        if root == from {
            return Ok(to);
        }
        trace!("substitute {} -> {} under {}", from, to, root);
        self.replace_children(root, |memo, child| memo.substitute(child, from, to))
    }
}
