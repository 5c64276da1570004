//! # Bound Trees
//!
//! `Tree` is the hand-off format between a binder and the memo: a plain, owned,
//! serde-serializable expression tree. Operators are named by string so the format can
//! travel over JSON; names the memo does not know are reported as unimplemented rather
//! than as internal errors.

use crate::error::{OptError, Result};
use crate::expr::{GroupId, Operands};
use crate::memo::Memo;
use crate::operator::Operator;
use crate::private::Private;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub op: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tree>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<Tree>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<Private>,
}

impl Tree {
    pub fn new(op: Operator) -> Self {
        Self {
            op: op.name().to_string(),
            children: Vec::new(),
            list: None,
            private: None,
        }
    }

    pub fn child(mut self, child: Tree) -> Self {
        self.children.push(child);
        self
    }

    pub fn list(mut self, items: Vec<Tree>) -> Self {
        self.list = Some(items);
        self
    }

    pub fn private(mut self, private: Private) -> Self {
        self.private = Some(private);
        self
    }
}

impl Memo {
    /// Memoize a bound tree bottom-up and return the group of its root.
    ///
    /// Children are built first, then list items, then the private is interned, then the
    /// node itself goes through [`Memo::construct`].
    pub fn build(&mut self, tree: &Tree) -> Result<GroupId> {
        let op = Operator::from_name(&tree.op)
            .ok_or_else(|| OptError::unimplemented(format!("operator {}", tree.op)))?;

        let mut operands = Operands::new();
        for child in &tree.children {
            let group = self.build(child)?;
            operands.children.push(group);
        }
        if let Some(items) = &tree.list {
            let mut groups = Vec::with_capacity(items.len());
            for item in items {
                groups.push(self.build(item)?);
            }
            operands.list = Some(self.intern_list(&groups));
        }
        if let Some(private) = &tree.private {
            operands.private = Some(self.intern_private(private.clone()));
        }

        self.construct(op, operands)
    }

    /// The normalized tree rooted at `group`.
    pub fn extract(&self, group: GroupId) -> Result<Tree> {
        let rec = *self.try_group(group)?.normalized();
        let operands = rec.operands();

        let mut tree = Tree::new(rec.operator());
        for child in &operands.children {
            tree.children.push(self.extract(*child)?);
        }
        if let Some(list) = operands.list {
            let items = self
                .lookup_list(list)
                .iter()
                .map(|item| self.extract(*item))
                .collect::<Result<Vec<_>>>()?;
            tree.list = Some(items);
        }
        tree.private = rec.private(self).cloned();
        Ok(tree)
    }
}
