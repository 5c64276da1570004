//! # Rule System
//!
//! A normalization rule is a declarative triple:
//!
//! - a **pattern** over the candidate expression and its children's normalized forms,
//! - zero or more **guards**, named side-effect-free predicates over the bindings,
//! - a **replacement template** describing the expression to produce instead.
//!
//! Rules are data, not code that walks the memo: the engine ([`crate::norm`]) matches,
//! checks guards, and instantiates templates. Helper functions that guards and templates
//! call are plain `fn` pointers with a name, so a rule set can be listed, traced and
//! disabled by name.
//!
//! ## Templates
//!
//! A template node either refers to something already bound (`Bound`), constructs a new
//! expression (`Construct`), or hands control to a named transform function
//! (`Transform`). Nested `Construct` nodes are built bottom-up through
//! [`Memo::construct`], so they are normalized too. The *root* node yields a [`Shape`]:
//! either an existing group or a not-yet-interned `(operator, operands)` pair that becomes
//! the engine's next candidate.
//!
//! ## Rule Set
//!
//! `RuleSet` compiles each rule once (pattern, guards and template are cached) and indexes
//! it under every root operator its pattern can match. Within an operator's bucket rules
//! keep their declared order, which decides which rule wins when several apply.

use crate::error::Result;
use crate::expr::{GroupId, Operands};
use crate::memo::Memo;
use crate::operator::Operator;
use crate::pattern::{Bindings, Pattern};
use crate::private::Private;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleCategory {
    /// Rewrites a candidate into its canonical form during construction.
    Normalize,
}

/// Result of the root node of a replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// An existing group. Construction ends with it.
    Group(GroupId),
    /// A new candidate to run through the rules again.
    Expr(Operator, Operands),
}

/// A named predicate over a match.
#[derive(Clone, Copy)]
pub struct Guard {
    pub name: &'static str,
    pub check: fn(&Memo, &Bindings) -> Result<bool>,
}

impl Guard {
    pub const fn new(name: &'static str, check: fn(&Memo, &Bindings) -> Result<bool>) -> Self {
        Self { name, check }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guard({})", self.name)
    }
}

/// A named function that builds a replacement.
#[derive(Clone, Copy)]
pub struct Transform {
    pub name: &'static str,
    pub apply: fn(&mut Memo, &Bindings) -> Result<Shape>,
}

impl Transform {
    pub const fn new(name: &'static str, apply: fn(&mut Memo, &Bindings) -> Result<Shape>) -> Self {
        Self { name, apply }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({})", self.name)
    }
}

/// A named function that computes a private value.
#[derive(Clone, Copy)]
pub struct PrivateTransform {
    pub name: &'static str,
    pub apply: fn(&Memo, &Bindings) -> Result<Private>,
}

impl PrivateTransform {
    pub const fn new(name: &'static str, apply: fn(&Memo, &Bindings) -> Result<Private>) -> Self {
        Self { name, apply }
    }
}

impl fmt::Debug for PrivateTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateTransform({})", self.name)
    }
}

/// Where a constructed node's operator comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpSource {
    Op(Operator),
    /// The operator of the matched root.
    Matched,
    /// The matched root operator with its operands swapped (`Lt` becomes `Gt`).
    Commuted,
}

#[derive(Debug, Clone)]
pub enum ListTemplate {
    Bound(&'static str),
    Items(Vec<Template>),
}

#[derive(Debug, Clone)]
pub enum PrivateTemplate {
    Bound(&'static str),
    Value(Private),
    Transform(PrivateTransform),
}

/// Replacement template.
#[derive(Debug, Clone)]
pub enum Template {
    Bound(&'static str),
    Construct {
        op: OpSource,
        children: Vec<Template>,
        list: Option<ListTemplate>,
        private: Option<PrivateTemplate>,
    },
    Transform(Transform),
}

impl Template {
    pub fn bound(name: &'static str) -> Self {
        Template::Bound(name)
    }

    pub fn construct(op: Operator, children: Vec<Template>) -> Self {
        Self::from_source(OpSource::Op(op), children)
    }

    /// Re-emit the matched operator over new children.
    pub fn matched(children: Vec<Template>) -> Self {
        Self::from_source(OpSource::Matched, children)
    }

    /// Emit the commuted form of the matched operator over new children.
    pub fn commuted(children: Vec<Template>) -> Self {
        Self::from_source(OpSource::Commuted, children)
    }

    fn from_source(op: OpSource, children: Vec<Template>) -> Self {
        Template::Construct {
            op,
            children,
            list: None,
            private: None,
        }
    }

    pub fn transform(name: &'static str, apply: fn(&mut Memo, &Bindings) -> Result<Shape>) -> Self {
        Template::Transform(Transform::new(name, apply))
    }

    /// Set the list of a `Construct`. Other templates are returned unchanged.
    pub fn with_list(self, template: ListTemplate) -> Self {
        match self {
            Template::Construct {
                op,
                children,
                private,
                ..
            } => Template::Construct {
                op,
                children,
                list: Some(template),
                private,
            },
            other => other,
        }
    }

    /// Set the private of a `Construct`. Other templates are returned unchanged.
    pub fn with_private(self, template: PrivateTemplate) -> Self {
        match self {
            Template::Construct {
                op, children, list, ..
            } => Template::Construct {
                op,
                children,
                list,
                private: Some(template),
            },
            other => other,
        }
    }
}

/// A normalization rule.
pub trait Rule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &'static str;

    fn category(&self) -> RuleCategory {
        RuleCategory::Normalize
    }

    /// Pattern the candidate must match.
    fn pattern(&self) -> Pattern;

    /// Checks evaluated in order after the pattern matches. All must pass.
    fn guards(&self) -> Vec<Guard> {
        Vec::new()
    }

    /// The replacement.
    fn replace(&self) -> Template;
}

/// A rule with its pattern, guards and template evaluated once.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: &'static str,
    pub category: RuleCategory,
    pub pattern: Pattern,
    pub guards: Vec<Guard>,
    pub template: Template,
}

impl CompiledRule {
    pub fn compile(rule: &dyn Rule) -> Self {
        Self {
            name: rule.name(),
            category: rule.category(),
            pattern: rule.pattern(),
            guards: rule.guards(),
            template: rule.replace(),
        }
    }
}

/// Ordered collection of compiled rules, indexed by root operator.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    /// For each operator (by discriminant), indices into `rules` in declared order.
    by_op: Vec<Vec<usize>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            by_op: vec![Vec::new(); Operator::ALL.len()],
        }
    }

    /// Append a rule. It ranks after every rule already added.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        let compiled = CompiledRule::compile(rule.as_ref());
        let index = self.rules.len();
        let ops = compiled
            .pattern
            .root_operators()
            .unwrap_or_else(|| Operator::ALL.to_vec());
        for op in ops {
            self.by_op[op as usize].push(index);
        }
        self.rules.push(compiled);
    }

    /// Rules whose pattern may match a root of `op`, in declared order.
    pub fn candidates(&self, op: Operator) -> impl Iterator<Item = &CompiledRule> + '_ {
        self.by_op[op as usize].iter().map(move |i| &self.rules[*i])
    }

    pub fn get(&self, name: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Rule names in declared order.
    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}
