//! # Declarative Pattern Matching for Normalization Rules
//!
//! Each rule declares a `Pattern` describing the shape of the candidate expression it
//! rewrites. The engine checks the pattern before evaluating guards or building a
//! replacement, so a rule's code only ever sees shapes it was written for.
//!
//! ## Pattern Language
//!
//! - `Pattern::Match { ops, children, list, private }`: the operator satisfies `ops`, the
//!   fixed children match `children` positionally (missing trailing patterns are
//!   wildcards), the list matches `list`, and the private is captured under a name.
//! - `Pattern::Any`: matches anything.
//! - `Pattern::Bind(name, p)`: matches `p` and records the matched group under `name`.
//! - `Pattern::Not(p)`: matches when `p` does not. Bindings made inside are discarded.
//! - `Pattern::Is(predicate)`: a named test over a child group's logical properties.
//! - `Pattern::All(ps)`: every pattern must match the same target.
//!
//! Lists have their own sublanguage (`ListPattern`): exact length, prefix (`[p ...]`),
//! containment (`[... p ...]`), repetition, and binding of the whole list.
//!
//! ## What is matched
//!
//! The root is the candidate `(operator, operands)` pair, which is not interned yet. Every
//! child is matched against the **normalized** member of its group. Other members of the
//! group are never consulted, which keeps matching deterministic.
//!
//! ## Bindings
//!
//! Bindings accumulate on a stack. Whenever a sub-match fails the stack is truncated back
//! to where it was, so a failed alternative leaves nothing behind.

use crate::error::{OptError, Result};
use crate::expr::{GroupId, ListId, Operands, PrivateId};
use crate::memo::Memo;
use crate::operator::{OpClass, Operator};
use crate::private::Private;
use std::fmt;

/// A named test over a memoized group.
#[derive(Clone, Copy)]
pub struct Predicate {
    pub name: &'static str,
    pub test: fn(&Memo, GroupId) -> bool,
}

impl Predicate {
    pub const fn new(name: &'static str, test: fn(&Memo, GroupId) -> bool) -> Self {
        Self { name, test }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

/// Matcher for the operator of an expression.
#[derive(Debug, Clone)]
pub enum OpMatcher {
    Op(Operator),
    OneOf(&'static [Operator]),
    Class(OpClass),
}

impl OpMatcher {
    pub fn matches(&self, op: Operator) -> bool {
        match self {
            OpMatcher::Op(o) => *o == op,
            OpMatcher::OneOf(ops) => ops.contains(&op),
            OpMatcher::Class(class) => op.class() == *class,
        }
    }

    /// The operators this matcher accepts.
    pub fn operators(&self) -> Vec<Operator> {
        Operator::ALL
            .iter()
            .copied()
            .filter(|op| self.matches(*op))
            .collect()
    }
}

/// Pattern over an expression or group.
#[derive(Debug, Clone)]
pub enum Pattern {
    Any,
    Match {
        ops: OpMatcher,
        children: Vec<Pattern>,
        list: ListPattern,
        /// Name to bind the private under. The expression must have a private.
        private: Option<&'static str>,
    },
    Bind(&'static str, Box<Pattern>),
    Not(Box<Pattern>),
    Is(Predicate),
    All(Vec<Pattern>),
}

/// Pattern over the list operand of an expression.
#[derive(Debug, Clone)]
pub enum ListPattern {
    Any,
    /// Exactly these items.
    Exact(Vec<Pattern>),
    /// At least these leading items.
    Prefix(Vec<Pattern>),
    /// Some item matches.
    Contains(Box<Pattern>),
    /// Every item matches.
    Each(Box<Pattern>),
    Bind(&'static str, Box<ListPattern>),
}

impl Pattern {
    /// Match operator `op` with wildcard operands.
    pub fn op(op: Operator) -> Self {
        Self::matcher(OpMatcher::Op(op))
    }

    pub fn one_of(ops: &'static [Operator]) -> Self {
        Self::matcher(OpMatcher::OneOf(ops))
    }

    pub fn class(class: OpClass) -> Self {
        Self::matcher(OpMatcher::Class(class))
    }

    fn matcher(ops: OpMatcher) -> Self {
        Pattern::Match {
            ops,
            children: Vec::new(),
            list: ListPattern::Any,
            private: None,
        }
    }

    /// Set the fixed child patterns of a `Match`. Other patterns are returned unchanged.
    pub fn children(self, patterns: Vec<Pattern>) -> Self {
        match self {
            Pattern::Match {
                ops, list, private, ..
            } => Pattern::Match {
                ops,
                children: patterns,
                list,
                private,
            },
            other => other,
        }
    }

    /// Set the list pattern of a `Match`. Other patterns are returned unchanged.
    pub fn list(self, pattern: ListPattern) -> Self {
        match self {
            Pattern::Match {
                ops,
                children,
                private,
                ..
            } => Pattern::Match {
                ops,
                children,
                list: pattern,
                private,
            },
            other => other,
        }
    }

    /// Bind the private of a `Match` under `name`. Other patterns are returned unchanged.
    pub fn with_private(self, name: &'static str) -> Self {
        match self {
            Pattern::Match {
                ops,
                children,
                list,
                ..
            } => Pattern::Match {
                ops,
                children,
                list,
                private: Some(name),
            },
            other => other,
        }
    }

    pub fn bind(name: &'static str, pattern: Pattern) -> Self {
        Pattern::Bind(name, Box::new(pattern))
    }

    /// Bind any group under `name`.
    pub fn var(name: &'static str) -> Self {
        Pattern::bind(name, Pattern::Any)
    }

    pub fn not(pattern: Pattern) -> Self {
        Pattern::Not(Box::new(pattern))
    }

    pub fn is(predicate: Predicate) -> Self {
        Pattern::Is(predicate)
    }

    pub fn all(patterns: Vec<Pattern>) -> Self {
        Pattern::All(patterns)
    }

    /// The root operators this pattern can match, or `None` if it matches any operator.
    pub fn root_operators(&self) -> Option<Vec<Operator>> {
        match self {
            Pattern::Match { ops, .. } => Some(ops.operators()),
            Pattern::Bind(_, inner) => inner.root_operators(),
            Pattern::All(patterns) => {
                let mut result: Option<Vec<Operator>> = None;
                for pattern in patterns {
                    if let Some(ops) = pattern.root_operators() {
                        result = Some(match result {
                            None => ops,
                            Some(prev) => prev.into_iter().filter(|o| ops.contains(o)).collect(),
                        });
                    }
                }
                result
            }
            Pattern::Any | Pattern::Not(_) | Pattern::Is(_) => None,
        }
    }
}

impl ListPattern {
    pub fn exact(items: Vec<Pattern>) -> Self {
        ListPattern::Exact(items)
    }

    pub fn prefix(items: Vec<Pattern>) -> Self {
        ListPattern::Prefix(items)
    }

    pub fn contains(item: Pattern) -> Self {
        ListPattern::Contains(Box::new(item))
    }

    pub fn each(item: Pattern) -> Self {
        ListPattern::Each(Box::new(item))
    }

    pub fn bind(name: &'static str, pattern: ListPattern) -> Self {
        ListPattern::Bind(name, Box::new(pattern))
    }
}

/// A value captured by a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Group(GroupId),
    List(ListId),
    Private(PrivateId),
}

/// Everything a rule's guards and template can see about one successful match.
#[derive(Debug, Clone)]
pub struct Bindings {
    rule: &'static str,
    root_op: Operator,
    root: Operands,
    entries: Vec<(&'static str, Binding)>,
}

impl Bindings {
    pub fn new(rule: &'static str, root_op: Operator, root: Operands) -> Self {
        Self {
            rule,
            root_op,
            root,
            entries: Vec::new(),
        }
    }

    pub fn rule(&self) -> &'static str {
        self.rule
    }

    /// Operator of the matched candidate.
    pub fn root_op(&self) -> Operator {
        self.root_op
    }

    /// Operands of the matched candidate.
    pub fn root(&self) -> &Operands {
        &self.root
    }

    pub fn push(&mut self, name: &'static str, binding: Binding) {
        self.entries.push((name, binding));
    }

    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    pub fn reset(&mut self, mark: usize) {
        self.entries.truncate(mark);
    }

    /// The most recent binding under `name`.
    pub fn get(&self, name: &str) -> Option<Binding> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, b)| *b)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn group(&self, name: &str) -> Result<GroupId> {
        match self.get(name) {
            Some(Binding::Group(g)) => Ok(g),
            _ => Err(self.unbound(name)),
        }
    }

    pub fn list(&self, name: &str) -> Result<ListId> {
        match self.get(name) {
            Some(Binding::List(l)) => Ok(l),
            _ => Err(self.unbound(name)),
        }
    }

    pub fn private_id(&self, name: &str) -> Result<PrivateId> {
        match self.get(name) {
            Some(Binding::Private(p)) => Ok(p),
            _ => Err(self.unbound(name)),
        }
    }

    /// The private value bound under `name`.
    pub fn private<'m>(&self, memo: &'m Memo, name: &str) -> Result<&'m Private> {
        Ok(memo.lookup_private(self.private_id(name)?))
    }

    fn unbound(&self, name: &str) -> OptError {
        OptError::UnboundName {
            rule: self.rule.to_string(),
            name: name.to_string(),
        }
    }
}

/// What a pattern is being matched against.
#[derive(Clone, Copy)]
enum Target<'a> {
    /// The candidate root, not yet interned.
    Root(Operator, &'a Operands),
    Group(GroupId),
}

/// Match the candidate `(op, operands)` against `pattern`, recording captures in
/// `bindings`. On failure `bindings` is left as it was.
pub fn match_root(
    memo: &Memo,
    op: Operator,
    operands: &Operands,
    pattern: &Pattern,
    bindings: &mut Bindings,
) -> bool {
    matches(memo, Target::Root(op, operands), pattern, bindings)
}

/// Match the normalized member of `group` against `pattern`.
pub fn match_group(memo: &Memo, group: GroupId, pattern: &Pattern, bindings: &mut Bindings) -> bool {
    matches(memo, Target::Group(group), pattern, bindings)
}

fn matches(memo: &Memo, target: Target<'_>, pattern: &Pattern, b: &mut Bindings) -> bool {
    let mark = b.mark();
    let matched = match pattern {
        Pattern::Any => true,
        Pattern::Bind(name, inner) => {
            let ok = matches(memo, target, inner, b);
            // The root has no group yet; its shape is reachable through `Bindings::root`.
            if let (true, Target::Group(g)) = (ok, target) {
                b.push(name, Binding::Group(g));
            }
            ok
        }
        Pattern::Not(inner) => {
            let ok = matches(memo, target, inner, b);
            b.reset(mark);
            !ok
        }
        Pattern::Is(predicate) => match target {
            Target::Group(g) => (predicate.test)(memo, g),
            Target::Root(..) => false,
        },
        Pattern::All(patterns) => patterns.iter().all(|p| matches(memo, target, p, b)),
        Pattern::Match {
            ops,
            children,
            list,
            private,
        } => {
            let (op, operands) = match target {
                Target::Root(op, operands) => (op, operands.clone()),
                Target::Group(g) => {
                    let rec = memo.normalized_expr(g);
                    (rec.operator(), rec.operands())
                }
            };
            ops.matches(op)
                && match_operands(memo, &operands, children, list, *private, b)
        }
    };
    if !matched {
        b.reset(mark);
    }
    matched
}

fn match_operands(
    memo: &Memo,
    operands: &Operands,
    children: &[Pattern],
    list: &ListPattern,
    private: Option<&'static str>,
    b: &mut Bindings,
) -> bool {
    if children.len() > operands.children.len() {
        return false;
    }
    for (child, pattern) in operands.children.iter().zip(children) {
        if !matches(memo, Target::Group(*child), pattern, b) {
            return false;
        }
    }

    match operands.list {
        Some(id) => {
            if !match_list(memo, id, list, b) {
                return false;
            }
        }
        None => {
            if !matches!(list, ListPattern::Any) {
                return false;
            }
        }
    }

    match (private, operands.private) {
        (None, _) => true,
        (Some(name), Some(id)) => {
            b.push(name, Binding::Private(id));
            true
        }
        (Some(_), None) => false,
    }
}

fn match_list(memo: &Memo, id: ListId, pattern: &ListPattern, b: &mut Bindings) -> bool {
    let items = memo.lookup_list(id);
    let mark = b.mark();
    let matched = match pattern {
        ListPattern::Any => true,
        ListPattern::Exact(patterns) => {
            items.len() == patterns.len()
                && items
                    .iter()
                    .zip(patterns)
                    .all(|(g, p)| matches(memo, Target::Group(*g), p, b))
        }
        ListPattern::Prefix(patterns) => {
            items.len() >= patterns.len()
                && items
                    .iter()
                    .zip(patterns)
                    .all(|(g, p)| matches(memo, Target::Group(*g), p, b))
        }
        ListPattern::Contains(p) => items
            .iter()
            .any(|g| matches(memo, Target::Group(*g), p, b)),
        ListPattern::Each(p) => items
            .iter()
            .all(|g| matches(memo, Target::Group(*g), p, b)),
        ListPattern::Bind(name, inner) => {
            let ok = match_list(memo, id, inner, b);
            if ok {
                b.push(name, Binding::List(id));
            }
            ok
        }
    };
    if !matched {
        b.reset(mark);
    }
    matched
}
