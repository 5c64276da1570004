//! # Normalizing Construction
//!
//! `Memo::construct` is the only entry point that creates normalized expressions. Every
//! node of a bound tree, and every nested node a rule template builds, goes through it.
//!
//! ## How It Works
//!
//! Given a candidate `(operator, operands)` whose operands are already memoized:
//!
//! 1. Evaluate the rules indexed under the candidate's operator, in declared order.
//! 2. The first rule whose pattern matches and whose guards all pass *fires*. Its template
//!    is instantiated: nested nodes are built through `construct` (so they are normalized
//!    first), and the root node yields a [`Shape`].
//! 3. A `Shape::Group` is the answer. A `Shape::Expr` becomes the next candidate and the
//!    loop continues at step 1.
//! 4. When no rule fires the candidate is a fixpoint. It is interned with
//!    [`Memo::memoize`], which either finds an identical record or opens a new group.
//!
//! ## Termination
//!
//! Rules are written to shrink the expression, reach a canonical order, or set a marker
//! that blocks their own re-trigger, so chains are short. Two safety limits turn a rule
//! bug into an error instead of a hang: `max_rewrites` bounds one chain and `max_depth`
//! bounds nested `construct` re-entry.

use crate::error::{OptError, Result};
use crate::expr::{GroupId, Operands};
use crate::memo::Memo;
use crate::operator::Operator;
use crate::pattern::{match_root, Bindings};
use crate::private::Private;
use crate::rule::{
    CompiledRule, ListTemplate, OpSource, PrivateTemplate, RuleSet, Shape, Template,
};
use crate::types::{Datum, Type};
use std::sync::Arc;
use tracing::{debug, trace};

impl Memo {
    /// Build the normalized form of `op` over `operands` and return its group.
    ///
    /// Constructing the same logical input twice returns the same group without creating
    /// anything new.
    pub fn construct(&mut self, op: Operator, operands: Operands) -> Result<GroupId> {
        self.stats.constructs += 1;
        self.validate(op, &operands)?;
        if self.depth >= self.config.max_depth {
            debug!("construct of {} exceeded depth {}", op, self.config.max_depth);
            return Err(OptError::DepthLimit(self.config.max_depth));
        }

        let (op, operands) = self.canonical_leaf(op, operands);
        self.depth += 1;
        let result = self.normalize(op, operands);
        self.depth -= 1;
        result
    }

    /// `Const` never holds a boolean or a bare NULL: those values have their own leaf
    /// operators, and every spelling of a value must land in one group.
    fn canonical_leaf(&mut self, op: Operator, operands: Operands) -> (Operator, Operands) {
        if op != Operator::Const {
            return (op, operands);
        }
        let leaf = match operands.private.and_then(|id| self.lookup_private(id).as_datum()) {
            Some(Datum::Bool(true)) => Operator::True,
            Some(Datum::Bool(false)) => Operator::False,
            Some(Datum::Null) => Operator::Null,
            _ => return (op, operands),
        };
        if leaf == Operator::Null {
            let private = self.intern_private(Private::Type(Type::Unknown));
            return (leaf, Operands::new().private(private));
        }
        (leaf, Operands::new())
    }

    /// Build a shape returned by a transform: groups pass through, expressions are
    /// constructed.
    pub fn construct_shape(&mut self, shape: Shape) -> Result<GroupId> {
        match shape {
            Shape::Group(group) => Ok(group),
            Shape::Expr(op, operands) => self.construct(op, operands),
        }
    }

    fn normalize(&mut self, mut op: Operator, mut operands: Operands) -> Result<GroupId> {
        let rules = Arc::clone(&self.rules);
        let mut chain = 0;

        loop {
            let Some((rule, bindings)) = self.find_rule(&rules, op, &operands)? else {
                self.stats.longest_chain = self.stats.longest_chain.max(chain);
                return self.memoize(op, &operands);
            };

            chain += 1;
            if chain > self.config.max_rewrites {
                debug!("rewrite limit hit on {} by rule {}", op, rule.name);
                return Err(OptError::RewriteLimit {
                    op,
                    rule: rule.name.to_string(),
                    limit: self.config.max_rewrites,
                });
            }

            self.stats.rewrites += 1;
            *self.stats.rules_fired.entry(rule.name.to_string()).or_insert(0) += 1;
            trace!("rule {} fired on {}", rule.name, op);

            match self.instantiate(&rule.template, &bindings)? {
                Shape::Group(group) => {
                    self.stats.longest_chain = self.stats.longest_chain.max(chain);
                    trace!("rule {} produced existing group {}", rule.name, group);
                    return Ok(group);
                }
                Shape::Expr(next_op, next_operands) => {
                    self.validate(next_op, &next_operands)?;
                    trace!("rule {} rewrote {} to {}", rule.name, op, next_op);
                    op = next_op;
                    operands = next_operands;
                }
            }
        }
    }

    /// The first enabled rule that matches the candidate and passes its guards.
    fn find_rule<'r>(
        &self,
        rules: &'r RuleSet,
        op: Operator,
        operands: &Operands,
    ) -> Result<Option<(&'r CompiledRule, Bindings)>> {
        'rules: for rule in rules.candidates(op) {
            if self.config.disabled_rules.contains(rule.name) {
                continue;
            }
            let mut bindings = Bindings::new(rule.name, op, operands.clone());
            if !match_root(self, op, operands, &rule.pattern, &mut bindings) {
                continue;
            }
            for guard in &rule.guards {
                if !(guard.check)(self, &bindings)? {
                    trace!("rule {} rejected by guard {}", rule.name, guard.name);
                    continue 'rules;
                }
            }
            return Ok(Some((rule, bindings)));
        }
        Ok(None)
    }

    fn instantiate(&mut self, template: &Template, bindings: &Bindings) -> Result<Shape> {
        match template {
            Template::Bound(name) => Ok(Shape::Group(bindings.group(name)?)),
            Template::Transform(transform) => (transform.apply)(self, bindings),
            Template::Construct {
                op,
                children,
                list,
                private,
            } => {
                let op = match op {
                    OpSource::Op(op) => *op,
                    OpSource::Matched => bindings.root_op(),
                    OpSource::Commuted => bindings.root_op().commuted().ok_or_else(|| {
                        OptError::internal(format!(
                            "rule {} commutes {}, which has no commuted form",
                            bindings.rule(),
                            bindings.root_op()
                        ))
                    })?,
                };

                let mut operands = Operands::new();
                for child in children {
                    let group = self.instantiate_group(child, bindings)?;
                    operands.children.push(group);
                }

                if let Some(list) = list {
                    let id = match list {
                        ListTemplate::Bound(name) => bindings.list(name)?,
                        ListTemplate::Items(items) => {
                            let mut groups = Vec::with_capacity(items.len());
                            for item in items {
                                groups.push(self.instantiate_group(item, bindings)?);
                            }
                            self.intern_list(&groups)
                        }
                    };
                    operands.list = Some(id);
                }

                if let Some(private) = private {
                    let id = match private {
                        PrivateTemplate::Bound(name) => bindings.private_id(name)?,
                        PrivateTemplate::Value(value) => self.intern_private(value.clone()),
                        PrivateTemplate::Transform(transform) => {
                            let value = (transform.apply)(self, bindings)?;
                            self.intern_private(value)
                        }
                    };
                    operands.private = Some(id);
                }

                Ok(Shape::Expr(op, operands))
            }
        }
    }

    fn instantiate_group(&mut self, template: &Template, bindings: &Bindings) -> Result<GroupId> {
        let shape = self.instantiate(template, bindings)?;
        self.construct_shape(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memo::NormalizeConfig;
    use crate::operator::OpClass;
    use crate::pattern::Pattern;
    use crate::rule::Rule;

    /// `Not(Not(x))` to `x`.
    struct EliminateNot;

    impl Rule for EliminateNot {
        fn name(&self) -> &'static str {
            "EliminateNot"
        }

        fn pattern(&self) -> Pattern {
            Pattern::op(Operator::Not).children(vec![
                Pattern::op(Operator::Not).children(vec![Pattern::var("x")])
            ])
        }

        fn replace(&self) -> Template {
            Template::bound("x")
        }
    }

    /// Swaps the operands of every `Plus`: re-triggers itself forever.
    struct SwapPlus;

    impl Rule for SwapPlus {
        fn name(&self) -> &'static str {
            "SwapPlus"
        }

        fn pattern(&self) -> Pattern {
            Pattern::op(Operator::Plus).children(vec![Pattern::var("a"), Pattern::var("b")])
        }

        fn replace(&self) -> Template {
            Template::matched(vec![Template::bound("b"), Template::bound("a")])
        }
    }

    /// `x IN y` to `x IN (y)` for a scalar `y` that is not already a tuple.
    struct WrapInTuple;

    impl Rule for WrapInTuple {
        fn name(&self) -> &'static str {
            "WrapInTuple"
        }

        fn pattern(&self) -> Pattern {
            Pattern::op(Operator::In).children(vec![
                Pattern::var("left"),
                Pattern::bind(
                    "right",
                    Pattern::all(vec![
                        Pattern::class(OpClass::Scalar),
                        Pattern::not(Pattern::op(Operator::Tuple)),
                    ]),
                ),
            ])
        }

        fn replace(&self) -> Template {
            let tuple = Template::construct(Operator::Tuple, vec![])
                .with_list(ListTemplate::Items(vec![Template::bound("right")]));
            Template::matched(vec![Template::bound("left"), tuple])
        }
    }

    fn rules(list: Vec<Box<dyn Rule>>) -> Arc<RuleSet> {
        let mut set = RuleSet::new();
        for rule in list {
            set.add_rule(rule);
        }
        Arc::new(set)
    }

    #[test]
    fn test_rule_fires_during_construction() {
        let mut memo = Memo::with_rules(rules(vec![Box::new(EliminateNot)]));
        let b = memo.metadata_mut().add_column("b", Type::Bool);
        let var = memo.variable(b).unwrap();
        let not = memo.unary(Operator::Not, var).unwrap();
        let not_not = memo.unary(Operator::Not, not).unwrap();

        assert_eq!(not_not, var);
        assert_eq!(memo.stats().rules_fired.get("EliminateNot"), Some(&1));
        assert_eq!(memo.num_groups(), 2);
    }

    #[test]
    fn test_list_built_from_item_templates() {
        let mut memo = Memo::with_rules(rules(vec![Box::new(WrapInTuple)]));
        let x = memo.metadata_mut().add_column("x", Type::Int);
        let var = memo.variable(x).unwrap();
        let one = memo.constant(Datum::Int(1)).unwrap();

        let wrapped = memo.binary(Operator::In, var, one).unwrap();
        let tuple = memo.list_op(Operator::Tuple, &[one]).unwrap();
        assert_eq!(memo.binary(Operator::In, var, tuple).unwrap(), wrapped);
        assert_eq!(memo.normalized_expr(wrapped).fixed_child(1), tuple);
        assert_eq!(memo.stats().rules_fired.get("WrapInTuple"), Some(&1));
    }

    #[test]
    fn test_disabled_rule_does_not_fire() {
        let mut config = NormalizeConfig::default();
        config.disabled_rules.insert("EliminateNot".to_string());
        let mut memo = Memo::with_config(rules(vec![Box::new(EliminateNot)]), config);
        let b = memo.metadata_mut().add_column("b", Type::Bool);
        let var = memo.variable(b).unwrap();
        let not = memo.unary(Operator::Not, var).unwrap();
        let not_not = memo.unary(Operator::Not, not).unwrap();

        assert_ne!(not_not, var);
        assert_eq!(memo.stats().rewrites, 0);
    }

    #[test]
    fn test_rewrite_limit_is_an_error() {
        let config = NormalizeConfig {
            max_rewrites: 10,
            ..NormalizeConfig::default()
        };
        let mut memo = Memo::with_config(rules(vec![Box::new(SwapPlus)]), config);
        let one = memo.constant(Datum::Int(1)).unwrap();
        let two = memo.constant(Datum::Int(2)).unwrap();
        let err = memo.binary(Operator::Plus, one, two).unwrap_err();
        assert!(matches!(err, OptError::RewriteLimit { limit: 10, .. }));
        assert!(err.is_internal());
    }

    #[test]
    fn test_const_leaves_have_one_representation() {
        let mut memo = Memo::new();
        let const_of = |memo: &mut Memo, datum: Datum| {
            let private = memo.intern_private(Private::Datum(datum));
            memo.construct(Operator::Const, Operands::new().private(private))
                .unwrap()
        };

        let t = const_of(&mut memo, Datum::Bool(true));
        assert_eq!(t, memo.bool_const(true).unwrap());
        let f = const_of(&mut memo, Datum::Bool(false));
        assert_eq!(f, memo.bool_const(false).unwrap());
        let null = const_of(&mut memo, Datum::Null);
        assert_eq!(null, memo.null(Type::Unknown).unwrap());
        assert_eq!(memo.normalized_expr(null).operator(), Operator::Null);

        let shuffled = const_of(&mut memo, Datum::Json(r#"{"b": 1, "a": 2}"#.into()));
        let sorted = memo
            .constant(Datum::json(serde_json::json!({"a": 2, "b": 1})))
            .unwrap();
        assert_eq!(shuffled, sorted);
    }

    #[test]
    fn test_depth_limit_is_an_error() {
        let config = NormalizeConfig {
            max_depth: 0,
            ..NormalizeConfig::default()
        };
        let mut memo = Memo::with_config(Arc::new(RuleSet::new()), config);
        let err = memo.bool_const(true).unwrap_err();
        assert_eq!(err, OptError::DepthLimit(0));
    }
}
