//! # The Memo
//!
//! The memo stores a forest of query expressions in deduplicated form. It is created once
//! per query compilation and populated bottom-up as the bound tree is handed over one node
//! at a time.
//!
//! ## Groups
//!
//! A group is an ordered, non-empty set of logically equivalent expression records. The
//! record at ordinal 0 is the *normalized* member: no normalization rule applies to it, and
//! it never changes once the group exists. Later members, added through
//! [`Memo::add_alternate`], are equivalent forms discovered by other means.
//!
//! ## Content addressing
//!
//! Every interned record is registered in a fingerprint index (record -> group). Because
//! records are pointer-free and children are group ids, two structurally identical
//! subtrees produce identical records and collapse into one group. Lists of children and
//! private payloads are interned in the same way (see [`crate::intern`]), so equal content
//! always maps to an equal reference.
//!
//! ## Ownership
//!
//! Everything is append-only: groups, group members, interned lists and privates are never
//! removed or mutated in place. A memo is used by one thread of control. Independent
//! compilations each own their own memo.

use crate::error::{OptError, Result};
use crate::expr::{ExprId, ExprOrdinal, ExprRecord, GroupId, ListId, Operands, PrivateId};
use crate::intern::{ListStore, PrivateStore};
use crate::metadata::{ColumnId, Metadata};
use crate::operator::Operator;
use crate::private::Private;
use crate::props::{self, LogicalProps, RelationalProps, ScalarProps};
use crate::rule::RuleSet;
use crate::types::{Datum, Type};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Limits and switches for normalization.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Upper bound on the number of rewrites applied by a single `construct` call before
    /// it reaches a fixpoint. Hitting it means some rule re-triggers itself.
    pub max_rewrites: usize,
    /// Upper bound on nested `construct` calls made while building rule templates.
    pub max_depth: usize,
    /// Rules skipped by name.
    pub disabled_rules: HashSet<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_rewrites: 1_000,
            max_depth: 512,
            disabled_rules: HashSet::new(),
        }
    }
}

/// Counters collected while constructing expressions.
#[derive(Debug, Clone, Default)]
pub struct NormStats {
    /// Calls to `construct`, including nested ones made by rule templates.
    pub constructs: usize,
    /// Total number of rule firings.
    pub rewrites: usize,
    /// Longest rewrite chain seen in a single `construct` call.
    pub longest_chain: usize,
    /// Times an interned record was found in the fingerprint index.
    pub fingerprint_hits: usize,
    pub groups_created: usize,
    /// Firings per rule name.
    pub rules_fired: BTreeMap<String, usize>,
}

/// A set of logically equivalent expressions.
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    exprs: Vec<ExprRecord>,
    props: LogicalProps,
}

impl Group {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// The normalized member (ordinal 0).
    pub fn normalized(&self) -> &ExprRecord {
        &self.exprs[0]
    }

    pub fn exprs(&self) -> &[ExprRecord] {
        &self.exprs
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Always false: a group is created with its normalized member.
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn props(&self) -> &LogicalProps {
        &self.props
    }
}

/// The memo table.
pub struct Memo {
    metadata: Metadata,
    groups: Vec<Group>,
    /// Fingerprint index: every interned record and the group that owns it.
    expr_map: HashMap<ExprRecord, GroupId>,
    lists: ListStore,
    privates: PrivateStore,
    pub(crate) rules: Arc<RuleSet>,
    pub(crate) config: NormalizeConfig,
    pub(crate) stats: NormStats,
    /// Current nesting of `construct` calls.
    pub(crate) depth: usize,
}

impl Memo {
    /// A memo with no normalization rules: `construct` interns every shape as given.
    pub fn new() -> Self {
        Self::with_rules(Arc::new(RuleSet::new()))
    }

    pub fn with_rules(rules: Arc<RuleSet>) -> Self {
        Self::with_config(rules, NormalizeConfig::default())
    }

    pub fn with_config(rules: Arc<RuleSet>, config: NormalizeConfig) -> Self {
        Self {
            metadata: Metadata::new(),
            groups: Vec::new(),
            expr_map: HashMap::new(),
            lists: ListStore::new(),
            privates: PrivateStore::new(),
            rules,
            config,
            stats: NormStats::default(),
            depth: 0,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    pub fn stats(&self) -> &NormStats {
        &self.stats
    }

    // ----- Interning -----

    /// Intern a sequence of groups. Identical sequences share one stored copy.
    pub fn intern_list(&mut self, items: &[GroupId]) -> ListId {
        self.lists.intern(items)
    }

    /// Intern a private value. Equal values share one id; datums are stored in their
    /// canonical form.
    pub fn intern_private(&mut self, value: Private) -> PrivateId {
        let value = match value {
            Private::Datum(datum) => Private::Datum(datum.canonical()),
            other => other,
        };
        self.privates.intern(value)
    }

    pub fn lookup_list(&self, id: ListId) -> &[GroupId] {
        self.lists.lookup(id)
    }

    pub fn lookup_private(&self, id: PrivateId) -> &Private {
        self.privates.lookup(id)
    }

    pub fn num_lists(&self) -> usize {
        self.lists.len()
    }

    pub fn num_privates(&self) -> usize {
        self.privates.len()
    }

    // ----- Groups -----

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Total number of expressions across all groups.
    pub fn num_exprs(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    /// Number of records registered in the fingerprint index.
    pub fn fingerprint_count(&self) -> usize {
        self.expr_map.len()
    }

    /// The group that owns this exact record, if it was interned.
    pub fn find(&self, rec: &ExprRecord) -> Option<GroupId> {
        self.expr_map.get(rec).copied()
    }

    /// # Panics
    ///
    /// Panics if `id` was not allocated by this memo.
    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.0 as usize]
    }

    pub fn try_group(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .get(id.0 as usize)
            .ok_or(OptError::UnknownGroup(id))
    }

    /// The normalized expression of a group.
    pub fn normalized_expr(&self, id: GroupId) -> &ExprRecord {
        self.group(id).normalized()
    }

    /// # Panics
    ///
    /// Panics if the group or ordinal does not exist.
    pub fn expr(&self, id: ExprId) -> &ExprRecord {
        &self.group(id.group).exprs[id.ordinal.0 as usize]
    }

    pub fn props(&self, id: GroupId) -> &LogicalProps {
        self.group(id).props()
    }

    pub fn try_props(&self, id: GroupId) -> Result<&LogicalProps> {
        Ok(self.try_group(id)?.props())
    }

    pub fn scalar_props(&self, id: GroupId) -> Result<&ScalarProps> {
        self.try_props(id)?
            .as_scalar()
            .ok_or_else(|| OptError::internal(format!("{} is not a scalar group", id)))
    }

    pub fn relational_props(&self, id: GroupId) -> Result<&RelationalProps> {
        self.try_props(id)?
            .as_relational()
            .ok_or_else(|| OptError::internal(format!("{} is not a relational group", id)))
    }

    /// Static type of a scalar group.
    pub fn type_of(&self, id: GroupId) -> Result<&Type> {
        Ok(&self.scalar_props(id)?.ty)
    }

    /// Check that `operands` fit the layout of `op` and that every id in them was handed
    /// out by this memo.
    pub(crate) fn validate(&self, op: Operator, operands: &Operands) -> Result<()> {
        ExprRecord::new(op, operands)?;
        for child in &operands.children {
            self.try_group(*child)?;
        }
        if let Some(list) = operands.list {
            if !self.lists.contains(list) {
                return Err(OptError::internal(format!(
                    "{} references unknown list {:?}",
                    op, list
                )));
            }
            for item in self.lists.lookup(list) {
                self.try_group(*item)?;
            }
        }
        if let Some(private) = operands.private {
            if private.0 as usize >= self.privates.len() {
                return Err(OptError::internal(format!(
                    "{} references unknown private {:?}",
                    op, private
                )));
            }
        }
        Ok(())
    }

    /// Intern an expression exactly as given, without running normalization rules.
    ///
    /// Returns the existing group if the record is already in the fingerprint index,
    /// otherwise creates a new group with the record as its normalized member.
    pub fn memoize(&mut self, op: Operator, operands: &Operands) -> Result<GroupId> {
        self.validate(op, operands)?;
        let rec = ExprRecord::new(op, operands)?;
        self.memoize_record(rec)
    }

    fn memoize_record(&mut self, rec: ExprRecord) -> Result<GroupId> {
        if let Some(existing) = self.expr_map.get(&rec.fingerprint()) {
            self.stats.fingerprint_hits += 1;
            trace!("fingerprint hit: {} -> {}", rec.operator(), existing);
            return Ok(*existing);
        }

        let props = props::derive(self, &rec)?;
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(Group {
            id,
            exprs: vec![rec],
            props,
        });
        self.expr_map.insert(rec.fingerprint(), id);
        self.stats.groups_created += 1;
        debug!("created group {} for {}", id, rec.operator());
        Ok(id)
    }

    /// Append an expression known to be equivalent to `group`.
    ///
    /// The group's normalized member is never displaced. Adding a record that is already
    /// a member of `group` returns its existing id. A record already owned by a different
    /// group is rejected, because merging groups is not supported.
    pub fn add_alternate(
        &mut self,
        group: GroupId,
        op: Operator,
        operands: &Operands,
    ) -> Result<ExprId> {
        self.try_group(group)?;
        self.validate(op, operands)?;
        let rec = ExprRecord::new(op, operands)?;

        if let Some(existing) = self.expr_map.get(&rec.fingerprint()).copied() {
            if existing != group {
                return Err(OptError::DuplicateExpr {
                    op,
                    existing,
                    target: group,
                });
            }
            let ordinal = self.groups[group.0 as usize]
                .exprs
                .iter()
                .position(|e| *e == rec)
                .ok_or_else(|| OptError::internal("fingerprint index out of sync with group"))?;
            return Ok(ExprId {
                group,
                ordinal: ExprOrdinal(ordinal as u16),
            });
        }

        let props = props::derive(self, &rec)?;
        let target = &self.groups[group.0 as usize];
        if std::mem::discriminant(&props) != std::mem::discriminant(&target.props) {
            return Err(OptError::internal(format!(
                "cannot add {} to {}: scalar/relational mismatch",
                op, group
            )));
        }
        let ordinal = u16::try_from(target.exprs.len())
            .map_err(|_| OptError::internal(format!("group {} is full", group)))?;

        self.groups[group.0 as usize].exprs.push(rec);
        self.expr_map.insert(rec.fingerprint(), group);
        debug!("added alternate {} to group {} at ordinal {}", op, group, ordinal);
        Ok(ExprId {
            group,
            ordinal: ExprOrdinal(ordinal),
        })
    }

    // ----- Convenience constructors -----

    pub fn variable(&mut self, col: ColumnId) -> Result<GroupId> {
        let private = self.intern_private(Private::Column(col));
        self.construct(Operator::Variable, Operands::new().private(private))
    }

    /// A constant. `construct` turns booleans into `True`/`False` and a bare
    /// `Datum::Null` into an untyped `Null`.
    pub fn constant(&mut self, datum: Datum) -> Result<GroupId> {
        let private = self.intern_private(Private::Datum(datum));
        self.construct(Operator::Const, Operands::new().private(private))
    }

    pub fn null(&mut self, ty: Type) -> Result<GroupId> {
        let private = self.intern_private(Private::Type(ty));
        self.construct(Operator::Null, Operands::new().private(private))
    }

    pub fn bool_const(&mut self, value: bool) -> Result<GroupId> {
        let op = if value { Operator::True } else { Operator::False };
        self.construct(op, Operands::new())
    }

    pub fn unary(&mut self, op: Operator, input: GroupId) -> Result<GroupId> {
        self.construct(op, Operands::new().child(input))
    }

    pub fn binary(&mut self, op: Operator, left: GroupId, right: GroupId) -> Result<GroupId> {
        self.construct(op, Operands::new().child(left).child(right))
    }

    /// Construct an operator whose only operand is a list (`Tuple`, `Coalesce`).
    pub fn list_op(&mut self, op: Operator, items: &[GroupId]) -> Result<GroupId> {
        let list = self.intern_list(items);
        self.construct(op, Operands::new().list(list))
    }

    pub fn cast(&mut self, input: GroupId, ty: Type) -> Result<GroupId> {
        let private = self.intern_private(Private::Type(ty));
        self.construct(Operator::Cast, Operands::new().child(input).private(private))
    }
}

impl Default for Memo {
    fn default() -> Self {
        Self::new()
    }
}
