//! Memo contract tests that do not depend on any particular rule set.
//!
//! ## What These Tests Verify
//! - The operand layout table decodes to the declared operator shapes
//! - Records built from the table are validated before they reach the memo
//! - Alternates never displace the normalized member and never cross groups
//! - The identity replace reproduces a record exactly and interns nothing new
//! - Bound trees survive a build/extract cycle

use normx_core::expr::ExprOrdinal;
use normx_core::metadata::ColSet;
use normx_core::operator::{OpClass, MAX_OPERANDS};
use normx_core::private::{GroupByPrivate, Private, ScanPrivate};
use normx_core::{Datum, ExprRecord, GroupId, Memo, OptError, Operands, Operator, Tree, Type};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn memo_with_vars() -> (Memo, GroupId, GroupId) {
    let mut memo = Memo::new();
    let x = memo.metadata_mut().add_column("x", Type::Int);
    let y = memo.metadata_mut().add_column("y", Type::Int);
    let x = memo.variable(x).unwrap();
    let y = memo.variable(y).unwrap();
    (memo, x, y)
}

fn shape(op: Operator) -> (usize, bool, bool) {
    let layout = op.layout();
    (layout.fixed_count(), layout.has_list(), layout.has_private())
}

// ---------------------------------------------------------------------------
// Layout table
// ---------------------------------------------------------------------------

#[test]
fn test_layout_table_matches_declared_shapes() {
    let expected = [
        (Operator::Variable, (0, false, true)),
        (Operator::Const, (0, false, true)),
        (Operator::True, (0, false, false)),
        (Operator::Tuple, (0, true, false)),
        (Operator::Array, (0, true, true)),
        (Operator::Not, (1, false, false)),
        (Operator::Eq, (2, false, false)),
        (Operator::Cast, (1, false, true)),
        (Operator::Case, (2, true, false)),
        (Operator::AnyScalar, (2, false, true)),
        (Operator::Any, (2, false, true)),
        (Operator::CountRows, (0, false, false)),
        (Operator::Values, (0, true, true)),
        (Operator::Select, (2, false, false)),
        (Operator::Project, (1, true, true)),
        (Operator::Limit, (2, false, false)),
    ];
    for (op, declared) in expected {
        assert_eq!(shape(op), declared, "{}", op);
    }

    for op in Operator::ALL {
        let layout = op.layout();
        assert!(layout.slots_used() <= MAX_OPERANDS, "{}", op);
        assert_eq!(Operator::from_name(op.name()), Some(*op));
        assert_eq!(op.is_relational(), op.class() == OpClass::Relational);
    }
}

#[test]
fn test_record_validation() {
    let (mut memo, x, _) = memo_with_vars();

    let err = memo
        .construct(Operator::Eq, Operands::new().child(x))
        .unwrap_err();
    assert!(matches!(err, OptError::ArityMismatch { expected: 2, actual: 1, .. }));

    let list = memo.intern_list(&[x]);
    let err = memo
        .construct(Operator::Not, Operands::new().child(x).list(list))
        .unwrap_err();
    assert!(matches!(err, OptError::UnexpectedOperand { operand: "list", .. }));

    let err = memo
        .construct(Operator::Not, Operands::new().child(GroupId(999)))
        .unwrap_err();
    assert_eq!(err, OptError::UnknownGroup(GroupId(999)));

    // Wrong private variant is caught when properties are derived.
    let ty = memo.intern_private(Private::Type(Type::Int));
    let err = memo
        .construct(Operator::Variable, Operands::new().private(ty))
        .unwrap_err();
    assert!(matches!(err, OptError::WrongPrivate { .. }));
    assert!(err.is_internal());

    // ANY compares with a comparison operator only.
    let plus = memo.intern_private(Private::Comparison(Operator::Plus));
    let err = memo
        .construct(Operator::AnyScalar, Operands::new().child(x).child(x).private(plus))
        .unwrap_err();
    assert!(matches!(err, OptError::WrongPrivate { expected: "comparison", .. }));
}

#[test]
fn test_record_accessors() {
    let (mut memo, x, y) = memo_with_vars();
    let whens = {
        let one = memo.constant(Datum::Int(1)).unwrap();
        let when = memo.binary(Operator::When, one, y).unwrap();
        memo.intern_list(&[when])
    };
    let case = memo
        .construct(Operator::Case, Operands::new().child(x).child(y).list(whens))
        .unwrap();

    let rec = *memo.normalized_expr(case);
    assert_eq!(rec.child_count(), 3);
    assert_eq!(rec.child_group(&memo, 1), y);
    assert_eq!(rec.try_child_group(&memo, 3), None);
    assert_eq!(rec.list_id(), Some(whens));
    assert_eq!(rec.private_id(), None);
    assert_eq!(ExprRecord::new(rec.operator(), &rec.operands()).unwrap(), rec);
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[test]
fn test_alternates_keep_normalized_member() {
    let (mut memo, x, y) = memo_with_vars();
    let xy = memo.binary(Operator::Plus, x, y).unwrap();
    let normalized = *memo.normalized_expr(xy);

    let yx = Operands::new().child(y).child(x);
    let id = memo.add_alternate(xy, Operator::Plus, &yx).unwrap();
    assert_eq!(id.ordinal, ExprOrdinal(1));
    assert_eq!(*memo.normalized_expr(xy), normalized);
    assert_eq!(memo.group(xy).len(), 2);

    // Adding the same alternate again is a no-op; constructing it finds the group.
    assert_eq!(memo.add_alternate(xy, Operator::Plus, &yx).unwrap(), id);
    assert_eq!(memo.construct(Operator::Plus, yx.clone()).unwrap(), xy);

    // A record owned by another group is rejected.
    let xx = memo.binary(Operator::Plus, x, x).unwrap();
    let err = memo.add_alternate(xx, Operator::Plus, &yx).unwrap_err();
    assert_eq!(
        err,
        OptError::DuplicateExpr {
            op: Operator::Plus,
            existing: xy,
            target: xx,
        }
    );
    assert_eq!(memo.group(xx).len(), 1);
}

#[test]
fn test_relational_properties() {
    let mut memo = Memo::new();
    let a = memo.metadata_mut().add_column("t.a", Type::Int);
    let b = memo.metadata_mut().add_column("t.b", Type::Int);
    let scan = memo.intern_private(Private::Scan(ScanPrivate {
        table: "t".into(),
        cols: vec![a, b],
    }));
    let scan = memo
        .construct(Operator::Scan, Operands::new().private(scan))
        .unwrap();

    let agg_col = memo.metadata_mut().add_column("count", Type::Int);
    let count = memo.construct(Operator::CountRows, Operands::new()).unwrap();
    let aggs = memo.intern_list(&[count]);
    let private = memo.intern_private(Private::GroupBy(GroupByPrivate {
        grouping: vec![a],
        aggs: vec![agg_col],
    }));
    let group_by = memo
        .construct(
            Operator::GroupBy,
            Operands::new().child(scan).list(aggs).private(private),
        )
        .unwrap();

    let props = memo.relational_props(group_by).unwrap();
    let expected: ColSet = [a, agg_col].into_iter().collect();
    assert_eq!(props.output_cols, expected);
    assert!(!props.is_correlated());
    assert!(memo.scalar_props(group_by).is_err());
}

// ---------------------------------------------------------------------------
// Replace and bound trees
// ---------------------------------------------------------------------------

#[test]
fn test_identity_replace() {
    let (mut memo, x, y) = memo_with_vars();
    let tuple = memo.list_op(Operator::Tuple, &[x, y]).unwrap();
    let rec = *memo.normalized_expr(tuple);
    let lists = memo.num_lists();

    let replaced = rec.replace(&mut memo, |_, g| Ok(g)).unwrap();
    assert_eq!(replaced, rec);
    assert_eq!(replaced.fingerprint(), rec.fingerprint());
    assert_eq!(memo.num_lists(), lists);
    assert_eq!(memo.replace_children(tuple, |_, g| Ok(g)).unwrap(), tuple);

    let swapped = memo
        .replace_children(tuple, |_, g| Ok(if g == x { y } else { x }))
        .unwrap();
    assert_ne!(swapped, tuple);
    assert_eq!(memo.normalized_expr(swapped).children(&memo), vec![y, x]);
}

#[test]
fn test_tree_round_trip() {
    let (mut memo, _, _) = memo_with_vars();
    let x = memo.metadata().find("x").unwrap();
    let tree = Tree::new(Operator::Coalesce).list(vec![
        Tree::new(Operator::Variable).private(Private::Column(x)),
        Tree::new(Operator::Null).private(Private::Type(Type::Int)),
    ]);
    let g = memo.build(&tree).unwrap();
    assert_eq!(memo.extract(g).unwrap(), tree);
    assert_eq!(memo.type_of(g).unwrap(), &Type::Int);

    let text = memo.format(g);
    assert!(text.starts_with("Coalesce"), "{}", text);
}
