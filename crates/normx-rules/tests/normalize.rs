//! End-to-end normalization tests against the default rule set.
//!
//! Every test builds expressions through the public construction API and checks the
//! observable contract of the memo: canonical forms, structural sharing, interning, and
//! that every rule reaches a fixpoint well under the rewrite cap.

use normx_core::memo::{Memo, NormalizeConfig};
use normx_core::private::{
    ArrayFlattenPrivate, ExistsPrivate, GroupByPrivate, Private, ScanPrivate,
};
use normx_core::tree::Tree;
use normx_core::{ColumnId, Datum, GroupId, OptError, Operands, Operator, Result, Type};
use normx_rules::default_rule_set;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A memo with a few registered columns and a base table.
struct Fixture {
    memo: Memo,
    x: GroupId,
    y: GroupId,
    s: GroupId,
    j: GroupId,
    a: ColumnId,
    scan: GroupId,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(NormalizeConfig::default())
    }

    fn with_config(config: NormalizeConfig) -> Self {
        let mut memo = Memo::with_config(default_rule_set(), config);
        let md = memo.metadata_mut();
        let (x, y) = (md.add_column("x", Type::Int), md.add_column("y", Type::Int));
        let s = md.add_column("s", Type::String);
        let j = md.add_column("j", Type::Jsonb);
        let a = md.add_column("t.a", Type::Int);

        let scan_private = memo.intern_private(Private::Scan(ScanPrivate {
            table: "t".into(),
            cols: vec![a],
        }));
        let scan = memo
            .construct(Operator::Scan, Operands::new().private(scan_private))
            .unwrap();
        Fixture {
            x: memo.variable(x).unwrap(),
            y: memo.variable(y).unwrap(),
            s: memo.variable(s).unwrap(),
            j: memo.variable(j).unwrap(),
            a,
            scan,
            memo,
        }
    }

    fn int(&mut self, v: i64) -> GroupId {
        self.memo.constant(Datum::Int(v)).unwrap()
    }

    fn ints(&mut self, values: &[i64]) -> Vec<GroupId> {
        values.iter().map(|v| self.int(*v)).collect()
    }

    fn binary(&mut self, op: Operator, left: GroupId, right: GroupId) -> GroupId {
        self.memo.binary(op, left, right).unwrap()
    }

    fn tuple(&mut self, items: &[GroupId]) -> GroupId {
        self.memo.list_op(Operator::Tuple, items).unwrap()
    }

    /// `SELECT * FROM t WHERE t.a = x`, correlated on `x`.
    fn correlated(&mut self) -> GroupId {
        let a = self.memo.variable(self.a).unwrap();
        let filter = self.binary(Operator::Eq, a, self.x);
        self.binary(Operator::Select, self.scan, filter)
    }

    /// The column called `name`, registered on first use.
    fn column(&mut self, name: &str, ty: Type) -> ColumnId {
        match self.memo.metadata().find(name) {
            Some(col) => col,
            None => self.memo.metadata_mut().add_column(name, ty),
        }
    }

    fn exists(&mut self, input: GroupId, limited: bool) -> Result<GroupId> {
        let private = self
            .memo
            .intern_private(Private::Exists(ExistsPrivate { limited }));
        self.memo
            .construct(Operator::Exists, Operands::new().child(input).private(private))
    }
}

/// Re-submit the normalized member of `group` and return the resulting group.
fn resubmit(memo: &mut Memo, group: GroupId) -> GroupId {
    let rec = *memo.normalized_expr(group);
    memo.construct(rec.operator(), rec.operands()).unwrap()
}

type Builder = fn(&mut Fixture) -> Result<GroupId>;

fn case(name: &'static str, build: Builder) -> (&'static str, Builder) {
    (name, build)
}

/// Inputs shaped to re-trigger a rule on its own output, one or more per rule.
fn adversarial_inputs() -> Vec<(&'static str, Builder)> {
    vec![
        case("commute var inequality", |f| {
            let five = f.int(5);
            f.memo.binary(Operator::Lt, five, f.x)
        }),
        case("commute const inequality", |f| {
            let (one, two) = (f.int(1), f.int(2));
            let sum = f.binary(Operator::Plus, one, two);
            let expr = f.binary(Operator::Plus, f.x, one);
            f.memo.binary(Operator::Ge, sum, expr)
        }),
        case("commute var", |f| {
            let one = f.int(1);
            let sum = f.binary(Operator::Plus, f.y, one);
            f.memo.binary(Operator::IsNot, sum, f.x)
        }),
        case("commute const", |f| {
            let (two, three) = (f.int(2), f.int(3));
            let inner = f.binary(Operator::Mult, two, f.x);
            f.memo.binary(Operator::Plus, three, inner)
        }),
        case("same var equality", |f| f.memo.binary(Operator::Ge, f.x, f.x)),
        case("same var inequality", |f| f.memo.binary(Operator::Gt, f.y, f.y)),
        case("unify comparison types", |f| {
            let five = f.int(5);
            let cast = f.memo.cast(five, Type::Float)?;
            f.memo.binary(Operator::Le, cast, f.x)
        }),
        case("json field access", |f| {
            let key = f.memo.constant(Datum::String("a".into()))?;
            let fetch = f.binary(Operator::FetchVal, f.j, key);
            let value = f.memo.constant(Datum::json(serde_json::json!("v")))?;
            f.memo.binary(Operator::Eq, value, fetch)
        }),
        case("json containment", |f| {
            let key = f.memo.constant(Datum::String("a".into()))?;
            let fetch = f.binary(Operator::FetchVal, f.j, key);
            let value = f.memo.constant(Datum::json(serde_json::json!({"b": [1]})))?;
            f.memo.binary(Operator::Contains, fetch, value)
        }),
        case("single coalesce", |f| f.memo.list_op(Operator::Coalesce, &[f.x])),
        case("coalesce leading nulls", |f| {
            let null = f.memo.null(Type::Unknown)?;
            let one = f.int(1);
            f.memo
                .list_op(Operator::Coalesce, &[null, null, null, f.x, one, f.y])
        }),
        case("coalesce all nulls", |f| {
            let unknown = f.memo.null(Type::Unknown)?;
            let int = f.memo.null(Type::Int)?;
            f.memo.list_op(Operator::Coalesce, &[unknown, int, unknown])
        }),
        case("nested casts", |f| {
            let inner = f.memo.cast(f.x, Type::Int)?;
            let outer = f.memo.cast(inner, Type::Int)?;
            f.memo.cast(outer, Type::Int)
        }),
        case("collate", |f| {
            let text = f.memo.constant(Datum::String("a".into()))?;
            let locale = f.memo.intern_private(Private::Locale("de".into()));
            f.memo
                .construct(Operator::Collate, Operands::new().child(text).private(locale))
        }),
        case("in list", |f| {
            let items = f.ints(&[5, 3, 5, 1, 3, 1]);
            let tuple = f.tuple(&items);
            f.memo.binary(Operator::NotIn, f.x, tuple)
        }),
        case("in null", |f| {
            let null = f.memo.null(Type::Unknown)?;
            let tuple = f.tuple(&[null]);
            f.memo.binary(Operator::In, f.x, tuple)
        }),
        case("case when", |f| {
            let items = f.ints(&[1, 2, 3]);
            let mut whens = Vec::new();
            for (cond, value) in [(items[1], f.x), (items[0], f.y), (items[2], f.s)] {
                whens.push(f.binary(Operator::When, cond, value));
            }
            let list = f.memo.intern_list(&whens);
            let null = f.memo.null(Type::Unknown)?;
            f.memo.construct(
                Operator::Case,
                Operands::new().child(items[0]).child(null).list(list),
            )
        }),
        case("exists over scan", |f| f.exists(f.scan, false)),
        case("exists over project", |f| {
            let var = f.memo.variable(f.a)?;
            let list = f.memo.intern_list(&[var]);
            let cols = f.memo.intern_private(Private::Columns(vec![f.a]));
            let project = f.memo.construct(
                Operator::Project,
                Operands::new().child(f.scan).list(list).private(cols),
            )?;
            f.exists(project, false)
        }),
        case("exists over group by", |f| {
            let count_col = f.column("count", Type::Int);
            let count = f.memo.construct(Operator::CountRows, Operands::new())?;
            let aggs = f.memo.intern_list(&[count]);
            let private = f.memo.intern_private(Private::GroupBy(GroupByPrivate {
                grouping: vec![f.a],
                aggs: vec![count_col],
            }));
            let group_by = f.memo.construct(
                Operator::GroupBy,
                Operands::new().child(f.scan).list(aggs).private(private),
            )?;
            f.exists(group_by, false)
        }),
        case("exists over correlated limit", |f| {
            let input = f.correlated();
            let one = f.int(1);
            let limit = f.binary(Operator::Limit, input, one);
            f.exists(limit, false)
        }),
        case("any values", |f| {
            let v = f.column("v", Type::Int);
            let mut rows = Vec::new();
            for n in [4, 2, 4] {
                let item = f.int(n);
                rows.push(f.tuple(&[item]));
            }
            let list = f.memo.intern_list(&rows);
            let cols = f.memo.intern_private(Private::Columns(vec![v]));
            let values = f
                .memo
                .construct(Operator::Values, Operands::new().list(list).private(cols))?;
            let cmp = f.memo.intern_private(Private::Comparison(Operator::Eq));
            f.memo.construct(
                Operator::Any,
                Operands::new().child(values).child(f.x).private(cmp),
            )
        }),
        case("any scalar array", |f| {
            let array = f.memo.constant(Datum::Array {
                elem: Type::Int,
                items: vec![Datum::Int(2), Datum::Int(2), Datum::Int(1)],
            })?;
            let cmp = f.memo.intern_private(Private::Comparison(Operator::Eq));
            f.memo.construct(
                Operator::AnyScalar,
                Operands::new().child(f.x).child(array).private(cmp),
            )
        }),
        case("correlated array flatten", |f| {
            let input = f.correlated();
            let out = f.column("agg", Type::array_of(Type::Int));
            let private = f.memo.intern_private(Private::ArrayFlatten(ArrayFlattenPrivate {
                input_col: f.a,
                output_col: out,
            }));
            f.memo.construct(
                Operator::ArrayFlatten,
                Operands::new().child(input).private(private),
            )
        }),
        case("non-empty array flatten", |f| {
            let w = f.column("w", Type::Int);
            let row = f.tuple(&[f.x]);
            let list = f.memo.intern_list(&[row]);
            let cols = f.memo.intern_private(Private::Columns(vec![w]));
            let values = f
                .memo
                .construct(Operator::Values, Operands::new().list(list).private(cols))?;
            let out = f.column("agg", Type::array_of(Type::Int));
            let private = f.memo.intern_private(Private::ArrayFlatten(ArrayFlattenPrivate {
                input_col: w,
                output_col: out,
            }));
            f.memo.construct(
                Operator::ArrayFlatten,
                Operands::new().child(values).private(private),
            )
        }),
    ]
}

// ---------------------------------------------------------------------------
// Construction contract
// ---------------------------------------------------------------------------

#[test]
fn test_construct_is_deterministic_across_memos() {
    for (name, build) in adversarial_inputs() {
        let mut first = Fixture::new();
        let mut second = Fixture::new();
        let g1 = build(&mut first).unwrap();
        let g2 = build(&mut second).unwrap();
        assert_eq!(g1, g2, "{}", name);
        assert_eq!(
            first.memo.normalized_expr(g1),
            second.memo.normalized_expr(g2),
            "{}",
            name
        );
        assert_eq!(first.memo.num_groups(), second.memo.num_groups(), "{}", name);

        // Same memo, same arguments: same group, nothing new.
        let groups = first.memo.num_groups();
        assert_eq!(build(&mut first).unwrap(), g1, "{}", name);
        assert_eq!(first.memo.num_groups(), groups, "{}", name);
    }
}

#[test]
fn test_normalized_form_is_a_fixpoint() {
    let mut f = Fixture::new();
    for (name, build) in adversarial_inputs() {
        let g = build(&mut f).unwrap();
        let fired = f.memo.stats().rewrites;
        assert_eq!(resubmit(&mut f.memo, g), g, "{}", name);
        assert_eq!(f.memo.stats().rewrites, fired, "{} fired on its own output", name);
    }
}

#[test]
fn test_every_rule_terminates_under_cap() {
    let mut f = Fixture::new();
    for (name, build) in adversarial_inputs() {
        assert!(build(&mut f).is_ok(), "{} hit a limit", name);
    }
    let stats = f.memo.stats();
    assert!(stats.longest_chain < f.memo.config().max_rewrites);
    assert!(stats.longest_chain <= 4, "longest chain {}", stats.longest_chain);
}

#[test]
fn test_low_cap_reports_rewrite_limit() {
    let mut f = Fixture::with_config(NormalizeConfig {
        max_rewrites: 1,
        ..NormalizeConfig::default()
    });
    // AnyScalar over an array takes three rewrites to reach its IN form.
    let err = adversarial_inputs()
        .into_iter()
        .find(|(name, _)| *name == "any scalar array")
        .map(|(_, build)| build(&mut f))
        .unwrap();
    assert!(matches!(err, Err(OptError::RewriteLimit { .. })), "{:?}", err);
    assert!(err.unwrap_err().is_internal());
}

#[test]
fn test_structural_sharing() {
    let mut f = Fixture::new();
    let one = f.int(1);
    let sum = f.binary(Operator::Plus, f.x, one);
    let fingerprints = f.memo.fingerprint_count();
    let groups = f.memo.num_groups();

    let again_one = f.int(1);
    assert_eq!(again_one, one);
    assert_eq!(f.binary(Operator::Plus, f.x, again_one), sum);
    assert_eq!(f.memo.fingerprint_count(), fingerprints);
    assert_eq!(f.memo.num_groups(), groups);
    assert!(f.memo.stats().fingerprint_hits >= 2);
}

#[test]
fn test_list_and_private_interning() {
    let mut f = Fixture::new();
    let a = f.memo.intern_list(&[f.x, f.y]);
    let b = f.memo.intern_list(&[f.x, f.y]);
    let c = f.memo.intern_list(&[f.y, f.x]);
    assert_eq!(a, b);
    assert_ne!(a, c);

    let p = f.memo.intern_private(Private::Type(Type::Int));
    let q = f.memo.intern_private(Private::Type(Type::Int));
    let r = f.memo.intern_private(Private::Type(Type::Float));
    assert_eq!(p, q);
    assert_ne!(p, r);
}

// ---------------------------------------------------------------------------
// Canonical forms
// ---------------------------------------------------------------------------

#[test]
fn test_commuted_equality_shares_group() {
    let mut f = Fixture::new();
    let five = f.int(5);
    let left = f.binary(Operator::Eq, five, f.x);
    let right = f.binary(Operator::Eq, f.x, five);
    assert_eq!(left, right);
    let rec = f.memo.normalized_expr(left);
    assert_eq!(rec.fixed_child(0), f.x);
    assert_eq!(rec.fixed_child(1), five);
}

#[test]
fn test_in_single_null_folds_to_bool_null() {
    let mut f = Fixture::new();
    let null = f.memo.constant(Datum::Null).unwrap();
    let tuple = f.tuple(&[null]);
    let g = f.binary(Operator::In, f.x, tuple);
    assert_eq!(g, f.memo.null(Type::Bool).unwrap());
}

#[test]
fn test_redundant_cast_is_the_input() {
    let mut f = Fixture::new();
    let cast = f.memo.cast(f.x, Type::Int).unwrap();
    assert_eq!(cast, f.x);

    let widened = f.memo.cast(f.x, Type::Float).unwrap();
    assert_ne!(widened, f.x);
}

#[test]
fn test_self_equality_is_null_aware() {
    let mut f = Fixture::new();
    let g = f.binary(Operator::Eq, f.x, f.x);
    assert_ne!(g, f.memo.bool_const(true).unwrap());

    let int_null = f.memo.null(Type::Int).unwrap();
    let bool_null = f.memo.null(Type::Bool).unwrap();
    let is_not = f.binary(Operator::IsNot, f.x, int_null);
    let expected = f.binary(Operator::Or, is_not, bool_null);
    assert_eq!(g, expected);
}

#[test]
fn test_disabled_rules_do_not_fire() {
    let mut f = Fixture::with_config(NormalizeConfig {
        disabled_rules: ["CommuteVar", "CommuteConst"]
            .into_iter()
            .map(String::from)
            .collect(),
        ..NormalizeConfig::default()
    });
    let five = f.int(5);
    let g = f.binary(Operator::Eq, five, f.x);
    assert_eq!(f.memo.normalized_expr(g).fixed_child(0), five);
    assert!(f.memo.stats().rules_fired.is_empty());

    // Other rules are unaffected.
    let lt = f.binary(Operator::Lt, five, f.x);
    assert_eq!(f.memo.normalized_expr(lt).operator(), Operator::Gt);
}

#[test]
fn test_substitute_renormalizes() {
    let mut f = Fixture::new();
    let root = f.binary(Operator::Eq, f.y, f.x);
    let five = f.int(5);
    let replaced = f.memo.substitute(root, f.y, five).unwrap();
    assert_eq!(replaced, f.binary(Operator::Eq, f.x, five));
}

// ---------------------------------------------------------------------------
// Bound trees
// ---------------------------------------------------------------------------

#[test]
fn test_bound_tree_normalizes_like_direct_construction() {
    let mut f = Fixture::new();
    let x = f.memo.metadata().find("x").unwrap();
    let tree = Tree::new(Operator::Eq)
        .child(Tree::new(Operator::Const).private(Private::Datum(Datum::Int(5))))
        .child(Tree::new(Operator::Variable).private(Private::Column(x)));
    let built = f.memo.build(&tree).unwrap();

    let five = f.int(5);
    assert_eq!(built, f.binary(Operator::Eq, f.x, five));

    let extracted = f.memo.extract(built).unwrap();
    assert_eq!(extracted.children[0].op, "Variable");
    assert_eq!(extracted.children[1].op, "Const");
}

#[test]
fn test_bound_tree_constants_are_canonical() {
    let mut f = Fixture::new();
    let x = f.memo.metadata().find("x").unwrap();
    let leaf = |datum: Datum| Tree::new(Operator::Const).private(Private::Datum(datum));

    let in_null = Tree::new(Operator::In)
        .child(Tree::new(Operator::Variable).private(Private::Column(x)))
        .child(Tree::new(Operator::Tuple).list(vec![leaf(Datum::Null)]));
    let built = f.memo.build(&in_null).unwrap();
    assert_eq!(built, f.memo.null(Type::Bool).unwrap());

    let built = f.memo.build(&leaf(Datum::Bool(true))).unwrap();
    assert_eq!(built, f.memo.bool_const(true).unwrap());

    let shuffled = leaf(Datum::Json(r#"{"b": 1, "a": 2}"#.into()));
    let built = f.memo.build(&shuffled).unwrap();
    let canonical = f
        .memo
        .constant(Datum::json(serde_json::json!({"a": 2, "b": 1})))
        .unwrap();
    assert_eq!(built, canonical);
}

#[test]
fn test_unknown_operator_is_unimplemented() {
    let mut f = Fixture::new();
    let tree: Tree = serde_json::from_value(serde_json::json!({
        "op": "not",
        "children": [{"op": "window_rank"}]
    }))
    .unwrap();
    let err = f.memo.build(&tree).unwrap_err();
    assert!(err.is_unimplemented());
    assert!(!err.is_internal());
}
