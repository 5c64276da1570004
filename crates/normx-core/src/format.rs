//! Indented, property-annotated rendering of a normalized expression.
//!
//! ```text
//! Eq [G3 type=bool]
//!   Variable x@1 [G0 type=int]
//!   Const 5 [G2 type=int]
//! ```

use crate::expr::GroupId;
use crate::memo::Memo;
use crate::operator::Operator;
use crate::props::LogicalProps;
use std::fmt;

/// Displays the normalized tree rooted at a group.
pub struct FormattedExpr<'m> {
    memo: &'m Memo,
    root: GroupId,
}

impl Memo {
    pub fn display(&self, group: GroupId) -> FormattedExpr<'_> {
        FormattedExpr {
            memo: self,
            root: group,
        }
    }

    /// The normalized tree rooted at `group` as indented text.
    pub fn format(&self, group: GroupId) -> String {
        self.display(group).to_string()
    }
}

impl FormattedExpr<'_> {
    fn write_group(&self, f: &mut fmt::Formatter<'_>, group: GroupId, depth: usize) -> fmt::Result {
        let memo = self.memo;
        let Ok(g) = memo.try_group(group) else {
            return writeln!(f, "{:indent$}<unknown {}>", "", group, indent = depth * 2);
        };
        let rec = g.normalized();
        let op = rec.operator();

        write!(f, "{:indent$}{}", "", op, indent = depth * 2)?;
        if let Some(private) = rec.private(memo) {
            match (op, private.as_column()) {
                (Operator::Variable, Some(col)) => match memo.metadata().column(col) {
                    Ok(meta) => write!(f, " {}{}", meta.name, col)?,
                    Err(_) => write!(f, " {}", col)?,
                },
                _ => write!(f, " {}", private)?,
            }
        }

        match g.props() {
            LogicalProps::Scalar(props) => write!(f, " [{} type={}]", group, props.ty)?,
            LogicalProps::Relational(props) => {
                write!(f, " [{} cols=(", group)?;
                for (i, col) in props.output_cols.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", col)?;
                }
                write!(f, ") rows={}-", props.cardinality.min)?;
                match props.cardinality.max {
                    Some(max) => write!(f, "{}", max)?,
                    None => write!(f, "inf")?,
                }
                if !props.outer_cols.is_empty() {
                    write!(f, " outer=(")?;
                    for (i, col) in props.outer_cols.iter().enumerate() {
                        if i > 0 {
                            write!(f, ",")?;
                        }
                        write!(f, "{}", col)?;
                    }
                    write!(f, ")")?;
                }
                write!(f, "]")?;
            }
        }
        writeln!(f)?;

        for child in rec.children(memo) {
            self.write_group(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for FormattedExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_group(f, self.root, 0)
    }
}
