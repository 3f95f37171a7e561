//! Row filters over leaf values.
//!
//! A [`Predicate`] is a tree of comparisons joined by unions and
//! intersections. Each comparison names the leaf it applies to by its path
//! from the root. While rows are assembled the tree is narrowed one path
//! segment at a time, so a branch only sees the comparisons under it.

use crate::parquet::col_type::ColumnType;
use crate::parquet::error::ParquetResult;
use crate::parquet::value::Value;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Whether a leaf value ordered `ord` relative to the operand passes.
    pub fn accepts(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row.
    All,
    Union(Vec<Predicate>),
    Intersection(Vec<Predicate>),
    Leaf {
        op: CompareOp,
        value: Value,
        path: Arc<[String]>,
        /// Number of path segments already narrowed away.
        offset: usize,
    },
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::All
    }
}

impl Predicate {
    pub fn all() -> Self {
        Predicate::All
    }

    pub fn compare<I, S>(op: CompareOp, path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::Leaf {
            op,
            value: value.into(),
            path: path.into_iter().map(Into::into).collect(),
            offset: 0,
        }
    }

    pub fn eq<I, S>(path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::compare(CompareOp::Eq, path, value)
    }

    pub fn lt<I, S>(path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::compare(CompareOp::Lt, path, value)
    }

    pub fn le<I, S>(path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::compare(CompareOp::Le, path, value)
    }

    pub fn gt<I, S>(path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::compare(CompareOp::Gt, path, value)
    }

    pub fn ge<I, S>(path: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::compare(CompareOp::Ge, path, value)
    }

    pub fn union(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Union(children.into_iter().collect())
    }

    pub fn intersection(children: impl IntoIterator<Item = Predicate>) -> Self {
        Predicate::Intersection(children.into_iter().collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Predicate::All)
    }

    /// The path segment a leaf comparison descends into next, `None` once the
    /// comparison has reached its leaf.
    fn next_segment(&self) -> Option<&str> {
        match self {
            Predicate::Leaf { path, offset, .. } => path.get(*offset).map(String::as_str),
            _ => None,
        }
    }

    /// Whether any comparison descends into the child `name`.
    pub fn includes_child(&self, name: &str) -> bool {
        match self {
            Predicate::All => false,
            Predicate::Union(children) | Predicate::Intersection(children) => {
                children.iter().any(|c| c.includes_child(name))
            }
            Predicate::Leaf { .. } => self.next_segment() == Some(name),
        }
    }

    /// Whether any comparison descends along `path` from this point.
    pub fn includes_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let mut current = self.clone();
        for segment in path {
            if !current.includes_child(segment.as_ref()) {
                return false;
            }
            current = current.for_child(segment.as_ref());
        }
        true
    }

    /// The part of this predicate that applies below the child `name`.
    /// Comparisons over other children drop out; if none remain the result
    /// is [`Predicate::All`].
    pub fn for_child(&self, name: &str) -> Predicate {
        match self {
            Predicate::All => Predicate::All,
            Predicate::Leaf {
                op,
                value,
                path,
                offset,
            } => {
                if self.next_segment() == Some(name) {
                    Predicate::Leaf {
                        op: *op,
                        value: value.clone(),
                        path: path.clone(),
                        offset: offset + 1,
                    }
                } else {
                    Predicate::All
                }
            }
            Predicate::Union(children) => {
                let narrowed = Self::narrow(children, name);
                if narrowed.is_empty() {
                    Predicate::All
                } else {
                    Predicate::Union(narrowed)
                }
            }
            Predicate::Intersection(children) => {
                let narrowed = Self::narrow(children, name);
                if narrowed.is_empty() {
                    Predicate::All
                } else {
                    Predicate::Intersection(narrowed)
                }
            }
        }
    }

    fn narrow(children: &[Predicate], name: &str) -> Vec<Predicate> {
        children
            .iter()
            .filter(|c| c.includes_child(name))
            .map(|c| c.for_child(name))
            .collect()
    }

    /// Evaluates the predicate at a branch. Every comparison is delegated to
    /// `child_matches` with the child it descends into and the comparison
    /// narrowed to that child.
    pub fn branch_matches<F>(&self, child_matches: &mut F) -> ParquetResult<bool>
    where
        F: FnMut(&str, &Predicate) -> ParquetResult<bool>,
    {
        match self {
            Predicate::All => Ok(true),
            Predicate::Union(children) => {
                if children.is_empty() {
                    return Ok(true);
                }
                for child in children {
                    if child.branch_matches(child_matches)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Intersection(children) => {
                for child in children {
                    if !child.branch_matches(child_matches)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Leaf { .. } => match self.next_segment() {
                Some(name) => child_matches(name, &self.for_child(name)),
                None => Ok(true),
            },
        }
    }

    /// Evaluates the predicate against a leaf slot, `None` standing for null.
    /// A comparison never matches a null. Comparisons whose path continues
    /// past the leaf do not constrain it.
    pub fn matches(&self, col_type: &ColumnType, value: Option<&Value>) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Union(children) => {
                children.is_empty() || children.iter().any(|c| c.matches(col_type, value))
            }
            Predicate::Intersection(children) => {
                children.iter().all(|c| c.matches(col_type, value))
            }
            Predicate::Leaf {
                op,
                value: operand,
                path,
                offset,
            } => {
                if *offset < path.len() {
                    return true;
                }
                match value {
                    Some(value) => col_type
                        .compare(value, operand)
                        .map(|ord| op.accepts(ord))
                        .unwrap_or(false),
                    None => false,
                }
            }
        }
    }

    pub fn value_matches(&self, col_type: &ColumnType, value: &Value) -> bool {
        self.matches(col_type, Some(value))
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let join = |f: &mut Formatter<'_>, children: &[Predicate], sep: &str| {
            write!(f, "(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, ")")
        };
        match self {
            Predicate::All => write!(f, "*"),
            Predicate::Union(children) => join(f, children, "or"),
            Predicate::Intersection(children) => join(f, children, "and"),
            Predicate::Leaf {
                op,
                value,
                path,
                offset,
            } => {
                let rest = path.get(*offset..).unwrap_or_default();
                if rest.is_empty() {
                    write!(f, "_ {} {}", op.symbol(), value)
                } else {
                    write!(f, "{} {} {}", rest.join("."), op.symbol(), value)
                }
            }
        }
    }
}
