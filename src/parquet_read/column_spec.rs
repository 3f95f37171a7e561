use std::sync::Arc;

/// Which fields of a row are materialized.
///
/// Narrowed one path segment at a time like a
/// [`Predicate`](crate::Predicate): once a column path is exhausted, the whole
/// subtree below it is selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSpec {
    #[default]
    All,
    None,
    Column {
        path: Arc<[String]>,
        offset: usize,
    },
    Union(Vec<ColumnSpec>),
}

impl ColumnSpec {
    pub fn all() -> Self {
        ColumnSpec::All
    }

    pub fn none() -> Self {
        ColumnSpec::None
    }

    pub fn column<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Arc<[String]> = path.into_iter().map(Into::into).collect();
        if path.is_empty() {
            ColumnSpec::All
        } else {
            ColumnSpec::Column { path, offset: 0 }
        }
    }

    pub fn union(children: impl IntoIterator<Item = ColumnSpec>) -> Self {
        ColumnSpec::Union(children.into_iter().collect())
    }

    pub fn includes_child(&self, name: &str) -> bool {
        match self {
            ColumnSpec::All => true,
            ColumnSpec::None => false,
            ColumnSpec::Column { path, offset } => match path.get(*offset) {
                Some(segment) => segment == name,
                None => true,
            },
            ColumnSpec::Union(children) => children.iter().any(|c| c.includes_child(name)),
        }
    }

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

    pub fn for_child(&self, name: &str) -> ColumnSpec {
        match self {
            ColumnSpec::All => ColumnSpec::All,
            ColumnSpec::None => ColumnSpec::None,
            ColumnSpec::Column { path, offset } => match path.get(*offset) {
                None => ColumnSpec::All,
                Some(segment) if segment == name => {
                    if offset + 1 == path.len() {
                        ColumnSpec::All
                    } else {
                        ColumnSpec::Column {
                            path: path.clone(),
                            offset: offset + 1,
                        }
                    }
                }
                Some(_) => ColumnSpec::None,
            },
            ColumnSpec::Union(children) => {
                let mut narrowed = Vec::with_capacity(children.len());
                for child in children {
                    match child.for_child(name) {
                        ColumnSpec::All => return ColumnSpec::All,
                        ColumnSpec::None => {}
                        other => narrowed.push(other),
                    }
                }
                match narrowed.len() {
                    0 => ColumnSpec::None,
                    1 => narrowed.pop().unwrap_or(ColumnSpec::None),
                    _ => ColumnSpec::Union(narrowed),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_column() {
        let spec = ColumnSpec::column(["a", "b"]);
        assert!(spec.includes_child("a"));
        assert!(!spec.includes_child("b"));
        assert_eq!(spec.for_child("c"), ColumnSpec::None);
        let a = spec.for_child("a");
        assert!(a.includes_child("b"));
        assert!(!a.includes_child("x"));
        // everything below the selected column
        assert_eq!(a.for_child("b"), ColumnSpec::All);
        assert!(spec.includes_path(&["a", "b", "c"]));
        assert!(!spec.includes_path(&["a", "x"]));
    }

    #[test]
    fn test_union() {
        let spec = ColumnSpec::union([
            ColumnSpec::column(["a", "x"]),
            ColumnSpec::column(["a", "y"]),
            ColumnSpec::column(["b"]),
        ]);
        assert!(spec.includes_child("a"));
        assert!(spec.includes_child("b"));
        assert!(!spec.includes_child("c"));
        assert_eq!(spec.for_child("b"), ColumnSpec::All);
        let a = spec.for_child("a");
        assert!(matches!(a, ColumnSpec::Union(ref c) if c.len() == 2));
        assert!(a.includes_child("y"));
        assert_eq!(spec.for_child("c"), ColumnSpec::None);
        assert_eq!(ColumnSpec::column(Vec::<String>::new()), ColumnSpec::All);
    }
}
