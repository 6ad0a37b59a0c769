use crate::types::SqlValue;

/// One optional comparison against an allow-listed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(&'static str, SqlValue),
    /// Case-insensitive substring match.
    Contains(&'static str, String),
    AtLeast(&'static str, SqlValue),
    AtMost(&'static str, SqlValue),
}

/// Set of predicates collected from optional request parameters.
///
/// Builder methods take `Option`s and skip `None`, so a handler can pass every query
/// parameter straight through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.predicates.push(Predicate::Eq(column, value.into()));
        }
        self
    }

    /// Blank needles are treated as absent.
    #[must_use]
    pub fn contains<S: AsRef<str>>(mut self, column: &'static str, needle: Option<S>) -> Self {
        if let Some(needle) = needle {
            let needle = needle.as_ref().trim();
            if !needle.is_empty() {
                self.predicates
                    .push(Predicate::Contains(column, needle.to_string()));
            }
        }
        self
    }

    #[must_use]
    pub fn at_least<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.predicates.push(Predicate::AtLeast(column, value.into()));
        }
        self
    }

    #[must_use]
    pub fn at_most<V: Into<SqlValue>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.predicates.push(Predicate::AtMost(column, value.into()));
        }
        self
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Conditions joined with `AND` (no `WHERE` keyword) and their arguments.
///
/// An empty clause means "no WHERE clause", not "match nothing".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterClause {
    pub text: String,
    pub args: Vec<SqlValue>,
}

impl FilterClause {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Escape `LIKE` wildcards so the needle matches literally; pairs with `ESCAPE '\'`.
#[must_use]
pub fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[must_use]
pub fn build_filter(spec: &FilterSpec) -> FilterClause {
    let mut parts = Vec::with_capacity(spec.predicates.len());
    let mut args = Vec::with_capacity(spec.predicates.len());
    for predicate in &spec.predicates {
        match predicate {
            Predicate::Eq(column, value) => {
                parts.push(format!("{column} = ?"));
                args.push(value.clone());
            }
            Predicate::Contains(column, needle) => {
                parts.push(format!("{column} LIKE ? ESCAPE '\\'"));
                args.push(SqlValue::Text(format!("%{}%", escape_like(needle))));
            }
            Predicate::AtLeast(column, value) => {
                parts.push(format!("{column} >= ?"));
                args.push(value.clone());
            }
            Predicate::AtMost(column, value) => {
                parts.push(format!("{column} <= ?"));
                args.push(value.clone());
            }
        }
    }
    FilterClause {
        text: parts.join(" AND "),
        args,
    }
}
