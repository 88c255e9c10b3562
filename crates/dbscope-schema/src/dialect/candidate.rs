//! Query candidates tried in order for one facet

use dbscope_core::Value;

/// A named positional argument.
///
/// Arguments bind to `$1`, `$2`... or to successive `?` markers, in the
/// order they were added.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryArg {
    pub name: &'static str,
    pub value: Value,
}

/// One SQL text with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCandidate {
    sql: String,
    args: Vec<QueryArg>,
}

impl QueryCandidate {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn bind(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.args.push(QueryArg {
            name,
            value: value.into(),
        });
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn args(&self) -> &[QueryArg] {
        &self.args
    }

    /// Argument values in binding order
    pub fn values(&self) -> Vec<Value> {
        self.args.iter().map(|arg| arg.value.clone()).collect()
    }

    /// Single-line SQL for log output
    pub fn preview(&self) -> String {
        self.sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Ordered candidates, most precise first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateList(Vec<QueryCandidate>);

impl CandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: QueryCandidate) {
        self.0.push(candidate);
    }

    /// Append every candidate of `other` after the existing ones
    pub fn chain(mut self, other: CandidateList) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryCandidate> {
        self.0.iter()
    }
}

impl FromIterator<QueryCandidate> for CandidateList {
    fn from_iter<I: IntoIterator<Item = QueryCandidate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for CandidateList {
    type Item = QueryCandidate;
    type IntoIter = std::vec::IntoIter<QueryCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a QueryCandidate;
    type IntoIter = std::slice::Iter<'a, QueryCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<QueryCandidate>> for CandidateList {
    fn from(candidates: Vec<QueryCandidate>) -> Self {
        Self(candidates)
    }
}
