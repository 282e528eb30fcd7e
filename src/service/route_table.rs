use crate::config::RouteRule;

/// Ordered set of forwarding rules with longest-prefix matching.
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Index of the longest matching rule for `path`, if any.
    pub fn match_index(&self, path: &str) -> Option<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| prefix_matches(&rule.prefix, path))
            .max_by_key(|(_, rule)| rule.prefix.len())
            .map(|(idx, _)| idx)
    }
}

/// Prefix match on a path-segment boundary: `/api/students` matches
/// `/api/students` and `/api/students/42` but not `/api/studentsX`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if !path.starts_with(prefix) {
        return false;
    }
    path.len() == prefix.len() || prefix.ends_with('/') || path.as_bytes()[prefix.len()] == b'/'
}
