//! Domain suffix filter

/// Set of domain suffixes a hostname must fall under to be published
///
/// A hostname matches suffix `d` when it ends with `.d`, so `example.com`
/// matches `vm1.example.com` but neither `example.com` itself nor
/// `vm1.badexample.com`. An empty filter matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    suffixes: Vec<String>,
}

impl DomainFilter {
    /// Create a filter from suffixes as given on the command line
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes
                .into_iter()
                .map(|s| format!(".{}", s.into()))
                .collect(),
        }
    }

    /// Whether the hostname falls under at least one suffix
    pub fn matches(&self, domain: &str) -> bool {
        self.suffixes.iter().any(|suffix| domain.ends_with(suffix.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_subdomains_only() {
        let filter = DomainFilter::new(["example.com"]);
        assert!(filter.matches("vm1.example.com"));
        assert!(filter.matches("a.b.example.com"));
        assert!(!filter.matches("example.com"));
        assert!(!filter.matches("vm1.badexample.com"));
    }

    #[test]
    fn any_suffix_is_enough() {
        let filter = DomainFilter::new(["lab.local", "example.com"]);
        assert!(filter.matches("db.lab.local"));
        assert!(filter.matches("web.example.com"));
        assert!(!filter.matches("web.other.com"));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let filter = DomainFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.matches("vm1.example.com"));
    }
}
