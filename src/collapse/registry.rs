//! Operator-maintained set of collapse patterns
//!
//! Patterns only affect rendering. Captured records are always complete,
//! so adding a pattern later never loses data.

use super::pattern::CollapsePattern;
use super::PatternError;

/// Insertion-ordered set of [`CollapsePattern`]s
#[derive(Debug, Clone)]
pub struct CollapseRegistry {
    patterns: Vec<CollapsePattern>,
    case_sensitive: bool,
}

impl CollapseRegistry {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            patterns: Vec::new(),
            case_sensitive,
        }
    }

    /// Build a registry from persisted pattern text, skipping invalid entries
    ///
    /// The rejected patterns are returned alongside so the caller can
    /// report them.
    pub fn with_patterns<I, S>(case_sensitive: bool, patterns: I) -> (Self, Vec<PatternError>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new(case_sensitive);
        let mut rejected = Vec::new();
        for text in patterns {
            if let Err(e) = registry.add(text.as_ref()) {
                rejected.push(e);
            }
        }
        (registry, rejected)
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Insert `pattern` if absent. Returns whether it was newly added.
    ///
    /// Invalid patterns are rejected and leave the registry unchanged.
    pub fn add(&mut self, pattern: &str) -> Result<bool, PatternError> {
        let compiled = CollapsePattern::compile(pattern, self.case_sensitive)?;
        if self.position(compiled.as_str()).is_some() {
            return Ok(false);
        }
        tracing::debug!("Adding collapse pattern '{}'", compiled);
        self.patterns.push(compiled);
        Ok(true)
    }

    /// Remove `pattern` if present. Returns whether removal occurred.
    pub fn remove(&mut self, pattern: &str) -> bool {
        match self.position(pattern.trim()) {
            Some(index) => {
                self.patterns.remove(index);
                true
            }
            None => false,
        }
    }

    /// Index of the stored pattern equal to `text` under this registry's
    /// case rule
    fn position(&self, text: &str) -> Option<usize> {
        if self.case_sensitive {
            self.patterns.iter().position(|p| p.as_str() == text)
        } else {
            let folded = text.to_lowercase();
            self.patterns
                .iter()
                .position(|p| p.as_str().to_lowercase() == folded)
        }
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    /// Pattern texts in insertion order
    pub fn list(&self) -> Vec<&str> {
        self.patterns.iter().map(CollapsePattern::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if any registered pattern matches `url`
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(url))
    }
}

impl Default for CollapseRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adding_same_pattern_twice_should_keep_one_entry() {
        let mut registry = CollapseRegistry::default();
        assert!(registry.add("/v1/models").unwrap());
        assert!(!registry.add("/v1/models").unwrap());
        assert!(!registry.add(" /v1/models ").unwrap());
        assert_eq!(registry.list(), vec!["/v1/models"]);
    }

    #[test]
    fn removing_absent_pattern_should_report_not_found() {
        let mut registry = CollapseRegistry::default();
        registry.add("/a").unwrap();

        assert!(!registry.remove("/missing"));
        assert_eq!(registry.list(), vec!["/a"]);
        assert!(registry.remove("/a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_should_empty_the_set() {
        let mut registry = CollapseRegistry::default();
        registry.add("/a").unwrap();
        registry.add("/b/*").unwrap();

        registry.clear();
        assert!(registry.list().is_empty());
        assert!(!registry.matches("/a"));
    }

    #[test]
    fn list_should_preserve_insertion_order() {
        let mut registry = CollapseRegistry::default();
        for p in ["/z", "/a", "/m/*"] {
            registry.add(p).unwrap();
        }
        assert_eq!(registry.list(), vec!["/z", "/a", "/m/*"]);
    }

    #[test]
    fn invalid_pattern_should_leave_registry_unchanged() {
        let mut registry = CollapseRegistry::default();
        registry.add("/a").unwrap();

        assert!(registry.add("/broken[").is_err());
        assert_eq!(registry.list(), vec!["/a"]);
    }

    #[test]
    fn matches_should_consult_every_pattern() {
        let mut registry = CollapseRegistry::default();
        registry.add("*/a").unwrap();
        registry.add("/v1/users/*").unwrap();

        assert!(registry.matches("/a"));
        assert!(registry.matches("/v1/users/42"));
        assert!(!registry.matches("/b"));
    }

    #[test]
    fn with_patterns_should_skip_invalid_entries() {
        let (registry, rejected) =
            CollapseRegistry::with_patterns(false, ["/ok", "[bad", "", "/OK/*"]);
        assert_eq!(registry.list(), vec!["/ok", "/OK/*"]);
        assert_eq!(rejected.len(), 2);
        assert!(registry.matches("/ok/deeper"));
    }

    #[test]
    fn case_insensitive_registry_should_treat_case_variants_as_one() {
        let mut registry = CollapseRegistry::new(false);
        assert!(registry.add("/v1/*").unwrap());
        assert!(!registry.add("/V1/*").unwrap());
        assert_eq!(registry.list(), vec!["/v1/*"]);

        assert!(registry.remove("/V1/*"));
        assert!(registry.is_empty());
    }

    #[test]
    fn case_sensitive_registry_should_keep_case_variants_apart() {
        let mut registry = CollapseRegistry::default();
        assert!(registry.add("/v1/*").unwrap());
        assert!(registry.add("/V1/*").unwrap());
        assert!(!registry.remove("/v1/X"));
        assert_eq!(registry.len(), 2);
    }
}
