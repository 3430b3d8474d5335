/// Per-record validation and persistence errors
///
/// Keeps insertion order so merged errors read in the order they arose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorSet {
    entries: Vec<(String, String)>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.entries.push((attribute.into(), message.into()));
    }

    /// All messages recorded for an attribute
    pub fn get(&self, attribute: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(a, _)| a == attribute)
            .map(|(_, m)| m.as_str())
            .collect()
    }

    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a == attribute)
            .map(|(_, m)| m.as_str())
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.entries.iter().any(|(a, _)| a == attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, m)| (a.as_str(), m.as_str()))
    }

    /// Merge another record's errors under `{prefix}_{attribute}` keys
    ///
    /// A prefixed key that already carries an error is left alone, so only
    /// the first message per key survives.
    pub fn merge_prefixed(&mut self, prefix: &str, other: &ErrorSet) {
        for (attribute, message) in other.iter() {
            let key = format!("{}_{}", prefix, attribute);
            if !self.contains(&key) {
                self.add(key, message);
            }
        }
    }

    /// Render as `attribute message` lines
    pub fn full_messages(&self) -> Vec<String> {
        self.iter().map(|(a, m)| format!("{} {}", a, m)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefixed_renames_keys() {
        let mut version_errors = ErrorSet::new();
        version_errors.add("title", "should not contain letter x");

        let mut owner_errors = ErrorSet::new();
        owner_errors.merge_prefixed("version", &version_errors);

        assert_eq!(
            owner_errors.first("version_title"),
            Some("should not contain letter x")
        );
        assert!(!owner_errors.contains("title"));
    }

    #[test]
    fn test_merge_prefixed_suppresses_duplicate_keys() {
        let mut version_errors = ErrorSet::new();
        version_errors.add("title", "first");
        version_errors.add("title", "second");

        let mut owner_errors = ErrorSet::new();
        owner_errors.merge_prefixed("version", &version_errors);
        owner_errors.merge_prefixed("version", &version_errors);

        assert_eq!(owner_errors.get("version_title"), vec!["first"]);
    }

    #[test]
    fn test_full_messages() {
        let mut errors = ErrorSet::new();
        errors.add("base", "cannot be destroyed");
        assert_eq!(errors.full_messages(), vec!["base cannot be destroyed"]);
    }
}
