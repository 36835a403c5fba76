use std::collections::BTreeMap;

use crate::{Result, StoryError};

/// Integer variables of one playback session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    values: BTreeMap<String, i64>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `name`. Fails if the variable was never set; check with
    /// [`VariableStore::has`] first.
    pub fn get(&self, name: &str) -> Result<i64> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| StoryError::UndefinedVariable(name.to_string()))
    }

    /// Inserts or overwrites `name`.
    pub fn set(&mut self, name: impl Into<String>, value: i64) {
        self.values.insert(name.into(), value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) {
        self.values.remove(name);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_and_get_reads_back() {
        let mut store = VariableStore::new();
        store.set("x", 1);
        store.set("x", 4);

        assert!(store.has("x"));
        assert_eq!(store.get("x").unwrap(), 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let store = VariableStore::new();

        assert!(!store.has("ghost"));
        let err = store.get("ghost").unwrap_err();
        assert!(matches!(err, StoryError::UndefinedVariable(name) if name == "ghost"));
    }

    #[test]
    fn remove_and_clear() {
        let mut store = VariableStore::new();
        store.set("a", 1);
        store.set("b", 2);

        store.remove("a");
        assert!(!store.has("a"));
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![("b", 2)]);

        store.clear();
        assert!(store.is_empty());
    }
}
