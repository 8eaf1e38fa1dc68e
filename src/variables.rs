//! Variable group bindings
//!
//! Regex descriptions can capture groups into named variables
//! (`/^NP-(\d+)$/#1%index`). Every occurrence of a variable within one match
//! must capture the same string. Bindings live on a single stack; a matcher
//! takes a [`Checkpoint`] before committing its groups and rolls back to it
//! when the search backtracks past that node.

/// Position in the binding stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

/// Stack of variable bindings with checkpoint/rollback
#[derive(Debug, Clone, Default)]
pub struct VariableStrings {
    bindings: Vec<(String, String)>,
}

impl VariableStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a variable (the most recent binding)
    pub fn get(&self, var: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(name, _)| name == var)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_set(&self, var: &str) -> bool {
        self.get(var).is_some()
    }

    /// Bind a variable. A variable may be bound several times to the same
    /// value; each binding is undone separately.
    pub fn set(&mut self, var: &str, value: &str) {
        self.bindings.push((var.to_string(), value.to_string()));
    }

    /// Remove the most recent binding of a variable
    pub fn unset(&mut self, var: &str) {
        if let Some(pos) = self.bindings.iter().rposition(|(name, _)| name == var) {
            self.bindings.remove(pos);
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.bindings.len())
    }

    /// Drop every binding made since `checkpoint`
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        if self.bindings.len() > checkpoint.0 {
            self.bindings.truncate(checkpoint.0);
        }
    }

    /// Clear all bindings
    pub fn reset(&mut self) {
        self.bindings.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Distinct bound variables with their current values, in binding order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(i, (name, _))| !self.bindings[..*i].iter().any(|(n, _)| n == name))
            .map(|(_, (name, _))| (name.as_str(), self.get(name).unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_unset() {
        let mut vars = VariableStrings::new();
        assert_eq!(vars.get("x"), None);

        vars.set("x", "1");
        vars.set("y", "2");
        assert_eq!(vars.get("x"), Some("1"));
        assert!(vars.is_set("y"));

        vars.unset("x");
        assert_eq!(vars.get("x"), None);
        assert_eq!(vars.get("y"), Some("2"));

        vars.reset();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_checkpoint_rollback() {
        let mut vars = VariableStrings::new();
        vars.set("idx", "3");

        let mark = vars.checkpoint();
        vars.set("idx", "3");
        vars.set("other", "a");
        assert_eq!(vars.get("other"), Some("a"));

        vars.rollback(mark);
        assert_eq!(vars.get("idx"), Some("3"));
        assert_eq!(vars.get("other"), None);

        // Rolling back to a later checkpoint after an outer rollback is a no-op
        let late = Checkpoint(10);
        vars.rollback(late);
        assert_eq!(vars.get("idx"), Some("3"));
    }

    #[test]
    fn test_iter_reports_each_variable_once() {
        let mut vars = VariableStrings::new();
        vars.set("a", "1");
        vars.set("b", "2");
        vars.set("a", "1");
        let all: Vec<_> = vars.iter().collect();
        assert_eq!(all, vec![("a", "1"), ("b", "2")]);
    }
}
