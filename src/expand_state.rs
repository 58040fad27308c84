use std::collections::HashSet;

/// Tracks which nodes are collapsed, by path key.
///
/// A collapsed node keeps its subtree in the tree; it is only left out of the
/// visible set. Collapsed descendants keep their own state while an ancestor
/// is collapsed, so re-expanding restores the exact previous view.
#[derive(Debug, Default, Clone)]
pub struct CollapseState {
    collapsed: HashSet<String>,
}

impl CollapseState {
    pub fn collapse(&mut self, key: &str) {
        self.collapsed.insert(key.to_string());
    }

    pub fn expand(&mut self, key: &str) {
        self.collapsed.remove(key);
    }

    /// Flip the node's state. Returns true if it is now collapsed.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.collapsed.remove(key) {
            false
        } else {
            self.collapsed.insert(key.to_string());
            true
        }
    }

    pub fn is_collapsed(&self, key: &str) -> bool {
        self.collapsed.contains(key)
    }

    /// Expand this node and everything below it.
    pub fn expand_recursive(&mut self, key: &str) {
        let prefix = format!("{}/", key);
        self.collapsed
            .retain(|k| k != key && !k.starts_with(&prefix));
    }

    /// Reset all collapses.
    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }

    pub fn collapsed_count(&self) -> usize {
        self.collapsed.len()
    }
}
