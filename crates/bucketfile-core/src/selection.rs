//! Multi-item selection state.

use indexmap::IndexSet;

/// Keys (files or folder prefixes) picked for a bulk action.
///
/// Selection only has meaning while select mode is on. Entering or leaving
/// the mode always starts from an empty set.
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    active: bool,
    selected: IndexSet<String>,
}

impl SelectionModel {
    /// Create an inactive, empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if select mode is on.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Turn select mode on with an empty set.
    pub fn enter_mode(&mut self) {
        self.active = true;
        self.selected.clear();
    }

    /// Turn select mode off, dropping the selection.
    pub fn exit_mode(&mut self) {
        self.active = false;
        self.selected.clear();
    }

    /// Flip select mode.
    pub fn toggle_mode(&mut self) {
        if self.active {
            self.exit_mode();
        } else {
            self.enter_mode();
        }
    }

    /// Flip one key. Returns whether the key is selected afterwards.
    ///
    /// Ignored outside select mode.
    pub fn toggle(&mut self, key: &str) -> bool {
        if !self.active {
            return false;
        }
        if self.selected.shift_remove(key) {
            false
        } else {
            self.selected.insert(key.to_string());
            true
        }
    }

    /// Replace the selection with `keys`. Ignored outside select mode.
    pub fn select_all<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.active {
            return;
        }
        self.selected = keys.into_iter().map(Into::into).collect();
    }

    /// Drop every selected key, staying in the current mode.
    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Check if a key is selected.
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.contains(key)
    }

    /// Number of selected keys.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected keys in selection order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Copy of the selected keys.
    pub fn to_vec(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }
}
