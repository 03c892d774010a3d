//! User macro and environment definitions with TeX grouping.
//!
//! Definitions made by `\newcommand`, `\def` and friends live in a
//! [`MacroScope`]. `\begingroup` opens a group; every definition made inside
//! it is rolled back at the matching `\endgroup`:
//!
//! ```
//! use ferrotex_texmath::scope::MacroScope;
//! use ferrotex_texmath::ParseAction;
//!
//! let mut scope = MacroScope::default();
//! scope.define_macro("x", ParseAction::macro_body("a", 0));
//! scope.begin_group();
//! scope.define_macro("x", ParseAction::macro_body("b", 0));
//! scope.end_group().unwrap();
//! assert_eq!(scope.lookup_macro("x"), Some(&ParseAction::macro_body("a", 0)));
//! ```
//!
//! Definitions persist across expressions of one document. Because a parse
//! may be abandoned half-way for a retry, the compiler takes a
//! [`ScopeCheckpoint`] before each attempt and rolls back to it when the
//! attempt does not finish.

use crate::actions::ParseAction;
use crate::error::{TexError, TexErrorId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Macro(String),
    Environment(String),
}

#[derive(Debug, Clone)]
enum EndOfGroup {
    Revert(ParseAction),
    Delete,
}

/// Grouped definition tables.
#[derive(Debug, Clone, Default)]
pub struct MacroScope {
    definitions: HashMap<Key, ParseAction>,
    // The global level is not on this stack; it needs no cleanup.
    groups: Vec<HashMap<Key, EndOfGroup>>,
}

/// Saved state of a [`MacroScope`].
#[derive(Debug, Clone)]
pub struct ScopeCheckpoint(MacroScope);

impl MacroScope {
    pub fn begin_group(&mut self) {
        self.groups.push(HashMap::new());
    }

    /// Ends the innermost group, undoing its definitions.
    pub fn end_group(&mut self) -> Result<(), TexError> {
        let Some(group) = self.groups.pop() else {
            return Err(TexError::new(
                TexErrorId::ExtraEndGroup,
                "Extra \\endgroup",
            )
            .with_context("\\endgroup"));
        };
        for (key, action) in group {
            match action {
                EndOfGroup::Revert(old) => {
                    self.definitions.insert(key, old);
                }
                EndOfGroup::Delete => {
                    self.definitions.remove(&key);
                }
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.groups.len()
    }

    fn insert(&mut self, key: Key, action: ParseAction) {
        let old = self.definitions.insert(key.clone(), action);
        if let Some(group) = self.groups.last_mut() {
            if let Entry::Vacant(entry) = group.entry(key) {
                entry.insert(match old {
                    Some(old) => EndOfGroup::Revert(old),
                    None => EndOfGroup::Delete,
                });
            }
        }
    }

    fn insert_global(&mut self, key: Key, action: ParseAction) {
        for group in &mut self.groups {
            group.remove(&key);
        }
        self.definitions.insert(key, action);
    }

    pub fn define_macro(&mut self, name: &str, action: ParseAction) {
        log::debug!("defining \\{} at group depth {}", name, self.depth());
        self.insert(Key::Macro(name.to_string()), action);
    }

    /// Defines a macro at the global level, surviving every open group.
    pub fn define_macro_global(&mut self, name: &str, action: ParseAction) {
        self.insert_global(Key::Macro(name.to_string()), action);
    }

    pub fn define_environment(&mut self, name: &str, action: ParseAction) {
        log::debug!("defining environment {} at group depth {}", name, self.depth());
        self.insert(Key::Environment(name.to_string()), action);
    }

    pub fn lookup_macro(&self, name: &str) -> Option<&ParseAction> {
        self.definitions.get(&Key::Macro(name.to_string()))
    }

    pub fn lookup_environment(&self, name: &str) -> Option<&ParseAction> {
        self.definitions.get(&Key::Environment(name.to_string()))
    }

    pub fn checkpoint(&self) -> ScopeCheckpoint {
        ScopeCheckpoint(self.clone())
    }

    pub fn rollback(&mut self, checkpoint: ScopeCheckpoint) {
        log::debug!(
            "rolling macro scope back to group depth {}",
            checkpoint.0.depth()
        );
        *self = checkpoint.0;
    }

    /// Forgets every definition and group.
    pub fn clear(&mut self) {
        self.definitions.clear();
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &str) -> ParseAction {
        ParseAction::macro_body(text, 0)
    }

    #[test]
    fn test_group_deletes_new_definitions() {
        let mut scope = MacroScope::default();
        scope.begin_group();
        scope.define_macro("foo", body("x"));
        scope.define_environment("bar", ParseAction::UnknownEnv);
        assert!(scope.lookup_macro("foo").is_some());
        scope.end_group().unwrap();
        assert!(scope.lookup_macro("foo").is_none());
        assert!(scope.lookup_environment("bar").is_none());
    }

    #[test]
    fn test_first_value_in_group_is_restored() {
        let mut scope = MacroScope::default();
        scope.define_macro("foo", body("1"));
        scope.begin_group();
        scope.define_macro("foo", body("2"));
        scope.define_macro("foo", body("3"));
        scope.end_group().unwrap();
        assert_eq!(scope.lookup_macro("foo"), Some(&body("1")));
    }

    #[test]
    fn test_global_definition_survives_groups() {
        let mut scope = MacroScope::default();
        scope.begin_group();
        scope.begin_group();
        scope.define_macro_global("g", body("y"));
        scope.end_group().unwrap();
        scope.end_group().unwrap();
        assert_eq!(scope.lookup_macro("g"), Some(&body("y")));
    }

    #[test]
    fn test_extra_endgroup() {
        let mut scope = MacroScope::default();
        let err = scope.end_group().unwrap_err();
        assert_eq!(err.id, TexErrorId::ExtraEndGroup);
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let mut scope = MacroScope::default();
        scope.define_macro("kept", body("k"));
        let checkpoint = scope.checkpoint();
        scope.begin_group();
        scope.define_macro("temp", body("t"));
        scope.define_macro_global("leaked", body("l"));
        scope.rollback(checkpoint);
        assert_eq!(scope.depth(), 0);
        assert!(scope.lookup_macro("temp").is_none());
        assert!(scope.lookup_macro("leaked").is_none());
        assert!(scope.lookup_macro("kept").is_some());
    }
}
