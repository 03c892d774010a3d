//! Named symbol tables.

use crate::actions::ParseAction;
use crate::error::RegistrationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;

/// The four independent lookup namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerType {
    Character,
    Delimiter,
    Macro,
    Environment,
}

impl HandlerType {
    pub const ALL: [HandlerType; 4] = [
        HandlerType::Character,
        HandlerType::Delimiter,
        HandlerType::Macro,
        HandlerType::Environment,
    ];
}

#[derive(Debug, Clone)]
enum Entries {
    Table(HashMap<String, ParseAction>),
    /// Every symbol matching the (anchored) pattern maps to one action.
    Pattern(Regex, ParseAction),
}

impl PartialEq for Entries {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Entries::Table(a), Entries::Table(b)) => a == b,
            (Entries::Pattern(ra, a), Entries::Pattern(rb, b)) => ra.as_str() == rb.as_str() && a == b,
            _ => false,
        }
    }
}

/// A named mapping from symbols to parse actions.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMap {
    name: String,
    entries: Entries,
    /// Keys are written with their leading backslash (`\langle`) so the map
    /// can serve both delimiter arguments and macro lookups.
    delimiters: bool,
}

impl SymbolMap {
    pub fn table<'a>(name: &str, entries: impl IntoIterator<Item = (&'a str, ParseAction)>) -> Self {
        Self {
            name: name.to_string(),
            entries: Entries::Table(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            delimiters: false,
        }
    }

    /// A delimiter table; each key maps to the character it stands for.
    pub fn delimiters<'a>(name: &str, entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = Self::table(
            name,
            entries
                .into_iter()
                .map(|(k, text)| (k, ParseAction::delim(text))),
        );
        map.delimiters = true;
        map
    }

    /// A map matching every symbol that fully matches `pattern`.
    pub fn pattern(name: &str, pattern: &str, action: ParseAction) -> Result<Self, RegistrationError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            RegistrationError::InvalidPattern {
                map: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            name: name.to_string(),
            entries: Entries::Pattern(regex, action),
            delimiters: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_delimiter_map(&self) -> bool {
        self.delimiters
    }

    pub fn len(&self) -> usize {
        match &self.entries {
            Entries::Table(table) => table.len(),
            Entries::Pattern(..) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, symbol: &str) -> Option<&ParseAction> {
        match &self.entries {
            Entries::Table(table) => table.get(symbol),
            Entries::Pattern(regex, action) => regex.is_match(symbol).then_some(action),
        }
    }

    /// Looks up `symbol` as seen by `handler`: macro names arrive without
    /// their backslash, which delimiter maps store.
    pub fn lookup_for(&self, handler: HandlerType, symbol: &str) -> Option<&ParseAction> {
        let key = if self.delimiters && handler == HandlerType::Macro {
            Cow::Owned(format!("\\{symbol}"))
        } else {
            Cow::Borrowed(symbol)
        };
        self.lookup(&key)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_some()
    }

    /// Adds or replaces an entry of a table map.
    pub fn insert(&mut self, symbol: &str, action: ParseAction) {
        if let Entries::Table(table) = &mut self.entries {
            table.insert(symbol.to_string(), action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_anchored() {
        let map = SymbolMap::pattern("letter", "[a-zA-Z]", ParseAction::Variable).unwrap();
        assert_eq!(map.lookup("x"), Some(&ParseAction::Variable));
        assert_eq!(map.lookup("xy"), None);
        assert_eq!(map.lookup("1"), None);
    }

    #[test]
    fn test_delimiter_map_serves_macros() {
        let map = SymbolMap::delimiters("delims", [("(", "("), ("\\langle", "\u{27E8}")]);
        assert_eq!(
            map.lookup_for(HandlerType::Macro, "langle"),
            Some(&ParseAction::delim("\u{27E8}"))
        );
        assert_eq!(
            map.lookup_for(HandlerType::Delimiter, "\\langle"),
            Some(&ParseAction::delim("\u{27E8}"))
        );
        assert!(map.lookup_for(HandlerType::Macro, "(").is_none());
    }

    #[test]
    fn test_bad_pattern_is_a_registration_error() {
        let err = SymbolMap::pattern("broken", "[a-", ParseAction::Variable).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }
}
