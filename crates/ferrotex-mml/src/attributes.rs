//! Four-layer attribute resolution for tree nodes.
//!
//! ## Layers
//!
//! Every node owns an [`Attributes`] value. Lookups walk four layers in a
//! fixed order and stop at the first hit:
//!
//! 1. **explicit**: values set on the node itself (from markup or a parse action)
//! 2. **inherited**: values pushed down from ancestors by
//!    [`MmlNode::set_inherited_attributes`](crate::MmlNode::set_inherited_attributes)
//! 3. **default**: the static table for the node's [`NodeKind`]
//! 4. **global**: document-wide values shared read-only from the root
//!
//! The explicit slot may hold [`AttrValue::Inherit`], which skips straight to
//! the global layer.
//!
//! ## Examples
//!
//! ```
//! use ferrotex_mml::{Attributes, AttrValue, NodeKind};
//!
//! let mut attrs = Attributes::new(NodeKind::Mo);
//! assert_eq!(attrs.get("stretchy"), Some(&AttrValue::Bool(false))); // default
//! assert!(!attrs.is_set("stretchy"));
//!
//! attrs.set_inherited("stretchy", true);
//! assert!(attrs.is_set("stretchy"));
//!
//! attrs.set("stretchy", false);
//! assert_eq!(attrs.get_explicit("stretchy"), Some(&AttrValue::Bool(false)));
//! ```

use crate::node::NodeKind;
use once_cell::sync::Lazy;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Defer to the global layer, ignoring inherited and default values.
    Inherit,
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Str(s) if s == "true" => Some(true),
            AttrValue::Str(s) if s == "false" => Some(false),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            AttrValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, AttrValue::Inherit)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(n) => write!(f, "{n}"),
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Inherit => f.write_str("_inherit_"),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<i32> for AttrValue {
    fn from(n: i32) -> Self {
        AttrValue::Int(n.into())
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

/// Attribute map shared by a whole document.
pub type GlobalAttributes = Arc<BTreeMap<String, AttrValue>>;

/// Document-wide values used when no other layer supplies one.
pub fn global_defaults() -> GlobalAttributes {
    static GLOBALS: Lazy<GlobalAttributes> = Lazy::new(|| {
        let mut map = BTreeMap::new();
        map.insert("mathvariant".to_string(), AttrValue::from("normal"));
        map.insert("mathsize".to_string(), AttrValue::from("normal"));
        map.insert("dir".to_string(), AttrValue::from("ltr"));
        map.insert("displaystyle".to_string(), AttrValue::Bool(false));
        map.insert("scriptlevel".to_string(), AttrValue::Int(0));
        Arc::new(map)
    });
    GLOBALS.clone()
}

type DefaultTable = HashMap<NodeKind, BTreeMap<&'static str, AttrValue>>;

static DEFAULTS: Lazy<DefaultTable> = Lazy::new(|| {
    let mut table: DefaultTable = HashMap::new();
    let mut add = |kind: NodeKind, entries: &[(&'static str, AttrValue)]| {
        table.entry(kind).or_default().extend(entries.iter().cloned());
    };
    add(
        NodeKind::Mo,
        &[
            ("form", "infix".into()),
            ("fence", false.into()),
            ("separator", false.into()),
            ("stretchy", false.into()),
            ("symmetric", false.into()),
            ("largeop", false.into()),
            ("movablelimits", false.into()),
            ("accent", false.into()),
            ("lspace", "thickmathspace".into()),
            ("rspace", "thickmathspace".into()),
        ],
    );
    add(NodeKind::Mi, &[("mathvariant", "italic".into())]);
    add(
        NodeKind::Mfrac,
        &[
            ("linethickness", "medium".into()),
            ("numalign", "center".into()),
            ("denomalign", "center".into()),
            ("bevelled", false.into()),
        ],
    );
    add(
        NodeKind::Mspace,
        &[
            ("width", "0em".into()),
            ("height", "0ex".into()),
            ("depth", "0ex".into()),
        ],
    );
    add(
        NodeKind::Mtable,
        &[
            ("align", "axis".into()),
            ("rowalign", "baseline".into()),
            ("columnalign", "center".into()),
            ("columnspacing", "0.8em".into()),
            ("rowspacing", "1.0ex".into()),
            ("frame", "none".into()),
            ("side", "right".into()),
            ("minlabelspacing", "0.8em".into()),
        ],
    );
    add(NodeKind::Mover, &[("accent", false.into())]);
    add(NodeKind::Munder, &[("accentunder", false.into())]);
    add(
        NodeKind::Munderover,
        &[("accent", false.into()), ("accentunder", false.into())],
    );
    add(NodeKind::Menclose, &[("notation", "longdiv".into())]);
    add(
        NodeKind::Mpadded,
        &[
            ("width", "".into()),
            ("height", "".into()),
            ("depth", "".into()),
            ("lspace", "0".into()),
            ("voffset", "0".into()),
        ],
    );
    table
});

const DERIVED: [&str; 2] = ["displaystyle", "scriptlevel"];

/// Attributes of one node, resolved through four layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    kind: NodeKind,
    explicit: BTreeMap<String, AttrValue>,
    inherited: BTreeMap<String, AttrValue>,
    global: GlobalAttributes,
}

impl Attributes {
    /// Creates an empty attribute set for a node of the given kind, sharing the
    /// process-wide global defaults.
    pub fn new(kind: NodeKind) -> Self {
        Self::with_global(kind, global_defaults())
    }

    pub fn with_global(kind: NodeKind, global: GlobalAttributes) -> Self {
        Self {
            kind,
            explicit: BTreeMap::new(),
            inherited: BTreeMap::new(),
            global,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Switches the default layer to another kind, keeping every set value.
    pub(crate) fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.explicit.insert(name.into(), value.into());
    }

    pub fn set_inherited(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.inherited.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) -> Option<AttrValue> {
        self.explicit.remove(name)
    }

    pub fn set_global(&mut self, global: GlobalAttributes) {
        self.global = global;
    }

    /// Resolves `name` through explicit, inherited, default and global values.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        match self.explicit.get(name) {
            Some(AttrValue::Inherit) => self.global.get(name),
            Some(value) => Some(value),
            None => self
                .inherited
                .get(name)
                .or_else(|| self.get_default(name)),
        }
    }

    pub fn get_explicit(&self, name: &str) -> Option<&AttrValue> {
        self.explicit.get(name)
    }

    pub fn get_inherited(&self, name: &str) -> Option<&AttrValue> {
        self.inherited.get(name)
    }

    /// The kind default, falling back to the global layer.
    pub fn get_default(&self, name: &str) -> Option<&AttrValue> {
        DEFAULTS
            .get(&self.kind)
            .and_then(|table| table.get(name))
            .or_else(|| self.global.get(name))
    }

    pub fn get_list(&self, names: &[&str]) -> Vec<Option<&AttrValue>> {
        names.iter().map(|name| self.get(name)).collect()
    }

    /// True when the value comes from the node or an ancestor, not a default.
    pub fn is_set(&self, name: &str) -> bool {
        self.explicit.contains_key(name) || self.inherited.contains_key(name)
    }

    pub fn explicit_names(&self) -> impl Iterator<Item = &str> {
        self.explicit.keys().map(String::as_str)
    }

    pub fn explicit(&self) -> &BTreeMap<String, AttrValue> {
        &self.explicit
    }

    pub fn inherited(&self) -> &BTreeMap<String, AttrValue> {
        &self.inherited
    }

    pub(crate) fn clear_inherited(&mut self) {
        self.inherited.clear();
    }

    /// Explicit and inherited values merged, explicit winning. This is what
    /// serializers emit. Display mode and script level are recomputed for
    /// every node, so they only appear when set explicitly.
    pub fn set_values(&self) -> BTreeMap<&str, &AttrValue> {
        let mut values: BTreeMap<&str, &AttrValue> = self
            .inherited
            .iter()
            .filter(|(k, _)| !DERIVED.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        for (k, v) in &self.explicit {
            if !v.is_inherit() {
                values.insert(k.as_str(), v);
            }
        }
        values
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let values = self.set_values();
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (k, v) in values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_order() {
        let mut attrs = Attributes::new(NodeKind::Mi);
        assert_eq!(attrs.get("mathvariant"), Some(&AttrValue::from("italic")));

        attrs.set_inherited("mathvariant", "bold");
        assert_eq!(attrs.get("mathvariant"), Some(&AttrValue::from("bold")));

        attrs.set("mathvariant", "normal");
        assert_eq!(attrs.get("mathvariant"), Some(&AttrValue::from("normal")));

        attrs.unset("mathvariant");
        assert_eq!(attrs.get("mathvariant"), Some(&AttrValue::from("bold")));
    }

    #[test]
    fn test_inherit_sentinel_skips_to_global() {
        let mut attrs = Attributes::new(NodeKind::Mi);
        attrs.set_inherited("mathvariant", "bold");
        attrs.set("mathvariant", AttrValue::Inherit);
        assert_eq!(attrs.get("mathvariant"), Some(&AttrValue::from("normal")));
    }

    #[test]
    fn test_global_fallback() {
        let attrs = Attributes::new(NodeKind::Mrow);
        assert_eq!(attrs.get("dir"), Some(&AttrValue::from("ltr")));
        assert_eq!(attrs.get("nonexistent"), None);
    }

    #[test]
    fn test_is_set_excludes_defaults() {
        let mut attrs = Attributes::new(NodeKind::Mo);
        assert!(attrs.get("fence").is_some());
        assert!(!attrs.is_set("fence"));
        attrs.set("fence", true);
        assert!(attrs.is_set("fence"));
    }

    #[test]
    fn test_get_list() {
        let mut attrs = Attributes::new(NodeKind::Mfrac);
        attrs.set("linethickness", "0");
        let values = attrs.get_list(&["linethickness", "bevelled", "missing"]);
        assert_eq!(values[0], Some(&AttrValue::from("0")));
        assert_eq!(values[1], Some(&AttrValue::Bool(false)));
        assert_eq!(values[2], None);
    }

    #[test]
    fn test_value_coercions() {
        assert_eq!(AttrValue::from("true").as_bool(), Some(true));
        assert_eq!(AttrValue::from("3").as_int(), Some(3));
        assert_eq!(AttrValue::Int(2).to_string(), "2");
        assert_eq!(AttrValue::Bool(true).as_str(), None);
    }

    #[test]
    fn test_serialization_skips_defaults() {
        let mut attrs = Attributes::new(NodeKind::Mo);
        attrs.set("stretchy", true);
        attrs.set_inherited("mathsize", "big");
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"mathsize":"big","stretchy":true}"#);
    }
}
