use crate::attributes::{AttrValue, Attributes, GlobalAttributes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The kind of a tree node. Mirrors the MathML element names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Math,
    Mrow,
    Mi,
    Mo,
    Mn,
    Mtext,
    Mspace,
    Ms,
    Mfrac,
    Msqrt,
    Mroot,
    Mstyle,
    Merror,
    Mpadded,
    Mphantom,
    Msub,
    Msup,
    Msubsup,
    Munder,
    Mover,
    Munderover,
    Mtable,
    Mtr,
    Mlabeledtr,
    Mtd,
    Menclose,
    /// An `mrow` carrying a TeX spacing class. Serialized as `mrow`.
    #[serde(rename = "TeXAtom")]
    TeXAtom,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Math => "math",
            NodeKind::Mrow => "mrow",
            NodeKind::Mi => "mi",
            NodeKind::Mo => "mo",
            NodeKind::Mn => "mn",
            NodeKind::Mtext => "mtext",
            NodeKind::Mspace => "mspace",
            NodeKind::Ms => "ms",
            NodeKind::Mfrac => "mfrac",
            NodeKind::Msqrt => "msqrt",
            NodeKind::Mroot => "mroot",
            NodeKind::Mstyle => "mstyle",
            NodeKind::Merror => "merror",
            NodeKind::Mpadded => "mpadded",
            NodeKind::Mphantom => "mphantom",
            NodeKind::Msub => "msub",
            NodeKind::Msup => "msup",
            NodeKind::Msubsup => "msubsup",
            NodeKind::Munder => "munder",
            NodeKind::Mover => "mover",
            NodeKind::Munderover => "munderover",
            NodeKind::Mtable => "mtable",
            NodeKind::Mtr => "mtr",
            NodeKind::Mlabeledtr => "mlabeledtr",
            NodeKind::Mtd => "mtd",
            NodeKind::Menclose => "menclose",
            NodeKind::TeXAtom => "TeXAtom",
        }
    }

    /// Token elements hold text rather than children.
    pub fn is_token(self) -> bool {
        matches!(
            self,
            NodeKind::Mi | NodeKind::Mo | NodeKind::Mn | NodeKind::Mtext | NodeKind::Ms
        )
    }

    /// Script-like elements whose first child is the base.
    pub fn is_script(self) -> bool {
        matches!(
            self,
            NodeKind::Msub
                | NodeKind::Msup
                | NodeKind::Msubsup
                | NodeKind::Munder
                | NodeKind::Mover
                | NodeKind::Munderover
        )
    }

    /// Child index of the subscript/underscript slot.
    pub fn sub_index(self) -> Option<usize> {
        match self {
            NodeKind::Msub | NodeKind::Msubsup | NodeKind::Munder | NodeKind::Munderover => {
                Some(1)
            }
            _ => None,
        }
    }

    /// Child index of the superscript/overscript slot.
    pub fn sup_index(self) -> Option<usize> {
        match self {
            NodeKind::Msup | NodeKind::Mover => Some(1),
            NodeKind::Msubsup | NodeKind::Munderover => Some(2),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown node kind '{}'", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for NodeKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [NodeKind; 27] = [
            NodeKind::Math,
            NodeKind::Mrow,
            NodeKind::Mi,
            NodeKind::Mo,
            NodeKind::Mn,
            NodeKind::Mtext,
            NodeKind::Mspace,
            NodeKind::Ms,
            NodeKind::Mfrac,
            NodeKind::Msqrt,
            NodeKind::Mroot,
            NodeKind::Mstyle,
            NodeKind::Merror,
            NodeKind::Mpadded,
            NodeKind::Mphantom,
            NodeKind::Msub,
            NodeKind::Msup,
            NodeKind::Msubsup,
            NodeKind::Munder,
            NodeKind::Mover,
            NodeKind::Munderover,
            NodeKind::Mtable,
            NodeKind::Mtr,
            NodeKind::Mlabeledtr,
            NodeKind::Mtd,
            NodeKind::Menclose,
            NodeKind::TeXAtom,
        ];
        ALL.into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// TeX spacing class of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TexClass {
    Ord,
    Op,
    Bin,
    Rel,
    Open,
    Close,
    Punct,
    Inner,
    Vcenter,
    None,
}

impl TexClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TexClass::Ord => "ORD",
            TexClass::Op => "OP",
            TexClass::Bin => "BIN",
            TexClass::Rel => "REL",
            TexClass::Open => "OPEN",
            TexClass::Close => "CLOSE",
            TexClass::Punct => "PUNCT",
            TexClass::Inner => "INNER",
            TexClass::Vcenter => "VCENTER",
            TexClass::None => "NONE",
        }
    }
}

/// A node of the expression tree.
///
/// Token kinds carry `text`; every other kind carries `children`. Parser-only
/// bookkeeping lives in `properties` and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MmlNode {
    pub kind: NodeKind,
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MmlNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "texClass", skip_serializing_if = "Option::is_none")]
    pub tex_class: Option<TexClass>,
    #[serde(skip)]
    pub properties: BTreeMap<String, AttrValue>,
}

impl MmlNode {
    pub fn new(kind: NodeKind, children: Vec<MmlNode>) -> Self {
        Self {
            kind,
            attributes: Attributes::new(kind),
            children,
            text: None,
            tex_class: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn token(kind: NodeKind, text: impl Into<String>) -> Self {
        let mut node = Self::new(kind, Vec::new());
        node.text = Some(text.into());
        node
    }

    pub fn is_kind(&self, kind: NodeKind) -> bool {
        self.kind == kind
    }

    pub fn is_token(&self) -> bool {
        self.kind.is_token()
    }

    /// Changes the node's kind in place, e.g. `msubsup` to `msup` once a
    /// script slot turns out to be empty.
    pub fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
        self.attributes.set_kind(kind);
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.set(name, value);
        self
    }

    pub fn with_class(mut self, class: TexClass) -> Self {
        self.tex_class = Some(class);
        self
    }

    pub fn property(&self, name: &str) -> Option<&AttrValue> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.properties.insert(name.to_string(), value.into());
    }

    pub fn remove_property(&mut self, name: &str) -> Option<AttrValue> {
        self.properties.remove(name)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.property(name).and_then(AttrValue::as_bool).unwrap_or(false)
    }

    /// Collapses a single-child `mrow` into its child.
    pub fn unwrap_row(self) -> MmlNode {
        if self.kind == NodeKind::Mrow
            && self.children.len() == 1
            && self.attributes.explicit().is_empty()
        {
            self.children.into_iter().next().unwrap_or_else(|| MmlNode::new(NodeKind::Mrow, vec![]))
        } else {
            self
        }
    }

    /// Finds the operator at the core of an embellished operator, if any.
    pub fn core_mo(&self) -> Option<&MmlNode> {
        match self.kind {
            NodeKind::Mo => Some(self),
            NodeKind::TeXAtom | NodeKind::Mrow | NodeKind::Mstyle if self.children.len() == 1 => {
                self.children[0].core_mo()
            }
            k if k.is_script() => self.children.first().and_then(MmlNode::core_mo),
            _ => None,
        }
    }

    /// The effective TeX class: explicit class, else the class of an
    /// embellished operator's core, else by kind.
    pub fn effective_class(&self) -> TexClass {
        if let Some(class) = self.tex_class {
            return class;
        }
        match self.kind {
            k if k.is_script() => self
                .children
                .first()
                .map(MmlNode::effective_class)
                .unwrap_or(TexClass::Ord),
            _ => TexClass::Ord,
        }
    }

    /// Replaces the global layer for this node and all descendants.
    pub fn set_global(&mut self, global: &GlobalAttributes) {
        self.attributes.set_global(global.clone());
        for child in &mut self.children {
            child.set_global(global);
        }
    }

    /// Visits every node depth-first, parents before children.
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut MmlNode)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    pub fn walk(&self, f: &mut dyn FnMut(&MmlNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Second pass over a finished tree: pushes `mstyle` settings, display
    /// mode and script level down to every descendant.
    ///
    /// Values already set explicitly on a node are never overwritten.
    pub fn set_inherited_attributes(
        &mut self,
        inherited: &BTreeMap<String, AttrValue>,
        display: bool,
        level: i64,
    ) {
        self.attributes.clear_inherited();
        for (name, value) in inherited {
            if self.attributes.get_explicit(name).is_none() {
                self.attributes.set_inherited(name.clone(), value.clone());
            }
        }
        if self.attributes.get_explicit("displaystyle").is_none() {
            self.attributes.set_inherited("displaystyle", display);
        }
        if self.attributes.get_explicit("scriptlevel").is_none() {
            self.attributes.set_inherited("scriptlevel", level);
        }

        let display = self
            .attributes
            .get_explicit("displaystyle")
            .and_then(AttrValue::as_bool)
            .unwrap_or(display);
        let level = match self.attributes.get_explicit("scriptlevel") {
            Some(AttrValue::Str(s)) if s.starts_with('+') || s.starts_with('-') => {
                level + s.trim_start_matches('+').parse::<i64>().unwrap_or(0)
            }
            Some(value) => value.as_int().unwrap_or(level),
            None => level,
        };

        let mut passed = inherited.clone();
        if self.kind == NodeKind::Mstyle {
            for (name, value) in self.attributes.explicit() {
                if name != "displaystyle" && name != "scriptlevel" && !value.is_inherit() {
                    passed.insert(name.clone(), value.clone());
                }
            }
        }

        let kind = self.kind;
        let accent = self.attributes_accent();
        let table_display = self
            .attributes
            .get_explicit("displaystyle")
            .and_then(AttrValue::as_bool)
            .unwrap_or(false);
        for (i, child) in self.children.iter_mut().enumerate() {
            let (child_display, child_level) = match kind {
                NodeKind::Mfrac => (false, if display { level } else { level + 1 }),
                NodeKind::Mroot if i == 1 => (false, level + 2),
                k if k.is_script() && i > 0 => {
                    let over = (i == 1 && k == NodeKind::Mover)
                        || (i == 2 && k == NodeKind::Munderover);
                    if over && accent {
                        (display, level)
                    } else {
                        (false, level + 1)
                    }
                }
                NodeKind::Mtable => (table_display, level),
                _ => (display, level),
            };
            child.set_inherited_attributes(&passed, child_display, child_level);
        }
    }

    fn attributes_accent(&self) -> bool {
        self.attributes
            .get("accent")
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }
}
