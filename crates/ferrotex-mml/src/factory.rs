//! Node construction seam between the parser and the tree implementation.
//!
//! The parser never builds [`MmlNode`]s directly; it goes through a
//! [`NodeFactory`] injected by the host. [`DefaultNodeFactory`] builds the
//! tree types of this crate and supports per-kind [`NodeHook`]s that packages
//! install to adjust freshly created nodes.

use crate::attributes::{AttrValue, GlobalAttributes, global_defaults};
use crate::node::{MmlNode, NodeKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Attribute list accepted by the factory, in source order.
pub type AttributeList = Vec<(String, AttrValue)>;

/// Callback run on every node of a given kind right after creation.
pub type NodeHook = Arc<dyn Fn(&mut MmlNode) + Send + Sync>;

/// Creates tree nodes for the parser.
pub trait NodeFactory: Send + Sync {
    /// Creates a container node.
    fn create(&self, kind: NodeKind, attributes: AttributeList, children: Vec<MmlNode>) -> MmlNode;

    /// Creates a token node holding `text`.
    fn create_token(&self, kind: NodeKind, attributes: AttributeList, text: &str) -> MmlNode;

    /// The global attribute layer shared by nodes from this factory.
    fn global(&self) -> GlobalAttributes;
}

/// Builds [`MmlNode`] trees, running registered hooks on each new node.
#[derive(Clone)]
pub struct DefaultNodeFactory {
    global: GlobalAttributes,
    hooks: HashMap<NodeKind, Vec<NodeHook>>,
}

impl fmt::Debug for DefaultNodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultNodeFactory")
            .field("global", &self.global)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for DefaultNodeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultNodeFactory {
    pub fn new() -> Self {
        Self {
            global: global_defaults(),
            hooks: HashMap::new(),
        }
    }

    pub fn with_global(global: GlobalAttributes) -> Self {
        Self {
            global,
            hooks: HashMap::new(),
        }
    }

    /// Registers a hook; hooks for one kind run in registration order.
    pub fn add_hook(&mut self, kind: NodeKind, hook: NodeHook) {
        log::debug!("registering node hook for <{}>", kind);
        self.hooks.entry(kind).or_default().push(hook);
    }

    fn finish(&self, mut node: MmlNode) -> MmlNode {
        node.attributes.set_global(self.global.clone());
        if let Some(hooks) = self.hooks.get(&node.kind) {
            for hook in hooks {
                hook(&mut node);
            }
        }
        node
    }
}

impl NodeFactory for DefaultNodeFactory {
    fn create(&self, kind: NodeKind, attributes: AttributeList, children: Vec<MmlNode>) -> MmlNode {
        let mut node = MmlNode::new(kind, children);
        for (name, value) in attributes {
            node.attributes.set(name, value);
        }
        self.finish(node)
    }

    fn create_token(&self, kind: NodeKind, attributes: AttributeList, text: &str) -> MmlNode {
        let mut node = MmlNode::token(kind, text);
        for (name, value) in attributes {
            node.attributes.set(name, value);
        }
        self.finish(node)
    }

    fn global(&self) -> GlobalAttributes {
        self.global.clone()
    }
}

/// Shorthand for building an [`AttributeList`] entry.
pub fn attr(name: &str, value: impl Into<AttrValue>) -> (String, AttrValue) {
    (name.to_string(), value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_create_sets_explicit_attributes() {
        let factory = DefaultNodeFactory::new();
        let node = factory.create_token(NodeKind::Mo, vec![attr("stretchy", true)], "(");
        assert_eq!(node.text(), "(");
        assert!(node.attributes.is_set("stretchy"));
    }

    #[test]
    fn test_hooks_run_per_kind() {
        let mut factory = DefaultNodeFactory::new();
        factory.add_hook(
            NodeKind::Mi,
            Arc::new(|node: &mut MmlNode| node.attributes.set("data-hooked", true)),
        );
        let mi = factory.create_token(NodeKind::Mi, vec![], "x");
        let mn = factory.create_token(NodeKind::Mn, vec![], "1");
        assert!(mi.attributes.is_set("data-hooked"));
        assert!(!mn.attributes.is_set("data-hooked"));
    }

    #[test]
    fn test_custom_global_layer() {
        let mut globals = BTreeMap::new();
        globals.insert("mathsize".to_string(), AttrValue::from("big"));
        let factory = DefaultNodeFactory::with_global(Arc::new(globals));
        let row = factory.create(NodeKind::Mrow, vec![], vec![]);
        assert_eq!(row.attributes.get("mathsize"), Some(&AttrValue::from("big")));
    }
}
