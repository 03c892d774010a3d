//! # FerroTeX MathML Tree
//!
//! The expression tree produced by the FerroTeX math compiler.
//!
//! ## Overview
//!
//! - [`MmlNode`]: a kinded node with ordered children (or text, for tokens)
//! - [`Attributes`]: four-layer attribute resolution
//!   (explicit > inherited > default > global)
//! - [`NodeFactory`]: the construction seam the parser builds through, so the
//!   same parser can target other tree implementations
//! - [`serialize`]: MathML markup output
//!
//! Trees are built in one left-to-right pass and then finalized with
//! [`MmlNode::set_inherited_attributes`], which is the only point where
//! ancestor context (display mode, script level, `mstyle` settings) becomes
//! visible to a node.
//!
//! ## Examples
//!
//! ```
//! use ferrotex_mml::{MmlNode, NodeKind, AttrValue, serialize::to_mathml};
//! use std::collections::BTreeMap;
//!
//! let mut style = MmlNode::new(
//!     NodeKind::Mstyle,
//!     vec![MmlNode::token(NodeKind::Mi, "x")],
//! )
//! .with_attr("mathvariant", "bold");
//!
//! style.set_inherited_attributes(&BTreeMap::new(), false, 0);
//! let mi = &style.children[0];
//! assert_eq!(mi.attributes.get("mathvariant"), Some(&AttrValue::from("bold")));
//! assert_eq!(to_mathml(&style), "<mstyle mathvariant=\"bold\"><mi>x</mi></mstyle>");
//! ```

pub mod attributes;
pub mod factory;
pub mod node;
pub mod serialize;

pub use attributes::{AttrValue, Attributes, GlobalAttributes, global_defaults};
pub use factory::{AttributeList, DefaultNodeFactory, NodeFactory, NodeHook, attr};
pub use node::{MmlNode, NodeKind, TexClass, UnknownKind};
