//! MathML markup output.

use crate::node::{MmlNode, NodeKind};
use std::fmt::Write;

/// Which attribute layers to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeLayers {
    /// Only values set on the node itself.
    #[default]
    Explicit,
    /// Explicit values plus values inherited from ancestors.
    ExplicitAndInherited,
}

/// Serializes a tree as MathML markup, emitting explicit attributes only.
pub fn to_mathml(node: &MmlNode) -> String {
    to_mathml_with(node, AttributeLayers::Explicit)
}

pub fn to_mathml_with(node: &MmlNode, layers: AttributeLayers) -> String {
    let mut out = String::new();
    write_node(&mut out, node, layers);
    out
}

fn write_node(out: &mut String, node: &MmlNode, layers: AttributeLayers) {
    let tag = match node.kind {
        NodeKind::TeXAtom => "mrow",
        kind => kind.as_str(),
    };
    out.push('<');
    out.push_str(tag);
    if node.kind == NodeKind::TeXAtom {
        if let Some(class) = node.tex_class {
            let _ = write!(out, " data-mjx-texclass=\"{}\"", class.as_str());
        }
    }
    let values = match layers {
        AttributeLayers::Explicit => node
            .attributes
            .explicit()
            .iter()
            .filter(|(_, v)| !v.is_inherit())
            .map(|(k, v)| (k.as_str(), v))
            .collect::<Vec<_>>(),
        AttributeLayers::ExplicitAndInherited => {
            node.attributes.set_values().into_iter().collect::<Vec<_>>()
        }
    };
    for (name, value) in values {
        let _ = write!(out, " {}=\"{}\"", name, escape(&value.to_string()));
    }
    out.push('>');
    if node.is_token() {
        out.push_str(&escape(node.text()));
    } else {
        for child in &node.children {
            write_node(out, child, layers);
        }
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\u{2061}' => escaped.push_str("&#x2061;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TexClass;
    use expect_test::expect;

    #[test]
    fn test_escapes_operator_text() {
        let node = MmlNode::new(
            NodeKind::Mrow,
            vec![
                MmlNode::token(NodeKind::Mi, "a"),
                MmlNode::token(NodeKind::Mo, "<"),
                MmlNode::token(NodeKind::Mi, "b"),
            ],
        );
        expect![[r#"<mrow><mi>a</mi><mo>&lt;</mo><mi>b</mi></mrow>"#]].assert_eq(&to_mathml(&node));
    }

    #[test]
    fn test_texatom_serializes_as_mrow() {
        let node = MmlNode::new(NodeKind::TeXAtom, vec![MmlNode::token(NodeKind::Mi, "x")])
            .with_class(TexClass::Ord);
        expect![[r#"<mrow data-mjx-texclass="ORD"><mi>x</mi></mrow>"#]].assert_eq(&to_mathml(&node));
    }

    #[test]
    fn test_inherited_layer_is_optional() {
        let mut mi = MmlNode::token(NodeKind::Mi, "x");
        mi.attributes.set_inherited("mathcolor", "red");
        assert_eq!(to_mathml(&mi), "<mi>x</mi>");
        assert_eq!(
            to_mathml_with(&mi, AttributeLayers::ExplicitAndInherited),
            "<mi mathcolor=\"red\">x</mi>"
        );
    }
}
