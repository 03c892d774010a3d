use ferrotex_mml::{AttrValue, MmlNode, NodeKind};
use std::collections::BTreeMap;

fn frac(num: MmlNode, den: MmlNode) -> MmlNode {
    MmlNode::new(NodeKind::Mfrac, vec![num, den])
}

#[test]
fn test_ancestor_mstyle_beats_kind_default() {
    // mi defaults to italic; an enclosing mstyle must win for every descendant.
    let tree = MmlNode::new(
        NodeKind::Mstyle,
        vec![MmlNode::new(
            NodeKind::Mrow,
            vec![
                MmlNode::token(NodeKind::Mi, "a"),
                frac(MmlNode::token(NodeKind::Mi, "b"), MmlNode::token(NodeKind::Mi, "c")),
            ],
        )],
    )
    .with_attr("mathvariant", "bold");

    let mut tree = tree;
    tree.set_inherited_attributes(&BTreeMap::new(), true, 0);

    let mut seen = 0;
    tree.walk(&mut |node| {
        if node.kind == NodeKind::Mi {
            seen += 1;
            assert_eq!(
                node.attributes.get("mathvariant"),
                Some(&AttrValue::from("bold"))
            );
        }
    });
    assert_eq!(seen, 3);
}

#[test]
fn test_explicit_value_is_never_overwritten() {
    let mut tree = MmlNode::new(
        NodeKind::Mstyle,
        vec![MmlNode::token(NodeKind::Mi, "x").with_attr("mathvariant", "normal")],
    )
    .with_attr("mathvariant", "bold");
    tree.set_inherited_attributes(&BTreeMap::new(), false, 0);
    assert_eq!(
        tree.children[0].attributes.get("mathvariant"),
        Some(&AttrValue::from("normal"))
    );
}

#[test]
fn test_fraction_and_script_levels() {
    let mut tree = MmlNode::new(
        NodeKind::Mrow,
        vec![
            frac(MmlNode::token(NodeKind::Mn, "1"), MmlNode::token(NodeKind::Mn, "2")),
            MmlNode::new(
                NodeKind::Msup,
                vec![MmlNode::token(NodeKind::Mi, "x"), MmlNode::token(NodeKind::Mn, "2")],
            ),
        ],
    );

    tree.set_inherited_attributes(&BTreeMap::new(), true, 0);
    let level = |node: &MmlNode| node.attributes.get("scriptlevel").and_then(AttrValue::as_int);
    let display = |node: &MmlNode| node.attributes.get("displaystyle").and_then(AttrValue::as_bool);

    let fraction = &tree.children[0];
    // Display fractions keep the level but switch children to text style.
    assert_eq!(level(&fraction.children[0]), Some(0));
    assert_eq!(display(&fraction.children[0]), Some(false));

    let sup = &tree.children[1];
    assert_eq!(level(&sup.children[0]), Some(0));
    assert_eq!(display(&sup.children[0]), Some(true));
    assert_eq!(level(&sup.children[1]), Some(1));

    tree.set_inherited_attributes(&BTreeMap::new(), false, 0);
    assert_eq!(level(&tree.children[0].children[1]), Some(1));
}

#[test]
fn test_relative_scriptlevel_on_mstyle() {
    let mut tree = MmlNode::new(NodeKind::Mstyle, vec![MmlNode::token(NodeKind::Mi, "x")])
        .with_attr("scriptlevel", "+1");
    tree.set_inherited_attributes(&BTreeMap::new(), false, 1);
    assert_eq!(
        tree.children[0].attributes.get("scriptlevel"),
        Some(&AttrValue::Int(2))
    );
}

#[test]
fn test_kind_round_trips_through_name() {
    for name in ["mi", "msubsup", "mlabeledtr", "TeXAtom"] {
        let kind: NodeKind = name.parse().unwrap();
        assert_eq!(kind.as_str(), name);
    }
    assert!("blink".parse::<NodeKind>().is_err());
}
