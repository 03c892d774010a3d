use ferrotex_mml::serialize::{AttributeLayers, to_mathml_with};
use ferrotex_mml::{AttrValue, MmlNode, NodeKind};
use ferrotex_texmath::{
    Catalog, ErrorPolicy, Outcome, TexCompiler, TexErrorId, TexOptions,
};

fn raise() -> TexOptions {
    TexOptions {
        format_error: ErrorPolicy::Raise,
        ..TexOptions::default()
    }
}

fn full(tree: &MmlNode) -> String {
    to_mathml_with(tree, AttributeLayers::ExplicitAndInherited)
}

#[test]
fn test_unbalanced_input_has_a_structural_error() {
    let cases = [
        ("{x", TexErrorId::ExtraOpenMissingClose),
        ("x}", TexErrorId::ExtraCloseMissingOpen),
        (r"\left( x", TexErrorId::ExtraLeftMissingRight),
        (r"x \right)", TexErrorId::MissingLeftExtraRight),
        (r"\middle| x", TexErrorId::ExtraMiddle),
        (r"\end{matrix}", TexErrorId::MissingBeginExtraEnd),
        (r"\begin{matrix}a\end{pmatrix}", TexErrorId::EnvBadEnd),
        (r"\begin{pmatrix}a", TexErrorId::EnvMissingEnd),
        ("x^", TexErrorId::MissingScript),
        ("x^1^2", TexErrorId::DoubleExponent),
        ("a & b", TexErrorId::Misplaced),
        (r"\begin{nosuch}x\end{nosuch}", TexErrorId::UnknownEnv),
    ];
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    for (source, id) in cases {
        let err = compiler.compile(source, false).unwrap_err();
        assert_eq!(err.id, id, "{source}");
        let unterminated = matches!(
            id,
            TexErrorId::ExtraOpenMissingClose
                | TexErrorId::ExtraLeftMissingRight
                | TexErrorId::EnvMissingEnd
                | TexErrorId::MissingScript
        );
        assert_eq!(err.is_unterminated(), unterminated, "{source}");
    }
}

#[test]
fn test_compiling_twice_gives_the_same_tree() {
    let sources = [
        r"x^2_3 + \frac{1}{2}",
        r"\left( \sum_{i=1}^n a_i \right)",
        r"\begin{pmatrix} a & b \\ c & d \end{pmatrix}",
        r"\mathbf{v} \cdot \vec{w}",
        r"\lim_{x \to 0} \sin x + \mathrm{d}y",
    ];
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    for source in sources {
        let first = compiler.compile(source, true).unwrap().done().unwrap();
        let second = compiler.compile(source, true).unwrap().done().unwrap();
        assert_eq!(first, second, "{source}");
    }
}

#[test]
fn test_numbered_compile_repeats_after_reset() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise().with_tags("all")).unwrap();
    let source = r"x = 1";
    let first = compiler.compile(source, true).unwrap().done().unwrap();
    compiler.reset(0);
    let second = compiler.compile(source, true).unwrap().done().unwrap();
    assert_eq!(full(&first), full(&second));
}

#[test]
fn test_style_attributes_cascade_to_descendants() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let tree = compiler
        .compile(r"\scriptstyle x", true)
        .unwrap()
        .done()
        .unwrap();

    let style = &tree.children[0];
    assert_eq!(style.kind, NodeKind::Mstyle);
    let x = &style.children[0];
    assert_eq!(x.kind, NodeKind::Mi);
    assert!(x.attributes.get_explicit("scriptlevel").is_none());
    assert_eq!(x.attributes.get("scriptlevel").and_then(AttrValue::as_int), Some(1));
    assert_eq!(
        x.attributes.get("displaystyle").and_then(AttrValue::as_bool),
        Some(false)
    );
}

#[test]
fn test_scripts_raise_the_level() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let tree = compiler.compile("x^y", true).unwrap().done().unwrap();
    let sup = &tree.children[0];
    assert_eq!(sup.kind, NodeKind::Msup);
    let base = &sup.children[0];
    let script = &sup.children[1];
    assert_eq!(base.attributes.get("scriptlevel").and_then(AttrValue::as_int), Some(0));
    assert_eq!(script.attributes.get("scriptlevel").and_then(AttrValue::as_int), Some(1));
    assert_eq!(
        base.attributes.get("displaystyle").and_then(AttrValue::as_bool),
        Some(true)
    );
    assert_eq!(
        script.attributes.get("displaystyle").and_then(AttrValue::as_bool),
        Some(false)
    );
}

#[test]
fn test_later_package_wins_lookup() {
    use ferrotex_texmath::{Configuration, ConfigurationSpec, HandlerType, ParseAction, SymbolMap};

    let ident = |text: &str| ParseAction::Ident {
        text: text.to_string(),
        variant: None,
    };
    let mut catalog = Catalog::with_defaults().unwrap();
    catalog.register(
        Configuration::create(
            "first",
            ConfigurationSpec::new().map(
                HandlerType::Macro,
                SymbolMap::table("first-macros", [("foo", ident("A")), ("bar", ident("B"))]),
            ),
        )
        .unwrap(),
    );
    catalog.register(
        Configuration::create(
            "second",
            ConfigurationSpec::new().map(
                HandlerType::Macro,
                SymbolMap::table("second-macros", [("foo", ident("C"))]),
            ),
        )
        .unwrap(),
    );

    let options = raise().with_packages(&["base", "first", "second"]);
    let mut compiler = TexCompiler::new(&catalog, options).unwrap();
    let tree = compiler.compile(r"\foo\bar", false).unwrap().done().unwrap();
    let texts: Vec<&str> = tree.children.iter().map(MmlNode::text).collect();
    assert_eq!(texts, ["C", "B"]);

    let options = raise().with_packages(&["base", "second", "first"]);
    let mut compiler = TexCompiler::new(&catalog, options).unwrap();
    let tree = compiler.compile(r"\foo", false).unwrap().done().unwrap();
    assert_eq!(tree.children[0].text(), "A");
}

#[test]
fn test_required_package_loads_on_retry() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let source = r"\require{boldsymbol}\boldsymbol{1}";
    let Outcome::NeedsResource(id) = compiler.compile(source, false).unwrap() else {
        panic!("expected a package request");
    };
    assert_eq!(id.as_str(), "boldsymbol");
    compiler.add_package(id.as_str()).unwrap();
    let tree = compiler.compile(source, false).unwrap().done().unwrap();
    assert_eq!(
        tree.children[0].attributes.get("mathvariant").and_then(AttrValue::as_str),
        Some("bold")
    );
}

#[test]
fn test_disallowed_package_is_refused() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut options = raise();
    options.extra.insert(
        "require".to_string(),
        serde_json::json!({ "allow": { "boldsymbol": false }, "defaultAllow": true }),
    );
    let mut compiler = TexCompiler::new(&catalog, options).unwrap();
    let err = compiler.compile(r"\require{boldsymbol}", false).unwrap_err();
    assert_eq!(err.id, TexErrorId::UnknownPackage);
}
