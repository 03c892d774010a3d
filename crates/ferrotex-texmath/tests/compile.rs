use expect_test::expect;
use ferrotex_mml::serialize::{AttributeLayers, to_mathml, to_mathml_with};
use ferrotex_mml::{
    AttributeList, DefaultNodeFactory, GlobalAttributes, MmlNode, NodeFactory, NodeKind,
};
use ferrotex_texmath::{Catalog, ErrorPolicy, Outcome, TexCompiler, TexErrorId, TexOptions};
use std::sync::Arc;

fn raise() -> TexOptions {
    TexOptions {
        format_error: ErrorPolicy::Raise,
        ..TexOptions::default()
    }
}

/// Compiles with the default packages, loading whatever the source asks for.
fn compile_with(compiler: &mut TexCompiler<'_>, source: &str, display: bool) -> MmlNode {
    for _ in 0..8 {
        match compiler.compile(source, display).unwrap() {
            Outcome::Done(tree) => return tree,
            Outcome::NeedsResource(package) => compiler.add_package(package.as_str()).unwrap(),
        }
    }
    panic!("{source} kept requesting packages");
}

fn compile(source: &str) -> MmlNode {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    compile_with(&mut compiler, source, false)
}

fn markup(source: &str) -> String {
    to_mathml(&compile(source))
}

#[test]
fn test_sub_and_superscript_share_one_node() {
    let tree = compile("x^2_3");
    assert_eq!(tree.children.len(), 1);
    let scripts = &tree.children[0];
    assert_eq!(scripts.kind, NodeKind::Msubsup);
    assert_eq!(scripts.children[0].text(), "x");
    assert_eq!(scripts.children[1].text(), "3");
    assert_eq!(scripts.children[2].text(), "2");

    expect![["<math><msubsup><mi>x</mi><mn>3</mn><mn>2</mn></msubsup></math>"]]
        .assert_eq(&to_mathml(&tree));
}

#[test]
fn test_unused_script_slots_are_dropped() {
    expect![["<math><msup><mi>x</mi><mn>2</mn></msup></math>"]].assert_eq(&markup("x^2"));
    expect![["<math><msub><mi>a</mi><mi>i</mi></msub></math>"]].assert_eq(&markup("a_i"));
}

#[test]
fn test_structures() {
    expect![["<math><mfrac><mi>a</mi><mi>b</mi></mfrac></math>"]]
        .assert_eq(&markup(r"\frac{a}{b}"));
    expect![["<math><mroot><mi>x</mi><mn>3</mn></mroot></math>"]]
        .assert_eq(&markup(r"\sqrt[3]{x}"));
    expect![[r#"<math><mrow data-mjx-texclass="ORD"><mi>a</mi></mrow></math>"#]]
        .assert_eq(&markup("{a}"));
    expect![["<math><mi>sin</mi><mo>&#x2061;</mo><mi>x</mi></math>"]]
        .assert_eq(&markup(r"\sin x"));
    expect![[r#"<math><mrow data-mjx-texclass="ORD"><mi mathvariant="double-struck">R</mi></mrow></math>"#]]
        .assert_eq(&markup(r"\mathbb{R}"));
}

#[test]
fn test_matrix_rows_and_cells() {
    let tree = compile(r"\begin{matrix}a&b\\c&d\end{matrix}");
    let table = &tree.children[0];
    assert_eq!(table.kind, NodeKind::Mtable);
    assert_eq!(table.children.len(), 2);
    for (row, expected) in table.children.iter().zip([["a", "b"], ["c", "d"]]) {
        assert_eq!(row.kind, NodeKind::Mtr);
        assert_eq!(row.children.len(), 2);
        for (cell, text) in row.children.iter().zip(expected) {
            assert_eq!(cell.kind, NodeKind::Mtd);
            assert_eq!(cell.children[0].text(), text);
        }
    }
}

#[test]
fn test_missing_end_names_the_environment() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let err = compiler
        .compile(r"\begin{matrix}a&b\\c&d", false)
        .unwrap_err();
    assert_eq!(err.id, TexErrorId::EnvMissingEnd);
    assert!(err.is_unterminated());
    assert_eq!(err.context.as_deref(), Some("matrix"));
}

#[test]
fn test_explicit_tag_leaves_counter_alone() {
    let catalog = Catalog::with_defaults().unwrap();
    let options = raise().with_tags("ams");
    let mut compiler = TexCompiler::new(&catalog, options).unwrap();

    let tree = compile_with(&mut compiler, r"\tag{7}\label{seven} x = y", true);
    let table = &tree.children[0];
    assert_eq!(table.kind, NodeKind::Mtable);
    let row = &table.children[0];
    assert_eq!(row.kind, NodeKind::Mlabeledtr);
    assert_eq!(row.children[0].children[0].text(), "(7)");
    assert_eq!(compiler.tags().state().all_counter, 0);
    let label = compiler.tags().state().lookup("seven").cloned().unwrap();
    assert_eq!(label.tag, "7");

    let tree = compile_with(&mut compiler, r"\begin{equation}a\end{equation}", true);
    let row = &tree.children[0].children[0];
    assert_eq!(row.children[0].children[0].text(), "(1)");
    assert_eq!(compiler.tags().state().all_counter, 1);
}

#[test]
fn test_tag_needs_display_math() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise().with_tags("ams")).unwrap();
    let tree = compile_with(&mut compiler, r"\tag{7} x", false);
    assert_eq!(tree.children[0].kind, NodeKind::Mi);
}

#[test]
fn test_align_labels_and_references() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise().with_tags("ams")).unwrap();

    let mut early = compile_with(&mut compiler, r"\ref{second}", false);
    assert_eq!(early.children[0].children[0].text(), "???");

    let tree = compile_with(
        &mut compiler,
        r"\begin{align}a&=b\label{first}\\c&=d\label{second}\end{align}",
        true,
    );
    let table = &tree.children[0];
    assert_eq!(table.children.len(), 2);
    let first = &table.children[0];
    assert_eq!(first.kind, NodeKind::Mlabeledtr);
    assert_eq!(
        first.children[0]
            .attributes
            .get_explicit("id")
            .and_then(|v| v.as_str()),
        Some("mjx-eqn:first")
    );
    assert_eq!(first.children[0].children[0].text(), "(1)");
    assert_eq!(table.children[1].children[0].children[0].text(), "(2)");

    let reference = compile_with(&mut compiler, r"\eqref{first}", false);
    let link = &reference.children[0];
    assert_eq!(
        link.attributes.get_explicit("href").and_then(|v| v.as_str()),
        Some("#mjx-eqn:first")
    );
    assert_eq!(link.children[0].text(), "(1)");

    assert_eq!(compiler.resolve_references(&mut early), 0);
    assert_eq!(early.children[0].children[0].text(), "2");
}

#[test]
fn test_duplicate_label_is_an_error() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise().with_tags("ams")).unwrap();
    let source = r"\begin{equation}x\label{a}\end{equation}";
    compile_with(&mut compiler, source, true);
    let err = compiler.compile(source, true).unwrap_err();
    assert_eq!(err.id, TexErrorId::MultipleLabel);

    compiler.reset(0);
    compile_with(&mut compiler, source, true);
}

#[test]
fn test_starred_environment_has_no_number() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise().with_tags("ams")).unwrap();
    let tree = compile_with(&mut compiler, r"\begin{align*}a&=b\end{align*}", true);
    assert_eq!(tree.children[0].children[0].kind, NodeKind::Mtr);
    assert_eq!(compiler.tags().state().all_counter, 0);
}

#[test]
fn test_autoload_matches_preloaded_package() {
    let catalog = Catalog::with_defaults().unwrap();
    let source = r"\boldsymbol{x}+y";

    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let first = compiler.compile(source, false).unwrap();
    assert!(matches!(&first, Outcome::NeedsResource(id) if id.as_str() == "boldsymbol"));
    compiler.add_package("boldsymbol").unwrap();
    let retried = compiler.compile(source, false).unwrap().done().unwrap();

    let mut options = raise();
    options.packages.push("boldsymbol".to_string());
    let mut preloaded = TexCompiler::new(&catalog, options).unwrap();
    let direct = preloaded.compile(source, false).unwrap().done().unwrap();

    assert_eq!(
        to_mathml_with(&retried, AttributeLayers::ExplicitAndInherited),
        to_mathml_with(&direct, AttributeLayers::ExplicitAndInherited)
    );
    assert_eq!(
        retried.children[0].attributes.get("mathvariant").and_then(|v| v.as_str()),
        Some("bold-italic")
    );
}

#[test]
fn test_abandoned_attempt_forgets_definitions() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let source = r"\begingroup\newcommand{\v}{1}\boldsymbol{\v}";
    let first = compiler.compile(source, false).unwrap();
    assert!(matches!(first, Outcome::NeedsResource(_)));
    assert!(compiler.parse_options().macros.lookup_macro("v").is_none());
    assert_eq!(compiler.parse_options().macros.depth(), 0);
}

#[test]
fn test_user_macros_and_environments() {
    expect![["<math><msup><mi>y</mi><mn>2</mn></msup></math>"]]
        .assert_eq(&markup(r"\newcommand{\sq}[1]{#1^2}\sq{y}"));
    expect![["<math><mi>a</mi><mi>b</mi></math>"]]
        .assert_eq(&markup(r"\newcommand{\p}[2][a]{#1#2}\p{b}"));
    expect![["<math><mi>x</mi><mi>z</mi></math>"]]
        .assert_eq(&markup(r"\def\w#1{#1z}\w x"));

    let tree = compile(r"\newenvironment{pair}{\left(}{\right)}\begin{pair}a\end{pair}");
    let texts: Vec<&str> = tree.children.iter().map(MmlNode::text).collect();
    assert_eq!(texts, ["(", "a", ")"]);
}

#[test]
fn test_runaway_macro_is_stopped() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let err = compiler
        .compile(r"\newcommand{\loop}{\loop}\loop", false)
        .unwrap_err();
    assert!(
        matches!(err.id, TexErrorId::MaxMacroSub | TexErrorId::MaxBufferSize),
        "{err:?}"
    );
}

#[test]
fn test_undefined_macro_renders_as_text() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise()).unwrap();
    let tree = compile_with(&mut compiler, r"\nosuchmacro", false);
    expect![[r#"<math><mtext mathcolor="red">\nosuchmacro</mtext></math>"#]]
        .assert_eq(&to_mathml(&tree));

    let options = raise().with_packages(&["base"]);
    let mut strict = TexCompiler::new(&catalog, options).unwrap();
    let err = strict.compile(r"\nosuchmacro", false).unwrap_err();
    assert_eq!(err.id, TexErrorId::UndefinedControlSequence);
}

fn texts(tree: &MmlNode) -> Vec<&str> {
    tree.children.iter().map(MmlNode::text).collect()
}

#[test]
fn test_adjacent_relations_merge_only_in_rows() {
    let tree = compile("a:=b");
    assert_eq!(texts(&tree), ["a", ":=", "b"]);

    let tree = compile("=^=");
    let sup = &tree.children[0];
    assert_eq!(sup.kind, NodeKind::Msup);
    assert_eq!(texts(sup), ["=", "="]);

    let tree = compile(r"\frac{=}{=}");
    let frac = &tree.children[0];
    assert_eq!(frac.kind, NodeKind::Mfrac);
    assert_eq!(frac.children.len(), 2);

    let tree = compile("x_=^=");
    let scripts = &tree.children[0];
    assert_eq!(scripts.kind, NodeKind::Msubsup);
    assert_eq!(texts(scripts), ["x", "=", "="]);
}

#[test]
fn test_custom_patterns_match_at_the_cursor() {
    let catalog = Catalog::with_defaults().unwrap();
    let options = TexOptions {
        number_pattern: r"^[0-9]+|\.[0-9]+".into(),
        multi_letter_identifiers: Some("^[a-z]{2}|[A-Z]+".into()),
        ..raise()
    };
    let mut compiler = TexCompiler::new(&catalog, options).unwrap();

    let tree = compile_with(&mut compiler, ".x.5", false);
    assert_eq!(texts(&tree), [".", "x", ".5"]);
    assert_eq!(tree.children[2].kind, NodeKind::Mn);

    let tree = compile_with(&mut compiler, "aB", false);
    assert_eq!(texts(&tree), ["a", "B"]);
}

/// Builds script nodes without their last slot.
struct ShortScripts(DefaultNodeFactory);

impl NodeFactory for ShortScripts {
    fn create(
        &self,
        kind: NodeKind,
        attributes: AttributeList,
        mut children: Vec<MmlNode>,
    ) -> MmlNode {
        if matches!(kind, NodeKind::Msubsup | NodeKind::Munderover) {
            children.truncate(2);
        }
        self.0.create(kind, attributes, children)
    }

    fn create_token(&self, kind: NodeKind, attributes: AttributeList, text: &str) -> MmlNode {
        self.0.create_token(kind, attributes, text)
    }

    fn global(&self) -> GlobalAttributes {
        self.0.global()
    }
}

#[test]
fn test_factory_without_script_slots_reports_an_error() {
    let catalog = Catalog::with_defaults().unwrap();
    let mut compiler = TexCompiler::new(&catalog, raise())
        .unwrap()
        .with_factory(Arc::new(ShortScripts(DefaultNodeFactory::new())));

    for source in ["x^2", "x_1^2"] {
        let err = compiler.compile(source, false).unwrap_err();
        assert_eq!(err.id, TexErrorId::MissingScript, "{source}");
    }
    assert!(compiler.compile("x_1", false).is_ok());
    let _ = compiler.compile("x'", false);
}
