//! The `base` package: everything plain TeX math mode understands.

use crate::actions::{AlignStyle, ParseAction};
use crate::configuration::ConfigurationSpec;
use crate::error::RegistrationError;
use crate::symbol_map::{HandlerType, SymbolMap};
use crate::tags;
use ferrotex_mml::{MmlNode, NodeKind, TexClass};
use std::sync::Arc;

fn idents<'a>(entries: &[(&'a str, &str)]) -> Vec<(&'a str, ParseAction)> {
    entries
        .iter()
        .map(|(name, text)| (*name, ParseAction::ident(text)))
        .collect()
}

/// Upright identifiers, e.g. capital Greek.
fn upright<'a>(entries: &[(&'a str, &str)]) -> Vec<(&'a str, ParseAction)> {
    entries
        .iter()
        .map(|(name, text)| {
            (
                *name,
                ParseAction::Ident {
                    text: text.to_string(),
                    variant: Some("normal".to_string()),
                },
            )
        })
        .collect()
}

fn ops<'a>(class: TexClass, entries: &[(&'a str, &str)]) -> Vec<(&'a str, ParseAction)> {
    entries
        .iter()
        .map(|(name, text)| (*name, ParseAction::op_class(text, class)))
        .collect()
}

fn large_ops<'a>(limits: bool, entries: &[(&'a str, &str)]) -> Vec<(&'a str, ParseAction)> {
    entries
        .iter()
        .map(|(name, text)| {
            (
                *name,
                ParseAction::LargeOp {
                    text: text.to_string(),
                    limits,
                },
            )
        })
        .collect()
}

fn characters() -> SymbolMap {
    SymbolMap::table(
        "special",
        [
            ("{", ParseAction::Open),
            ("}", ParseAction::Close),
            ("~", ParseAction::Tilde),
            ("^", ParseAction::Superscript),
            ("_", ParseAction::Subscript),
            ("&", ParseAction::Ampersand),
            ("#", ParseAction::Hash),
            ("%", ParseAction::Comment),
            ("'", ParseAction::Prime),
            ("\u{2019}", ParseAction::Prime),
            (" ", ParseAction::Space),
            ("\t", ParseAction::Space),
            ("\r", ParseAction::Space),
            ("\n", ParseAction::Space),
            ("\u{00A0}", ParseAction::Tilde),
        ],
    )
}

fn delimiters() -> SymbolMap {
    SymbolMap::delimiters(
        "delimiter",
        [
            ("(", "("),
            (")", ")"),
            ("[", "["),
            ("]", "]"),
            ("<", "\u{27E8}"),
            (">", "\u{27E9}"),
            ("/", "/"),
            ("|", "|"),
            (".", ""),
            ("\\{", "{"),
            ("\\}", "}"),
            ("\\|", "\u{2016}"),
            ("\\lbrace", "{"),
            ("\\rbrace", "}"),
            ("\\lbrack", "["),
            ("\\rbrack", "]"),
            ("\\langle", "\u{27E8}"),
            ("\\rangle", "\u{27E9}"),
            ("\\lfloor", "\u{230A}"),
            ("\\rfloor", "\u{230B}"),
            ("\\lceil", "\u{2308}"),
            ("\\rceil", "\u{2309}"),
            ("\\vert", "|"),
            ("\\lvert", "|"),
            ("\\rvert", "|"),
            ("\\Vert", "\u{2016}"),
            ("\\lVert", "\u{2016}"),
            ("\\rVert", "\u{2016}"),
            ("\\lgroup", "\u{27EE}"),
            ("\\rgroup", "\u{27EF}"),
            ("\\lmoustache", "\u{23B0}"),
            ("\\rmoustache", "\u{23B1}"),
            ("\\backslash", "\\"),
            ("\\uparrow", "\u{2191}"),
            ("\\downarrow", "\u{2193}"),
            ("\\updownarrow", "\u{2195}"),
            ("\\Uparrow", "\u{21D1}"),
            ("\\Downarrow", "\u{21D3}"),
            ("\\Updownarrow", "\u{21D5}"),
        ],
    )
}

fn letters() -> Vec<(&'static str, ParseAction)> {
    let mut entries = idents(&[
        ("alpha", "\u{03B1}"),
        ("beta", "\u{03B2}"),
        ("gamma", "\u{03B3}"),
        ("delta", "\u{03B4}"),
        ("epsilon", "\u{03F5}"),
        ("zeta", "\u{03B6}"),
        ("eta", "\u{03B7}"),
        ("theta", "\u{03B8}"),
        ("iota", "\u{03B9}"),
        ("kappa", "\u{03BA}"),
        ("lambda", "\u{03BB}"),
        ("mu", "\u{03BC}"),
        ("nu", "\u{03BD}"),
        ("xi", "\u{03BE}"),
        ("omicron", "\u{03BF}"),
        ("pi", "\u{03C0}"),
        ("rho", "\u{03C1}"),
        ("sigma", "\u{03C3}"),
        ("tau", "\u{03C4}"),
        ("upsilon", "\u{03C5}"),
        ("phi", "\u{03D5}"),
        ("chi", "\u{03C7}"),
        ("psi", "\u{03C8}"),
        ("omega", "\u{03C9}"),
        ("varepsilon", "\u{03B5}"),
        ("vartheta", "\u{03D1}"),
        ("varpi", "\u{03D6}"),
        ("varrho", "\u{03F1}"),
        ("varsigma", "\u{03C2}"),
        ("varphi", "\u{03C6}"),
        ("hbar", "\u{210F}"),
        ("imath", "\u{0131}"),
        ("jmath", "\u{0237}"),
        ("ell", "\u{2113}"),
        ("wp", "\u{2118}"),
        ("Re", "\u{211C}"),
        ("Im", "\u{2111}"),
        ("partial", "\u{2202}"),
        ("infty", "\u{221E}"),
        ("aleph", "\u{2135}"),
    ]);
    entries.extend(upright(&[
        ("Gamma", "\u{0393}"),
        ("Delta", "\u{0394}"),
        ("Theta", "\u{0398}"),
        ("Lambda", "\u{039B}"),
        ("Xi", "\u{039E}"),
        ("Pi", "\u{03A0}"),
        ("Sigma", "\u{03A3}"),
        ("Upsilon", "\u{03A5}"),
        ("Phi", "\u{03A6}"),
        ("Psi", "\u{03A8}"),
        ("Omega", "\u{03A9}"),
        ("nabla", "\u{2207}"),
        ("emptyset", "\u{2205}"),
        ("forall", "\u{2200}"),
        ("exists", "\u{2203}"),
        ("top", "\u{22A4}"),
        ("bot", "\u{22A5}"),
        ("angle", "\u{2220}"),
        ("triangle", "\u{25B3}"),
        ("flat", "\u{266D}"),
        ("natural", "\u{266E}"),
        ("sharp", "\u{266F}"),
        ("clubsuit", "\u{2663}"),
        ("diamondsuit", "\u{2662}"),
        ("heartsuit", "\u{2661}"),
        ("spadesuit", "\u{2660}"),
    ]));
    entries
}

fn operators() -> Vec<(&'static str, ParseAction)> {
    let mut entries = ops(
        TexClass::Bin,
        &[
            ("pm", "\u{00B1}"),
            ("mp", "\u{2213}"),
            ("times", "\u{00D7}"),
            ("div", "\u{00F7}"),
            ("cdot", "\u{22C5}"),
            ("ast", "\u{2217}"),
            ("star", "\u{22C6}"),
            ("circ", "\u{2218}"),
            ("bullet", "\u{2219}"),
            ("oplus", "\u{2295}"),
            ("ominus", "\u{2296}"),
            ("otimes", "\u{2297}"),
            ("oslash", "\u{2298}"),
            ("odot", "\u{2299}"),
            ("cap", "\u{2229}"),
            ("cup", "\u{222A}"),
            ("wedge", "\u{2227}"),
            ("land", "\u{2227}"),
            ("vee", "\u{2228}"),
            ("lor", "\u{2228}"),
            ("setminus", "\u{2216}"),
            ("uplus", "\u{228E}"),
            ("sqcap", "\u{2293}"),
            ("sqcup", "\u{2294}"),
            ("amalg", "\u{2A3F}"),
            ("wr", "\u{2240}"),
            ("bigcirc", "\u{25EF}"),
            ("dagger", "\u{2020}"),
            ("ddagger", "\u{2021}"),
            ("triangleleft", "\u{25C3}"),
            ("triangleright", "\u{25B9}"),
        ],
    );
    entries.extend(ops(
        TexClass::Rel,
        &[
            ("leq", "\u{2264}"),
            ("le", "\u{2264}"),
            ("geq", "\u{2265}"),
            ("ge", "\u{2265}"),
            ("neq", "\u{2260}"),
            ("ne", "\u{2260}"),
            ("equiv", "\u{2261}"),
            ("approx", "\u{2248}"),
            ("sim", "\u{223C}"),
            ("simeq", "\u{2243}"),
            ("cong", "\u{2245}"),
            ("propto", "\u{221D}"),
            ("ll", "\u{226A}"),
            ("gg", "\u{226B}"),
            ("prec", "\u{227A}"),
            ("succ", "\u{227B}"),
            ("preceq", "\u{2AAF}"),
            ("succeq", "\u{2AB0}"),
            ("asymp", "\u{224D}"),
            ("doteq", "\u{2250}"),
            ("subset", "\u{2282}"),
            ("supset", "\u{2283}"),
            ("subseteq", "\u{2286}"),
            ("supseteq", "\u{2287}"),
            ("sqsubseteq", "\u{2291}"),
            ("sqsupseteq", "\u{2292}"),
            ("in", "\u{2208}"),
            ("ni", "\u{220B}"),
            ("owns", "\u{220B}"),
            ("notin", "\u{2209}"),
            ("mid", "\u{2223}"),
            ("parallel", "\u{2225}"),
            ("perp", "\u{22A5}"),
            ("vdash", "\u{22A2}"),
            ("dashv", "\u{22A3}"),
            ("models", "\u{22A8}"),
            ("bowtie", "\u{22C8}"),
            ("smile", "\u{2323}"),
            ("frown", "\u{2322}"),
            ("to", "\u{2192}"),
            ("rightarrow", "\u{2192}"),
            ("leftarrow", "\u{2190}"),
            ("gets", "\u{2190}"),
            ("leftrightarrow", "\u{2194}"),
            ("Rightarrow", "\u{21D2}"),
            ("Leftarrow", "\u{21D0}"),
            ("Leftrightarrow", "\u{21D4}"),
            ("iff", "\u{27FA}"),
            ("mapsto", "\u{21A6}"),
            ("longrightarrow", "\u{27F6}"),
            ("longleftarrow", "\u{27F5}"),
            ("longleftrightarrow", "\u{27F7}"),
            ("Longrightarrow", "\u{27F9}"),
            ("Longleftarrow", "\u{27F8}"),
            ("Longleftrightarrow", "\u{27FA}"),
            ("longmapsto", "\u{27FC}"),
            ("hookrightarrow", "\u{21AA}"),
            ("hookleftarrow", "\u{21A9}"),
            ("nearrow", "\u{2197}"),
            ("searrow", "\u{2198}"),
            ("swarrow", "\u{2199}"),
            ("nwarrow", "\u{2196}"),
            ("rightharpoonup", "\u{21C0}"),
            ("rightharpoondown", "\u{21C1}"),
            ("leftharpoonup", "\u{21BC}"),
            ("leftharpoondown", "\u{21BD}"),
            ("rightleftharpoons", "\u{21CC}"),
        ],
    ));
    entries.extend(ops(
        TexClass::Inner,
        &[
            ("ldots", "\u{2026}"),
            ("cdots", "\u{22EF}"),
            ("vdots", "\u{22EE}"),
            ("ddots", "\u{22F1}"),
            ("dots", "\u{2026}"),
        ],
    ));
    entries.extend(ops(
        TexClass::Punct,
        &[("colon", ":"), ("ldotp", "."), ("cdotp", "\u{22C5}")],
    ));
    entries.extend(ops(
        TexClass::Ord,
        &[
            ("neg", "\u{00AC}"),
            ("lnot", "\u{00AC}"),
            ("prime", "\u{2032}"),
            ("surd", "\u{221A}"),
            ("#", "#"),
            ("$", "$"),
            ("%", "%"),
            ("&", "&"),
            ("_", "_"),
        ],
    ));
    entries
}

fn functions() -> Vec<(&'static str, ParseAction)> {
    let mut entries: Vec<(&'static str, ParseAction)> = [
        "arcsin", "arccos", "arctan", "arg", "cos", "cosh", "cot", "coth", "csc", "deg", "dim",
        "exp", "hom", "ker", "lg", "ln", "log", "sec", "sin", "sinh", "tan", "tanh",
    ]
    .into_iter()
    .map(|name| (name, ParseAction::NamedFn { text: None }))
    .collect();
    entries.extend(
        ["det", "gcd", "inf", "lim", "max", "min", "Pr", "sup"]
            .into_iter()
            .map(|name| {
                (
                    name,
                    ParseAction::NamedOp {
                        text: None,
                        limits: true,
                    },
                )
            }),
    );
    for (name, text) in [("liminf", "lim&thinsp;inf"), ("limsup", "lim&thinsp;sup")] {
        entries.push((
            name,
            ParseAction::NamedOp {
                text: Some(text.to_string()),
                limits: true,
            },
        ));
    }
    entries.extend(large_ops(
        true,
        &[
            ("sum", "\u{2211}"),
            ("prod", "\u{220F}"),
            ("coprod", "\u{2210}"),
            ("bigcup", "\u{22C3}"),
            ("bigcap", "\u{22C2}"),
            ("bigvee", "\u{22C1}"),
            ("bigwedge", "\u{22C0}"),
            ("bigoplus", "\u{2A01}"),
            ("bigotimes", "\u{2A02}"),
            ("bigodot", "\u{2A00}"),
            ("biguplus", "\u{2A04}"),
            ("bigsqcup", "\u{2A06}"),
        ],
    ));
    entries.extend(large_ops(
        false,
        &[
            ("int", "\u{222B}"),
            ("oint", "\u{222E}"),
            ("smallint", "\u{222B}"),
        ],
    ));
    entries
}

fn fonts() -> Vec<(&'static str, ParseAction)> {
    let switch = |variant: &str| ParseAction::FontSwitch {
        variant: variant.to_string(),
    };
    let font = |variant: &str| ParseAction::MathFont {
        variant: variant.to_string(),
    };
    vec![
        ("rm", switch("normal")),
        ("bf", switch("bold")),
        ("it", switch("italic")),
        ("sf", switch("sans-serif")),
        ("tt", switch("monospace")),
        ("cal", switch("script")),
        ("mathrm", font("normal")),
        ("mathup", font("normal")),
        ("mathbf", font("bold")),
        ("mathit", font("italic")),
        ("mathnormal", font("italic")),
        ("mathsf", font("sans-serif")),
        ("mathtt", font("monospace")),
        ("mathcal", font("script")),
        ("mathscr", font("script")),
        ("mathbb", font("double-struck")),
        ("mathfrak", font("fraktur")),
    ]
}

fn structure() -> Vec<(&'static str, ParseAction)> {
    let infix = |thickness: Option<&str>, open: Option<&str>, close: Option<&str>| {
        ParseAction::Infix {
            thickness: thickness.map(str::to_string),
            open: open.map(str::to_string),
            close: close.map(str::to_string),
        }
    };
    let style = |display: bool, level: i64| ParseAction::Style { display, level };
    let spacer = |width: &str| ParseAction::Spacer {
        width: width.to_string(),
    };
    let accent = |text: &str, stretchy: bool| ParseAction::Accent {
        text: text.to_string(),
        stretchy,
    };
    let under_over = |text: &str, under: bool| ParseAction::UnderOver {
        text: text.to_string(),
        under,
    };
    let class = |class: TexClass| ParseAction::MathClass { class };
    let text = |variant: Option<&str>| ParseAction::Text {
        variant: variant.map(str::to_string),
    };
    vec![
        ("frac", ParseAction::Frac { display: None }),
        ("sqrt", ParseAction::Sqrt),
        ("root", ParseAction::Root),
        ("left", ParseAction::Left),
        ("right", ParseAction::Right),
        ("middle", ParseAction::Middle),
        ("over", infix(None, None, None)),
        ("atop", infix(Some("0"), None, None)),
        ("above", infix(None, None, None)),
        ("choose", infix(Some("0"), Some("("), Some(")"))),
        ("brace", infix(Some("0"), Some("{"), Some("}"))),
        ("brack", infix(Some("0"), Some("["), Some("]"))),
        ("overwithdelims", infix(None, None, None)),
        ("atopwithdelims", infix(Some("0"), None, None)),
        ("abovewithdelims", infix(None, None, None)),
        ("displaystyle", style(true, 0)),
        ("textstyle", style(false, 0)),
        ("scriptstyle", style(false, 1)),
        ("scriptscriptstyle", style(false, 2)),
        (",", spacer("0.1667em")),
        (":", spacer("0.2222em")),
        (">", spacer("0.2222em")),
        (";", spacer("0.2778em")),
        ("!", spacer("-0.1667em")),
        (" ", spacer("0.25em")),
        ("thinspace", spacer("0.1667em")),
        ("negthinspace", spacer("-0.1667em")),
        ("enspace", spacer("0.5em")),
        ("quad", spacer("1em")),
        ("qquad", spacer("2em")),
        ("hat", accent("\u{02C6}", false)),
        ("widehat", accent("\u{02C6}", true)),
        ("check", accent("\u{02C7}", false)),
        ("tilde", accent("\u{02DC}", false)),
        ("widetilde", accent("\u{02DC}", true)),
        ("acute", accent("\u{02CA}", false)),
        ("grave", accent("\u{02CB}", false)),
        ("dot", accent("\u{02D9}", false)),
        ("ddot", accent("\u{00A8}", false)),
        ("breve", accent("\u{02D8}", false)),
        ("bar", accent("\u{02C9}", false)),
        ("vec", accent("\u{2192}", false)),
        ("mathring", accent("\u{02DA}", false)),
        ("overline", under_over("\u{2015}", false)),
        ("underline", under_over("\u{2015}", true)),
        ("overbrace", under_over("\u{23DE}", false)),
        ("underbrace", under_over("\u{23DF}", true)),
        ("overrightarrow", under_over("\u{2192}", false)),
        ("overleftarrow", under_over("\u{2190}", false)),
        (
            "stackrel",
            ParseAction::Overset {
                under: false,
                class: Some(TexClass::Rel),
            },
        ),
        ("limits", ParseAction::Limits { limits: true }),
        ("nolimits", ParseAction::Limits { limits: false }),
        ("mbox", text(None)),
        ("hbox", text(None)),
        ("textrm", text(None)),
        ("textbf", text(Some("bold"))),
        ("textit", text(Some("italic"))),
        ("textsf", text(Some("sans-serif"))),
        ("texttt", text(Some("monospace"))),
        ("mathord", class(TexClass::Ord)),
        ("mathop", class(TexClass::Op)),
        ("mathbin", class(TexClass::Bin)),
        ("mathrel", class(TexClass::Rel)),
        ("mathopen", class(TexClass::Open)),
        ("mathclose", class(TexClass::Close)),
        ("mathpunct", class(TexClass::Punct)),
        ("mathinner", class(TexClass::Inner)),
        ("phantom", ParseAction::Phantom),
        ("not", ParseAction::Not),
        ("\\", ParseAction::Cr),
        ("cr", ParseAction::Cr),
        ("begin", ParseAction::Begin),
        ("end", ParseAction::End),
        ("tag", ParseAction::Tag),
        ("notag", ParseAction::NoTag),
        ("nonumber", ParseAction::NoTag),
        ("label", ParseAction::Label),
        ("ref", ParseAction::Ref { eq: false }),
        ("relax", ParseAction::Relax),
    ]
}

fn environments() -> Vec<(&'static str, ParseAction)> {
    vec![
        ("array", ParseAction::Array),
        ("equation", ParseAction::Equation { numbered: true }),
        ("equation*", ParseAction::Equation { numbered: false }),
        (
            "eqnarray",
            ParseAction::EqnArray {
                style: AlignStyle::Align,
                numbered: true,
                top_level: true,
            },
        ),
        (
            "eqnarray*",
            ParseAction::EqnArray {
                style: AlignStyle::Align,
                numbered: false,
                top_level: true,
            },
        ),
    ]
}

/// Element kinds whose children form a row rather than positional slots.
fn is_row_like(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Math
            | NodeKind::Mrow
            | NodeKind::TeXAtom
            | NodeKind::Mstyle
            | NodeKind::Mtd
            | NodeKind::Msqrt
            | NodeKind::Merror
            | NodeKind::Mpadded
            | NodeKind::Mphantom
            | NodeKind::Menclose
    )
}

/// Merges runs of adjacent relations such as `:=` into one operator.
///
/// Only rows are touched; script, fraction and root slots keep their arity.
pub fn combine_relations(node: &mut MmlNode) {
    node.walk_mut(&mut |n: &mut MmlNode| {
        if !is_row_like(n.kind) || n.children.len() < 2 {
            return;
        }
        let mut i = 0;
        while i + 1 < n.children.len() {
            let (left, right) = (&n.children[i], &n.children[i + 1]);
            let mergeable = left.kind == NodeKind::Mo
                && right.kind == NodeKind::Mo
                && left.tex_class == Some(TexClass::Rel)
                && right.tex_class == Some(TexClass::Rel)
                && left.attributes.explicit() == right.attributes.explicit()
                && left.properties.is_empty()
                && right.properties.is_empty();
            if mergeable {
                let right = n.children.remove(i + 1);
                let left = &mut n.children[i];
                left.text = Some(format!("{}{}", left.text(), right.text()));
            } else {
                i += 1;
            }
        }
    });
}

pub(super) fn spec() -> Result<ConfigurationSpec, RegistrationError> {
    let mut macros = letters();
    macros.extend(operators());
    macros.extend(functions());
    macros.extend(fonts());
    macros.extend(structure());
    Ok(ConfigurationSpec::new()
        .map(
            HandlerType::Character,
            SymbolMap::pattern("letter", "[a-zA-Z]", ParseAction::Variable)?,
        )
        .map(
            HandlerType::Character,
            SymbolMap::pattern("digit", "[0-9.]", ParseAction::Digit)?,
        )
        .map(HandlerType::Character, characters())
        .map(HandlerType::Delimiter, delimiters())
        .handler(HandlerType::Macro, "delimiter")
        .map(HandlerType::Macro, SymbolMap::table("macros", macros))
        .map(
            HandlerType::Environment,
            SymbolMap::table("environment", environments()),
        )
        .fallback(HandlerType::Character, ParseAction::Other)
        .fallback(HandlerType::Macro, ParseAction::Undefined)
        .fallback(HandlerType::Environment, ParseAction::UnknownEnv)
        .tags("none", tags::no_tags)
        .tags("all", tags::all_tags)
        .postprocessor(Arc::new(combine_relations)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;

    #[test]
    fn test_base_is_valid() {
        let config = Configuration::create("base", spec().unwrap()).unwrap();
        assert_eq!(
            config.resolve(HandlerType::Character, "q"),
            Some(&ParseAction::Variable)
        );
        assert_eq!(
            config.resolve(HandlerType::Character, "7"),
            Some(&ParseAction::Digit)
        );
        assert_eq!(
            config.resolve(HandlerType::Character, "+"),
            Some(&ParseAction::Other)
        );
        assert_eq!(
            config.resolve(HandlerType::Macro, "\\"),
            Some(&ParseAction::Cr)
        );
    }

    #[test]
    fn test_combine_relations() {
        let rel = |text: &str| MmlNode::token(NodeKind::Mo, text).with_class(TexClass::Rel);
        let mut row = MmlNode::new(
            NodeKind::Mrow,
            vec![
                MmlNode::token(NodeKind::Mi, "a"),
                rel(":"),
                rel("="),
                MmlNode::token(NodeKind::Mi, "b"),
            ],
        );
        combine_relations(&mut row);
        assert_eq!(row.children.len(), 3);
        assert_eq!(row.children[1].text(), ":=");
    }

    #[test]
    fn test_combine_relations_keeps_positional_slots() {
        let rel = |text: &str| MmlNode::token(NodeKind::Mo, text).with_class(TexClass::Rel);
        for kind in [NodeKind::Msup, NodeKind::Mfrac, NodeKind::Mroot] {
            let mut node = MmlNode::new(kind, vec![rel("="), rel("=")]);
            combine_relations(&mut node);
            assert_eq!(node.children.len(), 2, "{kind}");
        }

        let mut nested = MmlNode::new(
            NodeKind::Mfrac,
            vec![
                MmlNode::new(NodeKind::Mrow, vec![rel("<"), rel("=")]),
                rel("="),
            ],
        );
        combine_relations(&mut nested);
        assert_eq!(nested.children.len(), 2);
        assert_eq!(nested.children[0].children.len(), 1);
        assert_eq!(nested.children[0].children[0].text(), "<=");
    }
}
