//! The `ams` package: amsmath environments, fractions and symbols.

use crate::actions::{AlignStyle, ParseAction};
use crate::configuration::ConfigurationSpec;
use crate::symbol_map::{HandlerType, SymbolMap};
use crate::tags;
use ferrotex_mml::TexClass;

fn genfrac(open: &str, close: &str, display: Option<bool>) -> ParseAction {
    ParseAction::Genfrac {
        open: open.to_string(),
        close: close.to_string(),
        thickness: Some("0".to_string()),
        display,
    }
}

fn macros() -> Vec<(&'static str, ParseAction)> {
    let rel = |text: &str| ParseAction::op_class(text, TexClass::Rel);
    let bin = |text: &str| ParseAction::op_class(text, TexClass::Bin);
    let ord = |text: &str| ParseAction::Ident {
        text: text.to_string(),
        variant: Some("normal".to_string()),
    };
    let int = |text: &str| ParseAction::LargeOp {
        text: text.to_string(),
        limits: false,
    };
    let arrow = |text: &str, under: bool| ParseAction::UnderOver {
        text: text.to_string(),
        under,
    };
    vec![
        ("dfrac", ParseAction::Frac {
            display: Some(true),
        }),
        ("tfrac", ParseAction::Frac {
            display: Some(false),
        }),
        ("binom", genfrac("(", ")", None)),
        ("dbinom", genfrac("(", ")", Some(true))),
        ("tbinom", genfrac("(", ")", Some(false))),
        ("operatorname", ParseAction::Operatorname),
        ("text", ParseAction::Text { variant: None }),
        ("eqref", ParseAction::Ref { eq: true }),
        (
            "overset",
            ParseAction::Overset {
                under: false,
                class: None,
            },
        ),
        (
            "underset",
            ParseAction::Overset {
                under: true,
                class: None,
            },
        ),
        ("iint", int("\u{222C}")),
        ("iiint", int("\u{222D}")),
        ("iiiint", int("\u{2A0C}")),
        ("overleftrightarrow", arrow("\u{2194}", false)),
        ("underleftarrow", arrow("\u{2190}", true)),
        ("underrightarrow", arrow("\u{2192}", true)),
        ("underleftrightarrow", arrow("\u{2194}", true)),
        ("implies", rel("\u{27F9}")),
        ("impliedby", rel("\u{27F8}")),
        ("leqslant", rel("\u{2A7D}")),
        ("geqslant", rel("\u{2A7E}")),
        ("nleq", rel("\u{2270}")),
        ("ngeq", rel("\u{2271}")),
        ("nless", rel("\u{226E}")),
        ("ngtr", rel("\u{226F}")),
        ("lesssim", rel("\u{2272}")),
        ("gtrsim", rel("\u{2273}")),
        ("subsetneq", rel("\u{228A}")),
        ("supsetneq", rel("\u{228B}")),
        ("therefore", rel("\u{2234}")),
        ("because", rel("\u{2235}")),
        ("coloneqq", rel("\u{2254}")),
        ("ltimes", bin("\u{22C9}")),
        ("rtimes", bin("\u{22CA}")),
        ("boxplus", bin("\u{229E}")),
        ("boxtimes", bin("\u{22A0}")),
        ("varnothing", ord("\u{2205}")),
        ("square", ord("\u{25A1}")),
        ("blacksquare", ord("\u{25A0}")),
        ("checkmark", ord("\u{2713}")),
        ("complement", ord("\u{2201}")),
        ("nexists", ord("\u{2204}")),
        ("hslash", ParseAction::ident("\u{210F}")),
        ("varGamma", ParseAction::ident("\u{0393}")),
        ("varDelta", ParseAction::ident("\u{0394}")),
        ("varTheta", ParseAction::ident("\u{0398}")),
        ("varLambda", ParseAction::ident("\u{039B}")),
        ("varPi", ParseAction::ident("\u{03A0}")),
        ("varSigma", ParseAction::ident("\u{03A3}")),
        ("varPhi", ParseAction::ident("\u{03A6}")),
        ("varPsi", ParseAction::ident("\u{03A8}")),
        ("varOmega", ParseAction::ident("\u{03A9}")),
    ]
}

fn matrix(open: Option<&str>, close: Option<&str>) -> ParseAction {
    ParseAction::Matrix {
        open: open.map(str::to_string),
        close: close.map(str::to_string),
    }
}

fn eqn_array(style: AlignStyle, numbered: bool, top_level: bool) -> ParseAction {
    ParseAction::EqnArray {
        style,
        numbered,
        top_level,
    }
}

fn environments() -> Vec<(&'static str, ParseAction)> {
    vec![
        ("matrix", matrix(None, None)),
        ("pmatrix", matrix(Some("("), Some(")"))),
        ("bmatrix", matrix(Some("["), Some("]"))),
        ("Bmatrix", matrix(Some("{"), Some("}"))),
        ("vmatrix", matrix(Some("|"), Some("|"))),
        ("Vmatrix", matrix(Some("\u{2016}"), Some("\u{2016}"))),
        ("cases", ParseAction::Cases),
        ("align", eqn_array(AlignStyle::Align, true, true)),
        ("align*", eqn_array(AlignStyle::Align, false, true)),
        ("gather", eqn_array(AlignStyle::Gather, true, true)),
        ("gather*", eqn_array(AlignStyle::Gather, false, true)),
        ("aligned", eqn_array(AlignStyle::Align, false, false)),
        ("gathered", eqn_array(AlignStyle::Gather, false, false)),
        ("split", eqn_array(AlignStyle::Align, false, false)),
    ]
}

pub(super) fn spec() -> ConfigurationSpec {
    ConfigurationSpec::new()
        .require("base")
        .map(HandlerType::Macro, SymbolMap::table("ams-macros", macros()))
        .map(
            HandlerType::Environment,
            SymbolMap::table("ams-environment", environments()),
        )
        .tags("ams", tags::ams_tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Configuration;

    #[test]
    fn test_starred_environments_are_unnumbered() {
        let config = Configuration::create("ams", spec()).unwrap();
        assert_eq!(
            config.find(HandlerType::Environment, "align*"),
            Some(&eqn_array(AlignStyle::Align, false, true))
        );
        assert_eq!(config.requires(), ["base".to_string()]);
        assert!(config.tags_constructor("ams").is_some());
    }
}
