//! Small packages: `noundefined`, `boldsymbol`, `require`, `autoload`.

use crate::actions::ParseAction;
use crate::configuration::ConfigurationSpec;
use crate::symbol_map::{HandlerType, SymbolMap};
use serde_json::json;

/// Unknown control sequences render as their name in red.
pub(super) fn noundefined() -> ConfigurationSpec {
    ConfigurationSpec::new()
        .fallback(HandlerType::Macro, ParseAction::UndefinedAsText)
        .option(
            "noundefined",
            json!({ "color": "red", "background": "", "size": "" }),
        )
}

pub(super) fn boldsymbol() -> ConfigurationSpec {
    ConfigurationSpec::new().map(
        HandlerType::Macro,
        SymbolMap::table("boldsymbol", [("boldsymbol", ParseAction::BoldSymbol)]),
    )
}

/// `\require{name}` loads a package mid-expression. The `allow` table
/// overrides `defaultAllow` per package.
pub(super) fn require() -> ConfigurationSpec {
    ConfigurationSpec::new()
        .map(
            HandlerType::Macro,
            SymbolMap::table("require", [("require", ParseAction::Require)]),
        )
        .option(
            "require",
            json!({
                "allow": { "base": false, "autoload": false, "require": false },
                "defaultAllow": true,
            }),
        )
}

/// Macros that pull in their package the first time they are used.
pub(super) fn autoload() -> ConfigurationSpec {
    let load = |package: &str| ParseAction::Autoload {
        package: package.to_string(),
    };
    ConfigurationSpec::new().map(
        HandlerType::Macro,
        SymbolMap::table(
            "autoload-macros",
            [
                ("boldsymbol", load("boldsymbol")),
                ("newcommand", load("newcommand")),
                ("renewcommand", load("newcommand")),
                ("newenvironment", load("newcommand")),
                ("renewenvironment", load("newcommand")),
                ("def", load("newcommand")),
                ("let", load("newcommand")),
                ("begingroup", load("newcommand")),
                ("endgroup", load("newcommand")),
            ],
        ),
    )
}
