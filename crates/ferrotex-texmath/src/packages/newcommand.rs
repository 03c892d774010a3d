//! The `newcommand` package: user-defined macros and environments.

use crate::actions::ParseAction;
use crate::configuration::ConfigurationSpec;
use crate::symbol_map::{HandlerType, SymbolMap};

pub(super) fn spec() -> ConfigurationSpec {
    ConfigurationSpec::new().require("base").map(
        HandlerType::Macro,
        SymbolMap::table(
            "newcommand-macros",
            [
                ("newcommand", ParseAction::NewCommand),
                ("renewcommand", ParseAction::NewCommand),
                ("newenvironment", ParseAction::NewEnvironment),
                ("renewenvironment", ParseAction::NewEnvironment),
                ("def", ParseAction::Def),
                ("let", ParseAction::Let),
                ("begingroup", ParseAction::BeginGroup),
                ("endgroup", ParseAction::EndGroup),
            ],
        ),
    )
}
