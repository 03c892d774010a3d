//! The packages shipped with this crate.
//!
//! | package        | provides                                              |
//! |----------------|-------------------------------------------------------|
//! | `base`         | characters, delimiters, core macros, `array`, tags    |
//! | `ams`          | matrices, `cases`, `align` and friends, `ams` tags     |
//! | `newcommand`   | `\newcommand`, `\newenvironment`, `\def`, `\let`      |
//! | `noundefined`  | unknown macros render as text instead of failing      |
//! | `boldsymbol`   | `\boldsymbol`                                         |
//! | `require`      | `\require{package}`                                   |
//! | `autoload`     | stubs that load a package on first use                |

mod ams;
mod base;
mod extras;
mod newcommand;

use crate::catalog::Catalog;
use crate::configuration::Configuration;
use crate::error::RegistrationError;

pub use base::combine_relations;

/// Registers every bundled package into `catalog`.
pub fn register_defaults(catalog: &mut Catalog) -> Result<(), RegistrationError> {
    catalog.register(Configuration::create("base", base::spec()?)?);
    catalog.register(Configuration::create("ams", ams::spec())?);
    catalog.register(Configuration::create("newcommand", newcommand::spec())?);
    catalog.register(Configuration::create("noundefined", extras::noundefined())?);
    catalog.register(Configuration::create("boldsymbol", extras::boldsymbol())?);
    catalog.register(Configuration::create("require", extras::require())?);
    catalog.register(Configuration::create("autoload", extras::autoload())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ParseAction;
    use crate::symbol_map::HandlerType;

    #[test]
    fn test_defaults_compose() {
        let catalog = Catalog::with_defaults().unwrap();
        let config = catalog
            .compose(&["base", "ams", "newcommand", "autoload"])
            .unwrap();
        assert!(matches!(
            config.resolve(HandlerType::Macro, "frac"),
            Some(ParseAction::Frac { display: None })
        ));
        assert!(matches!(
            config.resolve(HandlerType::Environment, "pmatrix"),
            Some(ParseAction::Matrix { .. })
        ));
        assert!(matches!(
            config.resolve(HandlerType::Macro, "boldsymbol"),
            Some(ParseAction::Autoload { .. })
        ));
        assert_eq!(
            config.resolve(HandlerType::Macro, "nosuchmacro"),
            Some(&ParseAction::Undefined)
        );
    }

    #[test]
    fn test_delimiters_serve_macros() {
        let catalog = Catalog::with_defaults().unwrap();
        let config = catalog.compose(&["base"]).unwrap();
        assert_eq!(
            config.find(HandlerType::Macro, "langle"),
            Some(&ParseAction::delim("\u{27E8}"))
        );
        assert!(config.find(HandlerType::Delimiter, "\\langle").is_some());
        assert!(config.find(HandlerType::Delimiter, "x").is_none());
    }

    #[test]
    fn test_loaded_package_wins() {
        let catalog = Catalog::with_defaults().unwrap();
        let config = catalog
            .compose(&["base", "autoload", "boldsymbol"])
            .unwrap();
        assert_eq!(
            config.resolve(HandlerType::Macro, "boldsymbol"),
            Some(&ParseAction::BoldSymbol)
        );
    }
}
