//! The registry of named packages.
//!
//! The host owns a [`Catalog`], registers packages into it during setup, and
//! composes the packages a document needs into one [`Configuration`].
//! Registration takes `&mut self`, compilation only `&self`, so the borrow
//! checker keeps the two from overlapping.

use crate::configuration::Configuration;
use crate::error::RegistrationError;
use crate::packages;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: BTreeMap<String, Arc<Configuration>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding every package shipped with this crate.
    pub fn with_defaults() -> Result<Self, RegistrationError> {
        let mut catalog = Self::new();
        packages::register_defaults(&mut catalog)?;
        Ok(catalog)
    }

    /// Registers `config` under its name, replacing any earlier package of
    /// the same name.
    pub fn register(&mut self, config: Configuration) {
        let name = config.name().to_string();
        if self
            .packages
            .insert(name.clone(), Arc::new(config))
            .is_some()
        {
            log::info!("Replaced package '{}'", name);
        } else {
            log::debug!("Registered package '{}'", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Configuration>> {
        self.packages.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    /// Composes the named packages, in order, with their requirements loaded
    /// first.
    pub fn compose<S: AsRef<str>>(&self, names: &[S]) -> Result<Configuration, RegistrationError> {
        let mut composed = Configuration::empty("document");
        for name in names {
            self.add_to(&mut composed, name.as_ref())?;
        }
        Ok(composed)
    }

    /// Appends `name` (and any requirement not yet present) to `target`.
    /// Packages already in `target` are left where they are.
    pub fn add_to(&self, target: &mut Configuration, name: &str) -> Result<(), RegistrationError> {
        let mut visiting = Vec::new();
        self.load(target, name, &mut visiting)
    }

    fn load(
        &self,
        target: &mut Configuration,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> Result<(), RegistrationError> {
        if target.has_package(name) || visiting.iter().any(|v| v == name) {
            return Ok(());
        }
        let config = self
            .get(name)
            .ok_or_else(|| RegistrationError::UnknownPackage(name.to_string()))?;
        visiting.push(name.to_string());
        for required in config.requires() {
            self.load(target, required, visiting)?;
        }
        visiting.pop();
        target.append(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ParseAction;
    use crate::configuration::ConfigurationSpec;
    use crate::symbol_map::{HandlerType, SymbolMap};

    fn leaf(name: &str, requires: &[&str]) -> Configuration {
        let mut spec = ConfigurationSpec::new().map(
            HandlerType::Macro,
            SymbolMap::table(&format!("{name}-macros"), [(name, ParseAction::Relax)]),
        );
        for r in requires {
            spec = spec.require(r);
        }
        Configuration::create(name, spec).unwrap()
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut catalog = Catalog::new();
        catalog.register(leaf("a", &[]));
        catalog.register(leaf("a", &["b"]));
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["a"]);
        assert_eq!(catalog.get("a").unwrap().requires(), ["b"]);
    }

    #[test]
    fn test_compose_loads_requirements_first() {
        let mut catalog = Catalog::new();
        catalog.register(leaf("base", &[]));
        catalog.register(leaf("extra", &["base"]));
        let composed = catalog.compose(&["extra"]).unwrap();
        assert_eq!(composed.packages(), ["base", "extra"]);
        assert_eq!(
            composed.handler_list(HandlerType::Macro),
            ["extra-macros", "base-macros"]
        );
    }

    #[test]
    fn test_require_cycles_terminate() {
        let mut catalog = Catalog::new();
        catalog.register(leaf("x", &["y"]));
        catalog.register(leaf("y", &["x"]));
        let composed = catalog.compose(&["x"]).unwrap();
        assert_eq!(composed.packages(), ["y", "x"]);
    }

    #[test]
    fn test_unknown_package() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.compose(&["nope"]).unwrap_err(),
            RegistrationError::UnknownPackage("nope".into())
        );
    }
}
