//! Packages and their composition.
//!
//! A package is described by a [`ConfigurationSpec`] and validated into an
//! immutable [`Configuration`] by [`Configuration::create`]. Packages compose
//! with [`Configuration::append`]:
//!
//! - handler lists (the ordered symbol-map names for each [`HandlerType`])
//!   are *prepended*, so the package loaded last wins a lookup while earlier
//!   packages stay reachable for symbols it does not define
//! - single-valued settings (fallback actions, stack-item overrides, tag
//!   schemes, option defaults, node hooks per kind) are replaced, last wins;
//!   replacing a different fallback is logged as a warning
//! - pre- and post-processors accumulate in load order

use crate::actions::ParseAction;
use crate::error::RegistrationError;
use crate::options::OptionSchema;
use crate::stack::{ItemCaps, ItemKind};
use crate::symbol_map::{HandlerType, SymbolMap};
use crate::tags::TagsConstructor;
use ferrotex_mml::{MmlNode, NodeHook, NodeKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Rewrites the source text before parsing.
pub type Preprocessor = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Adjusts the finished tree.
pub type Postprocessor = Arc<dyn Fn(&mut MmlNode) + Send + Sync>;

/// Everything a package contributes, before validation.
#[derive(Clone, Default)]
pub struct ConfigurationSpec {
    pub handlers: BTreeMap<HandlerType, Vec<String>>,
    pub maps: Vec<SymbolMap>,
    pub fallbacks: BTreeMap<HandlerType, ParseAction>,
    pub items: Vec<(ItemKind, ItemCaps)>,
    pub tags: Vec<(String, TagsConstructor)>,
    pub options: OptionSchema,
    pub hooks: Vec<(NodeKind, NodeHook)>,
    pub preprocessors: Vec<Preprocessor>,
    pub postprocessors: Vec<Postprocessor>,
    /// Packages loaded before this one.
    pub requires: Vec<String>,
}

impl ConfigurationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `map` and lists it for `handler`.
    pub fn map(mut self, handler: HandlerType, map: SymbolMap) -> Self {
        self.handlers
            .entry(handler)
            .or_default()
            .push(map.name().to_string());
        self.maps.push(map);
        self
    }

    /// Lists an already defined map for another handler type.
    pub fn handler(mut self, handler: HandlerType, name: &str) -> Self {
        self.handlers
            .entry(handler)
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn fallback(mut self, handler: HandlerType, action: ParseAction) -> Self {
        self.fallbacks.insert(handler, action);
        self
    }

    pub fn item(mut self, kind: ItemKind, caps: ItemCaps) -> Self {
        self.items.push((kind, caps));
        self
    }

    pub fn tags(mut self, name: &str, constructor: TagsConstructor) -> Self {
        self.tags.push((name.to_string(), constructor));
        self
    }

    pub fn option(mut self, key: &str, default: Value) -> Self {
        self.options.declare(key, default);
        self
    }

    pub fn hook(mut self, kind: NodeKind, hook: NodeHook) -> Self {
        self.hooks.push((kind, hook));
        self
    }

    pub fn preprocessor(mut self, processor: Preprocessor) -> Self {
        self.preprocessors.push(processor);
        self
    }

    pub fn postprocessor(mut self, processor: Postprocessor) -> Self {
        self.postprocessors.push(processor);
        self
    }

    pub fn require(mut self, package: &str) -> Self {
        self.requires.push(package.to_string());
        self
    }
}

/// A validated package, or the composition of several.
#[derive(Clone)]
pub struct Configuration {
    name: String,
    packages: Vec<String>,
    handlers: BTreeMap<HandlerType, Vec<String>>,
    maps: HashMap<String, Arc<SymbolMap>>,
    fallbacks: BTreeMap<HandlerType, ParseAction>,
    items: HashMap<ItemKind, ItemCaps>,
    tags: BTreeMap<String, TagsConstructor>,
    options: OptionSchema,
    hooks: BTreeMap<NodeKind, NodeHook>,
    preprocessors: Vec<Preprocessor>,
    postprocessors: Vec<Postprocessor>,
    requires: Vec<String>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("name", &self.name)
            .field("packages", &self.packages)
            .field("handlers", &self.handlers)
            .field("fallbacks", &self.fallbacks)
            .field("tags", &self.tags.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Configuration {
    /// A configuration with nothing in it, the starting point of a
    /// composition.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            packages: Vec::new(),
            handlers: BTreeMap::new(),
            maps: HashMap::new(),
            fallbacks: BTreeMap::new(),
            items: HashMap::new(),
            tags: BTreeMap::new(),
            options: OptionSchema::default(),
            hooks: BTreeMap::new(),
            preprocessors: Vec::new(),
            postprocessors: Vec::new(),
            requires: Vec::new(),
        }
    }

    /// Validates a package description.
    ///
    /// Fails when a handler list names a map the package does not define, or
    /// when two maps share a name but differ.
    pub fn create(name: &str, spec: ConfigurationSpec) -> Result<Self, RegistrationError> {
        let mut maps: HashMap<String, Arc<SymbolMap>> = HashMap::new();
        for map in spec.maps {
            match maps.get(map.name()) {
                Some(existing) if **existing != map => {
                    return Err(RegistrationError::DuplicateMap {
                        package: name.to_string(),
                        map: map.name().to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    maps.insert(map.name().to_string(), Arc::new(map));
                }
            }
        }

        let mut handlers = BTreeMap::new();
        for (handler, names) in spec.handlers {
            let mut list: Vec<String> = Vec::new();
            for map_name in names {
                if !maps.contains_key(&map_name) {
                    return Err(RegistrationError::UnknownMap {
                        package: name.to_string(),
                        map: map_name,
                    });
                }
                if !list.contains(&map_name) {
                    list.push(map_name);
                }
            }
            handlers.insert(handler, list);
        }

        let mut config = Self::empty(name);
        config.packages.push(name.to_string());
        config.handlers = handlers;
        config.maps = maps;
        config.fallbacks = spec.fallbacks;
        config.items = spec.items.into_iter().collect();
        config.tags = spec.tags.into_iter().collect();
        config.options = spec.options;
        config.hooks = spec.hooks.into_iter().collect();
        config.preprocessors = spec.preprocessors;
        config.postprocessors = spec.postprocessors;
        config.requires = spec.requires;
        Ok(config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the packages composed into this configuration, in load order.
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p == name)
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Map names consulted for `handler`, highest priority first.
    pub fn handler_list(&self, handler: HandlerType) -> &[String] {
        self.handlers.get(&handler).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn symbol_map(&self, name: &str) -> Option<&SymbolMap> {
        self.maps.get(name).map(Arc::as_ref)
    }

    pub fn fallback(&self, handler: HandlerType) -> Option<&ParseAction> {
        self.fallbacks.get(&handler)
    }

    pub fn item_caps(&self, kind: ItemKind) -> ItemCaps {
        self.items
            .get(&kind)
            .copied()
            .unwrap_or_else(|| ItemCaps::for_kind(kind))
    }

    pub fn tags_constructor(&self, name: &str) -> Option<TagsConstructor> {
        self.tags.get(name).copied()
    }

    pub fn tag_schemes(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn options(&self) -> &OptionSchema {
        &self.options
    }

    pub fn hooks(&self) -> impl Iterator<Item = (NodeKind, &NodeHook)> {
        self.hooks.iter().map(|(kind, hook)| (*kind, hook))
    }

    pub fn preprocessors(&self) -> &[Preprocessor] {
        &self.preprocessors
    }

    pub fn postprocessors(&self) -> &[Postprocessor] {
        &self.postprocessors
    }

    /// The first map entry for `symbol`, without falling back.
    pub fn find(&self, handler: HandlerType, symbol: &str) -> Option<&ParseAction> {
        self.handler_list(handler).iter().find_map(|name| {
            self.maps
                .get(name)
                .and_then(|map| map.lookup_for(handler, symbol))
        })
    }

    /// The action for `symbol`: the first map entry in priority order, else
    /// this configuration's fallback for `handler`.
    pub fn resolve(&self, handler: HandlerType, symbol: &str) -> Option<&ParseAction> {
        self.find(handler, symbol).or_else(|| self.fallback(handler))
    }

    /// Layers `other` on top of this configuration.
    pub fn append(&mut self, other: &Configuration) -> Result<(), RegistrationError> {
        for (name, map) in &other.maps {
            if let Some(existing) = self.maps.get(name) {
                if !Arc::ptr_eq(existing, map) && **existing != **map {
                    return Err(RegistrationError::ConflictingMap {
                        package: other.name.clone(),
                        map: name.clone(),
                    });
                }
            }
        }
        log::debug!("appending package '{}' to '{}'", other.name, self.name);

        for (name, map) in &other.maps {
            self.maps.insert(name.clone(), Arc::clone(map));
        }
        for handler in HandlerType::ALL {
            let incoming = other.handler_list(handler);
            if incoming.is_empty() {
                continue;
            }
            let mut merged: Vec<String> = incoming.to_vec();
            merged.extend(
                self.handler_list(handler)
                    .iter()
                    .filter(|name| !incoming.contains(name))
                    .cloned(),
            );
            self.handlers.insert(handler, merged);
        }
        for (handler, action) in &other.fallbacks {
            if let Some(previous) = self.fallbacks.get(handler) {
                if previous != action {
                    log::warn!(
                        "package '{}' replaces the {:?} fallback ({} -> {})",
                        other.name,
                        handler,
                        previous.opcode(),
                        action.opcode()
                    );
                }
            }
            self.fallbacks.insert(*handler, action.clone());
        }
        self.items.extend(other.items.iter().map(|(k, v)| (*k, *v)));
        self.tags
            .extend(other.tags.iter().map(|(k, v)| (k.clone(), *v)));
        self.options.extend(&other.options);
        self.hooks
            .extend(other.hooks.iter().map(|(k, v)| (*k, Arc::clone(v))));
        self.preprocessors.extend(other.preprocessors.iter().cloned());
        self.postprocessors.extend(other.postprocessors.iter().cloned());
        for package in &other.packages {
            if !self.has_package(package) {
                self.packages.push(package.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ParseAction;

    fn package(name: &str, map: &str, entries: &[(&str, &str)]) -> Configuration {
        let map = SymbolMap::table(
            map,
            entries
                .iter()
                .map(|(k, body)| (*k, ParseAction::macro_body(body, 0))),
        );
        Configuration::create(name, ConfigurationSpec::new().map(HandlerType::Macro, map)).unwrap()
    }

    #[test]
    fn test_unknown_map_is_rejected() {
        let spec = ConfigurationSpec::new().handler(HandlerType::Macro, "missing");
        let err = Configuration::create("broken", spec).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnknownMap {
                package: "broken".into(),
                map: "missing".into()
            }
        );
    }

    #[test]
    fn test_duplicate_map_with_different_contents() {
        let spec = ConfigurationSpec::new()
            .map(
                HandlerType::Macro,
                SymbolMap::table("m", [("a", ParseAction::Relax)]),
            )
            .map(
                HandlerType::Macro,
                SymbolMap::table("m", [("b", ParseAction::Relax)]),
            );
        assert!(matches!(
            Configuration::create("dup", spec),
            Err(RegistrationError::DuplicateMap { .. })
        ));
    }

    #[test]
    fn test_append_prepends_handler_lists() {
        let mut composed = Configuration::empty("doc");
        composed
            .append(&package("a", "a-macros", &[("foo", "A"), ("bar", "only-a")]))
            .unwrap();
        composed
            .append(&package("b", "b-macros", &[("foo", "B")]))
            .unwrap();

        assert_eq!(composed.handler_list(HandlerType::Macro), ["b-macros", "a-macros"]);
        assert_eq!(
            composed.resolve(HandlerType::Macro, "foo"),
            Some(&ParseAction::macro_body("B", 0))
        );
        assert_eq!(
            composed.resolve(HandlerType::Macro, "bar"),
            Some(&ParseAction::macro_body("only-a", 0))
        );
        assert_eq!(composed.packages(), ["a", "b"]);
    }

    #[test]
    fn test_reappending_moves_map_to_front_once() {
        let a = package("a", "a-macros", &[("x", "1")]);
        let b = package("b", "b-macros", &[("x", "2")]);
        let mut composed = Configuration::empty("doc");
        composed.append(&a).unwrap();
        composed.append(&b).unwrap();
        composed.append(&a).unwrap();
        assert_eq!(composed.handler_list(HandlerType::Macro), ["a-macros", "b-macros"]);
    }

    #[test]
    fn test_fallback_is_last_wins() {
        let first = Configuration::create(
            "strict",
            ConfigurationSpec::new().fallback(HandlerType::Macro, ParseAction::Undefined),
        )
        .unwrap();
        let second = Configuration::create(
            "lenient",
            ConfigurationSpec::new().fallback(HandlerType::Macro, ParseAction::UndefinedAsText),
        )
        .unwrap();
        let mut composed = Configuration::empty("doc");
        composed.append(&first).unwrap();
        composed.append(&second).unwrap();
        assert_eq!(
            composed.resolve(HandlerType::Macro, "nope"),
            Some(&ParseAction::UndefinedAsText)
        );
    }

    #[test]
    fn test_conflicting_map_names_across_packages() {
        let mut composed = Configuration::empty("doc");
        composed.append(&package("a", "shared", &[("x", "1")])).unwrap();
        let err = composed
            .append(&package("b", "shared", &[("x", "2")]))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ConflictingMap { .. }));
        // The failed append left the composition untouched.
        assert_eq!(composed.packages(), ["a"]);
    }
}
