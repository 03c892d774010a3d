//! Per-document state shared by every parser of one compile.
//!
//! A [`ParseOptions`] outlives individual parses: equation counters, labels
//! and user macros carry over from one expression to the next. Sub-parsers
//! created for macro arguments borrow the same instance.

use crate::configuration::Configuration;
use crate::error::{RegistrationError, TexError, TexErrorId};
use crate::options::TexOptions;
use crate::scope::MacroScope;
use crate::tags::{TagLayout, TagsClass};
use ferrotex_mml::{DefaultNodeFactory, NodeFactory};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub struct ParseOptions {
    pub factory: Arc<dyn NodeFactory>,
    pub tags: Box<dyn TagsClass>,
    pub macros: MacroScope,
    pub number_pattern: Regex,
    pub identifier_pattern: Option<Regex>,
    pub max_macros: usize,
    pub max_buffer: usize,
    /// Package options after defaults and user values were merged.
    pub package_options: Map<String, Value>,
    /// Macro substitutions performed in the current compile.
    pub macro_count: usize,
    /// Set once the current compile produced an error.
    pub error: bool,
    custom_factory: bool,
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("tags", &self.tags.name())
            .field("macros", &self.macros)
            .field("max_macros", &self.max_macros)
            .field("max_buffer", &self.max_buffer)
            .field("macro_count", &self.macro_count)
            .finish_non_exhaustive()
    }
}

impl ParseOptions {
    pub fn new(config: &Configuration, options: &TexOptions) -> Result<Self, RegistrationError> {
        let (number_pattern, identifier_pattern) = options.patterns()?;
        let package_options = config.options().merge(&options.extra)?;
        let constructor = config.tags_constructor(&options.tags).ok_or_else(|| {
            RegistrationError::InvalidOption {
                key: "tags".to_string(),
                reason: format!(
                    "unknown numbering scheme '{}' (available: {})",
                    options.tags,
                    config.tag_schemes().collect::<Vec<_>>().join(", ")
                ),
            }
        })?;
        let layout = TagLayout {
            side: options.tag_side.clone(),
            indent: options.tag_indent.clone(),
            use_label_ids: options.use_label_ids,
        };
        Ok(Self {
            factory: build_factory(config),
            tags: constructor(layout),
            macros: MacroScope::default(),
            number_pattern,
            identifier_pattern,
            max_macros: options.max_macros,
            max_buffer: options.max_buffer,
            package_options,
            macro_count: 0,
            error: false,
            custom_factory: false,
        })
    }

    /// Builds trees through `factory` instead of the default one. Hooks
    /// registered by packages are not applied to a custom factory.
    pub fn with_factory(mut self, factory: Arc<dyn NodeFactory>) -> Self {
        self.factory = factory;
        self.custom_factory = true;
        self
    }

    /// Picks up hooks and option declarations after a package was added.
    pub fn reconfigure(
        &mut self,
        config: &Configuration,
        options: &TexOptions,
    ) -> Result<(), RegistrationError> {
        self.package_options = config.options().merge(&options.extra)?;
        if !self.custom_factory {
            self.factory = build_factory(config);
        }
        Ok(())
    }

    /// Resets the per-compile counters.
    pub fn clear(&mut self) {
        self.macro_count = 0;
        self.error = false;
    }

    /// Counts one macro substitution, failing once the limit is passed.
    pub fn count_macro(&mut self) -> Result<(), TexError> {
        self.macro_count += 1;
        if self.macro_count > self.max_macros {
            return Err(TexError::new(
                TexErrorId::MaxMacroSub,
                "Maximum macro substitution count exceeded; is there a recursive macro call?",
            ));
        }
        Ok(())
    }

    /// A package option by key, e.g. `noundefined`.
    pub fn package_option(&self, key: &str) -> Option<&Value> {
        self.package_options.get(key)
    }
}

fn build_factory(config: &Configuration) -> Arc<dyn NodeFactory> {
    let mut factory = DefaultNodeFactory::new();
    for (kind, hook) in config.hooks() {
        factory.add_hook(kind, hook.clone());
    }
    Arc::new(factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::ConfigurationSpec;
    use crate::tags;

    fn config() -> Configuration {
        Configuration::create(
            "t",
            ConfigurationSpec::new()
                .tags("none", tags::no_tags)
                .option("answer", serde_json::json!(42)),
        )
        .unwrap()
    }

    #[test]
    fn test_macro_limit() {
        let options = TexOptions {
            max_macros: 2,
            ..TexOptions::default()
        };
        let mut parse_options = ParseOptions::new(&config(), &options).unwrap();
        assert!(parse_options.count_macro().is_ok());
        assert!(parse_options.count_macro().is_ok());
        assert_eq!(
            parse_options.count_macro().unwrap_err().id,
            TexErrorId::MaxMacroSub
        );
        parse_options.clear();
        assert!(parse_options.count_macro().is_ok());
    }

    #[test]
    fn test_unknown_tag_scheme() {
        let options = TexOptions::default().with_tags("fancy");
        let err = ParseOptions::new(&config(), &options).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidOption { ref key, .. } if key == "tags"));
    }

    #[test]
    fn test_package_option_defaults() {
        let parse_options = ParseOptions::new(&config(), &TexOptions::default()).unwrap();
        assert_eq!(
            parse_options.package_option("answer"),
            Some(&serde_json::json!(42))
        );
    }
}
