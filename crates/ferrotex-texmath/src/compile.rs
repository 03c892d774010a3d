//! The compile entry point.
//!
//! A [`TexCompiler`] owns one document's state: the composed configuration,
//! equation numbering, labels and user macros. Each [`TexCompiler::compile`]
//! call parses one expression and either returns its tree, asks the host for
//! a package, or fails according to the `formatError` policy.
//!
//! The host drives the restart loop:
//!
//! ```
//! use ferrotex_texmath::{Catalog, Outcome, TexCompiler, TexOptions};
//!
//! let catalog = Catalog::with_defaults().unwrap();
//! let mut compiler = TexCompiler::new(&catalog, TexOptions::default()).unwrap();
//! let tree = loop {
//!     match compiler.compile(r"\boldsymbol{x}", false).unwrap() {
//!         Outcome::Done(tree) => break tree,
//!         Outcome::NeedsResource(package) => compiler.add_package(package.as_str()).unwrap(),
//!     }
//! };
//! assert_eq!(tree.children[0].text(), "x");
//! ```

use crate::catalog::Catalog;
use crate::configuration::Configuration;
use crate::error::{Interrupt, Outcome, RegistrationError, TexError, TexErrorId};
use crate::options::{ErrorPolicy, TexOptions};
use crate::parse_options::ParseOptions;
use crate::parser::TexParser;
use crate::stack::{ParseEnv, clean_scripts};
use crate::tags::{self, TagsClass};
use ferrotex_mml::{MmlNode, NodeFactory, NodeKind, attr};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct TexCompiler<'c> {
    catalog: &'c Catalog,
    config: Configuration,
    options: TexOptions,
    parse_options: ParseOptions,
}

impl std::fmt::Debug for TexCompiler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TexCompiler")
            .field("config", &self.config)
            .field("parse_options", &self.parse_options)
            .finish_non_exhaustive()
    }
}

impl<'c> TexCompiler<'c> {
    /// Composes `options.packages` from `catalog`.
    pub fn new(catalog: &'c Catalog, options: TexOptions) -> Result<Self, RegistrationError> {
        let config = catalog.compose(&options.packages)?;
        let parse_options = ParseOptions::new(&config, &options)?;
        log::debug!(
            "compiler ready with packages [{}], tags '{}'",
            config.packages().join(", "),
            options.tags
        );
        Ok(Self {
            catalog,
            config,
            options,
            parse_options,
        })
    }

    /// Builds trees through a host-supplied factory.
    pub fn with_factory(mut self, factory: Arc<dyn NodeFactory>) -> Self {
        self.parse_options = self.parse_options.with_factory(factory);
        self
    }

    /// Compiles one expression.
    ///
    /// `Ok(Outcome::NeedsResource(id))` means the parse was abandoned because
    /// package `id` is needed: load it with [`add_package`](Self::add_package)
    /// and compile the same source again. Macro definitions made during the
    /// abandoned attempt are discarded.
    pub fn compile(&mut self, source: &str, display: bool) -> Result<Outcome<MmlNode>, TexError> {
        let checkpoint = self.parse_options.macros.checkpoint();
        self.parse_options.clear();
        self.parse_options.tags.start_equation();

        let source = self
            .config
            .preprocessors()
            .iter()
            .fold(source.to_string(), |text, process| process(&text));
        let env = ParseEnv {
            display,
            ..ParseEnv::default()
        };
        let result = TexParser::new(&source, env, &self.config, &mut self.parse_options).parse();

        match result {
            Ok(node) => Ok(Outcome::Done(self.finish(node, display))),
            Err(Interrupt::NeedsResource(id)) => {
                self.parse_options.macros.rollback(checkpoint);
                if !self.catalog.contains(id.as_str()) {
                    let error = TexError::new(
                        TexErrorId::UnknownPackage,
                        format!("Unknown package '{id}'"),
                    );
                    return self.fail(error, display);
                }
                log::debug!("parse abandoned, package '{}' needed", id);
                Ok(Outcome::NeedsResource(id))
            }
            Err(Interrupt::Error(error)) => {
                self.parse_options.macros.rollback(checkpoint);
                self.fail(error, display)
            }
        }
    }

    fn finish(&mut self, mut node: MmlNode, display: bool) -> MmlNode {
        let factory = Arc::clone(&self.parse_options.factory);
        clean_scripts(&mut node);

        let mut math = self.math(node, display, factory.as_ref());
        for process in self.config.postprocessors() {
            process(&mut math);
        }
        math.set_inherited_attributes(&BTreeMap::new(), display, 0);

        self.parse_options.tags.finish_equation();
        tags::resolve_refs(self.parse_options.tags.as_ref(), &mut math);
        math
    }

    /// Wraps the parsed expression in a `math` element, dropping a top-level
    /// `mrow` that only groups.
    fn math(&self, node: MmlNode, display: bool, factory: &dyn NodeFactory) -> MmlNode {
        let children = if node.kind == NodeKind::Mrow && node.attributes.explicit().is_empty() {
            node.children
        } else {
            vec![node]
        };
        let attrs = if display {
            vec![attr("display", "block")]
        } else {
            Vec::new()
        };
        factory.create(NodeKind::Math, attrs, children)
    }

    fn fail(&mut self, error: TexError, display: bool) -> Result<Outcome<MmlNode>, TexError> {
        self.parse_options.error = true;
        log::debug!("compile failed: {} ({})", error.message, error.id);
        match self.options.format_error {
            ErrorPolicy::Raise => Err(error),
            ErrorPolicy::Node => {
                let factory = Arc::clone(&self.parse_options.factory);
                let node = error_node(&error, factory.as_ref());
                let mut math = self.math(node, display, factory.as_ref());
                math.set_inherited_attributes(&BTreeMap::new(), display, 0);
                Ok(Outcome::Done(math))
            }
        }
    }

    /// Loads `name` (and its requirements) into the active configuration.
    pub fn add_package(&mut self, name: &str) -> Result<(), RegistrationError> {
        self.catalog.add_to(&mut self.config, name)?;
        if !self.options.packages.iter().any(|p| p == name) {
            self.options.packages.push(name.to_string());
        }
        self.parse_options.reconfigure(&self.config, &self.options)?;
        log::info!("Loaded package '{}'", name);
        Ok(())
    }

    /// Restarts equation numbering at `offset` and forgets all labels.
    pub fn reset(&mut self, offset: usize) {
        self.parse_options.tags.reset(offset);
    }

    /// Fills `\ref`s in an earlier tree whose labels were defined later.
    /// Returns how many are still unresolved.
    pub fn resolve_references(&mut self, node: &mut MmlNode) -> usize {
        let scheme = &mut self.parse_options.tags;
        scheme.state_mut().ref_update = true;
        let remaining = tags::resolve_refs(scheme.as_ref(), node);
        scheme.state_mut().ref_update = false;
        remaining
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn options(&self) -> &TexOptions {
        &self.options
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.parse_options
    }

    pub fn tags(&self) -> &dyn TagsClass {
        self.parse_options.tags.as_ref()
    }

    /// Whether the last compile failed.
    pub fn had_error(&self) -> bool {
        self.parse_options.error
    }
}

/// The `merror` shown in place of an expression that failed to compile.
pub fn error_node(error: &TexError, factory: &dyn NodeFactory) -> MmlNode {
    let text = factory.create_token(NodeKind::Mtext, vec![], &error.message);
    factory.create(
        NodeKind::Merror,
        vec![
            attr("data-mjx-error", error.message.as_str()),
            attr("title", error.message.as_str()),
        ],
        vec![text],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler(catalog: &Catalog, options: TexOptions) -> TexCompiler<'_> {
        TexCompiler::new(catalog, options).unwrap()
    }

    #[test]
    fn test_error_policy_node() {
        let catalog = Catalog::with_defaults().unwrap();
        let mut compiler = compiler(&catalog, TexOptions::default());
        let tree = compiler.compile("x}", false).unwrap().done().unwrap();
        assert_eq!(tree.children[0].kind, NodeKind::Merror);
        assert!(compiler.had_error());

        compiler.compile("x", false).unwrap();
        assert!(!compiler.had_error());
    }

    #[test]
    fn test_error_policy_raise() {
        let catalog = Catalog::with_defaults().unwrap();
        let options = TexOptions {
            format_error: ErrorPolicy::Raise,
            ..TexOptions::default()
        };
        let err = compiler(&catalog, options).compile("x}", false).unwrap_err();
        assert_eq!(err.id, TexErrorId::ExtraCloseMissingOpen);
    }

    #[test]
    fn test_unknown_package_is_an_error() {
        let catalog = Catalog::with_defaults().unwrap();
        let options = TexOptions {
            format_error: ErrorPolicy::Raise,
            ..TexOptions::default()
        };
        let err = compiler(&catalog, options)
            .compile(r"\require{nosuch}", false)
            .unwrap_err();
        assert_eq!(err.id, TexErrorId::UnknownPackage);
    }

    #[test]
    fn test_display_math_is_block() {
        let catalog = Catalog::with_defaults().unwrap();
        let mut compiler = compiler(&catalog, TexOptions::default());
        let tree = compiler.compile("x", true).unwrap().done().unwrap();
        assert_eq!(tree.kind, NodeKind::Math);
        assert_eq!(
            tree.attributes.get_explicit("display").and_then(|v| v.as_str()),
            Some("block")
        );
    }

    #[test]
    fn test_failed_compile_discards_macros() {
        let catalog = Catalog::with_defaults().unwrap();
        let mut compiler = compiler(&catalog, TexOptions::default());
        compiler
            .compile(r"\newcommand{\a}{1}}", false)
            .unwrap();
        assert!(compiler.parse_options().macros.lookup_macro("a").is_none());

        compiler.compile(r"\newcommand{\b}{2}", false).unwrap();
        assert!(compiler.parse_options().macros.lookup_macro("b").is_some());
    }
}
