//! # FerroTeX Math
//!
//! Compiles TeX math notation into a [`ferrotex_mml`] expression tree.
//!
//! ## Overview
//!
//! The compiler is built from independent layers:
//!
//! - [`tokenizer`] - character-level scanning of arguments, brackets,
//!   delimiters and dimensions
//! - [`symbol_map`], [`configuration`], [`catalog`] - the package system.
//!   Packages contribute named symbol maps for four handler types
//!   (characters, delimiters, macros, environments) and are composed in load
//!   order, later packages taking lookup priority
//! - [`parser`], [`stack`] - the parser dispatches each symbol to a
//!   [`ParseAction`] and assembles the tree on a stack of scope items that
//!   accept, close, or reject whatever is pushed onto them
//! - [`tags`] - equation numbering, labels and references
//! - [`compile`] - the entry point, error policy and restart protocol
//!
//! ## Design Philosophy
//!
//! - **Explicit registry**: the host owns a [`Catalog`] and registers
//!   packages into it; nothing registers itself
//! - **Actions are data**: [`ParseAction`] is a plain enum, so
//!   configurations are `Send + Sync` and serializable
//! - **Restart, don't suspend**: a macro that needs a package not yet loaded
//!   abandons the parse with [`Outcome::NeedsResource`]; the host loads it
//!   and compiles the same text again
//!
//! ## Examples
//!
//! ```
//! use ferrotex_texmath::{Catalog, TexCompiler, TexOptions};
//! use ferrotex_mml::serialize::to_mathml;
//!
//! let catalog = Catalog::with_defaults().unwrap();
//! let mut compiler = TexCompiler::new(&catalog, TexOptions::default()).unwrap();
//! let tree = compiler.compile("x^2", false).unwrap().done().unwrap();
//! assert_eq!(
//!     to_mathml(&tree),
//!     "<math><msup><mi>x</mi><mn>2</mn></msup></math>"
//! );
//! ```

pub mod actions;
pub mod catalog;
pub mod compile;
pub mod configuration;
pub mod environments;
pub mod error;
mod macros;
mod methods;
pub mod options;
pub mod packages;
pub mod parse_options;
pub mod parser;
pub mod scope;
pub mod stack;
pub mod symbol_map;
pub mod tags;
pub mod tokenizer;

pub use actions::{AlignStyle, ParseAction};
pub use catalog::Catalog;
pub use compile::{TexCompiler, error_node};
pub use configuration::{Configuration, ConfigurationSpec, Postprocessor, Preprocessor};
pub use error::{
    ErrorCategory, Interrupt, Outcome, ParseResult, RegistrationError, ResourceId, TexError,
    TexErrorId,
};
pub use options::{ErrorPolicy, OptionSchema, OptionsError, TexOptions};
pub use parse_options::ParseOptions;
pub use symbol_map::{HandlerType, SymbolMap};
pub use tags::{TagLayout, TagsClass};
