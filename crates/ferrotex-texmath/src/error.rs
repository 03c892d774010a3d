//! Error types and the retry signal.
//!
//! Three things can stop a parse early:
//!
//! - a [`TexError`]: malformed input, always fatal to the current expression
//! - a retry request ([`Interrupt::NeedsResource`]): not an error, a request
//!   for the host to load a package and compile again
//! - a [`RegistrationError`]: raised while composing packages, before any
//!   document is parsed

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable identifier for each error kind, suitable for localization lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexErrorId {
    // Lexical
    MissingArgFor,
    MissingCloseBracket,
    ExtraCloseLooking,
    TokenNotFound,
    MissingDimOrUnits,
    MissingOrUnrecognizedDelim,
    MissingCS,
    IllegalControlSequenceName,
    MaxBufferSize,
    // Structural
    ExtraCloseMissingOpen,
    MissingLeftExtraRight,
    ExtraMiddle,
    MissingBeginExtraEnd,
    EnvBadEnd,
    Misplaced,
    AmbiguousUseOf,
    DoubleExponent,
    DoubleSubscripts,
    MissingOpenForSup,
    MissingOpenForSub,
    ExtraEndGroup,
    // Unterminated constructs
    ExtraOpenMissingClose,
    ExtraLeftMissingRight,
    EnvMissingEnd,
    MissingScript,
    // Semantic
    UndefinedControlSequence,
    UnknownEnv,
    IllegalParamNumber,
    MaxMacroSub,
    MultipleCommand,
    MultipleLabel,
    MisplacedTag,
    BadMathStyleFor,
    ExtraAlignTab,
    BadColumnSpec,
    UnknownPackage,
}

/// Broad class of a [`TexErrorId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Lexical,
    Structural,
    /// A scope was still open when the input ended.
    UnterminatedConstruct,
    Semantic,
}

impl TexErrorId {
    pub fn as_str(self) -> &'static str {
        match self {
            TexErrorId::MissingArgFor => "MissingArgFor",
            TexErrorId::MissingCloseBracket => "MissingCloseBracket",
            TexErrorId::ExtraCloseLooking => "ExtraCloseLooking",
            TexErrorId::TokenNotFound => "TokenNotFound",
            TexErrorId::MissingDimOrUnits => "MissingDimOrUnits",
            TexErrorId::MissingOrUnrecognizedDelim => "MissingOrUnrecognizedDelim",
            TexErrorId::MissingCS => "MissingCS",
            TexErrorId::IllegalControlSequenceName => "IllegalControlSequenceName",
            TexErrorId::MaxBufferSize => "MaxBufferSize",
            TexErrorId::ExtraCloseMissingOpen => "ExtraCloseMissingOpen",
            TexErrorId::MissingLeftExtraRight => "MissingLeftExtraRight",
            TexErrorId::ExtraMiddle => "ExtraMiddle",
            TexErrorId::MissingBeginExtraEnd => "MissingBeginExtraEnd",
            TexErrorId::EnvBadEnd => "EnvBadEnd",
            TexErrorId::Misplaced => "Misplaced",
            TexErrorId::AmbiguousUseOf => "AmbiguousUseOf",
            TexErrorId::DoubleExponent => "DoubleExponent",
            TexErrorId::DoubleSubscripts => "DoubleSubscripts",
            TexErrorId::MissingOpenForSup => "MissingOpenForSup",
            TexErrorId::MissingOpenForSub => "MissingOpenForSub",
            TexErrorId::ExtraEndGroup => "ExtraEndGroup",
            TexErrorId::ExtraOpenMissingClose => "ExtraOpenMissingClose",
            TexErrorId::ExtraLeftMissingRight => "ExtraLeftMissingRight",
            TexErrorId::EnvMissingEnd => "EnvMissingEnd",
            TexErrorId::MissingScript => "MissingScript",
            TexErrorId::UndefinedControlSequence => "UndefinedControlSequence",
            TexErrorId::UnknownEnv => "UnknownEnv",
            TexErrorId::IllegalParamNumber => "IllegalParamNumber",
            TexErrorId::MaxMacroSub => "MaxMacroSub",
            TexErrorId::MultipleCommand => "MultipleCommand",
            TexErrorId::MultipleLabel => "MultipleLabel",
            TexErrorId::MisplacedTag => "MisplacedTag",
            TexErrorId::BadMathStyleFor => "BadMathStyleFor",
            TexErrorId::ExtraAlignTab => "ExtraAlignTab",
            TexErrorId::BadColumnSpec => "BadColumnSpec",
            TexErrorId::UnknownPackage => "UnknownPackage",
        }
    }

    pub fn category(self) -> ErrorCategory {
        use TexErrorId::*;
        match self {
            MissingArgFor | MissingCloseBracket | ExtraCloseLooking | TokenNotFound
            | MissingDimOrUnits | MissingOrUnrecognizedDelim | MissingCS
            | IllegalControlSequenceName | MaxBufferSize => ErrorCategory::Lexical,
            ExtraCloseMissingOpen | MissingLeftExtraRight | ExtraMiddle | MissingBeginExtraEnd
            | EnvBadEnd | Misplaced | AmbiguousUseOf | DoubleExponent | DoubleSubscripts
            | MissingOpenForSup | MissingOpenForSub | ExtraEndGroup => ErrorCategory::Structural,
            ExtraOpenMissingClose | ExtraLeftMissingRight | EnvMissingEnd | MissingScript => {
                ErrorCategory::UnterminatedConstruct
            }
            UndefinedControlSequence | UnknownEnv | IllegalParamNumber | MaxMacroSub
            | MultipleCommand | MultipleLabel | MisplacedTag | BadMathStyleFor | ExtraAlignTab
            | BadColumnSpec | UnknownPackage => ErrorCategory::Semantic,
        }
    }
}

impl fmt::Display for TexErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal error in the TeX source.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TexError {
    pub id: TexErrorId,
    pub message: String,
    /// The macro or environment being processed when the error was raised.
    pub context: Option<String>,
}

impl TexError {
    pub fn new(id: TexErrorId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.id.category()
    }

    pub fn is_unterminated(&self) -> bool {
        self.category() == ErrorCategory::UnterminatedConstruct
    }

    pub(crate) fn missing_arg(name: &str) -> Self {
        Self::new(TexErrorId::MissingArgFor, format!("Missing argument for {name}"))
            .with_context(name)
    }
}

/// A resource (package) the parser needs before it can continue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a parse stopped before producing a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    Error(TexError),
    /// Abort the whole top-level parse; the host loads the resource and
    /// compiles the same source again.
    NeedsResource(ResourceId),
}

impl From<TexError> for Interrupt {
    fn from(error: TexError) -> Self {
        Interrupt::Error(error)
    }
}

pub type ParseResult<T> = Result<T, Interrupt>;

/// Result of a compile that did not fail with a [`TexError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    NeedsResource(ResourceId),
}

impl<T> Outcome<T> {
    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::NeedsResource(_) => None,
        }
    }
}

/// Mistakes made while building or composing packages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("package '{package}' lists symbol map '{map}' but does not define it")]
    UnknownMap { package: String, map: String },
    #[error("package '{package}' defines symbol map '{map}' twice")]
    DuplicateMap { package: String, map: String },
    #[error("symbol map '{map}' from '{package}' conflicts with an existing map of the same name")]
    ConflictingMap { package: String, map: String },
    #[error("invalid pattern for symbol map '{map}': {reason}")]
    InvalidPattern { map: String, reason: String },
    #[error("unknown package '{0}'")]
    UnknownPackage(String),
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_stable_strings() {
        assert_eq!(TexErrorId::EnvMissingEnd.to_string(), "EnvMissingEnd");
        assert_eq!(
            serde_json::to_string(&TexErrorId::ExtraCloseMissingOpen).unwrap(),
            "\"ExtraCloseMissingOpen\""
        );
    }

    #[test]
    fn test_unterminated_category() {
        let err = TexError::new(TexErrorId::ExtraLeftMissingRight, "Missing \\right");
        assert!(err.is_unterminated());
        assert_eq!(err.to_string(), "Missing \\right");
        assert!(!TexError::missing_arg("\\frac").is_unterminated());
    }

    #[test]
    fn test_interrupt_from_error() {
        let interrupt: Interrupt = TexError::missing_arg("\\sqrt").into();
        match interrupt {
            Interrupt::Error(e) => assert_eq!(e.context.as_deref(), Some("\\sqrt")),
            Interrupt::NeedsResource(_) => panic!("expected error"),
        }
    }
}
