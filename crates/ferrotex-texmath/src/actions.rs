//! Parse actions: what a symbol does when the parser meets it.
//!
//! Every entry in a symbol map is a [`ParseAction`], plain data that the
//! parser dispatches on with a single `match`. Keeping actions as data makes
//! configurations `Send + Sync`, serializable, and safe to reuse across a
//! restarted parse.

use ferrotex_mml::TexClass;
use serde::{Deserialize, Serialize};

/// Kind of column-aligned environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlignStyle {
    /// `align`, `aligned`, `split`: alternating right/left columns.
    Align,
    /// `gather`: one centered column.
    Gather,
}

/// An operation bound to a character, control sequence, delimiter, or
/// environment name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ParseAction {
    // Character handlers.
    /// A letter: `mi`, italic unless a font is active.
    Variable,
    /// The start of a number, scanned with the `numberPattern` option.
    Digit,
    Prime,
    Open,
    Close,
    Superscript,
    Subscript,
    Ampersand,
    /// `~`: a non-breaking space.
    Tilde,
    /// Whitespace, ignored in math mode.
    Space,
    /// `%` to end of line.
    Comment,
    /// `#` outside a macro body.
    Hash,
    /// Any other character: an operator.
    Other,

    // Symbols.
    Ident {
        text: String,
        #[serde(default)]
        variant: Option<String>,
    },
    Op {
        text: String,
        #[serde(default)]
        class: Option<TexClass>,
        #[serde(default)]
        stretchy: Option<bool>,
    },
    Delimiter {
        text: String,
    },
    /// `\sin`: an upright function name followed by function application.
    NamedFn {
        #[serde(default)]
        text: Option<String>,
    },
    /// `\lim`: an upright operator name with movable limits.
    NamedOp {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        limits: bool,
    },
    /// `\sum`, `\int`: a large operator.
    LargeOp {
        text: String,
        limits: bool,
    },

    // Structure.
    Frac {
        #[serde(default)]
        display: Option<bool>,
    },
    /// `\binom` and relatives: a fenced fraction.
    Genfrac {
        open: String,
        close: String,
        #[serde(default)]
        thickness: Option<String>,
        #[serde(default)]
        display: Option<bool>,
    },
    Sqrt,
    Root,
    Left,
    Right,
    Middle,
    /// `\over`, `\atop`, `\choose`: infix fractions.
    Infix {
        #[serde(default)]
        thickness: Option<String>,
        #[serde(default)]
        open: Option<String>,
        #[serde(default)]
        close: Option<String>,
    },
    /// `\rm`, `\bf`: switch the font for the rest of the group.
    FontSwitch {
        variant: String,
    },
    /// `\mathrm{...}`: set the font for one argument.
    MathFont {
        variant: String,
    },
    /// `\displaystyle` and relatives.
    Style {
        display: bool,
        level: i64,
    },
    Spacer {
        width: String,
    },
    Accent {
        text: String,
        #[serde(default)]
        stretchy: bool,
    },
    /// `\overline`, `\underbrace`: a stretchy mark above or below.
    UnderOver {
        text: String,
        under: bool,
    },
    /// `\stackrel`, `\overset`, `\underset`.
    Overset {
        under: bool,
        /// `\stackrel` makes a relation.
        #[serde(default)]
        class: Option<TexClass>,
    },
    Limits {
        limits: bool,
    },
    /// `\text`, `\mbox`, `\textbf`: text-mode argument.
    Text {
        #[serde(default)]
        variant: Option<String>,
    },
    /// `\mathop`, `\mathrel`, ...: force a TeX class on one argument.
    MathClass {
        class: TexClass,
    },
    Phantom,
    Not,
    Cr,
    Begin,
    End,
    Tag,
    NoTag,
    Label,
    Ref {
        eq: bool,
    },
    Operatorname,
    BoldSymbol,
    /// Does nothing.
    Relax,

    // Macros and scoping.
    Macro {
        body: String,
        #[serde(default)]
        args: usize,
        #[serde(default)]
        default: Option<String>,
    },
    NewCommand,
    NewEnvironment,
    Def,
    Let,
    BeginGroup,
    EndGroup,

    // Resource loading.
    /// Needs `package`; the first use aborts the parse so the host can load it.
    Autoload {
        package: String,
    },
    Require,

    // Environments.
    Matrix {
        #[serde(default)]
        open: Option<String>,
        #[serde(default)]
        close: Option<String>,
    },
    Array,
    Cases,
    Equation {
        numbered: bool,
    },
    EqnArray {
        style: AlignStyle,
        numbered: bool,
        /// Full-width display environment (`align`) rather than a nested
        /// block (`aligned`).
        top_level: bool,
    },
    UserEnv {
        begin: String,
        end: String,
        #[serde(default)]
        args: usize,
        #[serde(default)]
        default: Option<String>,
    },

    // Fallbacks.
    /// Unknown control sequence: an error.
    Undefined,
    /// Unknown control sequence rendered as red text.
    UndefinedAsText,
    UnknownEnv,
}

impl ParseAction {
    pub fn ident(text: &str) -> Self {
        ParseAction::Ident {
            text: text.to_string(),
            variant: None,
        }
    }

    pub fn op(text: &str) -> Self {
        ParseAction::Op {
            text: text.to_string(),
            class: None,
            stretchy: None,
        }
    }

    pub fn op_class(text: &str, class: TexClass) -> Self {
        ParseAction::Op {
            text: text.to_string(),
            class: Some(class),
            stretchy: None,
        }
    }

    pub fn delim(text: &str) -> Self {
        ParseAction::Delimiter {
            text: text.to_string(),
        }
    }

    pub fn macro_body(body: &str, args: usize) -> Self {
        ParseAction::Macro {
            body: body.to_string(),
            args,
            default: None,
        }
    }

    /// Short name used in debug logs.
    pub fn opcode(&self) -> &'static str {
        match self {
            ParseAction::Variable => "variable",
            ParseAction::Digit => "digit",
            ParseAction::Prime => "prime",
            ParseAction::Open => "open",
            ParseAction::Close => "close",
            ParseAction::Superscript => "superscript",
            ParseAction::Subscript => "subscript",
            ParseAction::Ampersand => "ampersand",
            ParseAction::Tilde => "tilde",
            ParseAction::Space => "space",
            ParseAction::Comment => "comment",
            ParseAction::Hash => "hash",
            ParseAction::Other => "other",
            ParseAction::Ident { .. } => "ident",
            ParseAction::Op { .. } => "op",
            ParseAction::Delimiter { .. } => "delimiter",
            ParseAction::NamedFn { .. } => "namedFn",
            ParseAction::NamedOp { .. } => "namedOp",
            ParseAction::LargeOp { .. } => "largeOp",
            ParseAction::Frac { .. } => "frac",
            ParseAction::Genfrac { .. } => "genfrac",
            ParseAction::Sqrt => "sqrt",
            ParseAction::Root => "root",
            ParseAction::Left => "left",
            ParseAction::Right => "right",
            ParseAction::Middle => "middle",
            ParseAction::Infix { .. } => "infix",
            ParseAction::FontSwitch { .. } => "fontSwitch",
            ParseAction::MathFont { .. } => "mathFont",
            ParseAction::Style { .. } => "style",
            ParseAction::Spacer { .. } => "spacer",
            ParseAction::Accent { .. } => "accent",
            ParseAction::UnderOver { .. } => "underOver",
            ParseAction::Overset { .. } => "overset",
            ParseAction::Limits { .. } => "limits",
            ParseAction::Text { .. } => "text",
            ParseAction::MathClass { .. } => "mathClass",
            ParseAction::Phantom => "phantom",
            ParseAction::Not => "not",
            ParseAction::Cr => "cr",
            ParseAction::Begin => "begin",
            ParseAction::End => "end",
            ParseAction::Tag => "tag",
            ParseAction::NoTag => "noTag",
            ParseAction::Label => "label",
            ParseAction::Ref { .. } => "ref",
            ParseAction::Operatorname => "operatorname",
            ParseAction::BoldSymbol => "boldsymbol",
            ParseAction::Relax => "relax",
            ParseAction::Macro { .. } => "macro",
            ParseAction::NewCommand => "newcommand",
            ParseAction::NewEnvironment => "newenvironment",
            ParseAction::Def => "def",
            ParseAction::Let => "let",
            ParseAction::BeginGroup => "begingroup",
            ParseAction::EndGroup => "endgroup",
            ParseAction::Autoload { .. } => "autoload",
            ParseAction::Require => "require",
            ParseAction::Matrix { .. } => "matrix",
            ParseAction::Array => "array",
            ParseAction::Cases => "cases",
            ParseAction::Equation { .. } => "equation",
            ParseAction::EqnArray { .. } => "eqnArray",
            ParseAction::UserEnv { .. } => "userEnv",
            ParseAction::Undefined => "undefined",
            ParseAction::UndefinedAsText => "undefinedAsText",
            ParseAction::UnknownEnv => "unknownEnv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_serialize_with_opcode_tag() {
        let action = ParseAction::LargeOp {
            text: "\u{2211}".into(),
            limits: true,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["op"], "largeOp");
        assert_eq!(json["limits"], true);
        assert_eq!(action.opcode(), "largeOp");
    }

    #[test]
    fn test_macro_from_json_defaults() {
        let action: ParseAction =
            serde_json::from_str(r#"{"op":"macro","body":"\\frac{1}{#1}","args":1}"#).unwrap();
        assert_eq!(action, ParseAction::macro_body("\\frac{1}{#1}", 1));
    }
}
