//! The TeX math parser.
//!
//! ## Overview
//!
//! [`TexParser`] walks its input one character at a time. A backslash starts
//! a control sequence; anything else is a character. Each symbol is looked up
//! in the [`Configuration`]'s handler lists (user macros first) and the
//! resulting [`ParseAction`] is executed. Actions read their own arguments
//! from the [`Tokenizer`], push nodes, or push [`StackItem`]s whose check
//! functions assemble the tree.
//!
//! Macro arguments are parsed by sub-parsers sharing the same
//! [`ParseOptions`], so counters, labels and user macros are one per
//! document.

use crate::actions::ParseAction;
use crate::configuration::Configuration;
use crate::error::{Interrupt, ParseResult, ResourceId, TexError, TexErrorId};
use crate::parse_options::ParseOptions;
use crate::stack::{ItemKind, ParseEnv, ScriptSlot, Stack, StackContext, StackItem};
use crate::symbol_map::HandlerType;
use crate::tokenizer::{Tokenizer, join_args};
use ferrotex_mml::{AttributeList, MmlNode, NodeFactory, NodeKind};

static UNDEFINED: ParseAction = ParseAction::Undefined;
static UNKNOWN_ENV: ParseAction = ParseAction::UnknownEnv;
static OTHER: ParseAction = ParseAction::Other;

pub struct TexParser<'a> {
    pub(crate) config: &'a Configuration,
    pub(crate) options: &'a mut ParseOptions,
    pub(crate) input: Tokenizer,
    pub(crate) stack: Stack,
    /// The control sequence (or character) being executed, for messages.
    pub(crate) current_cs: String,
    /// Parsing a macro argument rather than a whole expression.
    pub(crate) inner: bool,
    /// Top-level display math.
    pub(crate) display: bool,
}

impl<'a> TexParser<'a> {
    pub fn new(
        source: &str,
        env: ParseEnv,
        config: &'a Configuration,
        options: &'a mut ParseOptions,
    ) -> Self {
        let input = Tokenizer::new(source).with_max_buffer(options.max_buffer);
        let display = env.display;
        Self {
            config,
            options,
            input,
            stack: Stack::new(env),
            current_cs: String::new(),
            inner: false,
            display,
        }
    }

    /// Parses the whole input and returns the finished node.
    pub fn parse(mut self) -> ParseResult<MmlNode> {
        while let Some(c) = self.input.next_char() {
            if c == '\\' {
                self.parse_macro()?;
            } else {
                self.parse_char(c)?;
            }
        }
        self.push(StackItem::new(ItemKind::Stop))?;
        Ok(self.stack.finish()?)
    }

    fn parse_char(&mut self, c: char) -> ParseResult<()> {
        let mut buf = [0u8; 4];
        let symbol: &str = c.encode_utf8(&mut buf);
        let config = self.config;
        let action = config
            .resolve(HandlerType::Character, symbol)
            .unwrap_or(&OTHER);
        self.current_cs = symbol.to_string();
        self.execute(action, symbol)
    }

    fn parse_macro(&mut self) -> ParseResult<()> {
        let name = self.input.get_cs();
        self.current_cs = format!("\\{name}");
        if let Some(action) = self.options.macros.lookup_macro(&name).cloned() {
            return self.execute(&action, &name);
        }
        let config = self.config;
        let action = config
            .resolve(HandlerType::Macro, &name)
            .unwrap_or(&UNDEFINED);
        self.execute(action, &name)
    }

    /// Runs `action` for `name`: the character itself, or the control
    /// sequence without its backslash.
    pub(crate) fn execute(&mut self, action: &ParseAction, name: &str) -> ParseResult<()> {
        log::trace!("{} -> {}", self.current_cs, action.opcode());
        match action {
            ParseAction::Variable => self.variable(name),
            ParseAction::Digit => self.digit(name),
            ParseAction::Prime => self.prime(),
            ParseAction::Open => self.open(),
            ParseAction::Close => self.close(),
            ParseAction::Superscript => self.script(ScriptSlot::Sup),
            ParseAction::Subscript => self.script(ScriptSlot::Sub),
            ParseAction::Ampersand => self.ampersand(),
            ParseAction::Tilde => self.tilde(),
            ParseAction::Space | ParseAction::Relax => Ok(()),
            ParseAction::Comment => self.comment(),
            ParseAction::Hash => Err(TexError::new(
                TexErrorId::Misplaced,
                "You can't use 'macro parameter character #' in math mode",
            )
            .with_context("#")
            .into()),
            ParseAction::Other => self.other(name),
            ParseAction::Ident { text, variant } => self.ident(text, variant.as_deref()),
            ParseAction::Op {
                text,
                class,
                stretchy,
            } => self.operator(text, *class, *stretchy),
            ParseAction::Delimiter { text } => self.delimiter(text),
            ParseAction::NamedFn { text } => self.named_fn(text.as_deref().unwrap_or(name)),
            ParseAction::NamedOp { text, limits } => {
                self.named_op(text.as_deref().unwrap_or(name), *limits)
            }
            ParseAction::LargeOp { text, limits } => self.large_op(text, *limits),
            ParseAction::Frac { display } => self.frac(*display),
            ParseAction::Genfrac {
                open,
                close,
                thickness,
                display,
            } => self.genfrac(open, close, thickness.as_deref(), *display),
            ParseAction::Sqrt => self.sqrt(),
            ParseAction::Root => self.root(),
            ParseAction::Left => self.left(),
            ParseAction::Right => self.right(),
            ParseAction::Middle => self.middle(),
            ParseAction::Infix {
                thickness,
                open,
                close,
            } => self.infix(thickness.as_deref(), open.as_deref(), close.as_deref()),
            ParseAction::FontSwitch { variant } => {
                self.stack.env_mut().font = Some(variant.clone());
                Ok(())
            }
            ParseAction::MathFont { variant } => self.math_font(variant),
            ParseAction::Style { display, level } => self.set_style(*display, *level),
            ParseAction::Spacer { width } => self.spacer(width),
            ParseAction::Accent { text, stretchy } => self.accent(text, *stretchy),
            ParseAction::UnderOver { text, under } => self.under_over(text, *under),
            ParseAction::Overset { under, class } => self.overset(*under, *class),
            ParseAction::Limits { limits } => self.limits(*limits),
            ParseAction::Text { variant } => self.text(variant.as_deref()),
            ParseAction::MathClass { class } => self.math_class(*class),
            ParseAction::Phantom => self.phantom(),
            ParseAction::Not => Ok(self.push(StackItem::new(ItemKind::Not))?),
            ParseAction::Cr => self.cr(),
            ParseAction::Begin => self.begin_environment(),
            ParseAction::End => self.end_environment(),
            ParseAction::Tag => self.handle_tag(),
            ParseAction::NoTag => {
                self.options.tags.no_tag();
                Ok(())
            }
            ParseAction::Label => self.label(),
            ParseAction::Ref { eq } => self.reference(*eq),
            ParseAction::Operatorname => self.operatorname(),
            ParseAction::BoldSymbol => self.bold_symbol(),
            ParseAction::Macro {
                body,
                args,
                default,
            } => self.expand_macro(body, *args, default.as_deref()),
            ParseAction::NewCommand => self.new_command(),
            ParseAction::NewEnvironment => self.new_environment(),
            ParseAction::Def => self.def(),
            ParseAction::Let => self.let_macro(),
            ParseAction::BeginGroup => {
                self.options.macros.begin_group();
                Ok(())
            }
            ParseAction::EndGroup => Ok(self.options.macros.end_group()?),
            ParseAction::Autoload { package } => self.autoload(package, name),
            ParseAction::Require => self.require(),
            ParseAction::Undefined => Err(TexError::new(
                TexErrorId::UndefinedControlSequence,
                format!("Undefined control sequence \\{name}"),
            )
            .with_context(format!("\\{name}"))
            .into()),
            ParseAction::UndefinedAsText => self.undefined_as_text(name),
            ParseAction::Matrix { .. }
            | ParseAction::Array
            | ParseAction::Cases
            | ParseAction::Equation { .. }
            | ParseAction::EqnArray { .. }
            | ParseAction::UserEnv { .. }
            | ParseAction::UnknownEnv => Err(TexError::new(
                TexErrorId::Misplaced,
                format!("Environment action used outside \\begin: {}", self.current_cs),
            )
            .into()),
        }
    }

    /// Looks up and runs the environment `name` for `\begin{name}`.
    pub(crate) fn run_environment(&mut self, name: &str) -> ParseResult<()> {
        if let Some(action) = self.options.macros.lookup_environment(name).cloned() {
            return self.environment(&action, name);
        }
        let config = self.config;
        let action = config
            .resolve(HandlerType::Environment, name)
            .unwrap_or(&UNKNOWN_ENV);
        self.environment(action, name)
    }

    /// Offers `item` to the stack.
    pub(crate) fn push(&mut self, item: StackItem) -> Result<(), TexError> {
        let mut ctx = StackContext {
            config: self.config,
            factory: &*self.options.factory,
            tags: &mut *self.options.tags,
            display: self.display,
            inner: self.inner,
        };
        self.stack.push(item, &mut ctx)
    }

    pub(crate) fn push_node(&mut self, node: MmlNode) -> Result<(), TexError> {
        self.push(StackItem::mml(node))
    }

    pub(crate) fn factory(&self) -> &dyn NodeFactory {
        &*self.options.factory
    }

    pub(crate) fn create(
        &self,
        kind: NodeKind,
        attributes: AttributeList,
        children: Vec<MmlNode>,
    ) -> MmlNode {
        self.options.factory.create(kind, attributes, children)
    }

    pub(crate) fn token(&self, kind: NodeKind, attributes: AttributeList, text: &str) -> MmlNode {
        self.options.factory.create_token(kind, attributes, text)
    }

    /// Parses `text` in a sub-parser that shares this parser's document
    /// state.
    pub(crate) fn sub_parse(&mut self, text: &str, env: ParseEnv) -> ParseResult<MmlNode> {
        let mut parser = TexParser::new(text, env, self.config, &mut *self.options);
        parser.inner = true;
        parser.display = self.display;
        parser.parse()
    }

    /// Reads the next argument and parses it in the current environment.
    pub(crate) fn parse_arg(&mut self, name: &str) -> ParseResult<MmlNode> {
        let arg = self.input.get_argument(name)?;
        let env = self.stack.env().clone();
        self.sub_parse(&arg, env)
    }

    /// Reads a delimiter argument and returns the character it stands for.
    pub(crate) fn get_delimiter(&mut self, name: &str, brace_ok: bool) -> Result<String, TexError> {
        let config = self.config;
        let delim = self.input.get_delimiter(name, brace_ok, |d| {
            config.find(HandlerType::Delimiter, d).is_some()
        })?;
        Ok(match config.find(HandlerType::Delimiter, &delim) {
            Some(ParseAction::Delimiter { text }) => text.clone(),
            _ => delim,
        })
    }

    /// Consumes a `*` right after the command name, if present.
    pub(crate) fn get_star(&mut self) -> bool {
        if self.input.peek() == Some('*') {
            self.input.advance(1);
            true
        } else {
            false
        }
    }

    /// Pushes `text` back in front of the unread input, counting it as one
    /// macro substitution.
    pub(crate) fn expand(&mut self, text: &str) -> ParseResult<()> {
        self.input.replace_rest(text)?;
        self.options.count_macro()?;
        Ok(())
    }

    pub(crate) fn needs(&self, package: &str) -> Interrupt {
        log::debug!("{} needs package '{}'", self.current_cs, package);
        Interrupt::NeedsResource(ResourceId::new(package))
    }
}

/// Substitutes `#1`..`#9` in a macro body; `##` stands for a literal `#`.
pub fn substitute_args(body: &str, args: &[String], name: &str) -> Result<String, TexError> {
    let mut result = String::new();
    let mut text = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                text.push(c);
                if let Some(next) = chars.next() {
                    text.push(next);
                }
            }
            '#' => match chars.next() {
                Some('#') => text.push('#'),
                next => {
                    let index = next
                        .and_then(|d| d.to_digit(10))
                        .filter(|&n| n >= 1 && (n as usize) <= args.len())
                        .ok_or_else(|| {
                            TexError::new(
                                TexErrorId::IllegalParamNumber,
                                format!("Illegal macro parameter reference in {name}"),
                            )
                            .with_context(name)
                        })?;
                    result = join_args(&join_args(&result, &text), &args[index as usize - 1]);
                    text.clear();
                }
            },
            _ => text.push(c),
        }
    }
    Ok(join_args(&result, &text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_substitute_args() {
        assert_eq!(
            substitute_args("#1+#2", &args(&["a", "b"]), "\\m").unwrap(),
            "a+b"
        );
        assert_eq!(
            substitute_args(r"\alpha#1", &args(&["x"]), "\\m").unwrap(),
            r"\alpha x"
        );
        assert_eq!(substitute_args("##1", &args(&[]), "\\m").unwrap(), "#1");
    }

    #[test]
    fn test_substitute_rejects_bad_reference() {
        let err = substitute_args("#3", &args(&["a"]), "\\m").unwrap_err();
        assert_eq!(err.id, TexErrorId::IllegalParamNumber);
        let err = substitute_args("#x", &args(&["a"]), "\\m").unwrap_err();
        assert_eq!(err.id, TexErrorId::IllegalParamNumber);
    }
}
