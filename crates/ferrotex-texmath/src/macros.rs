//! User macros, definitions and package loading.
//!
//! Expanding a macro never builds nodes: its body (with arguments
//! substituted) is pushed back in front of the unread input and parsed like
//! any other text.

use crate::actions::ParseAction;
use crate::error::{ParseResult, TexError, TexErrorId};
use crate::parser::{TexParser, substitute_args};
use crate::symbol_map::HandlerType;
use crate::tokenizer::trim_spaces;
use serde_json::Value;

fn is_valid_cs_name(name: &str) -> bool {
    name.chars().count() == 1 || (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic()))
}

fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parses the `[n]` of `\newcommand`: a parameter count from 0 to 9.
fn parameter_count(count: Option<String>, cs: &str) -> Result<usize, TexError> {
    let Some(count) = count else {
        return Ok(0);
    };
    let count = trim_spaces(&count);
    if count.is_empty() {
        return Ok(0);
    }
    count
        .parse::<usize>()
        .ok()
        .filter(|&n| n <= 9)
        .ok_or_else(|| {
            TexError::new(
                TexErrorId::IllegalParamNumber,
                format!("Illegal number of parameters specified in {cs}"),
            )
            .with_context(cs)
        })
}

/// Gives name-derived actions their name so they survive `\let`.
fn bind_name(action: &ParseAction, name: &str) -> ParseAction {
    match action {
        ParseAction::NamedFn { text: None } => ParseAction::NamedFn {
            text: Some(name.to_string()),
        },
        ParseAction::NamedOp { text: None, limits } => ParseAction::NamedOp {
            text: Some(name.to_string()),
            limits: *limits,
        },
        other => other.clone(),
    }
}

impl TexParser<'_> {
    /// Reads the arguments a macro or environment takes: an optional one
    /// first when it has a default, then mandatory ones.
    fn macro_args(
        &mut self,
        count: usize,
        default: Option<&str>,
        cs: &str,
    ) -> Result<Vec<String>, TexError> {
        let mut args = Vec::with_capacity(count);
        if count > 0 {
            if let Some(default) = default {
                let optional = self.input.get_brackets(cs)?;
                args.push(optional.unwrap_or_else(|| default.to_string()));
            }
        }
        while args.len() < count {
            args.push(self.input.get_argument(cs)?);
        }
        Ok(args)
    }

    pub(crate) fn expand_macro(
        &mut self,
        body: &str,
        args: usize,
        default: Option<&str>,
    ) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let text = if args == 0 {
            body.to_string()
        } else {
            let values = self.macro_args(args, default, &cs)?;
            substitute_args(body, &values, &cs)?
        };
        self.expand(&text)
    }

    /// Reads `\name` after `\def` or `\let`, returning the name without its
    /// backslash.
    fn get_cs_name(&mut self, cs: &str) -> Result<String, TexError> {
        self.input.skip_spaces();
        let missing = || {
            TexError::new(
                TexErrorId::MissingCS,
                format!("{cs} must be followed by a control sequence"),
            )
            .with_context(cs)
        };
        if self.input.next_char() != Some('\\') {
            return Err(missing());
        }
        let name = self.input.get_cs();
        if name.is_empty() {
            return Err(missing());
        }
        Ok(name)
    }

    /// `\newcommand{\name}[n][default]{body}` (also `\renewcommand`).
    pub(crate) fn new_command(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let name = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        let count = self.input.get_brackets(&cs)?;
        let default = self.input.get_brackets(&cs)?;
        let body = self.input.get_argument(&cs)?;
        let name = name.strip_prefix('\\').unwrap_or(&name);
        if !is_valid_cs_name(name) {
            return Err(TexError::new(
                TexErrorId::IllegalControlSequenceName,
                format!("Illegal control sequence name for {cs}"),
            )
            .with_context(cs.as_str())
            .into());
        }
        let args = parameter_count(count, &cs)?;
        self.options.macros.define_macro(
            name,
            ParseAction::Macro {
                body,
                args,
                default,
            },
        );
        Ok(())
    }

    /// `\newenvironment{name}[n][default]{begin}{end}`.
    pub(crate) fn new_environment(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let name = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        let count = self.input.get_brackets(&cs)?;
        let default = self.input.get_brackets(&cs)?;
        let begin = self.input.get_argument(&cs)?;
        let end = self.input.get_argument(&cs)?;
        let args = parameter_count(count, &cs)?;
        self.options.macros.define_environment(
            &name,
            ParseAction::UserEnv {
                begin,
                end,
                args,
                default,
            },
        );
        Ok(())
    }

    /// `\def\name#1#2{body}`. Only undelimited parameters are supported.
    pub(crate) fn def(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let name = self.get_cs_name(&cs)?;
        let mut args = 0;
        loop {
            self.input.skip_spaces();
            match self.input.peek() {
                Some('{') => break,
                Some('#') => {
                    self.input.advance(1);
                    let next = self.input.next_char().and_then(|c| c.to_digit(10));
                    if next != Some(args as u32 + 1) {
                        return Err(TexError::new(
                            TexErrorId::IllegalParamNumber,
                            format!("Parameters for \\{name} must be numbered sequentially"),
                        )
                        .with_context(cs.as_str())
                        .into());
                    }
                    args += 1;
                }
                Some(_) => {
                    return Err(TexError::new(
                        TexErrorId::IllegalParamNumber,
                        format!("Delimited parameters are not supported for \\{name}"),
                    )
                    .with_context(cs.as_str())
                    .into());
                }
                None => return Err(TexError::missing_arg(&cs).into()),
            }
        }
        let body = self.input.get_argument(&cs)?;
        self.options
            .macros
            .define_macro(&name, ParseAction::macro_body(&body, args));
        Ok(())
    }

    /// `\let\name=\other` or `\let\name=c`.
    pub(crate) fn let_macro(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let name = self.get_cs_name(&cs)?;
        self.input.skip_spaces();
        if self.input.peek() == Some('=') {
            self.input.advance(1);
            self.input.skip_spaces();
        }
        let action = match self.input.next_char() {
            Some('\\') => {
                let target = self.input.get_cs();
                if let Some(action) = self.options.macros.lookup_macro(&target) {
                    action.clone()
                } else if let Some(action) = self.config.find(HandlerType::Macro, &target) {
                    bind_name(action, &target)
                } else {
                    ParseAction::macro_body(&format!("\\{target}"), 0)
                }
            }
            Some(c) => ParseAction::macro_body(&c.to_string(), 0),
            None => return Err(TexError::missing_arg(&cs).into()),
        };
        self.options.macros.define_macro(&name, action);
        Ok(())
    }

    /// A symbol provided by a package that is not loaded yet. Once the
    /// package is present the stub is skipped in favor of the real entry.
    pub(crate) fn autoload(&mut self, package: &str, name: &str) -> ParseResult<()> {
        if !self.config.has_package(package) {
            return Err(self.needs(package));
        }
        let config = self.config;
        let loaded = config
            .handler_list(HandlerType::Macro)
            .iter()
            .filter_map(|map| config.symbol_map(map))
            .filter_map(|map| map.lookup_for(HandlerType::Macro, name))
            .find(|action| !matches!(action, ParseAction::Autoload { .. }));
        match loaded {
            Some(action) => self.execute(action, name),
            None => Err(TexError::new(
                TexErrorId::UndefinedControlSequence,
                format!("Undefined control sequence \\{name}"),
            )
            .with_context(format!("\\{name}"))
            .into()),
        }
    }

    /// `\require{package}`.
    pub(crate) fn require(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let name = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        if !is_valid_package_name(&name) {
            return Err(TexError::new(
                TexErrorId::UnknownPackage,
                format!("Argument for {cs} is not a valid package name"),
            )
            .with_context(cs.as_str())
            .into());
        }
        if self.config.has_package(&name) {
            return Ok(());
        }
        let settings = self.options.package_option("require");
        let allowed = settings
            .and_then(|s| s.get("allow"))
            .and_then(|allow| allow.get(&name))
            .and_then(Value::as_bool)
            .or_else(|| {
                settings
                    .and_then(|s| s.get("defaultAllow"))
                    .and_then(Value::as_bool)
            })
            .unwrap_or(true);
        if !allowed {
            return Err(TexError::new(
                TexErrorId::UnknownPackage,
                format!("Package '{name}' is not allowed"),
            )
            .with_context(cs.as_str())
            .into());
        }
        Err(self.needs(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_count() {
        assert_eq!(parameter_count(None, "\\newcommand").unwrap(), 0);
        assert_eq!(parameter_count(Some(" 2 ".into()), "\\newcommand").unwrap(), 2);
        assert_eq!(
            parameter_count(Some("x".into()), "\\newcommand").unwrap_err().id,
            TexErrorId::IllegalParamNumber
        );
        assert!(parameter_count(Some("10".into()), "\\newcommand").is_err());
    }

    #[test]
    fn test_cs_names() {
        assert!(is_valid_cs_name("foo"));
        assert!(is_valid_cs_name("!"));
        assert!(!is_valid_cs_name("foo1"));
        assert!(!is_valid_cs_name(""));
    }

    #[test]
    fn test_let_keeps_function_names() {
        let bound = bind_name(&ParseAction::NamedFn { text: None }, "sin");
        assert_eq!(
            bound,
            ParseAction::NamedFn {
                text: Some("sin".into())
            }
        );
    }
}
