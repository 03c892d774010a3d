//! `\begin{...}` / `\end{...}` and the environment actions.
//!
//! A table environment pushes two items: a `Begin` carrying the name, and an
//! `Array` that collects cells and rows. `\end` closes the array, which hands
//! the finished table and the `End` item down to the `Begin` for the name
//! check.

use crate::actions::{AlignStyle, ParseAction};
use crate::error::{ParseResult, TexError, TexErrorId};
use crate::parser::{TexParser, substitute_args};
use crate::stack::{ItemKind, StackItem, TableKind, TableState};
use ferrotex_mml::attr;

/// Column alignment and rule settings parsed from an `array` preamble such
/// as `{|c|l|}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub align: Vec<&'static str>,
    /// `solid`, `dashed` or `none` between adjacent columns.
    pub lines: Vec<&'static str>,
    pub frame: Option<&'static str>,
}

impl ColumnSpec {
    pub fn parse(spec: &str) -> Result<Self, TexError> {
        let mut align = Vec::new();
        let mut lines = Vec::new();
        let mut leading = None;
        let mut trailing = None;
        let mut pending: Option<&'static str> = None;
        for c in spec.chars() {
            let rule = match c {
                'l' | 'c' | 'r' => {
                    if align.is_empty() {
                        leading = pending;
                    } else {
                        lines.push(pending.unwrap_or("none"));
                    }
                    pending = None;
                    align.push(match c {
                        'l' => "left",
                        'r' => "right",
                        _ => "center",
                    });
                    continue;
                }
                '|' => "solid",
                ':' => "dashed",
                c if c.is_whitespace() => continue,
                other => {
                    return Err(TexError::new(
                        TexErrorId::BadColumnSpec,
                        format!("Illegal pream-token ({other})"),
                    )
                    .with_context("array"));
                }
            };
            pending = Some(rule);
            if !align.is_empty() {
                trailing = Some(rule);
            }
        }
        if pending.is_none() {
            trailing = None;
        }
        if align.is_empty() {
            return Err(
                TexError::new(TexErrorId::BadColumnSpec, "Empty column specification")
                    .with_context("array"),
            );
        }
        let frame = match (leading, trailing) {
            (Some(l), Some(_)) => Some(l),
            _ => None,
        };
        Ok(Self {
            align,
            lines,
            frame,
        })
    }
}

const ALIGN_COLUMNS: &str = "right left right left right left right left right left";
const ALIGN_SPACING: &str = "0em 2em 0em 2em 0em 2em 0em 2em 0em";

impl TexParser<'_> {
    pub(crate) fn begin_environment(&mut self) -> ParseResult<()> {
        let name = self.input.get_argument("\\begin")?;
        if name.contains('\\') {
            return Err(TexError::new(
                TexErrorId::UnknownEnv,
                format!("Invalid environment name '{name}'"),
            )
            .with_context("\\begin")
            .into());
        }
        self.current_cs = format!("\\begin{{{name}}}");
        self.run_environment(&name)
    }

    pub(crate) fn end_environment(&mut self) -> ParseResult<()> {
        let name = self.input.get_argument("\\end")?;
        if let Some(begin) = self.stack.pending_user_env_mut(&name) {
            begin.data.closing = true;
            let end_text = begin.data.end_text.clone().unwrap_or_default();
            return self.expand(&format!("{end_text}\\end{{{name}}}"));
        }
        Ok(self.push(StackItem::new(ItemKind::End).named(name))?)
    }

    /// Runs an environment action for `\begin{name}`.
    pub(crate) fn environment(&mut self, action: &ParseAction, name: &str) -> ParseResult<()> {
        log::trace!("\\begin{{{}}} -> {}", name, action.opcode());
        match action {
            ParseAction::Matrix { open, close } => {
                let mut table = self.table(TableKind::Array);
                table.attrs = vec![
                    attr("columnalign", "center"),
                    attr("columnspacing", "1em"),
                    attr("rowspacing", "4pt"),
                ];
                table.open = open.clone();
                table.close = close.clone();
                self.begin_table(name, table)
            }
            ParseAction::Array => {
                let cs = self.current_cs.clone();
                let spec = ColumnSpec::parse(&self.input.get_argument(&cs)?)?;
                let mut table = self.table(TableKind::Array);
                table.attrs = vec![
                    attr("columnalign", spec.align.join(" ")),
                    attr("columnspacing", "1em"),
                    attr("rowspacing", "4pt"),
                ];
                if spec.lines.iter().any(|l| *l != "none") {
                    table.attrs.push(attr("columnlines", spec.lines.join(" ")));
                }
                if let Some(frame) = spec.frame {
                    table.attrs.push(attr("frame", frame));
                }
                self.begin_table(name, table)
            }
            ParseAction::Cases => {
                let mut table = self.table(TableKind::Array);
                table.attrs = vec![
                    attr("columnalign", "left left"),
                    attr("columnspacing", "1em"),
                    attr("rowspacing", ".2em"),
                ];
                table.open = Some("{".to_string());
                table.close = Some(".".to_string());
                table.max_columns = Some(2);
                self.begin_table(name, table)
            }
            ParseAction::Equation { numbered } => {
                self.check_equation_nesting()?;
                let env = self.stack.env().clone();
                self.push(StackItem::scoped(ItemKind::Begin, &env).named(name))?;
                self.options.tags.start(name, true, *numbered);
                let mut env = env;
                env.display = true;
                Ok(self.push(StackItem::scoped(ItemKind::Equation, &env).named(name))?)
            }
            ParseAction::EqnArray {
                style,
                numbered,
                top_level,
            } => {
                if *top_level {
                    self.check_equation_nesting()?;
                }
                let mut table = self.table(TableKind::EqnArray);
                let (align, spacing) = match style {
                    AlignStyle::Align => (ALIGN_COLUMNS, ALIGN_SPACING),
                    AlignStyle::Gather => ("center", "1em"),
                };
                table.attrs = vec![
                    attr("displaystyle", true),
                    attr("columnalign", align),
                    attr("columnspacing", spacing),
                    attr("rowspacing", "3pt"),
                ];
                if *top_level {
                    let layout = &self.options.tags.state().layout;
                    table.attrs.push(attr("side", layout.side.as_str()));
                    table
                        .attrs
                        .push(attr("minlabelspacing", layout.indent.as_str()));
                }
                self.options.tags.start(name, *top_level, *numbered);
                self.begin_table(name, table)
            }
            ParseAction::UserEnv {
                begin,
                end,
                args,
                default,
            } => {
                let cs = self.current_cs.clone();
                let (begin, end) = if *args == 0 {
                    (begin.clone(), end.clone())
                } else {
                    let values = self.env_args(*args, default.as_deref(), &cs)?;
                    (
                        substitute_args(begin, &values, &cs)?,
                        substitute_args(end, &values, &cs)?,
                    )
                };
                let mut item = StackItem::scoped(ItemKind::Begin, self.stack.env()).named(name);
                item.data.end_text = Some(end);
                self.push(item)?;
                self.expand(&begin)
            }
            _ => Err(TexError::new(
                TexErrorId::UnknownEnv,
                format!("Unknown environment '{name}'"),
            )
            .with_context(name)
            .into()),
        }
    }

    fn env_args(
        &mut self,
        count: usize,
        default: Option<&str>,
        cs: &str,
    ) -> Result<Vec<String>, TexError> {
        let mut args = Vec::with_capacity(count);
        if let Some(default) = default {
            args.push(
                self.input
                    .get_brackets(cs)?
                    .unwrap_or_else(|| default.to_string()),
            );
        }
        while args.len() < count {
            args.push(self.input.get_argument(cs)?);
        }
        Ok(args)
    }

    fn table(&self, kind: TableKind) -> TableState {
        TableState::new(kind, self.stack.env().clone())
    }

    fn begin_table(&mut self, name: &str, table: TableState) -> ParseResult<()> {
        let env = self.stack.env().clone();
        self.push(StackItem::scoped(ItemKind::Begin, &env).named(name))?;
        let mut item = StackItem::scoped(ItemKind::Array, &env).named(name);
        item.data.table = Some(table);
        Ok(self.push(item)?)
    }

    /// Numbered display environments cannot be nested.
    fn check_equation_nesting(&self) -> Result<(), TexError> {
        if self.options.tags.env().is_empty() {
            return Ok(());
        }
        Err(TexError::new(
            TexErrorId::Misplaced,
            "Erroneous nesting of equation structures",
        )
        .with_context(self.current_cs.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_spec_rules_and_frame() {
        let spec = ColumnSpec::parse("|c|l:r|").unwrap();
        assert_eq!(spec.align, ["center", "left", "right"]);
        assert_eq!(spec.lines, ["solid", "dashed"]);
        assert_eq!(spec.frame, Some("solid"));

        let spec = ColumnSpec::parse("cc").unwrap();
        assert_eq!(spec.lines, ["none"]);
        assert_eq!(spec.frame, None);
    }

    #[test]
    fn test_column_spec_rejects_unknown_tokens() {
        let err = ColumnSpec::parse("cx").unwrap_err();
        assert_eq!(err.id, TexErrorId::BadColumnSpec);
        assert_eq!(
            ColumnSpec::parse("").unwrap_err().id,
            TexErrorId::BadColumnSpec
        );
    }
}
