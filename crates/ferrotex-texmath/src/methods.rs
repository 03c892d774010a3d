//! Actions for characters, symbols and structural commands.

use crate::error::{ParseResult, TexError, TexErrorId};
use crate::parser::TexParser;
use crate::stack::{
    ItemKind, ParseEnv, ScriptSlot, StackItem, fixed_fence, is_placeholder, placeholder,
    script_slot,
};
use crate::tags::make_ref;
use crate::tokenizer::trim_spaces;
use ferrotex_mml::{AttrValue, AttributeList, MmlNode, NodeKind, TexClass, attr};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LETTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]+").expect("letter pattern is valid"));

/// Characters typed directly that stand for another character.
fn remap(c: &str) -> &str {
    match c {
        "-" => "\u{2212}",
        "*" => "\u{2217}",
        "`" => "\u{2018}",
        other => other,
    }
}

/// TeX class of a bare operator character.
pub(crate) fn operator_class(text: &str) -> Option<TexClass> {
    let class = match text {
        "+" | "\u{2212}" | "\u{2217}" | "\u{00B1}" | "\u{2213}" | "\u{00D7}" | "\u{00F7}"
        | "\u{22C5}" | "\u{2218}" | "\u{2219}" | "\u{2229}" | "\u{222A}" | "\u{2227}"
        | "\u{2228}" | "\u{2295}" | "\u{2297}" => TexClass::Bin,
        "=" | "<" | ">" | ":" | "\u{2260}" | "\u{2264}" | "\u{2265}" | "\u{2261}" | "\u{2248}"
        | "\u{223C}" | "\u{2208}" | "\u{2209}" | "\u{2282}" | "\u{2283}" | "\u{2286}"
        | "\u{2287}" | "\u{2192}" | "\u{2190}" | "\u{21D2}" | "\u{21D0}" | "\u{21D4}"
        | "\u{2194}" | "\u{221D}" | "\u{226A}" | "\u{226B}" | "\u{22A2}" | "\u{2223}" => {
            TexClass::Rel
        }
        "," | ";" => TexClass::Punct,
        "(" | "[" | "{" | "\u{27E8}" | "\u{230A}" | "\u{2308}" => TexClass::Open,
        ")" | "]" | "}" | "\u{27E9}" | "\u{230B}" | "\u{2309}" | "!" | "?" => TexClass::Close,
        _ => return None,
    };
    Some(class)
}

/// `mathvariant` for a bold version of a token's current variant.
fn bold_variant(node: &MmlNode) -> Option<String> {
    let current = node
        .attributes
        .get_explicit("mathvariant")
        .and_then(AttrValue::as_str);
    let variant = match current {
        None if node.kind == NodeKind::Mi && node.text().chars().count() == 1 => "bold-italic",
        None | Some("normal") => "bold",
        Some("italic") => "bold-italic",
        Some(v) if v.starts_with("bold") => return None,
        Some(v) => return Some(format!("bold-{v}")),
    };
    Some(variant.to_string())
}

fn core_mo_mut(node: &mut MmlNode) -> Option<&mut MmlNode> {
    match node.kind {
        NodeKind::Mo => Some(node),
        NodeKind::TeXAtom | NodeKind::Mrow | NodeKind::Mstyle if node.children.len() == 1 => {
            node.children.first_mut().and_then(core_mo_mut)
        }
        k if k.is_script() => node.children.first_mut().and_then(core_mo_mut),
        _ => None,
    }
}

impl TexParser<'_> {
    /// `mathvariant` from the active font switch.
    pub(crate) fn font_attrs(&self) -> AttributeList {
        match &self.stack.env().font {
            Some(font) => vec![attr("mathvariant", font.as_str())],
            None => Vec::new(),
        }
    }

    pub(crate) fn variable(&mut self, c: &str) -> ParseResult<()> {
        let multi_letter = self.stack.env().multi_letter;
        let pattern = match &self.options.identifier_pattern {
            Some(pattern) => Some(pattern),
            None if multi_letter => Some(&*LETTERS),
            None => None,
        };
        let mut text = c.to_string();
        if let Some(pattern) = pattern {
            self.input.retreat(c.len());
            let len = pattern
                .find(self.input.rest())
                .map(|m| m.end())
                .filter(|&end| end >= c.len())
                .unwrap_or(c.len());
            text = self.input.rest()[..len].to_string();
            self.input.advance(len);
        }
        let node = self.token(NodeKind::Mi, self.font_attrs(), &text);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn digit(&mut self, c: &str) -> ParseResult<()> {
        self.input.retreat(c.len());
        let number = self
            .options
            .number_pattern
            .find(self.input.rest())
            .map(|m| m.as_str().to_string())
            .filter(|n| !n.is_empty());
        let node = match number {
            Some(number) => {
                self.input.advance(number.len());
                let text = number.replace(['{', '}'], "");
                self.token(NodeKind::Mn, self.font_attrs(), &text)
            }
            None => {
                self.input.advance(c.len());
                let mut mo = self.token(NodeKind::Mo, self.font_attrs(), c);
                mo.tex_class = operator_class(c);
                mo
            }
        };
        Ok(self.push_node(node)?)
    }

    pub(crate) fn other(&mut self, c: &str) -> ParseResult<()> {
        let text = remap(c);
        let attrs = self.font_attrs();
        let first = text.chars().next().unwrap_or_default();
        let node = if first.is_alphabetic() {
            self.token(NodeKind::Mi, attrs, text)
        } else if first.is_numeric() {
            self.token(NodeKind::Mn, attrs, text)
        } else {
            let mut mo = self.token(NodeKind::Mo, attrs, text);
            mo.tex_class = operator_class(text);
            mo
        };
        Ok(self.push_node(node)?)
    }

    pub(crate) fn prime(&mut self) -> ParseResult<()> {
        let base = match self.stack.prev_node() {
            Some(base) => base,
            None => self.token(NodeKind::Mi, vec![], ""),
        };
        if base.kind == NodeKind::Msubsup && !is_placeholder(script_slot(&base, 2)?) {
            return Err(TexError::new(
                TexErrorId::DoubleExponent,
                "Prime causes double exponent: use braces to clarify",
            )
            .into());
        }
        let mut count = 1;
        while self.input.peek() == Some('\'') {
            self.input.advance(1);
            count += 1;
        }
        let text = match count {
            1 => "\u{2032}".to_string(),
            2 => "\u{2033}".to_string(),
            3 => "\u{2034}".to_string(),
            4 => "\u{2057}".to_string(),
            n => "\u{2032}".repeat(n),
        };
        let primes = self.token(NodeKind::Mo, vec![], &text);
        let mut item = StackItem::new(ItemKind::Prime);
        item.nodes = vec![base, primes];
        Ok(self.push(item)?)
    }

    pub(crate) fn script(&mut self, slot: ScriptSlot) -> ParseResult<()> {
        let (base, primes) = if self.stack.top().map(|top| top.kind) == Some(ItemKind::Prime) {
            let mut item = self.stack.pop().unwrap_or_else(|| StackItem::new(ItemKind::Prime));
            let primes = item.nodes.pop();
            (item.nodes.pop(), primes)
        } else {
            (self.stack.prev_node(), None)
        };
        let mut base = match base {
            Some(base) => base,
            None => self.token(NodeKind::Mi, vec![], ""),
        };
        let index = match slot {
            ScriptSlot::Sub => 1,
            ScriptSlot::Sup => 2,
        };
        let scripted = matches!(base.kind, NodeKind::Msubsup | NodeKind::Munderover);
        let filled = scripted && !is_placeholder(script_slot(&base, index)?);
        if filled && !base.flag("subsupOK") {
            let error = match slot {
                ScriptSlot::Sub => TexError::new(
                    TexErrorId::DoubleSubscripts,
                    "Double subscripts: use braces to clarify",
                ),
                ScriptSlot::Sup => TexError::new(
                    TexErrorId::DoubleExponent,
                    "Double exponent: use braces to clarify",
                ),
            };
            return Err(error.into());
        }
        if !scripted || filled {
            let kind = if base.flag("movesupsub") {
                NodeKind::Munderover
            } else {
                NodeKind::Msubsup
            };
            base = self.create(kind, vec![], vec![base, placeholder(), placeholder()]);
        }
        let mut item = StackItem::new(ItemKind::Subsup);
        item.nodes.push(base);
        item.data.slot = Some(slot);
        item.data.primes = primes;
        Ok(self.push(item)?)
    }

    pub(crate) fn open(&mut self) -> ParseResult<()> {
        let item = StackItem::scoped(ItemKind::Open, self.stack.env());
        Ok(self.push(item)?)
    }

    pub(crate) fn close(&mut self) -> ParseResult<()> {
        Ok(self.push(StackItem::new(ItemKind::Close))?)
    }

    pub(crate) fn ampersand(&mut self) -> ParseResult<()> {
        let mut item = StackItem::new(ItemKind::Cell).named("&");
        item.data.is_entry = true;
        Ok(self.push(item)?)
    }

    /// `\\`, with an optional `*` and `[spacing]`.
    pub(crate) fn cr(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        self.get_star();
        self.input.get_brackets(&cs)?;
        let mut item = StackItem::new(ItemKind::Cell).named(cs);
        item.data.is_cr = true;
        Ok(self.push(item)?)
    }

    pub(crate) fn tilde(&mut self) -> ParseResult<()> {
        let node = self.token(NodeKind::Mtext, vec![], "\u{00A0}");
        Ok(self.push_node(node)?)
    }

    pub(crate) fn comment(&mut self) -> ParseResult<()> {
        while let Some(c) = self.input.next_char() {
            if c == '\n' {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn ident(&mut self, text: &str, variant: Option<&str>) -> ParseResult<()> {
        let attrs = variant
            .map(|v| vec![attr("mathvariant", v)])
            .unwrap_or_default();
        let node = self.token(NodeKind::Mi, attrs, text);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn operator(
        &mut self,
        text: &str,
        class: Option<TexClass>,
        stretchy: Option<bool>,
    ) -> ParseResult<()> {
        let attrs = stretchy
            .map(|s| vec![attr("stretchy", s)])
            .unwrap_or_default();
        let mut node = self.token(NodeKind::Mo, attrs, text);
        node.tex_class = class.or_else(|| operator_class(text));
        Ok(self.push_node(node)?)
    }

    pub(crate) fn delimiter(&mut self, text: &str) -> ParseResult<()> {
        let mut node = self.token(NodeKind::Mo, vec![attr("stretchy", false)], text);
        node.tex_class = operator_class(text);
        Ok(self.push_node(node)?)
    }

    /// `\sin`: an upright name followed by function application.
    pub(crate) fn named_fn(&mut self, name: &str) -> ParseResult<()> {
        let mi = self
            .token(NodeKind::Mi, vec![], name)
            .with_class(TexClass::Op);
        let mut item = StackItem::new(ItemKind::Fn);
        item.nodes.push(mi);
        Ok(self.push(item)?)
    }

    /// `\lim`: like [`named_fn`](Self::named_fn) but limits may go above and
    /// below.
    pub(crate) fn named_op(&mut self, name: &str, limits: bool) -> ParseResult<()> {
        let text = name.replace("&thinsp;", "\u{2006}");
        let attrs = if limits {
            vec![attr("movablelimits", true)]
        } else {
            Vec::new()
        };
        let mut mo = self
            .token(NodeKind::Mo, attrs, &text)
            .with_class(TexClass::Op);
        mo.set_property("fnOP", true);
        mo.set_property("movesupsub", limits);
        let mut item = StackItem::new(ItemKind::Fn);
        item.nodes.push(mo);
        Ok(self.push(item)?)
    }

    pub(crate) fn large_op(&mut self, text: &str, limits: bool) -> ParseResult<()> {
        let attrs = if limits {
            vec![attr("movablelimits", true)]
        } else {
            Vec::new()
        };
        let mut mo = self
            .token(NodeKind::Mo, attrs, text)
            .with_class(TexClass::Op);
        mo.set_property("movesupsub", limits);
        Ok(self.push_node(mo)?)
    }

    /// Wraps `node` in an `mstyle` forcing display or text style.
    fn styled(&self, node: MmlNode, display: Option<bool>) -> MmlNode {
        match display {
            Some(display) => self.create(
                NodeKind::Mstyle,
                vec![attr("displaystyle", display), attr("scriptlevel", 0)],
                vec![node],
            ),
            None => node,
        }
    }

    pub(crate) fn frac(&mut self, display: Option<bool>) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let numerator = self.parse_arg(&cs)?;
        let denominator = self.parse_arg(&cs)?;
        let frac = self.create(NodeKind::Mfrac, vec![], vec![numerator, denominator]);
        let node = self.styled(frac, display);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn genfrac(
        &mut self,
        open: &str,
        close: &str,
        thickness: Option<&str>,
        display: Option<bool>,
    ) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let numerator = self.parse_arg(&cs)?;
        let denominator = self.parse_arg(&cs)?;
        let attrs = thickness
            .map(|t| vec![attr("linethickness", t)])
            .unwrap_or_default();
        let mut frac = self.create(NodeKind::Mfrac, attrs, vec![numerator, denominator]);
        if !open.is_empty() || !close.is_empty() {
            frac = fixed_fence(self.factory(), open, frac, close);
        }
        let node = self.styled(frac, display);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn sqrt(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let index = self.input.get_brackets(&cs)?;
        let mut arg = self.input.get_argument(&cs)?;
        if arg == "\\frac" {
            let numerator = self.input.get_argument(&cs)?;
            let denominator = self.input.get_argument(&cs)?;
            arg = format!("\\frac{{{numerator}}}{{{denominator}}}");
        }
        let env = self.stack.env().clone();
        let body = self.sub_parse(&arg, env.clone())?;
        let node = match index {
            None => self.create(NodeKind::Msqrt, vec![], vec![body]),
            Some(index) => {
                let index = self.sub_parse(&index, env)?;
                self.create(NodeKind::Mroot, vec![], vec![body, index])
            }
        };
        Ok(self.push_node(node)?)
    }

    /// `\root n \of x`.
    pub(crate) fn root(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let index = self.input.get_up_to(&cs, "\\of")?;
        let body = self.parse_arg(&cs)?;
        let env = self.stack.env().clone();
        let index = self.sub_parse(&index, env)?;
        let node = self.create(NodeKind::Mroot, vec![], vec![body, index]);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn left(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let delim = self.get_delimiter(&cs, false)?;
        let mut item = StackItem::scoped(ItemKind::Left, self.stack.env());
        item.data.delim = Some(delim);
        Ok(self.push(item)?)
    }

    pub(crate) fn right(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let delim = self.get_delimiter(&cs, false)?;
        let mut item = StackItem::new(ItemKind::Right);
        item.data.delim = Some(delim);
        Ok(self.push(item)?)
    }

    pub(crate) fn middle(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let delim = self.get_delimiter(&cs, false)?;
        let mut item = StackItem::new(ItemKind::Middle);
        item.data.delim = Some(delim);
        Ok(self.push(item)?)
    }

    /// `\over`, `\choose`, `\above`: the fraction takes everything before it
    /// in the current group as numerator.
    pub(crate) fn infix(
        &mut self,
        thickness: Option<&str>,
        open: Option<&str>,
        close: Option<&str>,
    ) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let mut item = StackItem::new(ItemKind::Over).named(cs.as_str());
        item.data.thickness = thickness.map(String::from);
        item.data.open = open.map(String::from);
        item.data.close = close.map(String::from);
        if cs.ends_with("withdelims") {
            item.data.open = Some(self.get_delimiter(&cs, false)?);
            item.data.close = Some(self.get_delimiter(&cs, false)?);
        }
        if cs.starts_with("\\above") {
            item.data.thickness = Some(self.input.get_dimension(&cs)?);
        }
        Ok(self.push(item)?)
    }

    /// `\mathrm{...}` and friends: the argument in a fixed font, letter runs
    /// forming one identifier.
    pub(crate) fn math_font(&mut self, variant: &str) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let text = self.input.get_argument(&cs)?;
        let env = ParseEnv {
            font: Some(variant.to_string()),
            multi_letter: true,
            ..self.stack.env().clone()
        };
        let node = self.sub_parse(&text, env)?;
        let atom = self
            .create(NodeKind::TeXAtom, vec![], vec![node])
            .with_class(TexClass::Ord);
        Ok(self.push_node(atom)?)
    }

    pub(crate) fn set_style(&mut self, display: bool, level: i64) -> ParseResult<()> {
        self.stack.env_mut().display = display;
        let mut item = StackItem::new(ItemKind::Style);
        item.data.styles = vec![attr("displaystyle", display), attr("scriptlevel", level)];
        Ok(self.push(item)?)
    }

    pub(crate) fn spacer(&mut self, width: &str) -> ParseResult<()> {
        let node = self.create(NodeKind::Mspace, vec![attr("width", width)], vec![]);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn accent(&mut self, text: &str, stretchy: bool) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let mut base = self.parse_arg(&cs)?;
        if let Some(mo) = core_mo_mut(&mut base) {
            mo.attributes.set("movablelimits", false);
        }
        let mut attrs = self.font_attrs();
        attrs.push(attr("accent", true));
        attrs.push(attr("stretchy", stretchy));
        let mark = self.token(NodeKind::Mo, attrs, text);
        let over = self.create(
            NodeKind::Munderover,
            vec![attr("accent", true)],
            vec![base, placeholder(), mark],
        );
        let atom = self
            .create(NodeKind::TeXAtom, vec![], vec![over])
            .with_class(TexClass::Ord);
        Ok(self.push_node(atom)?)
    }

    /// `\overline`, `\underbrace`: a stretchy mark over or under the
    /// argument. Braces take limits like a large operator.
    pub(crate) fn under_over(&mut self, text: &str, under: bool) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let base = self.parse_arg(&cs)?;
        let takes_limits = matches!(text, "\u{23DE}" | "\u{23DF}");
        let accent = if under { "accentunder" } else { "accent" };
        let mark = self.token(
            NodeKind::Mo,
            vec![attr("stretchy", true), attr("accent", true)],
            text,
        );
        let children = if under {
            vec![base, mark, placeholder()]
        } else {
            vec![base, placeholder(), mark]
        };
        let mut node = self.create(NodeKind::Munderover, vec![attr(accent, true)], children);
        if takes_limits {
            node.set_property("subsupOK", true);
            node = self
                .create(NodeKind::TeXAtom, vec![], vec![node])
                .with_class(TexClass::Op);
            node.set_property("movesupsub", true);
        }
        Ok(self.push_node(node)?)
    }

    /// `\overset{top}{base}`, `\underset{bottom}{base}`, `\stackrel`.
    pub(crate) fn overset(&mut self, under: bool, class: Option<TexClass>) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let script = self.parse_arg(&cs)?;
        let mut base = self.parse_arg(&cs)?;
        if let Some(mo) = core_mo_mut(&mut base) {
            mo.attributes.set("movablelimits", false);
        }
        let children = if under {
            vec![base, script, placeholder()]
        } else {
            vec![base, placeholder(), script]
        };
        let node = self.create(NodeKind::Munderover, vec![], children);
        let node = match class {
            Some(class) => self
                .create(NodeKind::TeXAtom, vec![], vec![node])
                .with_class(class),
            None => node,
        };
        Ok(self.push_node(node)?)
    }

    /// `\limits` / `\nolimits` on the preceding operator.
    pub(crate) fn limits(&mut self, limits: bool) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let misplaced = || {
            TexError::new(
                TexErrorId::Misplaced,
                format!("{cs} is allowed only on operators"),
            )
            .with_context(cs.as_str())
        };
        let op = self
            .stack
            .top_mut()
            .and_then(|top| top.nodes.last_mut())
            .ok_or_else(misplaced)?;
        if op.effective_class() != TexClass::Op && op.property("movesupsub").is_none() {
            return Err(misplaced().into());
        }
        match (op.kind, limits) {
            (NodeKind::Munderover, false) => op.set_kind(NodeKind::Msubsup),
            (NodeKind::Msubsup, true) => op.set_kind(NodeKind::Munderover),
            _ => {}
        }
        op.set_property("movesupsub", limits);
        if let Some(mo) = core_mo_mut(op) {
            mo.attributes.set("movablelimits", false);
            mo.set_property("movesupsub", limits);
        }
        Ok(())
    }

    /// `\text{...}`: text with embedded `$...$` math.
    pub(crate) fn text(&mut self, variant: Option<&str>) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let text = self.input.get_argument(&cs)?;
        let node = self.internal_math(&text, variant)?;
        Ok(self.push_node(node)?)
    }

    fn internal_math(&mut self, text: &str, variant: Option<&str>) -> ParseResult<MmlNode> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut math = false;
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    current.push(c);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                '$' => {
                    parts.push((math, std::mem::take(&mut current)));
                    math = !math;
                }
                _ => current.push(c),
            }
        }
        if math {
            return Err(TexError::new(
                TexErrorId::Misplaced,
                "Math mode is not properly terminated",
            )
            .with_context(self.current_cs.as_str())
            .into());
        }
        parts.push((false, current));

        let text_attrs = variant
            .map(|v| vec![attr("mathvariant", v)])
            .unwrap_or_default();
        let mut nodes = Vec::new();
        for (is_math, part) in parts {
            if is_math {
                let inner = self.sub_parse(&part, ParseEnv::default())?;
                nodes.push(self.create(
                    NodeKind::Mstyle,
                    vec![attr("displaystyle", false)],
                    vec![inner],
                ));
            } else if !part.is_empty() {
                nodes.push(self.token(NodeKind::Mtext, text_attrs.clone(), &part));
            }
        }
        Ok(match nodes.len() {
            0 => self.token(NodeKind::Mtext, text_attrs, ""),
            1 => nodes.remove(0),
            _ => self
                .create(NodeKind::TeXAtom, vec![], nodes)
                .with_class(TexClass::Ord),
        })
    }

    /// `\mathrel{...}` and friends.
    pub(crate) fn math_class(&mut self, class: TexClass) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let arg = self.parse_arg(&cs)?;
        let mut atom = self
            .create(NodeKind::TeXAtom, vec![], vec![arg])
            .with_class(class);
        if class == TexClass::Op {
            atom.set_property("movesupsub", true);
        }
        Ok(self.push_node(atom)?)
    }

    pub(crate) fn phantom(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let arg = self.parse_arg(&cs)?;
        let node = self.create(NodeKind::Mphantom, vec![], vec![arg]);
        Ok(self.push_node(node)?)
    }

    pub(crate) fn handle_tag(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let tags = &self.options.tags;
        let current = &tags.state().current;
        if !current.taggable && !tags.env().is_empty() {
            return Err(TexError::new(
                TexErrorId::MisplacedTag,
                format!("{cs} not allowed in {} environment", tags.env()),
            )
            .with_context(cs.as_str())
            .into());
        }
        if current.tag.is_some() {
            return Err(TexError::new(TexErrorId::MultipleCommand, format!("Multiple {cs}"))
                .with_context(cs.as_str())
                .into());
        }
        let star = self.get_star();
        let tag = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        self.options.tags.tag(&tag, star);
        Ok(())
    }

    pub(crate) fn label(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let label = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        if label.is_empty() {
            return Ok(());
        }
        Ok(self.options.tags.set_label(&label, &cs)?)
    }

    pub(crate) fn reference(&mut self, eqref: bool) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let label = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        let node = make_ref(&mut *self.options.tags, &label, eqref, &*self.options.factory);
        Ok(self.push_node(node)?)
    }

    /// `\operatorname{name}`, `\operatorname*{name}`.
    pub(crate) fn operatorname(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let star = self.get_star();
        let name = trim_spaces(&self.input.get_argument(&cs)?).to_string();
        let env = ParseEnv {
            font: Some("normal".to_string()),
            multi_letter: true,
            ..self.stack.env().clone()
        };
        let node = self.sub_parse(&name, env)?;
        let mut op = if node.kind == NodeKind::Mi {
            node.with_class(TexClass::Op)
        } else {
            self.create(NodeKind::TeXAtom, vec![], vec![node])
                .with_class(TexClass::Op)
        };
        op.set_property("movesupsub", star);
        op.set_property("movablelimits", true);
        if !star {
            let rest = self.input.rest();
            if rest.starts_with("\\limits")
                && !rest["\\limits".len()..].starts_with(|c: char| c.is_ascii_alphabetic())
            {
                self.input.advance("\\limits".len());
            }
        }
        let mut item = StackItem::new(ItemKind::Fn);
        item.nodes.push(op);
        Ok(self.push(item)?)
    }

    /// `\boldsymbol{...}`: the argument with every token in bold.
    pub(crate) fn bold_symbol(&mut self) -> ParseResult<()> {
        let cs = self.current_cs.clone();
        let mut node = self.parse_arg(&cs)?;
        node.walk_mut(&mut |n: &mut MmlNode| {
            if matches!(
                n.kind,
                NodeKind::Mi | NodeKind::Mo | NodeKind::Mn | NodeKind::Mtext
            ) {
                if let Some(variant) = bold_variant(n) {
                    n.attributes.set("mathvariant", variant);
                }
            }
        });
        Ok(self.push_node(node)?)
    }

    /// Red text standing in for an unknown control sequence.
    pub(crate) fn undefined_as_text(&mut self, name: &str) -> ParseResult<()> {
        let settings = self.options.package_option("noundefined");
        let setting = |key: &str| {
            settings
                .and_then(|s| s.get(key))
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        let mut attrs = vec![attr(
            "mathcolor",
            setting("color").unwrap_or_else(|| "red".to_string()),
        )];
        if let Some(background) = setting("background") {
            attrs.push(attr("mathbackground", background));
        }
        if let Some(size) = setting("size") {
            attrs.push(attr("mathsize", size));
        }
        let node = self.token(NodeKind::Mtext, attrs, &format!("\\{name}"));
        Ok(self.push_node(node)?)
    }
}
