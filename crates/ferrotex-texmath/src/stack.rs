//! Scope markers and the accept/close/error protocol.
//!
//! ## Overview
//!
//! The parser has no grammar. Instead every construct that spans more than
//! one token pushes a [`StackItem`] and each new item is offered to the item
//! on top through its kind's check function. The top item decides to:
//!
//! - [`Check::Push`]: accept the newcomer as a new scope on top of it
//! - [`Check::Absorbed`]: take it in (usually its finished node) and continue
//! - [`Check::Replace`]: close itself; the returned items (typically its own
//!   finished node followed by the newcomer) are offered to the item beneath
//!
//! or fail with a [`TexError`] naming the mismatch.
//!
//! ```text
//!  push(Close) ──► top: Open ──► Replace([Mml(atom)]) ──► pop Open
//!                                      │
//!                                      ▼
//!                       push(Mml(atom)) ──► top: Start ──► Absorbed
//! ```
//!
//! Each kind's behavior is a small [`ItemCaps`] record (opens / closes /
//! final, plus the check function). A configuration may replace the caps for
//! a kind.

use crate::configuration::Configuration;
use crate::error::{TexError, TexErrorId};
use crate::tags::TagsClass;
use ferrotex_mml::{AttributeList, MmlNode, NodeFactory, NodeKind, TexClass, attr};
use std::mem;

/// Parser-local state that follows scopes: font and style switches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseEnv {
    /// Active `mathvariant` from switches like `\bf`.
    pub font: Option<String>,
    /// Display style requested by the enclosing construct.
    pub display: bool,
    /// Letter runs form a single identifier (inside `\mathrm{...}` and
    /// friends).
    pub multi_letter: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Start,
    Stop,
    Open,
    Close,
    Prime,
    Subsup,
    Over,
    Left,
    Middle,
    Right,
    Begin,
    End,
    Equation,
    Style,
    Cell,
    Array,
    Mml,
    Fn,
    Not,
}

/// Which script slot a [`ItemKind::Subsup`] item is waiting to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSlot {
    Sub,
    Sup,
}

/// How rows of a table are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Array,
    /// Rows may carry equation tags.
    EqnArray,
}

#[derive(Debug, Clone)]
pub struct TableState {
    pub kind: TableKind,
    pub rows: Vec<MmlNode>,
    pub row: Vec<MmlNode>,
    pub attrs: AttributeList,
    pub open: Option<String>,
    pub close: Option<String>,
    pub max_columns: Option<usize>,
    /// Cells are wrapped in a display-style `mstyle` when set.
    pub cell_display: Option<bool>,
    /// Font state restored at the start of every cell.
    pub initial_env: ParseEnv,
}

impl TableState {
    pub fn new(kind: TableKind, initial_env: ParseEnv) -> Self {
        Self {
            kind,
            rows: Vec::new(),
            row: Vec::new(),
            attrs: Vec::new(),
            open: None,
            close: None,
            max_columns: None,
            cell_display: None,
            initial_env,
        }
    }
}

/// Kind-specific payload of a stack item.
#[derive(Debug, Clone, Default)]
pub struct ItemData {
    /// Environment name (begin/end) or the macro that created the item.
    pub name: Option<String>,
    pub delim: Option<String>,
    pub slot: Option<ScriptSlot>,
    pub primes: Option<MmlNode>,
    pub numerator: Option<MmlNode>,
    pub thickness: Option<String>,
    pub open: Option<String>,
    pub close: Option<String>,
    pub styles: AttributeList,
    pub table: Option<TableState>,
    pub is_entry: bool,
    pub is_cr: bool,
    /// Text expanded just before a user environment closes.
    pub end_text: Option<String>,
    pub closing: bool,
}

/// A scope marker on the parser stack.
#[derive(Debug, Clone)]
pub struct StackItem {
    pub kind: ItemKind,
    pub nodes: Vec<MmlNode>,
    pub env: Option<ParseEnv>,
    pub data: ItemData,
}

impl StackItem {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            env: None,
            data: ItemData::default(),
        }
    }

    /// An item that opens a scope with its own copy of the environment.
    pub fn scoped(kind: ItemKind, env: &ParseEnv) -> Self {
        let mut item = Self::new(kind);
        item.env = Some(env.clone());
        item
    }

    pub fn mml(node: MmlNode) -> Self {
        let mut item = Self::new(ItemKind::Mml);
        item.nodes.push(node);
        item
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.data.name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        self.data.name.as_deref().unwrap_or("")
    }

    pub fn first(&self) -> Option<&MmlNode> {
        self.nodes.first()
    }

    /// Collapses the collected nodes into one: the node itself when there is
    /// exactly one and no row is forced, otherwise an `mrow`.
    pub fn to_mml(&mut self, force_row: bool, factory: &dyn NodeFactory) -> MmlNode {
        if self.nodes.len() == 1 && !force_row {
            if let Some(node) = self.nodes.pop() {
                return node;
            }
        }
        factory.create(NodeKind::Mrow, vec![], mem::take(&mut self.nodes))
    }
}

/// Signature of a kind's check function.
pub type CheckFn = fn(&mut StackItem, StackItem, &mut StackContext<'_>) -> Result<Check, TexError>;

/// Capabilities of one item kind.
#[derive(Clone, Copy)]
pub struct ItemCaps {
    /// Opens a scope that `\over` and `&` may act on.
    pub is_open: bool,
    /// Ends some scope beneath it.
    pub is_close: bool,
    /// Carries a finished node.
    pub is_final: bool,
    pub check: CheckFn,
}

impl std::fmt::Debug for ItemCaps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemCaps")
            .field("is_open", &self.is_open)
            .field("is_close", &self.is_close)
            .field("is_final", &self.is_final)
            .finish()
    }
}

impl ItemCaps {
    const fn new(is_open: bool, is_close: bool, is_final: bool, check: CheckFn) -> Self {
        Self {
            is_open,
            is_close,
            is_final,
            check,
        }
    }

    /// Built-in capabilities for `kind`.
    pub fn for_kind(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Start => Self::new(true, false, false, check_start),
            ItemKind::Stop => Self::new(false, true, false, check_base),
            ItemKind::Open => Self::new(true, false, false, check_open),
            ItemKind::Close => Self::new(false, true, false, check_base),
            ItemKind::Prime => Self::new(false, false, false, check_prime),
            ItemKind::Subsup => Self::new(false, false, false, check_subsup),
            ItemKind::Over => Self::new(false, true, false, check_over),
            ItemKind::Left => Self::new(true, false, false, check_left),
            ItemKind::Middle => Self::new(false, true, false, check_base),
            ItemKind::Right => Self::new(false, true, false, check_base),
            ItemKind::Begin => Self::new(true, false, false, check_begin),
            ItemKind::End => Self::new(false, true, false, check_base),
            ItemKind::Equation => Self::new(true, false, false, check_equation),
            ItemKind::Style => Self::new(false, false, false, check_style),
            ItemKind::Cell => Self::new(false, true, false, check_base),
            ItemKind::Array => Self::new(true, false, false, check_array),
            ItemKind::Mml => Self::new(false, false, true, check_base),
            ItemKind::Fn => Self::new(false, false, false, check_fn),
            ItemKind::Not => Self::new(false, false, false, check_not),
        }
    }
}

/// Decision of a check function.
#[derive(Debug)]
pub enum Check {
    Push(StackItem),
    Absorbed,
    Replace(Vec<StackItem>),
}

/// Everything a check function may touch besides the two items.
pub struct StackContext<'p> {
    pub config: &'p Configuration,
    pub factory: &'p dyn NodeFactory,
    pub tags: &'p mut dyn TagsClass,
    /// Top-level display math.
    pub display: bool,
    /// Parsing an argument rather than a whole expression.
    pub inner: bool,
}

impl StackContext<'_> {
    pub fn caps(&self, kind: ItemKind) -> ItemCaps {
        self.config.item_caps(kind)
    }
}

/// The parser's stack of open scopes.
#[derive(Debug)]
pub struct Stack {
    items: Vec<StackItem>,
    root_env: ParseEnv,
}

impl Stack {
    pub fn new(env: ParseEnv) -> Self {
        Self {
            items: vec![StackItem::scoped(ItemKind::Start, &env)],
            root_env: env,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn top(&self) -> Option<&StackItem> {
        self.items.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut StackItem> {
        self.items.last_mut()
    }

    pub fn pop(&mut self) -> Option<StackItem> {
        self.items.pop()
    }

    /// The environment of the innermost scope.
    pub fn env(&self) -> &ParseEnv {
        self.items
            .iter()
            .rev()
            .find_map(|item| item.env.as_ref())
            .unwrap_or(&self.root_env)
    }

    pub fn env_mut(&mut self) -> &mut ParseEnv {
        match self.items.iter_mut().rev().find_map(|item| item.env.as_mut()) {
            Some(env) => env,
            None => &mut self.root_env,
        }
    }

    /// Removes and returns the last node of the top item, the base for a
    /// following script or prime.
    pub fn prev_node(&mut self) -> Option<MmlNode> {
        self.items.last_mut().and_then(|item| item.nodes.pop())
    }

    /// The innermost open user environment called `name` whose end code has
    /// not been expanded yet.
    pub fn pending_user_env_mut(&mut self, name: &str) -> Option<&mut StackItem> {
        self.items.iter_mut().rev().find(|item| {
            item.kind == ItemKind::Begin
                && item.name() == name
                && item.data.end_text.is_some()
                && !item.data.closing
        })
    }

    /// Offers `item` to the top of the stack, following replacements until
    /// every produced item has been placed.
    pub fn push(&mut self, item: StackItem, ctx: &mut StackContext<'_>) -> Result<(), TexError> {
        let Some(top_kind) = self.items.last().map(|top| top.kind) else {
            self.items.push(item);
            return Ok(());
        };
        let check = ctx.caps(top_kind).check;
        let decision = match self.items.last_mut() {
            Some(top) => check(top, item, ctx)?,
            None => return Ok(()),
        };
        match decision {
            Check::Push(item) => self.items.push(item),
            Check::Absorbed => {}
            Check::Replace(items) => {
                self.items.pop();
                for item in items {
                    self.push(item, ctx)?;
                }
            }
        }
        Ok(())
    }

    /// Consumes the stack after a `Stop` has been pushed, returning the
    /// finished node.
    pub fn finish(mut self) -> Result<MmlNode, TexError> {
        match (self.items.len(), self.items.pop()) {
            (1, Some(mut item)) if item.kind == ItemKind::Mml && item.nodes.len() == 1 => {
                item.nodes.pop().ok_or_else(unbalanced)
            }
            _ => Err(unbalanced()),
        }
    }
}

fn unbalanced() -> TexError {
    TexError::new(TexErrorId::ExtraOpenMissingClose, "Missing close brace")
}

/// Error raised when a closing item reaches a scope it cannot close.
fn close_error(top: &StackItem, item: &StackItem) -> Option<TexError> {
    let specific = match (top.kind, item.kind) {
        (ItemKind::Open, ItemKind::Stop) => Some(unbalanced()),
        (ItemKind::Left, ItemKind::Stop) => Some(TexError::new(
            TexErrorId::ExtraLeftMissingRight,
            "Missing \\right",
        )),
        (ItemKind::Subsup, ItemKind::Stop) => Some(TexError::new(
            TexErrorId::MissingScript,
            "Missing superscript or subscript argument",
        )),
        (ItemKind::Begin | ItemKind::Equation, ItemKind::Stop) => Some(
            TexError::new(
                TexErrorId::EnvMissingEnd,
                format!("Missing \\end{{{}}}", top.name()),
            )
            .with_context(top.name()),
        ),
        _ => None,
    };
    specific.or_else(|| match item.kind {
        ItemKind::End => Some(
            TexError::new(
                TexErrorId::MissingBeginExtraEnd,
                format!("Missing \\begin{{{0}}} or extra \\end{{{0}}}", item.name()),
            )
            .with_context(item.name()),
        ),
        ItemKind::Close => Some(TexError::new(
            TexErrorId::ExtraCloseMissingOpen,
            "Extra close brace or missing open brace",
        )),
        ItemKind::Right => Some(TexError::new(
            TexErrorId::MissingLeftExtraRight,
            "Missing \\left or extra \\right",
        )),
        ItemKind::Middle => Some(TexError::new(TexErrorId::ExtraMiddle, "Extra \\middle")),
        ItemKind::Stop => Some(unbalanced()),
        _ => None,
    })
}

/// Shared behavior of all kinds; specific check functions defer to it.
pub fn check_base(
    top: &mut StackItem,
    mut item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    let top_caps = ctx.caps(top.kind);
    let item_caps = ctx.caps(item.kind);
    if item.kind == ItemKind::Over && top_caps.is_open {
        item.data.numerator = Some(top.to_mml(false, ctx.factory));
        return Ok(Check::Push(item));
    }
    if item.kind == ItemKind::Cell && top_caps.is_open {
        if item.data.is_cr {
            let linebreak =
                ctx.factory
                    .create(NodeKind::Mspace, vec![attr("linebreak", "newline")], vec![]);
            top.nodes.push(linebreak);
            return Ok(Check::Absorbed);
        }
        return Err(TexError::new(TexErrorId::Misplaced, "Misplaced &").with_context("&"));
    }
    if item_caps.is_close {
        if let Some(error) = close_error(top, &item) {
            return Err(error);
        }
    }
    if !item_caps.is_final {
        return Ok(Check::Push(item));
    }
    top.nodes.append(&mut item.nodes);
    Ok(Check::Absorbed)
}

fn check_start(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if item.kind == ItemKind::Stop {
        let mut node = top.to_mml(false, ctx.factory);
        if !ctx.inner {
            node = ctx.tags.finalize(node, ctx.display, ctx.factory);
        }
        return Ok(Check::Replace(vec![StackItem::mml(node)]));
    }
    check_base(top, item, ctx)
}

fn check_open(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if item.kind == ItemKind::Close {
        let inner = top.to_mml(false, ctx.factory);
        let atom = ctx
            .factory
            .create(NodeKind::TeXAtom, vec![], vec![inner])
            .with_class(TexClass::Ord);
        return Ok(Check::Replace(vec![StackItem::mml(atom)]));
    }
    check_base(top, item, ctx)
}

fn check_prime(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    let primes = top.nodes.pop();
    let base = top.nodes.pop();
    let (Some(mut base), Some(primes)) = (base, primes) else {
        return Ok(Check::Replace(vec![item]));
    };
    let open_sup = match (base.kind, base.kind.sup_index()) {
        (NodeKind::Msubsup, Some(sup)) if is_placeholder(script_slot(&base, sup)?) => Some(sup),
        _ => None,
    };
    let node = match open_sup {
        Some(sup) => {
            *script_slot_mut(&mut base, sup)? = primes;
            base
        }
        None => ctx.factory.create(
            NodeKind::Msubsup,
            vec![],
            vec![base, placeholder(), primes],
        ),
    };
    Ok(Check::Replace(vec![StackItem::mml(node), item]))
}

fn check_subsup(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if matches!(item.kind, ItemKind::Open | ItemKind::Left) {
        return Ok(Check::Push(item));
    }
    if item.kind == ItemKind::Mml {
        let mut item = item;
        let script = item.to_mml(false, ctx.factory);
        let Some(mut base) = top.nodes.pop() else {
            return Ok(Check::Replace(vec![StackItem::mml(script)]));
        };
        let slot = match top.data.slot {
            Some(ScriptSlot::Sub) => base.kind.sub_index(),
            _ => base.kind.sup_index(),
        };
        if let Some(primes) = top.data.primes.take() {
            if let Some(sup) = base.kind.sup_index() {
                if slot == Some(sup) {
                    // x'^2: the primes and the superscript share the slot.
                    let row = ctx.factory.create(NodeKind::Mrow, vec![], vec![primes, script]);
                    *script_slot_mut(&mut base, sup)? = row;
                    return Ok(Check::Replace(vec![StackItem::mml(base)]));
                }
                *script_slot_mut(&mut base, sup)? = primes;
            }
        }
        if let Some(index) = slot {
            *script_slot_mut(&mut base, index)? = script;
        }
        return Ok(Check::Replace(vec![StackItem::mml(base)]));
    }
    let caps = ctx.caps(item.kind);
    if caps.is_close {
        if let Some(error) = close_error(top, &item) {
            return Err(error);
        }
    }
    Err(match top.data.slot {
        Some(ScriptSlot::Sub) => TexError::new(
            TexErrorId::MissingOpenForSub,
            "Missing open brace for subscript",
        ),
        _ => TexError::new(
            TexErrorId::MissingOpenForSup,
            "Missing open brace for superscript",
        ),
    })
}

fn check_over(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if item.kind == ItemKind::Over {
        return Err(TexError::new(
            TexErrorId::AmbiguousUseOf,
            format!("Ambiguous use of {}", item.name()),
        )
        .with_context(item.name()));
    }
    if ctx.caps(item.kind).is_close {
        let numerator = top
            .data
            .numerator
            .take()
            .unwrap_or_else(|| ctx.factory.create(NodeKind::Mrow, vec![], vec![]));
        let denominator = top.to_mml(false, ctx.factory);
        let mut attrs = Vec::new();
        if let Some(thickness) = &top.data.thickness {
            attrs.push(attr("linethickness", thickness.as_str()));
        }
        let mut frac = ctx
            .factory
            .create(NodeKind::Mfrac, attrs, vec![numerator, denominator]);
        if top.data.open.is_some() || top.data.close.is_some() {
            let open = top.data.open.clone().unwrap_or_else(|| ".".into());
            let close = top.data.close.clone().unwrap_or_else(|| ".".into());
            frac = fixed_fence(ctx.factory, &open, frac, &close);
        }
        return Ok(Check::Replace(vec![StackItem::mml(frac), item]));
    }
    check_base(top, item, ctx)
}

fn check_left(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    match item.kind {
        ItemKind::Right => {
            let open = top.data.delim.clone().unwrap_or_else(|| ".".into());
            let close = item.data.delim.clone().unwrap_or_else(|| ".".into());
            let inner = top.to_mml(false, ctx.factory);
            let node = fenced(ctx.factory, &open, inner, &close);
            Ok(Check::Replace(vec![StackItem::mml(node)]))
        }
        ItemKind::Middle => {
            if let Some(delim) = item.data.delim.as_deref() {
                if !is_null_delim(delim) {
                    let mo = ctx
                        .factory
                        .create_token(
                            NodeKind::Mo,
                            vec![attr("stretchy", true), attr("fence", true)],
                            &delimiter_text(delim),
                        )
                        .with_class(TexClass::Rel);
                    top.nodes.push(mo);
                }
            }
            Ok(Check::Absorbed)
        }
        _ => check_base(top, item, ctx),
    }
}

fn check_begin(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if item.kind == ItemKind::End {
        if item.name() != top.name() {
            return Err(TexError::new(
                TexErrorId::EnvBadEnd,
                format!("\\begin{{{}}} ended with \\end{{{}}}", top.name(), item.name()),
            )
            .with_context(top.name()));
        }
        let node = top.to_mml(false, ctx.factory);
        return Ok(Check::Replace(vec![StackItem::mml(node)]));
    }
    check_base(top, item, ctx)
}

fn check_equation(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if item.kind == ItemKind::End {
        let mut node = top.to_mml(false, ctx.factory);
        if let Some(tag) = ctx.tags.get_tag(false, ctx.factory) {
            node = ctx.tags.en_tag(node, tag, ctx.factory);
        }
        ctx.tags.end();
        // The matching \begin item beneath checks the name.
        return Ok(Check::Replace(vec![StackItem::mml(node), item]));
    }
    check_base(top, item, ctx)
}

fn check_style(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if !ctx.caps(item.kind).is_close {
        return check_base(top, item, ctx);
    }
    let inner = top.to_mml(false, ctx.factory);
    let styles = mem::take(&mut top.data.styles);
    let node = ctx.factory.create(NodeKind::Mstyle, styles, vec![inner]);
    Ok(Check::Replace(vec![StackItem::mml(node), item]))
}

fn check_fn(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    let Some(function) = top.nodes.first().cloned() else {
        return check_base(top, item, ctx);
    };
    if ctx.caps(item.kind).is_open {
        return Ok(Check::Push(item));
    }
    if item.kind == ItemKind::Fn {
        return check_base(top, item, ctx);
    }
    let function = StackItem::mml(function);
    let Some(argument) = item.first().filter(|_| item.kind == ItemKind::Mml) else {
        return Ok(Check::Replace(vec![function, item]));
    };
    let class = argument.effective_class();
    if matches!(
        class,
        TexClass::Rel | TexClass::Bin | TexClass::Punct | TexClass::Close
    ) || argument.property("fnOP").is_some()
    {
        return Ok(Check::Replace(vec![function, item]));
    }
    let apply = ctx
        .factory
        .create_token(NodeKind::Mo, vec![], "\u{2061}")
        .with_class(TexClass::None);
    Ok(Check::Replace(vec![function, StackItem::mml(apply), item]))
}

fn negated(text: &str) -> Option<String> {
    let remapped = match text {
        "<" => "\u{226E}",
        "=" => "\u{2260}",
        ">" => "\u{226F}",
        "\u{2208}" => "\u{2209}",
        "\u{2264}" => "\u{2270}",
        "\u{2265}" => "\u{2271}",
        "\u{2282}" => "\u{2284}",
        "\u{2283}" => "\u{2285}",
        "\u{2261}" => "\u{2262}",
        _ => {
            if text.chars().count() != 1 {
                return None;
            }
            return Some(format!("{text}\u{0338}"));
        }
    };
    Some(remapped.to_string())
}

fn check_not(
    _top: &mut StackItem,
    mut item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    if matches!(item.kind, ItemKind::Open | ItemKind::Left) {
        return Ok(Check::Push(item));
    }
    if item.kind == ItemKind::Mml {
        if let Some(node) = item.nodes.first_mut() {
            if matches!(node.kind, NodeKind::Mo | NodeKind::Mi | NodeKind::Mtext) {
                if let Some(text) = negated(node.text()) {
                    node.text = Some(text);
                    return Ok(Check::Replace(vec![item]));
                }
            }
        }
    }
    let slash = ctx.factory.create_token(NodeKind::Mtext, vec![], "\u{29F8}");
    let padded = ctx
        .factory
        .create(NodeKind::Mpadded, vec![attr("width", "0")], vec![slash]);
    let atom = ctx
        .factory
        .create(NodeKind::TeXAtom, vec![], vec![padded])
        .with_class(TexClass::Rel);
    Ok(Check::Replace(vec![StackItem::mml(atom), item]))
}

fn check_array(
    top: &mut StackItem,
    item: StackItem,
    ctx: &mut StackContext<'_>,
) -> Result<Check, TexError> {
    let caps = ctx.caps(item.kind);
    if !caps.is_close || item.kind == ItemKind::Over {
        return check_base(top, item, ctx);
    }
    if item.data.is_entry {
        end_entry(top, ctx)?;
        clear_env(top);
        return Ok(Check::Absorbed);
    }
    if item.data.is_cr {
        end_entry(top, ctx)?;
        end_row(top, ctx);
        clear_env(top);
        return Ok(Check::Absorbed);
    }
    end_table(top, ctx)?;
    let table = create_table(top, ctx);
    Ok(Check::Replace(vec![StackItem::mml(table), item]))
}

fn clear_env(top: &mut StackItem) {
    if let Some(table) = &top.data.table {
        top.env = Some(table.initial_env.clone());
    }
}

fn end_entry(top: &mut StackItem, ctx: &mut StackContext<'_>) -> Result<(), TexError> {
    let mut content = mem::take(&mut top.nodes);
    let Some(table) = top.data.table.as_mut() else {
        return Ok(());
    };
    if let Some(max) = table.max_columns {
        if table.row.len() >= max {
            return Err(TexError::new(
                TexErrorId::ExtraAlignTab,
                format!("Extra alignment tab in {}", top.data.name.as_deref().unwrap_or("array")),
            ));
        }
    }
    if let Some(display) = table.cell_display {
        let inner = ctx.factory.create(NodeKind::Mrow, vec![], mem::take(&mut content));
        let style = ctx.factory.create(
            NodeKind::Mstyle,
            vec![attr("displaystyle", display), attr("scriptlevel", 0)],
            vec![inner],
        );
        content = vec![style];
    }
    let cell = ctx.factory.create(NodeKind::Mtd, vec![], content);
    table.row.push(cell);
    Ok(())
}

fn end_row(top: &mut StackItem, ctx: &mut StackContext<'_>) {
    let Some(table) = top.data.table.as_mut() else {
        return;
    };
    let mut cells = mem::take(&mut table.row);
    let row = match table.kind {
        TableKind::EqnArray => {
            let tag = ctx.tags.get_tag(false, ctx.factory);
            ctx.tags.clear_tag();
            match tag {
                Some(tag) => {
                    cells.insert(0, tag);
                    ctx.factory.create(NodeKind::Mlabeledtr, vec![], cells)
                }
                None => ctx.factory.create(NodeKind::Mtr, vec![], cells),
            }
        }
        TableKind::Array => ctx.factory.create(NodeKind::Mtr, vec![], cells),
    };
    table.rows.push(row);
}

fn end_table(top: &mut StackItem, ctx: &mut StackContext<'_>) -> Result<(), TexError> {
    let pending = !top.nodes.is_empty()
        || top.data.table.as_ref().is_some_and(|table| !table.row.is_empty());
    if pending {
        end_entry(top, ctx)?;
        end_row(top, ctx);
    }
    if top.data.table.as_ref().map(|t| t.kind) == Some(TableKind::EqnArray) {
        ctx.tags.end();
    }
    Ok(())
}

fn create_table(top: &mut StackItem, ctx: &mut StackContext<'_>) -> MmlNode {
    let Some(table) = top.data.table.take() else {
        return ctx.factory.create(NodeKind::Mtable, vec![], vec![]);
    };
    let mtable = ctx.factory.create(NodeKind::Mtable, table.attrs, table.rows);
    match (table.open, table.close) {
        (None, None) => mtable,
        (open, close) => fenced(
            ctx.factory,
            open.as_deref().unwrap_or("."),
            mtable,
            close.as_deref().unwrap_or("."),
        ),
    }
}

/// Maps a delimiter as written in the source to the character it stands for.
pub fn delimiter_text(delim: &str) -> String {
    match delim {
        "\\{" | "\\lbrace" => "{".into(),
        "\\}" | "\\rbrace" => "}".into(),
        "\\langle" | "<" => "\u{27E8}".into(),
        "\\rangle" | ">" => "\u{27E9}".into(),
        "\\lvert" | "\\rvert" | "\\vert" | "|" => "|".into(),
        "\\lVert" | "\\rVert" | "\\Vert" | "\\|" => "\u{2016}".into(),
        "\\lfloor" => "\u{230A}".into(),
        "\\rfloor" => "\u{230B}".into(),
        "\\lceil" => "\u{2308}".into(),
        "\\rceil" => "\u{2309}".into(),
        "\\backslash" => "\\".into(),
        "\\uparrow" => "\u{2191}".into(),
        "\\downarrow" => "\u{2193}".into(),
        "\\updownarrow" => "\u{2195}".into(),
        "." => String::new(),
        other => other.to_string(),
    }
}

/// `.` (or an empty delimiter) stands for no fence at all.
pub fn is_null_delim(delim: &str) -> bool {
    delim.is_empty() || delim == "."
}

fn fence_mo(factory: &dyn NodeFactory, delim: &str, stretchy: bool, class: TexClass) -> MmlNode {
    let mut attrs = vec![attr("fence", true)];
    attrs.push(attr("stretchy", stretchy));
    attrs.push(attr("symmetric", true));
    factory
        .create_token(NodeKind::Mo, attrs, &delimiter_text(delim))
        .with_class(class)
}

/// `\left ... \right`: stretchy fences around `inner`, as an INNER atom.
pub fn fenced(factory: &dyn NodeFactory, open: &str, inner: MmlNode, close: &str) -> MmlNode {
    let mut children = Vec::new();
    if !is_null_delim(open) {
        children.push(fence_mo(factory, open, true, TexClass::Open));
    }
    children.push(inner);
    if !is_null_delim(close) {
        children.push(fence_mo(factory, close, true, TexClass::Close));
    }
    factory
        .create(NodeKind::Mrow, vec![], children)
        .with_class(TexClass::Inner)
}

/// Non-stretchy fences around `inner`, used by `\choose`-style infix
/// fractions.
pub fn fixed_fence(factory: &dyn NodeFactory, open: &str, inner: MmlNode, close: &str) -> MmlNode {
    let mut children = Vec::new();
    if !is_null_delim(open) {
        children.push(fence_mo(factory, open, false, TexClass::Open));
    }
    children.push(inner);
    if !is_null_delim(close) {
        children.push(fence_mo(factory, close, false, TexClass::Close));
    }
    factory.create(NodeKind::Mrow, vec![], children)
}

/// Empty script slot, removed by [`clean_scripts`].
pub fn placeholder() -> MmlNode {
    let mut node = MmlNode::new(NodeKind::Mrow, vec![]);
    node.set_property("placeholder", true);
    node
}

pub fn is_placeholder(node: &MmlNode) -> bool {
    node.flag("placeholder")
}

fn missing_slot(kind: NodeKind, index: usize) -> TexError {
    TexError::new(
        TexErrorId::MissingScript,
        format!("Script slot {index} is missing from {kind}"),
    )
}

/// Child `index` of a script node, or an error when the node was built
/// without that slot.
pub(crate) fn script_slot(node: &MmlNode, index: usize) -> Result<&MmlNode, TexError> {
    node.children
        .get(index)
        .ok_or_else(|| missing_slot(node.kind, index))
}

pub(crate) fn script_slot_mut(
    node: &mut MmlNode,
    index: usize,
) -> Result<&mut MmlNode, TexError> {
    let kind = node.kind;
    node.children
        .get_mut(index)
        .ok_or_else(|| missing_slot(kind, index))
}

/// Rewrites `msubsup`/`munderover` nodes with an empty slot into their
/// two-child forms.
pub fn clean_scripts(node: &mut MmlNode) {
    node.walk_mut(&mut |n: &mut MmlNode| {
        let (combined, sub_only, sup_only) = match n.kind {
            NodeKind::Msubsup => (true, NodeKind::Msub, NodeKind::Msup),
            NodeKind::Munderover => (true, NodeKind::Munder, NodeKind::Mover),
            _ => (false, n.kind, n.kind),
        };
        if !combined || n.children.len() != 3 {
            return;
        }
        let sub_empty = is_placeholder(&n.children[1]);
        let sup_empty = is_placeholder(&n.children[2]);
        let kind = match (sub_empty, sup_empty) {
            (true, true) => {
                n.children.truncate(1);
                if let Some(base) = n.children.pop() {
                    *n = base;
                }
                return;
            }
            (true, false) => {
                n.children.remove(1);
                sup_only
            }
            (false, true) => {
                n.children.remove(2);
                sub_only
            }
            (false, false) => return,
        };
        n.set_kind(kind);
    });
}
