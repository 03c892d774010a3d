//! Equation numbering, labels and references.
//!
//! A [`TagsClass`] tracks one *current tag* per open numbered environment, a
//! running counter, and the label table used by `\ref`/`\eqref`. Three
//! schemes ship with the crate, selected by the `tags` option:
//!
//! | name   | type        | numbers                                     |
//! |--------|-------------|---------------------------------------------|
//! | `none` | [`NoTags`]  | only explicit `\tag{...}`                   |
//! | `ams`  | [`AmsTags`] | numbered environments (`equation`, `align`) |
//! | `all`  | [`AllTags`] | every display equation                      |
//!
//! All logic lives in the trait's provided methods over a shared
//! [`TagState`]; a custom scheme overrides only the formatting hooks or the
//! one method it needs to change.

use crate::error::{TexError, TexErrorId};
use ferrotex_mml::{MmlNode, NodeFactory, NodeKind, attr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Display text and element id bound to a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub tag: String,
    pub id: String,
}

impl Default for Label {
    fn default() -> Self {
        Self {
            tag: "???".to_string(),
            id: String::new(),
        }
    }
}

/// Tag bookkeeping for one (possibly nested) environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub env: String,
    pub taggable: bool,
    pub default_tags: bool,
    pub tag: Option<String>,
    pub tag_format: String,
    pub no_tag: bool,
    pub tag_id: String,
    pub label: String,
}

impl TagInfo {
    pub fn new(env: &str, taggable: bool, default_tags: bool) -> Self {
        Self {
            env: env.to_string(),
            taggable,
            default_tags,
            ..Self::default()
        }
    }
}

/// Placement options for generated tag rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLayout {
    pub side: String,
    pub indent: String,
    pub use_label_ids: bool,
}

impl Default for TagLayout {
    fn default() -> Self {
        Self {
            side: "right".to_string(),
            indent: "0.8em".to_string(),
            use_label_ids: true,
        }
    }
}

/// Counters and tables shared by every tag scheme.
#[derive(Debug, Clone, Default)]
pub struct TagState {
    pub counter: usize,
    /// Counter value at the end of the last finished expression.
    pub all_counter: usize,
    pub current: TagInfo,
    pub stack: Vec<TagInfo>,
    /// Environments closed during the current expression.
    pub history: Vec<TagInfo>,
    pub labels: BTreeMap<String, Label>,
    pub all_labels: BTreeMap<String, Label>,
    /// Set when a `\ref` could not be resolved while parsing.
    pub redo: bool,
    /// A second pass is filling references; labels may be seen again.
    pub ref_update: bool,
    pub layout: TagLayout,
}

impl TagState {
    pub fn with_layout(layout: TagLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    pub fn lookup(&self, label: &str) -> Option<&Label> {
        self.labels.get(label).or_else(|| self.all_labels.get(label))
    }
}

/// Pluggable numbering scheme.
pub trait TagsClass: Send + fmt::Debug {
    fn name(&self) -> &'static str;
    fn state(&self) -> &TagState;
    fn state_mut(&mut self) -> &mut TagState;

    fn format_number(&self, n: usize) -> String {
        n.to_string()
    }

    fn format_tag(&self, tag: &str) -> String {
        format!("({tag})")
    }

    fn format_id(&self, id: &str) -> String {
        let id: String = id
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        format!("mjx-eqn:{id}")
    }

    fn format_url(&self, id: &str, base: &str) -> String {
        format!("{base}#{id}")
    }

    fn format_ref(&self, tag: &str) -> String {
        self.format_tag(tag)
    }

    /// Opens a (possibly nested) numbered context.
    fn start(&mut self, env: &str, taggable: bool, default_tags: bool) {
        let state = self.state_mut();
        let previous = std::mem::replace(&mut state.current, TagInfo::new(env, taggable, default_tags));
        state.stack.push(previous);
    }

    fn end(&mut self) {
        let state = self.state_mut();
        let restored = state.stack.pop().unwrap_or_default();
        let finished = std::mem::replace(&mut state.current, restored);
        state.history.push(finished);
    }

    fn env(&self) -> &str {
        &self.state().current.env
    }

    /// Sets an explicit tag. Never touches the counter.
    fn tag(&mut self, tag: &str, no_format: bool) {
        let formatted = if no_format {
            tag.to_string()
        } else {
            self.format_tag(tag)
        };
        let current = &mut self.state_mut().current;
        current.tag = Some(tag.to_string());
        current.tag_format = formatted;
        current.no_tag = false;
    }

    fn no_tag(&mut self) {
        self.tag("", true);
        self.state_mut().current.no_tag = true;
    }

    /// Numbers the current equation unless it already carries a tag.
    fn auto_tag(&mut self) {
        if self.state().current.tag.is_none() {
            self.state_mut().counter += 1;
            let number = self.format_number(self.state().counter);
            self.tag(&number, false);
        }
    }

    fn clear_tag(&mut self) {
        let current = &mut self.state_mut().current;
        current.label.clear();
        current.tag = None;
        current.tag_format.clear();
        current.no_tag = false;
        current.tag_id.clear();
    }

    /// Records `label` for the current equation.
    fn set_label(&mut self, label: &str, command: &str) -> Result<(), TexError> {
        if self.state().ref_update {
            return Ok(());
        }
        if !self.state().current.label.is_empty() {
            return Err(TexError::new(
                TexErrorId::MultipleCommand,
                format!("Multiple {command}"),
            )
            .with_context(command));
        }
        if self.state().lookup(label).is_some() {
            return Err(TexError::new(
                TexErrorId::MultipleLabel,
                format!("Label '{label}' multiply defined"),
            )
            .with_context(command));
        }
        self.state_mut().current.label = label.to_string();
        Ok(())
    }

    fn make_id(&mut self) {
        let state = self.state();
        let source = if state.layout.use_label_ids && !state.current.label.is_empty() {
            state.current.label.clone()
        } else {
            state.current.tag.clone().unwrap_or_default()
        };
        let id = self.format_id(&source);
        self.state_mut().current.tag_id = id;
    }

    /// Builds the tag cell and binds the current label to it.
    fn make_tag(&mut self, factory: &dyn NodeFactory) -> MmlNode {
        self.make_id();
        let state = self.state_mut();
        if !state.current.label.is_empty() {
            let label = Label {
                tag: state.current.tag.clone().unwrap_or_default(),
                id: state.current.tag_id.clone(),
            };
            state.labels.insert(state.current.label.clone(), label);
        }
        let text = factory.create_token(NodeKind::Mtext, vec![], &state.current.tag_format);
        factory.create(
            NodeKind::Mtd,
            vec![attr("id", state.current.tag_id.as_str())],
            vec![text],
        )
    }

    /// The tag cell for the current equation, if it gets one.
    fn get_tag(&mut self, force: bool, factory: &dyn NodeFactory) -> Option<MmlNode> {
        if force {
            self.auto_tag();
            return Some(self.make_tag(factory));
        }
        let current = &self.state().current;
        if current.taggable && !current.no_tag {
            if current.default_tags {
                self.auto_tag();
            }
            if self.state().current.tag.is_some() {
                return Some(self.make_tag(factory));
            }
        }
        None
    }

    /// Wraps `node` in a one-row labeled table carrying `tag`.
    fn en_tag(&self, node: MmlNode, tag: MmlNode, factory: &dyn NodeFactory) -> MmlNode {
        let layout = &self.state().layout;
        let cell = factory.create(NodeKind::Mtd, vec![], vec![node]);
        let row = factory.create(NodeKind::Mlabeledtr, vec![], vec![tag, cell]);
        factory.create(
            NodeKind::Mtable,
            vec![
                attr("side", layout.side.as_str()),
                attr("minlabelspacing", layout.indent.as_str()),
                attr("displaystyle", true),
            ],
            vec![row],
        )
    }

    /// Called on the finished top-level node; attaches a tag set outside any
    /// environment (e.g. `\tag{1} x` in display math).
    fn finalize(&mut self, node: MmlNode, display: bool, factory: &dyn NodeFactory) -> MmlNode {
        let current = &self.state().current;
        if !display || !current.env.is_empty() || current.tag.is_none() || current.no_tag {
            return node;
        }
        let tag = self.make_tag(factory);
        self.en_tag(node, tag, factory)
    }

    /// Restarts numbering, e.g. between documents.
    fn reset(&mut self, offset: usize) {
        let layout = self.state().layout.clone();
        *self.state_mut() = TagState::with_layout(layout);
        self.state_mut().counter = offset;
        self.state_mut().all_counter = offset;
    }

    /// Prepares per-expression state before a parse attempt.
    fn start_equation(&mut self) {
        let state = self.state_mut();
        state.history.clear();
        state.stack.clear();
        state.current = TagInfo::default();
        state.labels.clear();
        state.counter = state.all_counter;
        state.redo = false;
    }

    /// Commits numbering and labels of a successfully parsed expression.
    fn finish_equation(&mut self) {
        let state = self.state_mut();
        if !state.ref_update {
            state.all_counter = state.counter;
        }
        let labels = std::mem::take(&mut state.labels);
        state.all_labels.extend(labels);
    }
}

/// Only explicit `\tag` produces numbers.
#[derive(Debug, Clone, Default)]
pub struct NoTags {
    state: TagState,
}

impl NoTags {
    pub fn new(layout: TagLayout) -> Self {
        Self {
            state: TagState::with_layout(layout),
        }
    }
}

impl TagsClass for NoTags {
    fn name(&self) -> &'static str {
        "none"
    }

    fn state(&self) -> &TagState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TagState {
        &mut self.state
    }

    fn auto_tag(&mut self) {}

    fn get_tag(&mut self, _force: bool, factory: &dyn NodeFactory) -> Option<MmlNode> {
        let current = &self.state.current;
        if current.no_tag || current.tag.as_deref().is_none_or(str::is_empty) {
            return None;
        }
        Some(self.make_tag(factory))
    }
}

/// Numbers environments that are numbered in AMS LaTeX.
#[derive(Debug, Clone, Default)]
pub struct AmsTags {
    state: TagState,
}

impl AmsTags {
    pub fn new(layout: TagLayout) -> Self {
        Self {
            state: TagState::with_layout(layout),
        }
    }
}

impl TagsClass for AmsTags {
    fn name(&self) -> &'static str {
        "ams"
    }

    fn state(&self) -> &TagState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TagState {
        &mut self.state
    }
}

/// Numbers every display equation not already numbered by an environment.
#[derive(Debug, Clone, Default)]
pub struct AllTags {
    state: TagState,
}

impl AllTags {
    pub fn new(layout: TagLayout) -> Self {
        Self {
            state: TagState::with_layout(layout),
        }
    }
}

impl TagsClass for AllTags {
    fn name(&self) -> &'static str {
        "all"
    }

    fn state(&self) -> &TagState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TagState {
        &mut self.state
    }

    fn finalize(&mut self, node: MmlNode, display: bool, factory: &dyn NodeFactory) -> MmlNode {
        if !display || self.state.history.iter().any(|info| info.taggable) {
            return node;
        }
        if self.state.current.no_tag {
            return node;
        }
        match self.get_tag(true, factory) {
            Some(tag) => self.en_tag(node, tag, factory),
            None => node,
        }
    }
}

/// Constructor registered under a scheme name.
pub type TagsConstructor = fn(TagLayout) -> Box<dyn TagsClass>;

pub fn no_tags(layout: TagLayout) -> Box<dyn TagsClass> {
    Box::new(NoTags::new(layout))
}

pub fn ams_tags(layout: TagLayout) -> Box<dyn TagsClass> {
    Box::new(AmsTags::new(layout))
}

pub fn all_tags(layout: TagLayout) -> Box<dyn TagsClass> {
    Box::new(AllTags::new(layout))
}

/// Builds the node for `\ref{label}` / `\eqref{label}`. Unknown labels give
/// a `???` placeholder that [`resolve_refs`] can fill in later.
pub fn make_ref(
    tags: &mut dyn TagsClass,
    label: &str,
    eqref: bool,
    factory: &dyn NodeFactory,
) -> MmlNode {
    let found = tags.state().lookup(label).cloned();
    if found.is_none() && !tags.state().ref_update {
        tags.state_mut().redo = true;
    }
    let resolved = found.is_some();
    let target = found.unwrap_or_default();
    let text = if eqref && resolved {
        tags.format_ref(&target.tag)
    } else {
        target.tag.clone()
    };
    let mtext = factory.create_token(NodeKind::Mtext, vec![], &text);
    let mut node = factory.create(
        NodeKind::Mrow,
        vec![
            attr("href", tags.format_url(&target.id, "")),
            attr("class", "MathJax_ref"),
        ],
        vec![mtext],
    );
    node.set_property("ref", label);
    node.set_property("eqref", eqref);
    if !resolved {
        node.set_property("unresolved", true);
    }
    node
}

/// Second pass over a finished tree: fills references whose labels were
/// defined after the `\ref`. Returns how many remain unresolved (`???`).
pub fn resolve_refs(tags: &dyn TagsClass, node: &mut MmlNode) -> usize {
    let mut remaining = 0;
    node.walk_mut(&mut |n: &mut MmlNode| {
        if !n.flag("unresolved") {
            return;
        }
        let label = n
            .property("ref")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        match tags.state().lookup(&label) {
            Some(target) => {
                let text = if n.flag("eqref") {
                    tags.format_ref(&target.tag)
                } else {
                    target.tag.clone()
                };
                n.attributes.set("href", tags.format_url(&target.id, ""));
                if let Some(mtext) = n.children.first_mut() {
                    mtext.text = Some(text);
                }
                n.remove_property("unresolved");
            }
            None => remaining += 1,
        }
    });
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrotex_mml::DefaultNodeFactory;

    fn cell_text(cell: &MmlNode) -> &str {
        cell.children[0].text()
    }

    #[test]
    fn test_explicit_tag_does_not_increment() {
        let factory = DefaultNodeFactory::new();
        let mut tags = AmsTags::default();
        tags.start_equation();
        tags.tag("7", false);
        let tag = tags.get_tag(true, &factory).unwrap();
        assert_eq!(cell_text(&tag), "(7)");
        assert_eq!(tags.state().counter, 0);

        tags.clear_tag();
        tags.auto_tag();
        assert_eq!(tags.state().current.tag.as_deref(), Some("1"));
    }

    #[test]
    fn test_numbered_environment_counts() {
        let factory = DefaultNodeFactory::new();
        let mut tags = AmsTags::default();
        tags.start_equation();
        tags.start("equation", true, true);
        assert!(tags.get_tag(false, &factory).is_some());
        tags.end();
        tags.finish_equation();
        assert_eq!(tags.state().all_counter, 1);

        tags.start_equation();
        tags.start("equation*", true, false);
        assert!(tags.get_tag(false, &factory).is_none());
        tags.end();
        tags.finish_equation();
        assert_eq!(tags.state().all_counter, 1);
    }

    #[test]
    fn test_label_binds_tag_and_id() {
        let factory = DefaultNodeFactory::new();
        let mut tags = AmsTags::default();
        tags.start_equation();
        tags.start("equation", true, true);
        tags.set_label("eq:a", "\\label").unwrap();
        tags.get_tag(false, &factory).unwrap();
        tags.end();
        tags.finish_equation();
        let label = tags.state().lookup("eq:a").unwrap();
        assert_eq!(label.tag, "1");
        assert_eq!(label.id, "mjx-eqn:eq:a");
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let mut tags = AmsTags::default();
        tags.state_mut()
            .all_labels
            .insert("x".into(), Label::default());
        let err = tags.set_label("x", "\\label").unwrap_err();
        assert_eq!(err.id, TexErrorId::MultipleLabel);

        tags.start_equation();
        tags.set_label("y", "\\label").unwrap();
        let err = tags.set_label("z", "\\label").unwrap_err();
        assert_eq!(err.id, TexErrorId::MultipleCommand);
    }

    #[test]
    fn test_refs_resolve_in_second_pass() {
        let factory = DefaultNodeFactory::new();
        let mut tags = AmsTags::default();
        tags.start_equation();
        let mut node = make_ref(&mut tags, "later", true, &factory);
        assert_eq!(node.children[0].text(), "???");
        assert!(tags.state().redo);

        tags.state_mut().all_labels.insert(
            "later".into(),
            Label {
                tag: "3".into(),
                id: "mjx-eqn:later".into(),
            },
        );
        assert_eq!(resolve_refs(&tags, &mut node), 0);
        assert_eq!(node.children[0].text(), "(3)");
    }

    #[test]
    fn test_all_tags_numbers_plain_display_math() {
        let factory = DefaultNodeFactory::new();
        let mut tags = AllTags::default();
        tags.start_equation();
        let node = factory.create_token(NodeKind::Mi, vec![], "x");
        let tagged = tags.finalize(node.clone(), true, &factory);
        assert_eq!(tagged.kind, NodeKind::Mtable);
        let inline = tags.finalize(node, false, &factory);
        assert_eq!(inline.kind, NodeKind::Mi);
    }
}
