//! In-memory document for exercising the bot without a browser.
//!
//! Pages are HTML parsed with `scraper`; selectors run through
//! `scraper::Selector`. Nodes carrying a `data-key` attribute can be found
//! by reactions (re-renders after a click, keystroke or read, optionally
//! delayed) and by assertions. Re-rendering detaches the old nodes from the
//! tree, so handles to them go stale.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{ElementRef, Html, Node, Selector};
use tokio::time::Instant;

use tradeit_core::error::{Result, TradeitError};

use crate::driver::{Driver, WebElement};

const KEY: &str = "data-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Navigate(String),
    Click(String),
    Keys(String, String),
    Clear(String),
}

type Reaction = Arc<dyn Fn(&mut Dom) + Send + Sync>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Click,
    Keys,
    Read,
}

struct Hook {
    key: String,
    trigger: Trigger,
    delay: Duration,
    reaction: Reaction,
}

pub(crate) struct Dom {
    html: Html,
    values: HashMap<NodeId, String>,
    actions: Vec<Action>,
    hooks: Vec<Hook>,
    pending: Vec<(Instant, Reaction)>,
}

impl Dom {
    fn id_of(&self, key: &str) -> NodeId {
        let selector = Selector::parse(&format!(r#"[{KEY}="{key}"]"#)).unwrap();
        self.html
            .root_element()
            .select(&selector)
            .next()
            .map(|found| found.id())
            .unwrap_or_else(|| panic!("no attached node keyed '{key}'"))
    }

    fn element(&self, id: NodeId) -> ElementRef<'_> {
        self.html
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .unwrap_or_else(|| panic!("{id:?} is not an element"))
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        id == root
            || self
                .html
                .tree
                .get(id)
                .is_some_and(|node| node.ancestors().any(|a| a.id() == root))
    }

    /// Replace the content of the keyed node with `markup`; the old
    /// descendants are detached and go stale.
    pub fn set_children(&mut self, key: &str, markup: &str) {
        let target = self.id_of(key);
        let old: Vec<NodeId> = self.element(target).children().map(|c| c.id()).collect();
        for child in old {
            if let Some(mut node) = self.html.tree.get_mut(child) {
                node.detach();
            }
        }
        let fragment = Html::parse_fragment(markup);
        graft(&mut self.html.tree, target, *fragment.root_element());
    }

    pub fn add_class(&mut self, key: &str, class: &str) {
        let id = self.id_of(key);
        let classes = match self.element(id).value().attr("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", Some(&classes));
    }

    pub fn set_value(&mut self, key: &str, value: &str) {
        let id = self.id_of(key);
        self.values.insert(id, value.to_string());
    }

    pub fn set_displayed(&mut self, key: &str, displayed: bool) {
        let id = self.id_of(key);
        self.set_attr(id, "hidden", (!displayed).then_some(""));
    }

    /// Swap the element's data for a re-parsed copy with one attribute
    /// changed. The node keeps its id, so existing handles stay attached.
    fn set_attr(&mut self, id: NodeId, name: &str, value: Option<&str>) {
        let element = self.element(id).value();
        let mut attrs: Vec<(String, String)> = element
            .attrs()
            .filter(|(n, _)| *n != name)
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        if let Some(value) = value {
            attrs.push((name.to_string(), value.to_string()));
        }
        let mut markup = format!("<{}", element.name());
        for (n, v) in &attrs {
            assert!(!v.contains('"'), "attribute values must not contain quotes");
            markup.push_str(&format!(r#" {n}="{v}""#));
        }
        markup.push('>');

        let fragment = Html::parse_fragment(&markup);
        let rebuilt = fragment
            .root_element()
            .first_child()
            .map(|node| node.value().clone())
            .unwrap_or_else(|| panic!("could not rebuild {markup}"));
        if let Some(mut node) = self.html.tree.get_mut(id) {
            *node.value() = rebuilt;
        }
    }

    fn value(&self, id: NodeId) -> String {
        self.values.get(&id).cloned().unwrap_or_else(|| {
            self.element(id)
                .value()
                .attr("value")
                .unwrap_or_default()
                .to_string()
        })
    }

    fn is_displayed(&self, id: NodeId) -> bool {
        let element = self.element(id);
        std::iter::once(*element)
            .chain(element.ancestors())
            .filter_map(ElementRef::wrap)
            .all(|e| e.value().attr("hidden").is_none())
    }

    fn key(&self, id: NodeId) -> Option<String> {
        self.element(id).value().attr(KEY).map(str::to_string)
    }

    fn label(&self, id: NodeId) -> String {
        self.key(id)
            .unwrap_or_else(|| self.element(id).value().name().to_string())
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.pending = later;
        for (_, reaction) in due {
            reaction(self);
        }
    }

    fn fire(&mut self, id: NodeId, trigger: Trigger) {
        let Some(key) = self.key(id) else {
            return;
        };
        let matching: Vec<(Duration, Reaction)> = self
            .hooks
            .iter()
            .filter(|h| h.key == key && h.trigger == trigger)
            .map(|h| (h.delay, h.reaction.clone()))
            .collect();
        for (delay, reaction) in matching {
            if delay.is_zero() {
                reaction(self);
            } else {
                self.pending.push((Instant::now() + delay, reaction));
            }
        }
    }
}

/// Copy the children of `source`, a node of another document, under `parent`.
fn graft(tree: &mut Tree<Node>, parent: NodeId, source: NodeRef<'_, Node>) {
    for child in source.children() {
        let Some(mut target) = tree.get_mut(parent) else {
            return;
        };
        let id = target.append(child.value().clone()).id();
        graft(tree, id, child);
    }
}

/// A fake single-page session.
#[derive(Clone)]
pub(crate) struct FakeDom {
    dom: Arc<Mutex<Dom>>,
}

impl FakeDom {
    pub fn new(markup: &str) -> Self {
        let dom = Dom {
            html: Html::parse_document(markup),
            values: HashMap::new(),
            actions: Vec::new(),
            hooks: Vec::new(),
            pending: Vec::new(),
        };
        Self {
            dom: Arc::new(Mutex::new(dom)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Dom> {
        self.dom.lock().unwrap()
    }

    /// Run `reaction` `delay` after each click on the keyed node.
    pub fn on_click(
        &self,
        key: &str,
        delay: Duration,
        reaction: impl Fn(&mut Dom) + Send + Sync + 'static,
    ) {
        self.hook(key, Trigger::Click, delay, Arc::new(reaction));
    }

    /// Run `reaction` `delay` after each keystroke batch sent to the keyed node.
    pub fn on_keys(
        &self,
        key: &str,
        delay: Duration,
        reaction: impl Fn(&mut Dom) + Send + Sync + 'static,
    ) {
        self.hook(key, Trigger::Keys, delay, Arc::new(reaction));
    }

    /// Run `reaction` right before each text read of the keyed node, like a
    /// re-render racing the read.
    pub fn on_read(&self, key: &str, reaction: impl Fn(&mut Dom) + Send + Sync + 'static) {
        self.hook(key, Trigger::Read, Duration::ZERO, Arc::new(reaction));
    }

    fn hook(&self, key: &str, trigger: Trigger, delay: Duration, reaction: Reaction) {
        self.lock().hooks.push(Hook {
            key: key.to_string(),
            trigger,
            delay,
            reaction,
        });
    }

    pub fn mutate(&self, f: impl FnOnce(&mut Dom)) {
        let mut dom = self.lock();
        f(&mut *dom);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Click(label) => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn keystrokes(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Keys(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn element(&self, key: &str) -> FakeElement {
        let id = self.lock().id_of(key);
        self.handle(id)
    }

    pub fn value_of(&self, key: &str) -> String {
        let dom = self.lock();
        let id = dom.id_of(key);
        dom.value(id)
    }

    fn handle(&self, id: NodeId) -> FakeElement {
        FakeElement {
            dom: self.dom.clone(),
            id,
        }
    }
}

#[async_trait]
impl Driver for FakeDom {
    type Element = FakeElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.lock().actions.push(Action::Navigate(url.to_string()));
        Ok(())
    }

    async fn root(&self) -> Result<FakeElement> {
        let root = self.lock().html.root_element().id();
        Ok(self.handle(root))
    }
}

#[derive(Clone)]
pub(crate) struct FakeElement {
    dom: Arc<Mutex<Dom>>,
    id: NodeId,
}

impl std::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeElement").field("id", &self.id).finish()
    }
}

impl FakeElement {
    pub fn key(&self) -> Option<String> {
        self.dom.lock().unwrap().key(self.id)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Dom, NodeId) -> T) -> Result<T> {
        let mut dom = self.dom.lock().unwrap();
        dom.tick();
        if !dom.is_attached(self.id) {
            return Err(TradeitError::StaleElement(format!(
                "<{}> ({}) is no longer attached",
                dom.element(self.id).value().name(),
                dom.label(self.id)
            )));
        }
        Ok(f(&mut *dom, self.id))
    }

    fn handles(&self, ids: Vec<NodeId>) -> Vec<FakeElement> {
        ids.into_iter()
            .map(|id| FakeElement {
                dom: self.dom.clone(),
                id,
            })
            .collect()
    }
}

#[async_trait]
impl WebElement for FakeElement {
    async fn query_all(&self, selector: &str) -> Result<Vec<Self>> {
        let selector = Selector::parse(selector)
            .map_err(|e| TradeitError::Driver(format!("invalid selector '{selector}': {e:?}")))?;
        let ids: Vec<NodeId> = self.with(|dom, id| {
            dom.element(id)
                .select(&selector)
                .map(|found| found.id())
                .collect()
        })?;
        Ok(self.handles(ids))
    }

    async fn children(&self) -> Result<Vec<Self>> {
        let ids: Vec<NodeId> = self.with(|dom, id| {
            dom.element(id)
                .children()
                .filter_map(ElementRef::wrap)
                .map(|child| child.id())
                .collect()
        })?;
        Ok(self.handles(ids))
    }

    async fn tag_name(&self) -> Result<String> {
        self.with(|dom, id| dom.element(id).value().name().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.with(|dom, id| dom.element(id).value().attr(name).map(str::to_string))
    }

    async fn inner_html(&self) -> Result<String> {
        self.with(|dom, id| dom.element(id).inner_html())
    }

    async fn text_content(&self) -> Result<String> {
        self.with(|dom, id| dom.fire(id, Trigger::Read))?;
        self.with(|dom, id| dom.element(id).text().collect())
    }

    async fn value(&self) -> Result<String> {
        self.with(|dom, id| dom.value(id))
    }

    async fn is_displayed(&self) -> Result<bool> {
        self.with(|dom, id| dom.is_displayed(id))
    }

    async fn is_enabled(&self) -> Result<bool> {
        self.with(|dom, id| dom.element(id).value().attr("disabled").is_none())
    }

    async fn click(&self) -> Result<()> {
        self.with(|dom, id| {
            let label = dom.label(id);
            dom.actions.push(Action::Click(label));
            dom.fire(id, Trigger::Click);
        })
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        self.with(|dom, id| {
            let mut value = dom.value(id);
            value.push_str(text);
            dom.values.insert(id, value);
            let label = dom.label(id);
            dom.actions.push(Action::Keys(label, text.to_string()));
            dom.fire(id, Trigger::Keys);
        })
    }

    async fn clear(&self) -> Result<()> {
        self.with(|dom, id| {
            dom.values.insert(id, String::new());
            let label = dom.label(id);
            dom.actions.push(Action::Clear(label));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scoped_query_and_markup() {
        let dom = FakeDom::new(
            r#"<div id="sinv-loader"><ul><li>A</li><li class="x">B &amp; C</li></ul></div><ol><li>outside</li></ol>"#,
        );
        let root = dom.root().await.unwrap();
        let items = root.query_all("#sinv-loader li").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].inner_html().await.unwrap(), "B &amp; C");
        assert_eq!(items[1].text_content().await.unwrap(), "B & C");
        assert!(items[1].has_class("x").await.unwrap());

        let loader = root.query_all("#sinv-loader").await.unwrap();
        assert_eq!(
            loader[0].inner_html().await.unwrap(),
            r#"<ul><li>A</li><li class="x">B &amp; C</li></ul>"#
        );
        assert_eq!(loader[0].query_all("li").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replaced_nodes_go_stale() {
        let dom = FakeDom::new(r#"<ul data-key="list"><li>A</li></ul>"#);
        let root = dom.root().await.unwrap();
        let old = root.query_all("li").await.unwrap().remove(0);

        dom.mutate(|d| d.set_children("list", "<li>B</li>"));

        let err = old.inner_html().await.unwrap_err();
        assert!(matches!(err, TradeitError::StaleElement(_)));
        let fresh = root.query_all("li").await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].inner_html().await.unwrap(), "B");
    }

    #[tokio::test]
    async fn test_attribute_edits_keep_the_handle() {
        let dom = FakeDom::new(r#"<ul><li data-key="opt" game="730" hidden>x</li></ul>"#);
        let option = dom.element("opt");
        assert!(!option.is_displayed().await.unwrap());

        dom.mutate(|d| {
            d.add_class("opt", "sactive-game");
            d.set_displayed("opt", true);
        });

        assert!(option.has_class("sactive-game").await.unwrap());
        assert!(option.is_displayed().await.unwrap());
        assert_eq!(option.attribute("game").await.unwrap().as_deref(), Some("730"));
        assert_eq!(option.text_content().await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_read_hook_runs_before_the_read() {
        let dom = FakeDom::new(r#"<ul data-key="list"><li data-key="a">A</li></ul>"#);
        dom.on_read("a", |d| d.set_children("list", "<li>B</li>"));
        let err = dom.element("a").text_content().await.unwrap_err();
        assert!(matches!(err, TradeitError::StaleElement(_)));
    }
}
