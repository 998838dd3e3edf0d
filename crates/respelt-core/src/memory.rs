#![forbid(unsafe_code)]

//! In-memory document host.
//!
//! `MemoryDom` is a small arena-backed tree implementing [`Dom`] without a
//! rendering engine. Boxes and font sizes are set explicitly; resizes and
//! image events are fired by the caller, which makes chain behaviour fully
//! deterministic in tests.

use std::collections::BTreeMap;

use crate::attrs::{Attribute, is_attribute_name};
use crate::dom::{Dom, DomError, NodeKind, ObserverId, WatchId};
use crate::geometry::BoxSize;
use crate::signal::{ChainNotifier, ChainSignal};

/// Computed `font-size` when no ancestor sets one.
pub const DEFAULT_FONT_SIZE: &str = "16px";

/// Handle to a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct MemNode {
    kind: NodeKind,
    tag: String,
    text: String,
    attrs: Vec<Attribute>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    size: BoxSize,
    font_size: Option<String>,
}

impl MemNode {
    fn new(kind: NodeKind, tag: &str) -> Self {
        Self {
            kind,
            tag: tag.to_owned(),
            text: String::new(),
            attrs: Vec::new(),
            parent: None,
            children: Vec::new(),
            size: BoxSize::default(),
            font_size: None,
        }
    }
}

#[derive(Debug)]
struct Subscription {
    node: NodeId,
    notifier: ChainNotifier,
}

/// Deterministic [`Dom`] host for tests.
#[derive(Debug)]
pub struct MemoryDom {
    nodes: Vec<MemNode>,
    root: NodeId,
    body: NodeId,
    observers: BTreeMap<ObserverId, Subscription>,
    watches: BTreeMap<WatchId, Subscription>,
    next_observer: u64,
    next_watch: u64,
    disconnected: Vec<ObserverId>,
    mutations: u64,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// A document with an empty `<body>`.
    #[must_use]
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: vec![MemNode::new(NodeKind::Other, "#document")],
            root: NodeId(0),
            body: NodeId(0),
            observers: BTreeMap::new(),
            watches: BTreeMap::new(),
            next_observer: 1,
            next_watch: 1,
            disconnected: Vec::new(),
            mutations: 0,
        };
        let body = dom.create_element("body");
        dom.append_child(dom.root, body);
        dom.body = body;
        dom.mutations = 0;
        dom
    }

    #[must_use]
    pub const fn document(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub const fn body(&self) -> NodeId {
        self.body
    }

    /// A detached element. `img` tags become [`NodeKind::Image`].
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let kind = if tag == "img" {
            NodeKind::Image
        } else {
            NodeKind::Element
        };
        self.push(MemNode::new(kind, &tag))
    }

    /// A detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let mut node = MemNode::new(NodeKind::Text, "#text");
        node.text = text.to_owned();
        self.push(node)
    }

    /// Append `child` to `parent`, moving it if it is attached elsewhere.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.mutations += 1;
    }

    /// Remove `node` from its parent. Detached nodes are left as they are.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes[node.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|&child| child != node);
        self.mutations += 1;
    }

    #[must_use]
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    #[must_use]
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    #[must_use]
    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    #[must_use]
    pub fn text(&self, node: NodeId) -> &str {
        &self.nodes[node.0].text
    }

    /// Attribute value, for assertions.
    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0]
            .attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Set the rendered box without notifying observers (initial layout).
    pub fn set_box(&mut self, node: NodeId, width: f64, height: f64) {
        self.nodes[node.0].size = BoxSize::new(width, height);
    }

    /// Set the `font-size` declared on `node`; descendants inherit it.
    pub fn set_font_size(&mut self, node: NodeId, value: &str) {
        self.nodes[node.0].font_size = Some(value.to_owned());
    }

    /// Change the rendered box and notify observers of `node` when it moved.
    ///
    /// Returns how many observers were notified.
    pub fn resize(&mut self, node: NodeId, width: f64, height: f64) -> usize {
        let next = BoxSize::new(width, height);
        if !self.nodes[node.0].size.differs_from(&next, 0.0) {
            return 0;
        }
        self.nodes[node.0].size = next;
        self.notify_observers(node)
    }

    /// Deliver a notification to every observer of `node` regardless of size,
    /// the way a host reports the initial observation.
    pub fn notify_observers(&mut self, node: NodeId) -> usize {
        let targets: Vec<(ObserverId, ChainNotifier)> = self
            .observers
            .iter()
            .filter(|(_, sub)| sub.node == node)
            .map(|(&id, sub)| (id, sub.notifier.clone()))
            .collect();
        let mut delivered = 0usize;
        for (id, notifier) in targets {
            if notifier.notify(ChainSignal::Resized { observer: id }) {
                delivered += 1;
            } else {
                self.disconnect(id);
            }
        }
        delivered
    }

    /// Fire `load` on an image. Returns how many watches were notified.
    pub fn fire_image_load(&mut self, img: NodeId) -> usize {
        self.settle_image(img)
    }

    /// Fire `error` on an image. Chains treat it exactly like `load`.
    pub fn fire_image_error(&mut self, img: NodeId) -> usize {
        self.settle_image(img)
    }

    /// Whether any observer currently watches `node`.
    #[must_use]
    pub fn is_observed(&self, node: NodeId) -> bool {
        self.observers.values().any(|sub| sub.node == node)
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn image_watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Observers disconnected so far, in order.
    #[must_use]
    pub fn disconnected(&self) -> &[ObserverId] {
        &self.disconnected
    }

    /// Tree and attribute mutations so far.
    #[must_use]
    pub const fn mutation_count(&self) -> u64 {
        self.mutations
    }

    fn push(&mut self, node: MemNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn settle_image(&mut self, img: NodeId) -> usize {
        let targets: Vec<(WatchId, ChainNotifier)> = self
            .watches
            .iter()
            .filter(|(_, sub)| sub.node == img)
            .map(|(&id, sub)| (id, sub.notifier.clone()))
            .collect();
        let mut delivered = 0usize;
        for (id, notifier) in targets {
            if notifier.notify(ChainSignal::ImageSettled { watch: id }) {
                delivered += 1;
            } else {
                self.watches.remove(&id);
            }
        }
        delivered
    }

    fn element(&self, node: &NodeId) -> Result<&MemNode, DomError> {
        let mem = self
            .nodes
            .get(node.0)
            .ok_or_else(|| DomError::Query(format!("unknown node {}", node.0)))?;
        if mem.kind.is_element() {
            Ok(mem)
        } else {
            Err(DomError::NotAnElement)
        }
    }

    fn element_mut(&mut self, node: &NodeId) -> Result<&mut MemNode, DomError> {
        self.element(node)?;
        Ok(&mut self.nodes[node.0])
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn node_kind(&self, node: &NodeId) -> NodeKind {
        self.nodes.get(node.0).map_or(NodeKind::Other, |mem| mem.kind)
    }

    fn is_in_document(&self, node: &NodeId) -> bool {
        let mut cursor = Some(*node);
        while let Some(id) = cursor {
            if id == self.root {
                return true;
            }
            cursor = self.nodes.get(id.0).and_then(|mem| mem.parent);
        }
        false
    }

    fn bounding_box(&self, elt: &NodeId) -> Result<BoxSize, DomError> {
        Ok(self.element(elt)?.size)
    }

    fn computed_font_size(&self, elt: &NodeId) -> Result<String, DomError> {
        self.element(elt)?;
        let mut cursor = Some(*elt);
        while let Some(id) = cursor {
            let mem = &self.nodes[id.0];
            if let Some(value) = &mem.font_size {
                return Ok(value.clone());
            }
            cursor = mem.parent;
        }
        Ok(DEFAULT_FONT_SIZE.to_owned())
    }

    fn attributes(&self, elt: &NodeId) -> Result<Vec<Attribute>, DomError> {
        Ok(self.element(elt)?.attrs.clone())
    }

    fn get_attribute(&self, elt: &NodeId, name: &str) -> Result<Option<String>, DomError> {
        Ok(self
            .element(elt)?
            .attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.clone()))
    }

    fn set_attribute(&mut self, elt: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mem = self.element_mut(elt)?;
        if !is_attribute_name(name) {
            return Err(DomError::Query(format!(
                "InvalidCharacterError: '{name}' is not a valid attribute name"
            )));
        }
        match mem.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.value = value.to_owned(),
            None => mem.attrs.push(Attribute::new(name, value)),
        }
        self.mutations += 1;
        Ok(())
    }

    fn remove_attribute(&mut self, elt: &NodeId, name: &str) -> Result<(), DomError> {
        let mem = self.element_mut(elt)?;
        let before = mem.attrs.len();
        mem.attrs.retain(|attr| attr.name != name);
        if mem.attrs.len() != before {
            self.mutations += 1;
        }
        Ok(())
    }

    fn replace_with(&mut self, old: &NodeId, new: &NodeId) -> Result<(), DomError> {
        if old == new {
            return Ok(());
        }
        let parent = self.nodes[old.0].parent.ok_or(DomError::Detached)?;
        self.detach(*new);
        let Some(index) = self.nodes[parent.0]
            .children
            .iter()
            .position(|child| child == old)
        else {
            return Err(DomError::Detached);
        };
        self.nodes[parent.0].children[index] = *new;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
        self.mutations += 1;
        Ok(())
    }

    fn observe_resize(
        &mut self,
        elt: &NodeId,
        notifier: ChainNotifier,
    ) -> Result<ObserverId, DomError> {
        self.element(elt)?;
        let id = ObserverId::new(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(
            id,
            Subscription {
                node: *elt,
                notifier,
            },
        );
        Ok(id)
    }

    fn disconnect(&mut self, observer: ObserverId) {
        if self.observers.remove(&observer).is_some() {
            self.disconnected.push(observer);
        }
    }

    fn watch_image_load(
        &mut self,
        img: &NodeId,
        notifier: ChainNotifier,
    ) -> Result<WatchId, DomError> {
        if self.node_kind(img) != NodeKind::Image {
            return Err(DomError::NotAnElement);
        }
        let id = WatchId::new(self.next_watch);
        self.next_watch += 1;
        self.watches.insert(
            id,
            Subscription {
                node: *img,
                notifier,
            },
        );
        Ok(id)
    }

    fn release_image_watch(&mut self, watch: WatchId) {
        self.watches.remove(&watch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_attached_body() {
        let dom = MemoryDom::new();
        assert!(dom.is_in_document(&dom.body()));
        assert_eq!(dom.parent(dom.body()), Some(dom.document()));
        assert_eq!(dom.mutation_count(), 0);
    }

    #[test]
    fn replace_with_keeps_position() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let a = dom.create_element("p");
        let b = dom.create_element("div");
        let c = dom.create_element("p");
        dom.append_child(body, a);
        dom.append_child(body, b);
        dom.append_child(body, c);

        let span = dom.create_element("span");
        dom.replace_with(&b, &span).expect("b is attached");

        assert_eq!(dom.children(body), &[a, span, c]);
        assert!(!dom.is_in_document(&b));
        assert!(dom.is_in_document(&span));
    }

    #[test]
    fn replace_with_detached_node_fails() {
        let mut dom = MemoryDom::new();
        let lonely = dom.create_element("div");
        let other = dom.create_element("div");
        assert_eq!(dom.replace_with(&lonely, &other), Err(DomError::Detached));
    }

    #[test]
    fn font_size_is_inherited() {
        let mut dom = MemoryDom::new();
        let body = dom.body();
        let child = dom.create_element("span");
        dom.append_child(body, child);
        assert_eq!(dom.computed_font_size(&child).as_deref(), Ok("16px"));
        dom.set_font_size(body, "20px");
        assert_eq!(dom.computed_font_size(&child).as_deref(), Ok("20px"));
    }

    #[test]
    fn text_nodes_reject_element_queries() {
        let mut dom = MemoryDom::new();
        let text = dom.create_text("hello");
        assert_eq!(dom.text(text), "hello");
        assert_eq!(dom.bounding_box(&text), Err(DomError::NotAnElement));
        assert_eq!(
            dom.set_attribute(&text, "id", "x"),
            Err(DomError::NotAnElement)
        );
    }

    #[test]
    fn invalid_attribute_names_are_refused() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div");
        let before = dom.mutation_count();
        assert!(matches!(
            dom.set_attribute(&div, "data respelt", "1"),
            Err(DomError::Query(msg)) if msg.starts_with("InvalidCharacterError")
        ));
        assert_eq!(dom.attr(div, "data respelt"), None);
        assert_eq!(dom.mutation_count(), before);
    }

    #[test]
    fn resize_without_change_does_not_notify() {
        let mut dom = MemoryDom::new();
        let div = dom.create_element("div");
        dom.set_box(div, 10.0, 10.0);
        assert_eq!(dom.resize(div, 10.0, 10.0), 0);
    }
}
