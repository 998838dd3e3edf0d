#![forbid(unsafe_code)]

//! [`Dom`] over the live browser document.
//!
//! Only compiled on `wasm32` targets.

use std::collections::HashMap;

use js_sys::Array;
use respelt_core::{
    Attribute, BoxSize, ChainNotifier, ChainSignal, Dom, DomError, NodeKind, ObserverId, WatchId,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlImageElement, Node, ResizeObserver, Window};

/// Best-effort message of a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}

fn query_error(value: JsValue) -> DomError {
    DomError::Query(js_message(&value))
}

struct ActiveObserver {
    observer: ResizeObserver,
    // Must outlive the observer's registration.
    _callback: Closure<dyn FnMut(Array, ResizeObserver)>,
}

struct ActiveWatch {
    img: HtmlImageElement,
    _callback: Closure<dyn FnMut()>,
}

/// Browser document host.
///
/// Owns the JS closures behind every subscription it hands out; dropping the
/// host disconnects its observers and clears its image handlers.
pub struct WebDom {
    window: Window,
    document: Document,
    debug: bool,
    next_observer: u64,
    observers: HashMap<ObserverId, ActiveObserver>,
    next_watch: u64,
    watches: HashMap<WatchId, ActiveWatch>,
}

impl WebDom {
    /// Host for the global `window.document`.
    ///
    /// With `debug` set, every substitution is logged through
    /// `console.debug("Replacing element", old, new)`.
    pub fn new(debug: bool) -> Result<Self, DomError> {
        let window = web_sys::window().ok_or(DomError::Unsupported("window"))?;
        let document = window
            .document()
            .ok_or(DomError::Unsupported("window.document"))?;
        Ok(Self {
            window,
            document,
            debug,
            next_observer: 1,
            observers: HashMap::new(),
            next_watch: 1,
            watches: HashMap::new(),
        })
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Number of live resize observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn element<'a>(&self, node: &'a Node) -> Result<&'a Element, DomError> {
        node.dyn_ref::<Element>().ok_or(DomError::NotAnElement)
    }
}

impl Drop for WebDom {
    fn drop(&mut self) {
        for (_, active) in self.observers.drain() {
            active.observer.disconnect();
        }
        for (_, active) in self.watches.drain() {
            active.img.set_onload(None);
            active.img.set_onerror(None);
        }
    }
}

impl Dom for WebDom {
    type Node = Node;

    fn node_kind(&self, node: &Node) -> NodeKind {
        if node.dyn_ref::<HtmlImageElement>().is_some() {
            NodeKind::Image
        } else if node.dyn_ref::<Element>().is_some() {
            NodeKind::Element
        } else if node.node_type() == Node::TEXT_NODE {
            NodeKind::Text
        } else {
            NodeKind::Other
        }
    }

    fn is_in_document(&self, node: &Node) -> bool {
        self.document.contains(Some(node))
    }

    fn bounding_box(&self, elt: &Node) -> Result<BoxSize, DomError> {
        let rect = self.element(elt)?.get_bounding_client_rect();
        Ok(BoxSize::new(rect.width(), rect.height()))
    }

    fn computed_font_size(&self, elt: &Node) -> Result<String, DomError> {
        let style = self
            .window
            .get_computed_style(self.element(elt)?)
            .map_err(query_error)?
            .ok_or(DomError::Unsupported("getComputedStyle"))?;
        style.get_property_value("font-size").map_err(query_error)
    }

    fn attributes(&self, elt: &Node) -> Result<Vec<Attribute>, DomError> {
        let map = self.element(elt)?.attributes();
        Ok((0..map.length())
            .filter_map(|idx| map.item(idx))
            .map(|attr| Attribute::new(attr.name(), attr.value()))
            .collect())
    }

    fn get_attribute(&self, elt: &Node, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.element(elt)?.get_attribute(name))
    }

    fn set_attribute(&mut self, elt: &Node, name: &str, value: &str) -> Result<(), DomError> {
        self.element(elt)?
            .set_attribute(name, value)
            .map_err(query_error)
    }

    fn remove_attribute(&mut self, elt: &Node, name: &str) -> Result<(), DomError> {
        self.element(elt)?
            .remove_attribute(name)
            .map_err(query_error)
    }

    fn replace_with(&mut self, old: &Node, new: &Node) -> Result<(), DomError> {
        let old_elt = self.element(old)?;
        if old.parent_node().is_none() {
            return Err(DomError::Detached);
        }
        if self.debug {
            web_sys::console::debug_3(&JsValue::from_str("Replacing element"), old, new);
        }
        old_elt.replace_with_with_node_1(new).map_err(query_error)
    }

    fn observe_resize(
        &mut self,
        elt: &Node,
        notifier: ChainNotifier,
    ) -> Result<ObserverId, DomError> {
        let target = self.element(elt)?;
        let id = ObserverId::new(self.next_observer);
        self.next_observer += 1;

        let callback = Closure::<dyn FnMut(Array, ResizeObserver)>::new(
            move |_entries: Array, observer: ResizeObserver| {
                if !notifier.notify(ChainSignal::Resized { observer: id }) {
                    observer.disconnect();
                }
            },
        );
        let observer =
            ResizeObserver::new(callback.as_ref().unchecked_ref()).map_err(query_error)?;
        observer.observe(target);
        self.observers.insert(
            id,
            ActiveObserver {
                observer,
                _callback: callback,
            },
        );
        Ok(id)
    }

    fn disconnect(&mut self, observer: ObserverId) {
        if let Some(active) = self.observers.remove(&observer) {
            active.observer.disconnect();
        }
    }

    fn watch_image_load(
        &mut self,
        img: &Node,
        notifier: ChainNotifier,
    ) -> Result<WatchId, DomError> {
        let img = img
            .dyn_ref::<HtmlImageElement>()
            .ok_or(DomError::NotAnElement)?
            .clone();
        let id = WatchId::new(self.next_watch);
        self.next_watch += 1;

        let signal_notifier = notifier.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            let _ = signal_notifier.notify(ChainSignal::ImageSettled { watch: id });
        });
        img.set_onload(Some(callback.as_ref().unchecked_ref()));
        img.set_onerror(Some(callback.as_ref().unchecked_ref()));
        // An image without a pending fetch (no `src`, or already decoded)
        // never fires either event.
        if img.complete() {
            let _ = notifier.notify(ChainSignal::ImageSettled { watch: id });
        }
        self.watches.insert(
            id,
            ActiveWatch {
                img,
                _callback: callback,
            },
        );
        Ok(id)
    }

    fn release_image_watch(&mut self, watch: WatchId) {
        if let Some(active) = self.watches.remove(&watch) {
            active.img.set_onload(None);
            active.img.set_onerror(None);
        }
    }
}
