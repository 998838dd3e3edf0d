#![forbid(unsafe_code)]

//! Host document abstraction.
//!
//! Everything this crate does to a document goes through [`Dom`]: geometry
//! queries, attribute reads and writes, in-place substitution, and the two
//! asynchronous subscriptions (size changes and image load). The browser host
//! lives in `respelt-web`; [`crate::memory::MemoryDom`] is an in-memory host
//! for deterministic tests.
//!
//! Subscriptions are push-based. The host keeps the [`ChainNotifier`] it was
//! handed and calls [`ChainNotifier::notify`] from its own callback; the chain
//! consumes the signal later in [`crate::chain::ResponsiveChain::pump`].

use core::fmt;

use serde::Serialize;

use crate::attrs::Attribute;
use crate::geometry::BoxSize;
use crate::signal::ChainNotifier;

/// Coarse classification of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Any element that is not an image.
    Element,
    /// An `<img>` element. Its box is only meaningful after load/error.
    Image,
    Text,
    /// Documents, comments, fragments, and anything else.
    Other,
}

impl NodeKind {
    /// Whether this node is an element (images included).
    #[must_use]
    pub const fn is_element(self) -> bool {
        matches!(self, Self::Element | Self::Image)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Image => "image",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}

/// Handle for one size-change subscription, issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ObserverId(u64);

impl ObserverId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Handle for one image load/error subscription, issued by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WatchId(u64);

impl WatchId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Failures reported by a [`Dom`] host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The node has no parent to be replaced within.
    Detached,
    /// The operation needs an element and got some other node.
    NotAnElement,
    /// The host query itself failed (a thrown platform error, for example).
    Query(String),
    /// The host cannot provide this capability.
    Unsupported(&'static str),
}

impl fmt::Display for DomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "node is not attached to a parent"),
            Self::NotAnElement => write!(f, "node is not an element"),
            Self::Query(msg) => write!(f, "host query failed: {msg}"),
            Self::Unsupported(what) => write!(f, "host does not support {what}"),
        }
    }
}

impl std::error::Error for DomError {}

/// The document operations the geometry readers, the attribute cloner, and
/// responsive chains are written against.
///
/// Read operations take `&self`; anything that mutates the tree or installs a
/// subscription takes `&mut self`.
pub trait Dom {
    /// Opaque node handle. Cloning a handle never clones the node.
    type Node: Clone + PartialEq + fmt::Debug;

    fn node_kind(&self, node: &Self::Node) -> NodeKind;

    /// Whether `node` is currently contained in the document.
    fn is_in_document(&self, node: &Self::Node) -> bool;

    /// Rendered box of `elt` in CSS pixels.
    fn bounding_box(&self, elt: &Self::Node) -> Result<BoxSize, DomError>;

    /// Raw computed `font-size` value, e.g. `"16px"`.
    fn computed_font_size(&self, elt: &Self::Node) -> Result<String, DomError>;

    /// All attributes of `elt` in stored order.
    fn attributes(&self, elt: &Self::Node) -> Result<Vec<Attribute>, DomError>;

    fn get_attribute(&self, elt: &Self::Node, name: &str) -> Result<Option<String>, DomError>;

    fn set_attribute(&mut self, elt: &Self::Node, name: &str, value: &str)
    -> Result<(), DomError>;

    fn remove_attribute(&mut self, elt: &Self::Node, name: &str) -> Result<(), DomError>;

    /// Put `new` at the exact position of `old` and detach `old`.
    fn replace_with(&mut self, old: &Self::Node, new: &Self::Node) -> Result<(), DomError>;

    /// Start delivering [`crate::signal::ChainSignal::Resized`] for `elt`
    /// through `notifier` until [`Dom::disconnect`] is called.
    fn observe_resize(
        &mut self,
        elt: &Self::Node,
        notifier: ChainNotifier,
    ) -> Result<ObserverId, DomError>;

    /// Stop a size-change subscription. Unknown ids are ignored.
    fn disconnect(&mut self, observer: ObserverId);

    /// Deliver [`crate::signal::ChainSignal::ImageSettled`] once `img` fires
    /// `load` or `error`.
    fn watch_image_load(
        &mut self,
        img: &Self::Node,
        notifier: ChainNotifier,
    ) -> Result<WatchId, DomError>;

    /// Drop an image subscription. Unknown ids are ignored.
    fn release_image_watch(&mut self, watch: WatchId);
}
