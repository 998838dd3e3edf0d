#![forbid(unsafe_code)]

//! Core: element geometry, attribute cloning, and responsive element chains.
//!
//! # Role in respelt
//! `respelt-core` holds every piece of logic and no platform types. It talks
//! to a document only through the [`Dom`] trait, so the same code runs in the
//! browser (`respelt-web` implements [`Dom`] over `web-sys`) and in native
//! tests (against [`memory::MemoryDom`], behind the `test-helpers` feature).
//!
//! # Primary responsibilities
//! - **Geometry**: [`geometry::width`], [`geometry::height`],
//!   [`geometry::font_size`], [`geometry::em_width`], [`geometry::em_height`].
//! - **Attributes**: [`attrs::clone_attrs`].
//! - **Responsive elements**: [`responsive_elt`] builds an adapter whose
//!   [`ResponsiveElt::replace`] starts a [`ResponsiveChain`]: an explicit
//!   state machine that swaps in a new element every time the current one
//!   changes size.
//!
//! # Driving a chain
//! ```ignore
//! let adapter = respelt_core::responsive_elt(|dom: &mut MyDom, old: &MyNode| {
//!     let new = dom.create("span");
//!     respelt_core::attrs::clone_attrs(dom, old, &new).ok();
//!     new
//! });
//! let mut chain = adapter.replace(&mut dom, &target)?;
//! // Host callbacks queue signals; the host pumps the chain afterwards.
//! chain.pump(&mut dom)?;
//! ```

pub mod adapter;
pub mod attrs;
pub mod chain;
pub mod config;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod signal;

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

pub use adapter::{CreateElement, ResponsiveElt, responsive_elt, responsive_elt_with_config};
pub use attrs::{Attribute, clone_attrs};
pub use chain::{ChainEventKind, ChainSnapshot, ChainState, ChainTransition, ResponsiveChain};
pub use config::ChainConfig;
pub use dom::{Dom, DomError, NodeKind, ObserverId, WatchId};
pub use error::ResponsiveError;
pub use geometry::{BoxSize, em_height, em_size, em_width, font_size, height, width};
pub use signal::{ChainId, ChainNotifier, ChainSignal, WakeHook};
