#![forbid(unsafe_code)]

//! Browser binding for respelt.
//!
//! [`WebDom`] implements [`respelt_core::Dom`] over `web-sys`, and the
//! `wasm-bindgen` exports give JavaScript the measuring helpers
//! (`width`, `height`, `fontSize`, `emWidth`, `emHeight`), `cloneAttrs`, and
//! `responsiveElt(createElt, options?)`.
//!
//! Chains are host-driven: resize observers and image handlers only queue a
//! signal, and the chain is pumped from a microtask afterwards.

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use dom::WebDom;
#[cfg(target_arch = "wasm32")]
pub use wasm::{
    ResponsiveChainHandle, clone_attrs, em_height, em_width, font_size, height, responsive_elt,
    width,
};

// Option parsing and promise settlement are used by the wasm module and by
// native tests.
#[cfg(any(target_arch = "wasm32", test))]
mod options;
#[cfg(any(target_arch = "wasm32", test))]
mod settle;
