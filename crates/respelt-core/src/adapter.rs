#![forbid(unsafe_code)]

//! Responsive element factory.
//!
//! [`responsive_elt`] wraps an element-creating function into a
//! [`ResponsiveElt`]. Calling [`ResponsiveElt::replace`] on an attached
//! element substitutes the first generation and hands back the
//! [`ResponsiveChain`] that keeps replacing it on resize.

use std::rc::Rc;

use crate::chain::ResponsiveChain;
use crate::config::ChainConfig;
use crate::dom::Dom;
use crate::error::ResponsiveError;

/// Builds the replacement for an element.
///
/// Closures `Fn(&mut D, &D::Node) -> D::Node` implement this directly. Hosts
/// whose factories can fail (a JS callback that throws, say) implement it on
/// their own type and report [`ResponsiveError::Factory`].
pub trait CreateElement<D: Dom> {
    fn create(&self, dom: &mut D, old: &D::Node) -> Result<D::Node, ResponsiveError>;
}

impl<D, F> CreateElement<D> for F
where
    D: Dom,
    F: Fn(&mut D, &D::Node) -> D::Node,
{
    fn create(&self, dom: &mut D, old: &D::Node) -> Result<D::Node, ResponsiveError> {
        Ok(self(dom, old))
    }
}

/// Adapter returned by [`responsive_elt`].
pub struct ResponsiveElt<F> {
    factory: Rc<F>,
    config: ChainConfig,
}

impl<F> Clone for ResponsiveElt<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Rc::clone(&self.factory),
            config: self.config.clone(),
        }
    }
}

/// Wrap `create_elt` into an adapter with the default [`ChainConfig`].
#[must_use]
pub fn responsive_elt<F>(create_elt: F) -> ResponsiveElt<F> {
    ResponsiveElt {
        factory: Rc::new(create_elt),
        config: ChainConfig::default(),
    }
}

/// Wrap `create_elt` into an adapter with an explicit config.
pub fn responsive_elt_with_config<F>(
    create_elt: F,
    config: ChainConfig,
) -> Result<ResponsiveElt<F>, ResponsiveError> {
    config.validate()?;
    Ok(ResponsiveElt {
        factory: Rc::new(create_elt),
        config,
    })
}

impl<F> ResponsiveElt<F> {
    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// An idle chain sharing this adapter's factory and config.
    ///
    /// Hosts that need a wake hook install it on the idle chain and then call
    /// [`ResponsiveChain::start`] themselves.
    #[must_use]
    pub fn chain<D>(&self) -> ResponsiveChain<D, F>
    where
        D: Dom,
        F: CreateElement<D>,
    {
        ResponsiveChain::new(self.config.clone(), Rc::clone(&self.factory))
    }

    /// Replace `target` and return the chain that keeps it responsive.
    ///
    /// Validation failures (not an element, not in the document, factory
    /// result not an element, target claimed by another chain) are returned
    /// before the document is touched.
    ///
    /// Dropping the returned chain ends it: its subscriptions go quiet and its
    /// claim on the current element is no longer enforced.
    #[must_use = "dropping the chain stops the element from being replaced"]
    pub fn replace<D>(
        &self,
        dom: &mut D,
        target: &D::Node,
    ) -> Result<ResponsiveChain<D, F>, ResponsiveError>
    where
        D: Dom,
        F: CreateElement<D>,
    {
        let mut chain = self.chain();
        chain.start(dom, target)?;
        Ok(chain)
    }
}
