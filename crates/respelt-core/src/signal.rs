#![forbid(unsafe_code)]

//! Per-chain notification channel.
//!
//! Host callbacks (resize observers, image `load`/`error` handlers) never touch
//! a chain directly. They push a [`ChainSignal`] through the chain's
//! [`ChainNotifier`] and the chain drains its queue on the next
//! [`crate::chain::ResponsiveChain::pump`].

use core::fmt;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use serde::Serialize;

use crate::dom::{ObserverId, WatchId};

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Ids of chains on this thread that have not been dropped yet.
    static LIVE_CHAINS: RefCell<BTreeSet<u64>> = const { RefCell::new(BTreeSet::new()) };
}

/// Process-unique identity of a responsive chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Value written into the claim attribute.
    #[must_use]
    pub fn claim_value(self) -> String {
        self.0.to_string()
    }

    /// Parse a claim attribute value back into the id that wrote it.
    #[must_use]
    pub fn from_claim_value(value: &str) -> Option<Self> {
        value.parse().ok().map(Self)
    }

    /// Whether a chain with this id still exists on the current thread.
    ///
    /// Claims left behind by dropped chains are not enforced.
    #[must_use]
    pub fn is_live(self) -> bool {
        LIVE_CHAINS.with(|live| live.borrow().contains(&self.0))
    }

    pub(crate) fn mark_live(self) {
        LIVE_CHAINS.with(|live| live.borrow_mut().insert(self.0));
    }

    pub(crate) fn mark_dropped(self) {
        LIVE_CHAINS.with(|live| live.borrow_mut().remove(&self.0));
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages a chain reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSignal {
    /// The watched image fired `load` or `error`.
    ImageSettled { watch: WatchId },
    /// The observed element's box may have changed size.
    Resized { observer: ObserverId },
    /// Tear the chain down on the next pump.
    StopRequested,
}

/// Called after a signal was queued, so the host can schedule a pump.
pub type WakeHook = Rc<dyn Fn()>;

/// Sending half of a chain's notification channel.
#[derive(Clone)]
pub struct ChainNotifier {
    chain: ChainId,
    sender: mpsc::Sender<ChainSignal>,
    wake: Option<WakeHook>,
}

impl ChainNotifier {
    pub(crate) fn new(
        chain: ChainId,
        sender: mpsc::Sender<ChainSignal>,
        wake: Option<WakeHook>,
    ) -> Self {
        Self {
            chain,
            sender,
            wake,
        }
    }

    #[must_use]
    pub const fn chain(&self) -> ChainId {
        self.chain
    }

    /// Queue `signal` and run the wake hook.
    ///
    /// Returns `false` once the chain has been dropped; the host should then
    /// tear down whatever subscription produced the signal.
    pub fn notify(&self, signal: ChainSignal) -> bool {
        if self.sender.send(signal).is_err() {
            return false;
        }
        if let Some(wake) = &self.wake {
            wake();
        }
        true
    }
}

impl fmt::Debug for ChainNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainNotifier")
            .field("chain", &self.chain)
            .field("wake", &self.wake.is_some())
            .finish()
    }
}
