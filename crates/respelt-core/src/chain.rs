#![forbid(unsafe_code)]

//! Responsive chain state machine.
//!
//! A chain owns one element at a time. Each generation substitutes a freshly
//! created element for the current one, waits for image load when needed,
//! records a baseline box, and arms a one-shot size-change observer. The
//! first notification whose box differs from the baseline disconnects that
//! observer and runs the next generation on the element it was watching.
//!
//! ```text
//!   Idle ──start──▶ (substitute) ──img──▶ AwaitingImageLoad ──settled──┐
//!                        │                                             ▼
//!                        └───────────────────────────────────────▶ Observing
//!   Observing ──resized (box != baseline)──▶ (substitute) ──▶ …
//!   any live state ──stop──▶ Stopped
//!   any live state ──current element left the document──▶ Orphaned
//!   any live state ──error──▶ Failed
//! ```
//!
//! The chain never holds the host. Every operation that touches the document
//! borrows it, and host callbacks reach the chain only through the
//! [`ChainNotifier`] channel drained by [`ResponsiveChain::pump`].

use core::fmt;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::mpsc;

use serde::Serialize;
use serde_json::json;

use crate::adapter::CreateElement;
use crate::config::ChainConfig;
use crate::dom::{Dom, NodeKind, ObserverId, WatchId};
use crate::error::ResponsiveError;
use crate::geometry::{BoxSize, box_size};
use crate::signal::{ChainId, ChainNotifier, ChainSignal, WakeHook};

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

const JSONL_SCHEMA_VERSION: &str = "respelt-jsonl-v1";

/// Lifecycle states of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// Created, not started.
    Idle,
    /// Current element is an image that has not fired `load`/`error` yet.
    AwaitingImageLoad,
    /// A size-change observer is armed on the current element.
    Observing,
    /// Torn down on request or by the generation limit.
    Stopped,
    /// Torn down because the current element left the document.
    Orphaned,
    /// Torn down by an error; see [`ResponsiveChain::last_error`].
    Failed,
}

impl ChainState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingImageLoad => "awaiting_image_load",
            Self::Observing => "observing",
            Self::Stopped => "stopped",
            Self::Orphaned => "orphaned",
            Self::Failed => "failed",
        }
    }

    /// Terminal states ignore every further signal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Orphaned | Self::Failed)
    }
}

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainEventKind {
    StartRequested,
    ImageSettled,
    Resized,
    StopRequested,
}

impl ChainEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartRequested => "start_requested",
            Self::ImageSettled => "image_settled",
            Self::Resized => "resized",
            Self::StopRequested => "stop_requested",
        }
    }
}

/// Transition record and deterministic log payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainTransition {
    pub seq: u64,
    pub chain: ChainId,
    pub event: ChainEventKind,
    pub from_state: ChainState,
    pub to_state: ChainState,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BoxSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<BoxSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observer: Option<ObserverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainTransition {
    /// Serialize one JSONL line for diagnostics.
    #[must_use]
    pub fn to_jsonl_line(&self, run_id: &str) -> String {
        let record = ChainTransitionJsonl {
            schema_version: JSONL_SCHEMA_VERSION,
            event: "responsive_chain_transition",
            run_id,
            chain_id: self.chain.get(),
            transition_seq: self.seq,
            chain_event: self.event.as_str(),
            from_state: self.from_state.as_str(),
            to_state: self.to_state.as_str(),
            generation: self.generation,
            baseline: self.baseline,
            observed: self.observed,
            observer: self.observer,
            reason: self.reason.as_deref(),
            error: self.error.as_deref(),
        };
        match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(error) => serde_json::to_string(&json!({
                "schema_version": JSONL_SCHEMA_VERSION,
                "event": "responsive_chain_transition_encode_error",
                "run_id": run_id,
                "chain_id": self.chain.get(),
                "transition_seq": self.seq,
                "error": error.to_string(),
            }))
            .unwrap_or_else(|_| {
                "{\"schema_version\":\"respelt-jsonl-v1\",\"event\":\"responsive_chain_transition_encode_error\"}".to_owned()
            }),
        }
    }
}

#[derive(Serialize)]
struct ChainTransitionJsonl<'a> {
    schema_version: &'static str,
    event: &'static str,
    run_id: &'a str,
    chain_id: u64,
    transition_seq: u64,
    chain_event: &'static str,
    from_state: &'static str,
    to_state: &'static str,
    generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    baseline: Option<BoxSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed: Option<BoxSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observer: Option<ObserverId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

/// Snapshot returned to host callers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSnapshot {
    pub id: ChainId,
    pub state: ChainState,
    pub generation: u64,
    pub baseline: Option<BoxSize>,
    pub observer: Option<ObserverId>,
    pub image_watch: Option<WatchId>,
    pub last_error: Option<ResponsiveError>,
}

/// One replace-on-resize chain over a host `D`, creating elements with `F`.
pub struct ResponsiveChain<D: Dom, F> {
    id: ChainId,
    config: ChainConfig,
    factory: Rc<F>,
    state: ChainState,
    current: Option<D::Node>,
    observer: Option<ObserverId>,
    image_watch: Option<WatchId>,
    baseline: Option<BoxSize>,
    generation: u64,
    last_error: Option<ResponsiveError>,
    sender: mpsc::Sender<ChainSignal>,
    receiver: mpsc::Receiver<ChainSignal>,
    wake: Option<WakeHook>,
    transition_seq: u64,
    transitions: VecDeque<ChainTransition>,
}

impl<D: Dom, F> fmt::Debug for ResponsiveChain<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsiveChain")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("current", &self.current)
            .field("observer", &self.observer)
            .field("image_watch", &self.image_watch)
            .finish_non_exhaustive()
    }
}

impl<D: Dom, F> Drop for ResponsiveChain<D, F> {
    fn drop(&mut self) {
        self.id.mark_dropped();
    }
}

impl<D: Dom, F: CreateElement<D>> ResponsiveChain<D, F> {
    pub(crate) fn new(config: ChainConfig, factory: Rc<F>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let id = ChainId::next();
        id.mark_live();
        Self {
            id,
            config,
            factory,
            state: ChainState::Idle,
            current: None,
            observer: None,
            image_watch: None,
            baseline: None,
            generation: 0,
            last_error: None,
            sender,
            receiver,
            wake: None,
            transition_seq: 0,
            transitions: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ChainId {
        self.id
    }

    #[must_use]
    pub const fn state(&self) -> ChainState {
        self.state
    }

    /// Element the chain currently owns (the latest substitute).
    #[must_use]
    pub fn current(&self) -> Option<&D::Node> {
        self.current.as_ref()
    }

    /// Number of substitutions performed so far.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&ResponsiveError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            id: self.id,
            state: self.state,
            generation: self.generation,
            baseline: self.baseline,
            observer: self.observer,
            image_watch: self.image_watch,
            last_error: self.last_error.clone(),
        }
    }

    /// A sender for this chain's channel. Hosts may also use it to request a
    /// stop from outside.
    #[must_use]
    pub fn notifier(&self) -> ChainNotifier {
        ChainNotifier::new(self.id, self.sender.clone(), self.wake.clone())
    }

    /// Install the hook run after every queued signal.
    ///
    /// Only notifiers handed out after this call carry the hook, so install it
    /// before [`ResponsiveChain::start`].
    pub fn set_wake_hook(&mut self, hook: WakeHook) {
        self.wake = Some(hook);
    }

    /// Run the first generation on `target`.
    pub fn start(
        &mut self,
        dom: &mut D,
        target: &D::Node,
    ) -> Result<ChainTransition, ResponsiveError> {
        let from_state = self.state;
        if from_state != ChainState::Idle {
            return Err(ResponsiveError::AlreadyStarted);
        }
        match self.replace_generation(dom, target) {
            Ok(()) => Ok(self.record_transition(
                ChainEventKind::StartRequested,
                from_state,
                None,
                None,
                None,
            )),
            Err(err) => Err(self.fail(dom, ChainEventKind::StartRequested, from_state, err)),
        }
    }

    /// Drain and handle every queued signal.
    ///
    /// Returns the number of signals handled, or the error that moved the
    /// chain to [`ChainState::Failed`]. Signals still queued behind a failure
    /// are handled (and ignored) by the next pump.
    pub fn pump(&mut self, dom: &mut D) -> Result<usize, ResponsiveError> {
        let mut handled = 0usize;
        while let Ok(signal) = self.receiver.try_recv() {
            self.handle_signal(dom, signal)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Handle one signal immediately, bypassing the queue.
    pub fn handle_signal(
        &mut self,
        dom: &mut D,
        signal: ChainSignal,
    ) -> Result<ChainTransition, ResponsiveError> {
        match signal {
            ChainSignal::ImageSettled { watch } => self.on_image_settled(dom, watch),
            ChainSignal::Resized { observer } => self.on_resized(dom, observer),
            ChainSignal::StopRequested => Ok(self.stop(dom)),
        }
    }

    /// Tear the chain down: disconnect its observer, drop its image watch,
    /// and release its claim. Ignored once the chain is terminal.
    pub fn stop(&mut self, dom: &mut D) -> ChainTransition {
        let from_state = self.state;
        if from_state.is_terminal() {
            return self.record_transition(
                ChainEventKind::StopRequested,
                from_state,
                Some("ignored_in_terminal_state"),
                None,
                None,
            );
        }
        self.teardown(dom);
        self.state = ChainState::Stopped;
        self.record_transition(
            ChainEventKind::StopRequested,
            from_state,
            Some("stopped"),
            None,
            None,
        )
    }

    #[must_use]
    pub fn drain_transitions(&mut self) -> Vec<ChainTransition> {
        self.transitions.drain(..).collect()
    }

    #[must_use]
    pub fn drain_transition_jsonl(&mut self, run_id: &str) -> Vec<String> {
        self.drain_transitions()
            .into_iter()
            .map(|transition| transition.to_jsonl_line(run_id))
            .collect()
    }

    fn on_image_settled(
        &mut self,
        dom: &mut D,
        watch: WatchId,
    ) -> Result<ChainTransition, ResponsiveError> {
        let from_state = self.state;
        if from_state != ChainState::AwaitingImageLoad || self.image_watch != Some(watch) {
            return Ok(self.record_ignored(
                ChainEventKind::ImageSettled,
                from_state,
                "stale_image_watch",
            ));
        }
        dom.release_image_watch(watch);
        self.image_watch = None;

        let Some(current) = self.current.clone() else {
            return Ok(self.record_ignored(
                ChainEventKind::ImageSettled,
                from_state,
                "no_current_element",
            ));
        };
        if !dom.is_in_document(&current) {
            return Ok(self.orphan(dom, ChainEventKind::ImageSettled, from_state));
        }
        match self.arm(dom, &current) {
            Ok(()) => Ok(self.record_transition(
                ChainEventKind::ImageSettled,
                from_state,
                None,
                None,
                None,
            )),
            Err(err) => Err(self.fail(dom, ChainEventKind::ImageSettled, from_state, err)),
        }
    }

    fn on_resized(
        &mut self,
        dom: &mut D,
        observer: ObserverId,
    ) -> Result<ChainTransition, ResponsiveError> {
        let from_state = self.state;
        if from_state != ChainState::Observing || self.observer != Some(observer) {
            return Ok(self.record_ignored(
                ChainEventKind::Resized,
                from_state,
                "stale_observer",
            ));
        }
        let Some(current) = self.current.clone() else {
            return Ok(self.record_ignored(
                ChainEventKind::Resized,
                from_state,
                "no_current_element",
            ));
        };
        if !dom.is_in_document(&current) {
            return Ok(self.orphan(dom, ChainEventKind::Resized, from_state));
        }

        let observed = match box_size(dom, &current) {
            Ok(size) => size,
            Err(err) => {
                return Err(self.fail(dom, ChainEventKind::Resized, from_state, err.into()));
            }
        };
        let baseline = self.baseline.unwrap_or_default();
        if !baseline.differs_from(&observed, self.config.size_epsilon) {
            return Ok(self.record_transition(
                ChainEventKind::Resized,
                from_state,
                Some("size_unchanged"),
                Some(observed),
                None,
            ));
        }

        // One-shot: this generation's observer is done before the next exists.
        dom.disconnect(observer);
        self.observer = None;

        if let Some(limit) = self.config.max_generations {
            if self.generation >= limit {
                self.teardown(dom);
                self.state = ChainState::Stopped;
                return Ok(self.record_transition(
                    ChainEventKind::Resized,
                    from_state,
                    Some("generation_limit"),
                    Some(observed),
                    None,
                ));
            }
        }

        match self.replace_generation(dom, &current) {
            Ok(()) => Ok(self.record_transition(
                ChainEventKind::Resized,
                from_state,
                Some("retriggered"),
                Some(observed),
                None,
            )),
            Err(err) => Err(self.fail(dom, ChainEventKind::Resized, from_state, err)),
        }
    }

    /// Validate `target`, substitute a new element for it, then either wait
    /// for the image or arm the observer.
    fn replace_generation(
        &mut self,
        dom: &mut D,
        target: &D::Node,
    ) -> Result<(), ResponsiveError> {
        if !dom.node_kind(target).is_element() {
            return Err(ResponsiveError::NotAnElement);
        }
        if !dom.is_in_document(target) {
            return Err(ResponsiveError::NotInDocument);
        }
        self.check_claim(dom, target)?;

        let created = self.factory.create(dom, target)?;
        let created_kind = dom.node_kind(&created);
        if !created_kind.is_element() {
            return Err(ResponsiveError::CreatedNotAnElement);
        }

        #[cfg(feature = "tracing")]
        trace!(
            chain = self.id.get(),
            generation = self.generation + 1,
            old = ?target,
            new = ?created,
            "replacing element"
        );

        // Claim before substituting so a rejected write leaves the document as it was.
        self.claim(dom, &created)?;
        dom.replace_with(target, &created)?;
        self.generation = self.generation.saturating_add(1);
        self.current = Some(created.clone());
        self.baseline = None;
        if *target != created {
            self.unclaim(dom, target)?;
        }

        if created_kind == NodeKind::Image {
            let watch = dom.watch_image_load(&created, self.notifier())?;
            self.image_watch = Some(watch);
            self.state = ChainState::AwaitingImageLoad;
            return Ok(());
        }
        self.arm(dom, &created)
    }

    fn arm(&mut self, dom: &mut D, elt: &D::Node) -> Result<(), ResponsiveError> {
        let baseline = box_size(dom, elt)?;
        let observer = dom.observe_resize(elt, self.notifier())?;
        self.baseline = Some(baseline);
        self.observer = Some(observer);
        self.state = ChainState::Observing;
        Ok(())
    }

    fn check_claim(&self, dom: &D, target: &D::Node) -> Result<(), ResponsiveError> {
        let Some(attr) = self.config.claim_attribute.as_deref() else {
            return Ok(());
        };
        let Some(owner) = dom.get_attribute(target, attr)? else {
            return Ok(());
        };
        if owner == self.id.claim_value() {
            return Ok(());
        }
        // Foreign values count as claimed; ids of dropped chains do not.
        if ChainId::from_claim_value(&owner).is_none_or(ChainId::is_live) {
            return Err(ResponsiveError::AlreadyClaimed { by: owner });
        }
        Ok(())
    }

    fn claim(&self, dom: &mut D, elt: &D::Node) -> Result<(), ResponsiveError> {
        let Some(attr) = self.config.claim_attribute.as_deref() else {
            return Ok(());
        };
        dom.set_attribute(elt, attr, &self.id.claim_value())?;
        Ok(())
    }

    fn unclaim(&self, dom: &mut D, elt: &D::Node) -> Result<(), ResponsiveError> {
        let Some(attr) = self.config.claim_attribute.as_deref() else {
            return Ok(());
        };
        dom.remove_attribute(elt, attr)?;
        Ok(())
    }

    fn release_claim(&self, dom: &mut D) {
        let (Some(attr), Some(current)) = (self.config.claim_attribute.as_deref(), &self.current)
        else {
            return;
        };
        if let Ok(Some(owner)) = dom.get_attribute(current, attr) {
            if owner == self.id.claim_value() {
                let _ = dom.remove_attribute(current, attr);
            }
        }
    }

    fn teardown(&mut self, dom: &mut D) {
        if let Some(observer) = self.observer.take() {
            dom.disconnect(observer);
        }
        if let Some(watch) = self.image_watch.take() {
            dom.release_image_watch(watch);
        }
        self.release_claim(dom);
    }

    fn orphan(
        &mut self,
        dom: &mut D,
        event: ChainEventKind,
        from_state: ChainState,
    ) -> ChainTransition {
        self.teardown(dom);
        self.state = ChainState::Orphaned;

        #[cfg(feature = "tracing")]
        warn!(
            chain = self.id.get(),
            generation = self.generation,
            "responsive chain element left the document; chain terminated"
        );

        self.record_transition(event, from_state, Some("target_detached"), None, None)
    }

    fn fail(
        &mut self,
        dom: &mut D,
        event: ChainEventKind,
        from_state: ChainState,
        err: ResponsiveError,
    ) -> ResponsiveError {
        self.teardown(dom);
        self.state = ChainState::Failed;
        self.last_error = Some(err.clone());

        #[cfg(feature = "tracing")]
        warn!(
            chain = self.id.get(),
            generation = self.generation,
            event = event.as_str(),
            error = %err,
            "responsive chain failed"
        );

        let message = err.to_string();
        let _ = self.record_transition(event, from_state, None, None, Some(message));
        err
    }

    fn record_ignored(
        &mut self,
        event: ChainEventKind,
        from_state: ChainState,
        reason: &str,
    ) -> ChainTransition {
        let reason = if from_state.is_terminal() {
            "ignored_in_terminal_state"
        } else {
            reason
        };
        self.record_transition(event, from_state, Some(reason), None, None)
    }

    fn record_transition(
        &mut self,
        event: ChainEventKind,
        from_state: ChainState,
        reason: Option<&str>,
        observed: Option<BoxSize>,
        error: Option<String>,
    ) -> ChainTransition {
        self.transition_seq = self.transition_seq.saturating_add(1);
        let transition = ChainTransition {
            seq: self.transition_seq,
            chain: self.id,
            event,
            from_state,
            to_state: self.state,
            generation: self.generation,
            baseline: self.baseline,
            observed,
            observer: self.observer,
            reason: reason.map(str::to_owned),
            error,
        };

        #[cfg(feature = "tracing")]
        debug!(
            chain = self.id.get(),
            seq = transition.seq,
            event = event.as_str(),
            from = from_state.as_str(),
            to = self.state.as_str(),
            generation = self.generation,
            reason = transition.reason.as_deref().unwrap_or(""),
            "responsive chain transition"
        );

        let capacity = self.config.transition_log_capacity;
        if capacity > 0 {
            while self.transitions.len() >= capacity {
                let _ = self.transitions.pop_front();
            }
            self.transitions.push_back(transition.clone());
        }
        transition
    }
}
