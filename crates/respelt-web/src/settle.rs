#![forbid(unsafe_code)]

//! When the `replace` promise settles.
//!
//! The promise resolves once the first generation has armed its observer
//! (after any image load), or once the chain ended without failing before
//! that. It rejects with the chain's error if the chain failed first. Later
//! generations never touch it.

use respelt_core::{ChainId, ChainState, DomError, ResponsiveError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Settlement {
    Resolve,
    Reject(ResponsiveError),
}

#[derive(Debug, Default)]
pub(crate) struct FirstArmGate {
    settled: bool,
}

impl FirstArmGate {
    /// Settlement due for a chain in `state`, at most once per gate.
    pub(crate) fn poll(
        &mut self,
        state: ChainState,
        last_error: Option<&ResponsiveError>,
    ) -> Option<Settlement> {
        if self.settled {
            return None;
        }
        let settlement = match state {
            ChainState::Idle | ChainState::AwaitingImageLoad => return None,
            ChainState::Observing | ChainState::Stopped | ChainState::Orphaned => {
                Settlement::Resolve
            }
            ChainState::Failed => Settlement::Reject(last_error.cloned().unwrap_or_else(|| {
                ResponsiveError::Dom(DomError::Unsupported("chain failed without an error"))
            })),
        };
        self.settled = true;
        Some(settlement)
    }
}

/// Console line for a chain that failed after its promise settled.
pub(crate) fn failure_report(chain: ChainId, err: &ResponsiveError) -> String {
    format!("respelt: responsive chain {chain} failed: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn waits_while_image_loads() {
        let mut gate = FirstArmGate::default();
        assert_eq!(gate.poll(ChainState::Idle, None), None);
        assert_eq!(gate.poll(ChainState::AwaitingImageLoad, None), None);
        assert_eq!(
            gate.poll(ChainState::Observing, None),
            Some(Settlement::Resolve)
        );
    }

    #[test]
    fn settles_only_once() {
        let mut gate = FirstArmGate::default();
        assert_eq!(
            gate.poll(ChainState::Observing, None),
            Some(Settlement::Resolve)
        );
        let later = ResponsiveError::CreatedNotAnElement;
        assert_eq!(gate.poll(ChainState::Failed, Some(&later)), None);
        assert_eq!(gate.poll(ChainState::Observing, None), None);
    }

    #[test]
    fn failure_before_arming_rejects_with_error() {
        let mut gate = FirstArmGate::default();
        let err = ResponsiveError::NotInDocument;
        assert_eq!(
            gate.poll(ChainState::Failed, Some(&err)),
            Some(Settlement::Reject(ResponsiveError::NotInDocument))
        );
    }

    #[test]
    fn stop_while_awaiting_image_resolves() {
        let mut gate = FirstArmGate::default();
        assert_eq!(gate.poll(ChainState::AwaitingImageLoad, None), None);
        assert_eq!(
            gate.poll(ChainState::Stopped, None),
            Some(Settlement::Resolve)
        );
    }

    #[test]
    fn failure_report_names_chain_and_error() {
        let chain = ChainId::from_claim_value("12").expect("numeric id");
        let err = ResponsiveError::Factory("boom".to_owned());
        assert_eq!(
            failure_report(chain, &err),
            "respelt: responsive chain 12 failed: element factory failed: boom"
        );
    }
}
