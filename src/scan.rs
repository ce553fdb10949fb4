//! Finding envelopes inside handler results

use crate::envelope::{Envelope, HandleException, HandlerResult, NewData, NewState};

/// An envelope type that can be picked out of a `HandlerResult`
pub trait EnvelopeKind {
    fn select(envelope: &Envelope) -> Option<&Self>;
}

impl EnvelopeKind for NewData {
    fn select(envelope: &Envelope) -> Option<&Self> {
        match envelope {
            Envelope::NewData(data) => Some(data),
            _ => None,
        }
    }
}

impl EnvelopeKind for NewState {
    fn select(envelope: &Envelope) -> Option<&Self> {
        match envelope {
            Envelope::NewState(state) => Some(state),
            _ => None,
        }
    }
}

impl EnvelopeKind for HandleException {
    fn select(envelope: &Envelope) -> Option<&Self> {
        match envelope {
            Envelope::HandleException(exception) => Some(exception),
            _ => None,
        }
    }
}

/// Depth-first, left-to-right search for the first envelope of kind `K`.
///
/// Later envelopes of the same kind are ignored.
pub fn search_in_results<K: EnvelopeKind>(container: &HandlerResult) -> Option<&K> {
    match container {
        HandlerResult::Seq(items) => items.iter().find_map(search_in_results::<K>),
        HandlerResult::Envelope(envelope) => K::select(envelope),
        HandlerResult::Value(_) => None,
    }
}
