use tincan_core::IceCandidate;

/// Holds remote candidates that arrive before the owning link's remote
/// description. A candidate must never be applied before that description is
/// set, so pushes queue until [`CandidateBuffer::mark_live`] drains them in
/// arrival order; from then on every push passes straight through.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidate>,
    live: bool,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the candidate back when it should be applied immediately;
    /// `None` means it was queued.
    pub fn push(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.live {
            Some(candidate)
        } else {
            self.pending.push(candidate);
            None
        }
    }

    /// The remote description is now set: everything buffered comes out in
    /// FIFO order and subsequent pushes apply immediately.
    pub fn mark_live(&mut self) -> Vec<IceCandidate> {
        self.live = true;
        std::mem::take(&mut self.pending)
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
