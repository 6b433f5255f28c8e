//! Observing the codebook state machine.
//!
//! Both the encoder and the decoder report every state transition as an [`Event`]. The events
//! always go to the `log` facade; an [`Observer`] can be installed with `with_observer` to
//! receive them directly.
//!
//! Encoder and decoder emit the exact same event sequence for the same stream. The decoder
//! reports the `Step` of a codeword only after it has read the following one, since only then has
//! it made the table insertion the encoder made right after writing it.
use crate::Code;

/// One transition of the per-stream state.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A data codeword was completed.
    Step {
        /// The codeword.
        code: Code,
        /// Number of bytes the codeword stands for.
        len: usize,
        /// The width the codeword was written with.
        width: u8,
        /// The width after the step, used for the next codeword.
        next_width: u8,
        /// The next code to be assigned after the step.
        next_code: u32,
    },
    /// The codeword width grew to `width`.
    Grow { width: u8 },
    /// The table is full at maximum width and the candidate entry was discarded.
    Freeze,
    /// The ratio monitor recorded its baseline.
    Arm { ratio: f64 },
    /// The monitor is armed but the ratio has not degraded past the threshold.
    Hold { baseline: f64, ratio: f64 },
    /// The ratio degraded past the threshold, a reset follows.
    Trigger { baseline: f64, ratio: f64 },
    /// The codebook was rebuilt from its initial state.
    Reset,
    /// The end-of-stream code, written or read with `width`.
    End { width: u8 },
}

/// Receives the events of one stream.
pub trait Observer {
    fn on_event(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> Observer for F {
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

impl Event {
    pub(crate) fn log(&self) {
        match self {
            Event::Step { .. } => log::trace!("{:?}", self),
            Event::Freeze | Event::Hold { .. } => log::trace!("{:?}", self),
            _ => log::debug!("{:?}", self),
        }
    }
}
