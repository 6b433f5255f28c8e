//! The width and fill state shared in mirrored form by encoder and decoder.
use crate::observe::{Event, Observer};
use crate::{Code, ConfigError, Mode, FIRST_CODE, MAX_WIDTH, MIN_WIDTH};

/// The default degradation factor of the ratio monitor.
pub const DEFAULT_THRESHOLD: f64 = 1.1;

/// When the ratio monitor considers compression to have degraded.
///
/// The monitor compares `baseline / current` of the compression ratios against the factor. The
/// threshold is not part of the stream, encoder and decoder must be configured alike.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    factor: f64,
    inclusive: bool,
}

impl Threshold {
    /// A threshold exceeded when the degradation is strictly larger than `factor`.
    ///
    /// The factor is not checked, see [`try_new`](#method.try_new) for untrusted values.
    pub const fn new(factor: f64) -> Self {
        Threshold {
            factor,
            inclusive: false,
        }
    }

    /// Like `new`, but rejects factors that are not finite or below 1.0.
    ///
    /// Such a factor either never triggers or triggers on an improving ratio.
    pub fn try_new(factor: f64) -> Result<Self, ConfigError> {
        if factor.is_finite() && factor >= 1.0 {
            Ok(Threshold::new(factor))
        } else {
            Err(ConfigError::InvalidThreshold(factor))
        }
    }

    /// Also consider a degradation exactly equal to the factor as exceeding it.
    pub const fn inclusive(self) -> Self {
        Threshold {
            inclusive: true,
            ..self
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    pub fn is_exceeded(&self, baseline: f64, ratio: f64) -> bool {
        let degradation = baseline / ratio;
        if self.inclusive {
            degradation >= self.factor
        } else {
            degradation > self.factor
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::new(DEFAULT_THRESHOLD)
    }
}

/// Running compression ratio since the start of the stream.
#[derive(Debug, Default)]
struct RatioMonitor {
    uncompressed_bits: u64,
    compressed_bits: u64,
    /// The ratio recorded when the monitor was armed.
    baseline: Option<f64>,
}

enum Verdict {
    Armed(f64),
    Hold { baseline: f64, ratio: f64 },
    Triggered { baseline: f64, ratio: f64 },
}

impl RatioMonitor {
    fn record(&mut self, len: usize, width: u8) {
        self.uncompressed_bits += 8 * len as u64;
        self.compressed_bits += u64::from(width);
    }

    fn ratio(&self) -> f64 {
        self.uncompressed_bits as f64 / self.compressed_bits as f64
    }

    fn check(&mut self, threshold: Threshold) -> Verdict {
        let ratio = self.ratio();
        match self.baseline {
            None => {
                self.baseline = Some(ratio);
                Verdict::Armed(ratio)
            }
            Some(baseline) if threshold.is_exceeded(baseline, ratio) => {
                Verdict::Triggered { baseline, ratio }
            }
            Some(baseline) => Verdict::Hold { baseline, ratio },
        }
    }

    fn disarm(&mut self) {
        self.baseline = None;
    }
}

/// The outcome of making room for the next dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Room {
    /// `next_code` is free, possibly after growing the width.
    Available,
    /// The state was reset, the codebook must be rebuilt before inserting.
    Reset,
    /// The table stays full, the entry is discarded.
    Full,
}

/// The code width, next code and fill policy of one stream.
pub(crate) struct CodecState {
    mode: Mode,
    width: u8,
    next_code: u32,
    monitor: RatioMonitor,
    threshold: Threshold,
    observer: Option<Box<dyn Observer + Send>>,
}

impl CodecState {
    pub(crate) fn new(mode: Mode, threshold: Threshold) -> Self {
        CodecState {
            mode,
            width: MIN_WIDTH,
            next_code: u32::from(FIRST_CODE),
            monitor: RatioMonitor::default(),
            threshold,
            observer: None,
        }
    }

    pub(crate) fn set_observer(&mut self, observer: Box<dyn Observer + Send>) {
        self.observer = Some(observer);
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    /// Only valid before the first code, the decoder learns its mode from the stream header.
    pub(crate) fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub(crate) fn width(&self) -> u8 {
        self.width
    }

    /// The number of codes representable with the current width.
    pub(crate) fn capacity(&self) -> u32 {
        1 << self.width
    }

    pub(crate) fn next_code(&self) -> u32 {
        self.next_code
    }

    pub(crate) fn has_room(&self) -> bool {
        self.next_code < self.capacity()
    }

    /// Account a code standing for `len` bytes, written or read with `width` bits.
    pub(crate) fn record(&mut self, len: usize, width: u8) {
        self.monitor.record(len, width);
    }

    /// Prepare the state for the entry that follows a code.
    ///
    /// Grows the width when the current one is exhausted and applies the fill policy of the mode
    /// when the width is already at its maximum. Runs once after every data code on both sides,
    /// whether or not an entry is inserted afterwards.
    pub(crate) fn make_room(&mut self) -> Room {
        if self.has_room() {
            return Room::Available;
        }

        if self.width < MAX_WIDTH {
            self.width += 1;
            self.notify(Event::Grow { width: self.width });
            return Room::Available;
        }

        match self.mode {
            Mode::Freeze => {
                self.notify(Event::Freeze);
                Room::Full
            }
            Mode::Reset => {
                self.reset();
                Room::Reset
            }
            Mode::Monitor => match self.monitor.check(self.threshold) {
                Verdict::Armed(ratio) => {
                    self.notify(Event::Arm { ratio });
                    Room::Full
                }
                Verdict::Hold { baseline, ratio } => {
                    self.notify(Event::Hold { baseline, ratio });
                    Room::Full
                }
                Verdict::Triggered { baseline, ratio } => {
                    self.notify(Event::Trigger { baseline, ratio });
                    self.reset();
                    Room::Reset
                }
            },
        }
    }

    /// Take the next code for a new entry.
    ///
    /// Must only be called when there is room.
    pub(crate) fn claim(&mut self) -> Code {
        debug_assert!(self.has_room());
        let code = self.next_code as Code;
        self.next_code += 1;
        code
    }

    /// Report a completed data code.
    pub(crate) fn step(&mut self, code: Code, len: usize, width: u8) {
        self.notify(Event::Step {
            code,
            len,
            width,
            next_width: self.width,
            next_code: self.next_code,
        });
    }

    /// Report the end code.
    pub(crate) fn end(&mut self) {
        self.notify(Event::End { width: self.width });
    }

    fn reset(&mut self) {
        self.width = MIN_WIDTH;
        self.next_code = u32::from(FIRST_CODE);
        self.monitor.disarm();
        self.notify(Event::Reset);
    }

    fn notify(&mut self, event: Event) {
        event.log();
        if let Some(observer) = &mut self.observer {
            observer.on_event(&event);
        }
    }
}
