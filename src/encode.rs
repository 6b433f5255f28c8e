//! A module for all encoding needs.
use crate::dict::{Cursor, Dictionary};
use crate::observe::Observer;
use crate::state::{CodecState, Room, Threshold};
use crate::{AllResult, Code, Error, LzwStatus, Mode, StreamResult};
use crate::{END_CODE, MAX_WIDTH, STREAM_BUFFER};

use std::io::{BufRead, Write};

/// The state for encoding data with an adaptive LZW algorithm.
///
/// The same structure can be utilized with streams as well as your own buffers and driver logic.
/// The encoder writes the mode tag as the first byte and the end code once [`finish`] has been
/// called and all input has been consumed.
///
/// [`finish`]: #method.finish
pub struct Encoder {
    state: Box<EncodeState>,
}

/// A encoding stream sink.
///
/// See [`Encoder::into_stream`] on how to create this type and more information.
///
/// [`Encoder::into_stream`]: struct.Encoder.html#method.into_stream
pub struct IntoStream<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

/// An async encoding sink.
///
/// See [`Encoder::into_async`] on how to create this type.
///
/// [`Encoder::into_async`]: struct.Encoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    encoder: &'d mut Encoder,
    writer: W,
}

struct EncodeState {
    /// Code width, next code and fill policy.
    codec: CodecState,
    /// The current encoding dictionary.
    dict: Dictionary,
    /// Position of the match in progress.
    cursor: Cursor,
    /// Bytes of the match in progress, including any walked past its longest coded prefix.
    window: Vec<u8>,
    /// If all input has been provided.
    has_ended: bool,
    /// If we have pushed the end code.
    end_written: bool,
    /// The bit buffer for encoding.
    buffer: MsbBuffer,
}

struct MsbBuffer {
    /// The buffer bits.
    buffer: u64,
    /// The number of valid buffer bits.
    bits_in_buffer: u8,
}

impl Encoder {
    /// Create a new encoder for the given mode.
    pub fn new(mode: Mode) -> Self {
        Encoder::with_threshold(mode, Threshold::default())
    }

    /// Create an encoder whose ratio monitor uses a custom threshold.
    ///
    /// Only relevant for [`Mode::Monitor`]. The decoder must be created with the same threshold.
    pub fn with_threshold(mode: Mode, threshold: Threshold) -> Self {
        Encoder {
            state: Box::new(EncodeState::new(mode, threshold)),
        }
    }

    /// Report all state transitions of this stream to `observer`.
    pub fn with_observer(mut self, observer: impl Observer + Send + 'static) -> Self {
        self.state.codec.set_observer(Box::new(observer));
        self
    }

    /// Encode some bytes from `inp` into `out`.
    ///
    /// See [`into_stream`] for high-level functions and [`finish`] for marking the input data as
    /// complete.
    ///
    /// [`into_stream`]: #method.into_stream
    /// [`finish`]: #method.finish
    pub fn encode_bytes(&mut self, inp: &[u8], out: &mut [u8]) -> StreamResult {
        self.state.advance(inp, out)
    }

    /// Construct a encoder into a writer.
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream {
            encoder: self,
            writer,
        }
    }

    /// Construct a encoder into an async writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: futures::io::AsyncWrite>(&mut self, writer: W) -> IntoAsync<'_, W> {
        IntoAsync {
            encoder: self,
            writer,
        }
    }

    /// Mark the encoding as finished.
    ///
    /// In following calls to `encode_bytes` the encoder will emit an end code after encoding all
    /// of `inp`. Input provided after the end code has been written is ignored.
    pub fn finish(&mut self) {
        self.state.has_ended = true;
    }

    /// Whether the end code has been written.
    pub fn has_ended(&self) -> bool {
        self.state.end_written
    }

    pub fn mode(&self) -> Mode {
        self.state.codec.mode()
    }
}

impl<W: Write> IntoStream<'_, W> {
    /// Encode data from a reader.
    ///
    /// This will drain the supplied reader. It will not encode an end marker after all data has
    /// been processed.
    pub fn encode(&mut self, read: impl BufRead) -> AllResult {
        self.encode_part(read, false)
    }

    /// Encode data from a reader and an end marker.
    pub fn encode_all(mut self, read: impl BufRead) -> AllResult {
        self.encode_part(read, true)
    }

    fn encode_part(&mut self, mut read: impl BufRead, finish: bool) -> AllResult {
        let IntoStream { encoder, writer } = self;
        enum Progress {
            Ok,
            Done,
        }

        let mut bytes_read = 0;
        let mut bytes_written = 0;

        let read_bytes = &mut bytes_read;
        let write_bytes = &mut bytes_written;

        let mut outbuf = vec![0; STREAM_BUFFER];
        let once = move || -> Result<Progress, Error> {
            let data = read.fill_buf()?;

            if data.is_empty() {
                if finish {
                    encoder.finish();
                } else {
                    return Ok(Progress::Done);
                }
            }

            let result = encoder.encode_bytes(data, &mut outbuf[..]);
            *read_bytes += result.consumed_in;
            *write_bytes += result.consumed_out;
            read.consume(result.consumed_in);

            let done = result.status?;
            writer.write_all(&outbuf[..result.consumed_out])?;

            if let LzwStatus::Done = done {
                return Ok(Progress::Done);
            }

            Ok(Progress::Ok)
        };

        let status = core::iter::repeat_with(once)
            // scan+fuse can be replaced with map_while
            .scan((), |(), result| match result {
                Ok(Progress::Ok) => Some(Ok(())),
                Err(err) => Some(Err(err)),
                Ok(Progress::Done) => None,
            })
            .fuse()
            .collect();

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}

#[cfg(feature = "async")]
impl<W: futures::io::AsyncWrite + core::marker::Unpin> IntoAsync<'_, W> {
    /// Encode data from an async reader without an end marker.
    pub async fn encode(&mut self, read: impl futures::io::AsyncBufRead) -> AllResult {
        self.encode_part(read, false).await
    }

    /// Encode data from an async reader and an end marker.
    pub async fn encode_all(mut self, read: impl futures::io::AsyncBufRead) -> AllResult {
        self.encode_part(read, true).await
    }

    async fn encode_part(&mut self, read: impl futures::io::AsyncBufRead, finish: bool) -> AllResult {
        use futures::io::{AsyncBufReadExt, AsyncWriteExt};

        let IntoAsync { encoder, writer } = self;
        let mut read = Box::pin(read);
        let mut bytes_read = 0;
        let mut bytes_written = 0;
        let mut outbuf = vec![0; STREAM_BUFFER];

        let status = loop {
            let data = match read.fill_buf().await {
                Ok(data) => data,
                Err(err) => break Err(err.into()),
            };

            if data.is_empty() {
                if finish {
                    encoder.finish();
                } else {
                    break Ok(());
                }
            }

            let result = encoder.encode_bytes(data, &mut outbuf[..]);
            bytes_read += result.consumed_in;
            bytes_written += result.consumed_out;
            read.consume_unpin(result.consumed_in);

            let done = match result.status {
                Ok(done) => done,
                Err(err) => break Err(err.into()),
            };

            if let Err(err) = writer.write_all(&outbuf[..result.consumed_out]).await {
                break Err(err.into());
            }

            if let LzwStatus::Done = done {
                break writer.flush().await.map_err(Error::from);
            }
        };

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}

impl EncodeState {
    fn new(mode: Mode, threshold: Threshold) -> Self {
        let mut buffer = MsbBuffer::new();
        buffer.buffer_bits(u64::from(mode.tag()), 8);
        EncodeState {
            codec: CodecState::new(mode, threshold),
            dict: Dictionary::new(),
            cursor: Cursor::new(),
            window: Vec::new(),
            has_ended: false,
            end_written: false,
            buffer,
        }
    }

    fn advance(&mut self, mut inp: &[u8], mut out: &mut [u8]) -> StreamResult {
        let c_in = inp.len();
        let c_out = out.len();
        let mut status = Ok(LzwStatus::Ok);

        loop {
            if self.buffer.push_out(&mut out) || self.end_written {
                break;
            }

            if self.walk(&mut inp) {
                self.emit_match();
                continue;
            }

            // All input so far is part of the undecided match.
            if !self.has_ended {
                break;
            }

            if !self.window.is_empty() {
                self.emit_match();
                continue;
            }

            self.buffer.buffer_code(END_CODE, self.codec.width());
            self.codec.end();
            self.buffer.buffer_pad();
            self.end_written = true;
        }

        if self.end_written && !self.buffer.flush_out(&mut out) {
            status = Ok(LzwStatus::Done);
        }

        StreamResult {
            consumed_in: c_in - inp.len(),
            consumed_out: c_out - out.len(),
            status,
        }
    }

    /// Extend the match in progress.
    ///
    /// Returns true when the next byte does not continue any stored sequence, that byte stays in
    /// the window.
    fn walk(&mut self, inp: &mut &[u8]) -> bool {
        // Bytes left over from a match that was walked past its longest coded prefix.
        while self.cursor.depth() < self.window.len() {
            let byte = self.window[self.cursor.depth()];
            if !self.dict.advance(&mut self.cursor, byte) {
                return true;
            }
        }

        let slice: &[u8] = *inp;
        let mut bytes = slice.iter();
        while let Some(&byte) = bytes.next() {
            *inp = bytes.as_slice();
            self.window.push(byte);
            if !self.dict.advance(&mut self.cursor, byte) {
                return true;
            }
        }

        false
    }

    /// Write the code of the longest stored prefix of the window and grow the dictionary.
    fn emit_match(&mut self) {
        let (code, len) = match self.cursor.best() {
            Some(best) => best,
            None => return,
        };

        let width = self.codec.width();
        self.buffer.buffer_code(code, width);
        self.codec.record(len, width);

        let room = self.codec.make_room();
        if room == Room::Reset {
            self.dict.reset();
        }

        // The new entry is the match continued by the byte following it, if any.
        if self.window.len() > len && room != Room::Full {
            let new_code = self.codec.claim();
            self.dict.insert(&self.window[..=len], new_code);
        }

        self.codec.step(code, len, width);
        self.window.drain(..len);
        self.cursor = Cursor::new();
    }
}

impl MsbBuffer {
    fn new() -> Self {
        MsbBuffer {
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    fn buffer_code(&mut self, code: Code, width: u8) {
        self.buffer_bits(u64::from(code), width);
    }

    fn buffer_bits(&mut self, value: u64, count: u8) {
        let shift = 64 - self.bits_in_buffer - count;
        self.buffer |= value << shift;
        self.bits_in_buffer += count;
    }

    /// Push bytes if the buffer space is getting small.
    fn push_out(&mut self, out: &mut &mut [u8]) -> bool {
        if self.bits_in_buffer + 2 * MAX_WIDTH < 64 {
            return false;
        }

        self.flush_out(out)
    }

    /// Flush all full bytes, returning if at least one more byte remains.
    fn flush_out(&mut self, out: &mut &mut [u8]) -> bool {
        let want = usize::from(self.bits_in_buffer / 8);
        let count = want.min((*out).len());
        let (bytes, tail) = core::mem::take(out).split_at_mut(count);
        *out = tail;

        for b in bytes {
            *b = ((self.buffer & 0xff00_0000_0000_0000) >> 56) as u8;
            self.buffer <<= 8;
            self.bits_in_buffer -= 8;
        }

        count < want
    }

    /// Pad the buffer to a full byte.
    fn buffer_pad(&mut self) {
        let to_byte = self.bits_in_buffer.wrapping_neg() & 0x7;
        self.bits_in_buffer += to_byte;
    }
}
