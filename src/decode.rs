//! A module for all decoding needs.
use crate::observe::Observer;
use crate::state::{CodecState, Room, Threshold};
use crate::{AllResult, Code, Error, LzwError, LzwStatus, Mode, StreamResult};
use crate::{ALPHABET, END_CODE, STREAM_BUFFER};

use std::io::{BufRead, Write};

/// The state for decoding data with an adaptive LZW algorithm.
///
/// The decoder learns the mode from the first byte of the stream and stops at the end code.
pub struct Decoder {
    state: Box<DecodeState>,
}

/// A decoding stream sink.
///
/// See [`Decoder::into_stream`] on how to create this type and more information.
///
/// [`Decoder::into_stream`]: struct.Decoder.html#method.into_stream
pub struct IntoStream<'d, W> {
    decoder: &'d mut Decoder,
    writer: W,
}

/// An async decoding sink.
///
/// See [`Decoder::into_async`] on how to create this type.
///
/// [`Decoder::into_async`]: struct.Decoder.html#method.into_async
#[cfg(feature = "async")]
pub struct IntoAsync<'d, W> {
    decoder: &'d mut Decoder,
    writer: W,
}

struct DecodeState {
    /// Code width, next code and fill policy.
    codec: CodecState,
    /// Whether the mode tag has been read.
    has_header: bool,
    /// The table of decoded codes.
    table: Table,
    /// The decoded sequence not yet written out.
    buffer: Buffer,
    /// The previously decoded sequence.
    last: Option<Last>,
    /// The previous code, reported once its table entry has been made.
    pending: Option<(Code, usize, u8)>,
    has_ended: bool,
    failed: Option<LzwError>,
    bits: BitReader,
}

enum Last {
    /// A sequence of the current table.
    Code(Code),
    /// A sequence decoded before the last reset.
    Carried(Vec<u8>),
}

#[derive(Clone, Copy)]
enum Link {
    Base(u8),
    Derived { prefix: Code, byte: u8 },
    /// The entry continuing a sequence from before a reset, its bytes are kept by the table.
    Carried,
    /// The slot of the end code.
    Reserved,
}

struct Table {
    links: Vec<Link>,
    depths: Vec<u32>,
    firsts: Vec<u8>,
    carried: Vec<u8>,
}

struct Buffer {
    bytes: Vec<u8>,
    read_mark: usize,
}

struct BitReader {
    bit_buffer: u64,
    bits: u8,
}

impl Decoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Decoder::with_threshold(Threshold::default())
    }

    /// Create a decoder whose ratio monitor uses a custom threshold.
    ///
    /// Must match the threshold the stream was encoded with.
    pub fn with_threshold(threshold: Threshold) -> Self {
        Decoder {
            state: Box::new(DecodeState::new(threshold)),
        }
    }

    /// Report all state transitions of this stream to `observer`.
    pub fn with_observer(mut self, observer: impl Observer + Send + 'static) -> Self {
        self.state.codec.set_observer(Box::new(observer));
        self
    }

    /// Decode some bytes from `inp` and write result to `out`.
    ///
    /// This will consume a prefix of the input buffer and write decoded output into a prefix of
    /// the output buffer. See the respective fields of the return value for the count of consumed
    /// and written bytes. A status of `NoProgress` means more input is required, for a complete
    /// stream that has been fully provided it indicates a truncated stream.
    pub fn decode_bytes(&mut self, inp: &[u8], out: &mut [u8]) -> StreamResult {
        self.state.advance(inp, out)
    }

    /// Construct a decoder into a writer.
    pub fn into_stream<W: Write>(&mut self, writer: W) -> IntoStream<'_, W> {
        IntoStream {
            decoder: self,
            writer,
        }
    }

    /// Construct a decoder into an async writer.
    #[cfg(feature = "async")]
    pub fn into_async<W: futures::io::AsyncWrite>(&mut self, writer: W) -> IntoAsync<'_, W> {
        IntoAsync {
            decoder: self,
            writer,
        }
    }

    /// Whether the end code has been read.
    pub fn has_ended(&self) -> bool {
        self.state.has_ended
    }

    /// The mode of the stream, once its header has been read.
    pub fn mode(&self) -> Option<Mode> {
        if self.state.has_header {
            Some(self.state.codec.mode())
        } else {
            None
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

impl<W: Write> IntoStream<'_, W> {
    /// Decode data from a reader until the end code.
    ///
    /// A reader running dry before the end code is a truncated stream.
    pub fn decode_all(mut self, mut read: impl BufRead) -> AllResult {
        let IntoStream { decoder, writer } = &mut self;
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

            let result = decoder.decode_bytes(data, &mut outbuf[..]);
            *read_bytes += result.consumed_in;
            *write_bytes += result.consumed_out;
            read.consume(result.consumed_in);

            let done = result.status?;
            writer.write_all(&outbuf[..result.consumed_out])?;

            match done {
                LzwStatus::Ok => Ok(Progress::Ok),
                LzwStatus::Done => Ok(Progress::Done),
                LzwStatus::NoProgress => Err(LzwError::Truncated.into()),
            }
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
    /// Decode data from an async reader until the end code.
    pub async fn decode_all(self, read: impl futures::io::AsyncBufRead) -> AllResult {
        use futures::io::{AsyncBufReadExt, AsyncWriteExt};

        let IntoAsync { decoder, mut writer } = self;
        let mut read = Box::pin(read);
        let mut bytes_read = 0;
        let mut bytes_written = 0;
        let mut outbuf = vec![0; STREAM_BUFFER];

        let status = loop {
            let data = match read.fill_buf().await {
                Ok(data) => data,
                Err(err) => break Err(err.into()),
            };

            let result = decoder.decode_bytes(data, &mut outbuf[..]);
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

            match done {
                LzwStatus::Ok => {}
                LzwStatus::Done => break writer.flush().await.map_err(Error::from),
                LzwStatus::NoProgress => break Err(LzwError::Truncated.into()),
            }
        };

        AllResult {
            bytes_read,
            bytes_written,
            status,
        }
    }
}

impl DecodeState {
    fn new(threshold: Threshold) -> Self {
        DecodeState {
            // The mode is replaced by the one in the header.
            codec: CodecState::new(Mode::Freeze, threshold),
            has_header: false,
            table: Table::new(),
            buffer: Buffer::new(),
            last: None,
            pending: None,
            has_ended: false,
            failed: None,
            bits: BitReader::new(),
        }
    }

    fn advance(&mut self, mut inp: &[u8], mut out: &mut [u8]) -> StreamResult {
        let o_in = inp.len();
        let o_out = out.len();

        let status = match self.failed {
            Some(err) => Err(err),
            None => self.run(&mut inp, &mut out),
        };

        let status = match status {
            Err(err) => {
                self.failed = Some(err);
                Err(err)
            }
            Ok(LzwStatus::Ok) if o_in == inp.len() && o_out == out.len() => {
                Ok(LzwStatus::NoProgress)
            }
            other => other,
        };

        StreamResult {
            consumed_in: o_in - inp.len(),
            consumed_out: o_out - out.len(),
            status,
        }
    }

    fn run(&mut self, inp: &mut &[u8], out: &mut &mut [u8]) -> Result<LzwStatus, LzwError> {
        loop {
            if !self.buffer.drain_into(out) {
                return Ok(LzwStatus::Ok);
            }

            if self.has_ended {
                return Ok(LzwStatus::Done);
            }

            if !self.has_header {
                let tag = match self.bits.read(8, inp) {
                    Some(tag) => tag as u8,
                    None => return Ok(LzwStatus::Ok),
                };
                let mode = Mode::from_tag(tag).ok_or(LzwError::InvalidMode(tag))?;
                self.codec.set_mode(mode);
                self.has_header = true;
                continue;
            }

            let width = self.codec.width();
            let code = match self.bits.read(width, inp) {
                Some(code) => code,
                None => return Ok(LzwStatus::Ok),
            };

            if code == END_CODE {
                self.complete_step();
                self.codec.end();
                self.has_ended = true;
                continue;
            }

            self.decode_code(code, width)?;
        }
    }

    /// Decode one data code read with `width` bits into the buffer.
    fn decode_code(&mut self, code: Code, width: u8) -> Result<(), LzwError> {
        let next_code = self.codec.next_code();
        let invalid = LzwError::InvalidCode { code, next_code };

        // The first byte of the sequence, needed for the entry of the previous code.
        let first = match &self.last {
            None if usize::from(code) < ALPHABET => code as u8,
            None => return Err(invalid),
            Some(_) if u32::from(code) < next_code => self.table.first(code),
            // The encoder made this entry and used it right away. The sequence is the previous
            // one continued by its own first byte.
            Some(Last::Code(prev)) if u32::from(code) == next_code && self.codec.has_room() => {
                self.table.first(*prev)
            }
            Some(Last::Carried(bytes)) if u32::from(code) == next_code && self.codec.has_room() => {
                bytes[0]
            }
            Some(_) => return Err(invalid),
        };

        // The entry the encoder made right after writing the previous code.
        if let Some(last) = self.last.take() {
            if self.codec.has_room() {
                let new_code = self.codec.claim();
                match last {
                    Last::Code(prev) => self.table.derive(prev, first),
                    Last::Carried(bytes) => self.table.carry(&bytes, first),
                }
                debug_assert_eq!(self.table.len(), usize::from(new_code) + 1);
            }
        }
        self.complete_step();

        let len = self.table.reconstruct(code, &mut self.buffer);
        self.codec.record(len, width);

        self.last = match self.codec.make_room() {
            Room::Reset => {
                self.table.reset();
                Some(Last::Carried(self.buffer.bytes.clone()))
            }
            Room::Available | Room::Full => Some(Last::Code(code)),
        };
        self.pending = Some((code, len, width));

        Ok(())
    }

    fn complete_step(&mut self) {
        if let Some((code, len, width)) = self.pending.take() {
            self.codec.step(code, len, width);
        }
    }
}

impl Table {
    fn new() -> Self {
        let mut table = Table {
            links: Vec::with_capacity(1 << 16),
            depths: Vec::with_capacity(1 << 16),
            firsts: Vec::with_capacity(1 << 16),
            carried: Vec::new(),
        };
        for byte in 0..ALPHABET {
            table.links.push(Link::Base(byte as u8));
            table.depths.push(1);
            table.firsts.push(byte as u8);
        }
        // End code.
        table.links.push(Link::Reserved);
        table.depths.push(0);
        table.firsts.push(0);
        table
    }

    fn reset(&mut self) {
        self.links.truncate(ALPHABET + 1);
        self.depths.truncate(ALPHABET + 1);
        self.firsts.truncate(ALPHABET + 1);
        self.carried.clear();
    }

    fn len(&self) -> usize {
        self.links.len()
    }

    fn first(&self, code: Code) -> u8 {
        self.firsts[usize::from(code)]
    }

    fn derive(&mut self, prefix: Code, byte: u8) {
        let depth = self.depths[usize::from(prefix)] + 1;
        let first = self.first(prefix);
        self.links.push(Link::Derived { prefix, byte });
        self.depths.push(depth);
        self.firsts.push(first);
    }

    fn carry(&mut self, bytes: &[u8], byte: u8) {
        self.carried.clear();
        self.carried.extend_from_slice(bytes);
        self.carried.push(byte);
        self.links.push(Link::Carried);
        self.depths.push(self.carried.len() as u32);
        self.firsts.push(self.carried[0]);
    }

    /// Write the sequence of `code` into the buffer, returning its length.
    fn reconstruct(&self, code: Code, buffer: &mut Buffer) -> usize {
        let depth = self.depths[usize::from(code)] as usize;
        let out = buffer.refill(depth);

        let mut code = code;
        let mut at = depth;
        loop {
            match self.links[usize::from(code)] {
                Link::Base(byte) => {
                    out[0] = byte;
                    break;
                }
                Link::Derived { prefix, byte } => {
                    at -= 1;
                    out[at] = byte;
                    code = prefix;
                }
                Link::Carried => {
                    out[..at].copy_from_slice(&self.carried);
                    break;
                }
                Link::Reserved => break,
            }
        }

        depth
    }
}

impl Buffer {
    fn new() -> Self {
        Buffer {
            bytes: Vec::with_capacity(1 << 12),
            read_mark: 0,
        }
    }

    /// Replace the content with `len` zeroed bytes to be filled.
    fn refill(&mut self, len: usize) -> &mut [u8] {
        self.bytes.clear();
        self.bytes.resize(len, 0);
        self.read_mark = 0;
        &mut self.bytes[..]
    }

    /// Copy as much as possible into `out`, returning if the buffer is empty afterwards.
    fn drain_into(&mut self, out: &mut &mut [u8]) -> bool {
        let remain = &self.bytes[self.read_mark..];
        let count = remain.len().min(out.len());
        let (into, tail) = core::mem::take(out).split_at_mut(count);
        into.copy_from_slice(&remain[..count]);
        *out = tail;
        self.read_mark += count;
        self.read_mark == self.bytes.len()
    }
}

impl BitReader {
    fn new() -> Self {
        BitReader {
            bit_buffer: 0,
            bits: 0,
        }
    }

    /// Read a `width` bit value, `None` if the input does not hold enough bits yet.
    fn read(&mut self, width: u8, inp: &mut &[u8]) -> Option<Code> {
        if self.bits < width {
            self.refill(inp);
        }

        self.get_bits(width)
    }

    fn refill(&mut self, inp: &mut &[u8]) {
        let data: &[u8] = *inp;
        let wish_count = usize::from((64 - self.bits) / 8);
        let mut buffer = [0u8; 8];
        let new_bits = match data.get(..wish_count) {
            Some(bytes) => {
                buffer[..wish_count].copy_from_slice(bytes);
                *inp = &data[wish_count..];
                wish_count * 8
            }
            None => {
                buffer[..data.len()].copy_from_slice(data);
                *inp = &[];
                data.len() * 8
            }
        };
        self.bit_buffer |= u64::from_be_bytes(buffer) >> self.bits;
        self.bits += new_bits as u8;
    }

    fn get_bits(&mut self, width: u8) -> Option<Code> {
        if self.bits < width {
            return None;
        }

        let mask = (1u64 << width) - 1;
        let rotbuf = self.bit_buffer.rotate_left(width.into());
        self.bit_buffer = rotbuf & !mask;
        self.bits -= width;
        Some((rotbuf & mask) as Code)
    }
}
