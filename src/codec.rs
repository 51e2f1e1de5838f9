//! Canonical serialize/deserialize of the IDL type system to/from bytes
//! (spec §4.2), grounded directly on eRPC's `BasicCodec`.
//!
//! A codec is stateless except for the buffer cursor it currently borrows and
//! a sticky status: once an operation fails, every later operation on the
//! same codec is a no-op that preserves the first error (§4.2, §9).

use crate::buffer::{Cursor, MessageBuffer};
use crate::error::{Result, RpcError, StickyStatus};

/// The eRPC wire version this codec implements. Message headers carrying any
/// other version fail with [`RpcError::InvalidMessageVersion`].
pub const BASIC_CODEC_VERSION: u8 = 1;

/// One byte preceding any nullable value: 0 = not null, 1 = null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NullFlag {
    NotNull = 0,
    IsNull = 1,
}

/// The four message types a header's `type` field may carry (spec §6).
/// Values 4..255 are reserved and must be rejected as `InvalidArgument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Invocation = 0,
    Oneway = 1,
    Reply = 2,
    Notification = 3,
}

impl MessageType {
    /// Decode a wire byte, rejecting the reserved range 4..255.
    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(MessageType::Invocation),
            1 => Ok(MessageType::Oneway),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Notification),
            _ => Err(RpcError::InvalidArgument(format!(
                "reserved message type code {byte}"
            ))),
        }
    }
}

/// Compile-time-agreed communication endianness (spec §6). Every primitive
/// write/read passes through this so a codec can bridge a little-endian host
/// and a big-endian wire, or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Library-level (not CLI/env-var) configuration for a [`BasicCodec`].
#[derive(Debug, Clone, Copy)]
pub struct CodecConfig {
    /// Communication endianness; host byte order is swapped to this at every
    /// primitive boundary when they differ.
    pub endianness: Endianness,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            endianness: Endianness::Little,
        }
    }
}

/// Decoded message header (spec §3): the packed 32-bit preamble plus the
/// sequence number that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub service: u8,
    pub request: u8,
    pub sequence: u32,
}

/// The codec trait every wire format must implement (spec §4.2, §9: collapses
/// eRPC's inheritance hierarchy of codecs into one capability interface).
///
/// Every method here follows the sticky-status discipline: once `status()`
/// is non-ok, calling any further method is a no-op. Callers that need
/// `Result`-based early exit should call [`Codec::finish`] once at the end of
/// a message instead of checking after every field.
pub trait Codec {
    /// Begin writing a message: the packed header word, then the sequence.
    fn start_write_message(
        &mut self,
        message_type: MessageType,
        service: u8,
        request: u8,
        sequence: u32,
    );

    /// Begin reading a message, returning the decoded header. Fails with
    /// [`RpcError::InvalidMessageVersion`] if the version byte does not
    /// match this codec's version.
    fn start_read_message(&mut self) -> Option<MessageHeader>;

    fn write_bool(&mut self, value: bool);
    fn write_i8(&mut self, value: i8);
    fn write_i16(&mut self, value: i16);
    fn write_i32(&mut self, value: i32);
    fn write_i64(&mut self, value: i64);
    fn write_u8(&mut self, value: u8);
    fn write_u16(&mut self, value: u16);
    fn write_u32(&mut self, value: u32);
    fn write_u64(&mut self, value: u64);
    fn write_f32(&mut self, value: f32);
    fn write_f64(&mut self, value: f64);
    /// Write a shared-memory pointer as `{u8 width, width bytes}`, width
    /// being this platform's `size_of::<usize>()`.
    fn write_ptr(&mut self, value: usize);
    fn write_string(&mut self, value: &str);
    fn write_binary(&mut self, value: &[u8]);
    /// Write a list's `u32` count; the caller serializes each element after.
    fn start_write_list(&mut self, length: u32);
    /// Write a union's `i32` discriminator; the caller serializes the
    /// selected arm's fields after.
    fn start_write_union(&mut self, discriminator: i32);
    fn write_null_flag(&mut self, is_null: bool);

    fn read_bool(&mut self) -> bool;
    fn read_i8(&mut self) -> i8;
    fn read_i16(&mut self) -> i16;
    fn read_i32(&mut self) -> i32;
    fn read_i64(&mut self) -> i64;
    fn read_u8(&mut self) -> u8;
    fn read_u16(&mut self) -> u16;
    fn read_u32(&mut self) -> u32;
    fn read_u64(&mut self) -> u64;
    fn read_f32(&mut self) -> f32;
    fn read_f64(&mut self) -> f64;
    /// Read a shared-memory pointer. Fails with [`RpcError::BadAddressScale`]
    /// if the sender's width exceeds this platform's `usize` width; a
    /// narrower sender width zero-extends (spec §4.2, §9).
    fn read_ptr(&mut self) -> usize;
    /// Read length-prefixed bytes and copy them into an owned `String`,
    /// lossily replacing invalid UTF-8 the way a boundary between an
    /// untyped byte blob and a typed string must.
    fn read_string(&mut self) -> String;
    fn read_binary(&mut self) -> Vec<u8>;
    /// Read a list's `u32` count.
    fn start_read_list(&mut self) -> u32;
    /// Read a union's `i32` discriminator.
    fn start_read_union(&mut self) -> i32;
    fn read_null_flag(&mut self) -> bool;

    /// Absolute cursor position in the bound buffer. Callers that finish
    /// writing a message use this to set the buffer's `used` length.
    fn position(&self) -> usize;

    /// The sticky status as it stands right now.
    fn status(&self) -> &StickyStatus;

    /// Consume the sticky status, returning `Ok(())` if every operation
    /// since the last [`Codec::reset`]/bind succeeded, or the first error
    /// otherwise. This is the `?`-propagation boundary the spec's §9 redesign
    /// note describes: internal accumulation stays sticky-status, external
    /// callers get ordinary `Result`.
    fn finish(&self) -> Result<()> {
        match self.status().as_error() {
            None => Ok(()),
            Some(err) => Err(err.clone()),
        }
    }
}

/// eRPC's canonical binary format: fixed-width little/big-endian primitives,
/// `u32`-length-prefixed strings/binary/lists, `i32` union discriminators and
/// enums, one-byte null flags. Grounded directly on `erpc_basic_codec.cpp`.
pub struct BasicCodec<'a> {
    cursor: Cursor<'a>,
    config: CodecConfig,
    status: StickyStatus,
}

impl<'a> BasicCodec<'a> {
    /// Bind a codec to a buffer for writing, starting at `header_reserve`
    /// bytes in (the transport's reserved header region, §4.4).
    pub fn writer(buffer: &'a mut MessageBuffer, header_reserve: usize, config: CodecConfig) -> Self {
        Self {
            cursor: buffer.write_cursor_at(header_reserve),
            config,
            status: StickyStatus::new(),
        }
    }

    /// Bind a codec to a buffer for reading, starting at `header_reserve`
    /// bytes in.
    pub fn reader(buffer: &'a mut MessageBuffer, header_reserve: usize, config: CodecConfig) -> Self {
        Self {
            cursor: buffer.read_cursor_at(header_reserve),
            config,
            status: StickyStatus::new(),
        }
    }

    fn swap16(&self, bytes: [u8; 2]) -> [u8; 2] {
        match self.config.endianness {
            Endianness::Little => bytes,
            Endianness::Big => [bytes[1], bytes[0]],
        }
    }

    fn swap32(&self, bytes: [u8; 4]) -> [u8; 4] {
        match self.config.endianness {
            Endianness::Little => bytes,
            Endianness::Big => [bytes[3], bytes[2], bytes[1], bytes[0]],
        }
    }

    fn swap64(&self, bytes: [u8; 8]) -> [u8; 8] {
        match self.config.endianness {
            Endianness::Little => bytes,
            Endianness::Big => {
                let mut out = bytes;
                out.reverse();
                out
            }
        }
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        if !self.status.is_ok() {
            return;
        }
        if let Err(err) = self.cursor.write(bytes) {
            self.status.fail(err);
        }
    }

    fn read_raw(&mut self, dst: &mut [u8]) {
        if !self.status.is_ok() {
            return;
        }
        if let Err(err) = self.cursor.read(dst) {
            self.status.fail(err);
        }
    }
}

impl<'a> Codec for BasicCodec<'a> {
    fn start_write_message(&mut self, message_type: MessageType, service: u8, request: u8, sequence: u32) {
        let header = ((BASIC_CODEC_VERSION as u32) << 24)
            | ((service as u32) << 16)
            | ((request as u32) << 8)
            | (message_type as u32);
        self.write_u32(header);
        self.write_u32(sequence);
    }

    fn start_read_message(&mut self) -> Option<MessageHeader> {
        let header = self.read_u32();
        if !self.status.is_ok() {
            return None;
        }
        let version = ((header >> 24) & 0xff) as u8;
        if version != BASIC_CODEC_VERSION {
            self.status.fail(RpcError::InvalidMessageVersion {
                expected: BASIC_CODEC_VERSION,
                actual: version,
            });
            return None;
        }
        let service = ((header >> 16) & 0xff) as u8;
        let request = ((header >> 8) & 0xff) as u8;
        let message_type = match MessageType::from_wire((header & 0xff) as u8) {
            Ok(t) => t,
            Err(err) => {
                self.status.fail(err);
                return None;
            }
        };
        let sequence = self.read_u32();
        if !self.status.is_ok() {
            return None;
        }
        Some(MessageHeader {
            message_type,
            service,
            request,
            sequence,
        })
    }

    fn write_bool(&mut self, value: bool) {
        self.write_raw(&[value as u8]);
    }

    fn write_i8(&mut self, value: i8) {
        self.write_raw(&value.to_le_bytes());
    }

    fn write_i16(&mut self, value: i16) {
        let bytes = self.swap16(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_i32(&mut self, value: i32) {
        let bytes = self.swap32(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_i64(&mut self, value: i64) {
        let bytes = self.swap64(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_u8(&mut self, value: u8) {
        self.write_raw(&[value]);
    }

    fn write_u16(&mut self, value: u16) {
        let bytes = self.swap16(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_u32(&mut self, value: u32) {
        let bytes = self.swap32(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_u64(&mut self, value: u64) {
        let bytes = self.swap64(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_f32(&mut self, value: f32) {
        let bytes = self.swap32(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_f64(&mut self, value: f64) {
        let bytes = self.swap64(value.to_le_bytes());
        self.write_raw(&bytes);
    }

    fn write_ptr(&mut self, value: usize) {
        let width = std::mem::size_of::<usize>() as u8;
        self.write_u8(width);
        let bytes = self.swap64((value as u64).to_le_bytes());
        self.write_raw(&bytes[..width as usize]);
    }

    fn write_string(&mut self, value: &str) {
        // Treat the string as binary: length-prefixed raw bytes, no terminator.
        self.write_binary(value.as_bytes());
    }

    fn write_binary(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.write_raw(value);
    }

    fn start_write_list(&mut self, length: u32) {
        self.write_u32(length);
    }

    fn start_write_union(&mut self, discriminator: i32) {
        self.write_i32(discriminator);
    }

    fn write_null_flag(&mut self, is_null: bool) {
        let flag = if is_null {
            NullFlag::IsNull
        } else {
            NullFlag::NotNull
        };
        self.write_u8(flag as u8);
    }

    fn read_bool(&mut self) -> bool {
        let mut byte = [0u8; 1];
        self.read_raw(&mut byte);
        byte[0] != 0
    }

    fn read_i8(&mut self) -> i8 {
        let mut byte = [0u8; 1];
        self.read_raw(&mut byte);
        byte[0] as i8
    }

    fn read_i16(&mut self) -> i16 {
        let mut bytes = [0u8; 2];
        self.read_raw(&mut bytes);
        i16::from_le_bytes(self.swap16(bytes))
    }

    fn read_i32(&mut self) -> i32 {
        let mut bytes = [0u8; 4];
        self.read_raw(&mut bytes);
        i32::from_le_bytes(self.swap32(bytes))
    }

    fn read_i64(&mut self) -> i64 {
        let mut bytes = [0u8; 8];
        self.read_raw(&mut bytes);
        i64::from_le_bytes(self.swap64(bytes))
    }

    fn read_u8(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        self.read_raw(&mut byte);
        byte[0]
    }

    fn read_u16(&mut self) -> u16 {
        let mut bytes = [0u8; 2];
        self.read_raw(&mut bytes);
        u16::from_le_bytes(self.swap16(bytes))
    }

    fn read_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.read_raw(&mut bytes);
        u32::from_le_bytes(self.swap32(bytes))
    }

    fn read_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        self.read_raw(&mut bytes);
        u64::from_le_bytes(self.swap64(bytes))
    }

    fn read_f32(&mut self) -> f32 {
        let mut bytes = [0u8; 4];
        self.read_raw(&mut bytes);
        f32::from_le_bytes(self.swap32(bytes))
    }

    fn read_f64(&mut self) -> f64 {
        let mut bytes = [0u8; 8];
        self.read_raw(&mut bytes);
        f64::from_le_bytes(self.swap64(bytes))
    }

    fn read_ptr(&mut self) -> usize {
        let width = self.read_u8();
        let local_width = std::mem::size_of::<usize>() as u8;
        if !self.status.is_ok() {
            return 0;
        }
        if width > local_width {
            self.status.fail(RpcError::BadAddressScale {
                sender_width: width,
                local_width,
            });
            return 0;
        }
        let mut bytes = [0u8; 8];
        let mut raw = vec![0u8; width as usize];
        self.read_raw(&mut raw);
        if !self.status.is_ok() {
            return 0;
        }
        bytes[..width as usize].copy_from_slice(&raw);
        let swapped = self.swap64(bytes);
        u64::from_le_bytes(swapped) as usize
    }

    fn read_string(&mut self) -> String {
        let bytes = self.read_binary();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn read_binary(&mut self) -> Vec<u8> {
        let length = self.read_u32();
        if !self.status.is_ok() {
            return Vec::new();
        }
        if (length as usize) > self.cursor.remaining() {
            self.status.fail(RpcError::BufferOverrun {
                position: self.cursor.position() as u32,
                capacity: (self.cursor.position() + self.cursor.remaining()) as u32,
                requested: length,
            });
            return Vec::new();
        }
        if (length as usize) > self.cursor.remaining_used() {
            self.status.fail(RpcError::Fail);
            return Vec::new();
        }
        match self.cursor.read_zero_copy(length as usize) {
            Ok(slice) => slice.to_vec(),
            Err(err) => {
                self.status.fail(err);
                Vec::new()
            }
        }
    }

    fn start_read_list(&mut self) -> u32 {
        let length = self.read_u32();
        if !self.status.is_ok() {
            return 0;
        }
        length
    }

    fn start_read_union(&mut self) -> i32 {
        self.read_i32()
    }

    fn read_null_flag(&mut self) -> bool {
        let flag = self.read_u8();
        flag == NullFlag::IsNull as u8
    }

    fn position(&self) -> usize {
        self.cursor.position()
    }

    fn status(&self) -> &StickyStatus {
        &self.status
    }
}
