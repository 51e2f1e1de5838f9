//! `FramedTransport`: wraps any byte-oriented duplex link with a 4-byte
//! `{u16 length, u16 crc16}` header (spec §4.4.1), grounded on eRPC's
//! `erpc_tcp_transport.cpp` framing and CRC-checked receive path, and on the
//! teacher repo's own length-prefixed `tcp_socket.rs::read_message`/
//! `write_message` (which uses a bare `u32` length with no CRC — this
//! implementation adds the CRC because the spec requires it).

use std::io::{self, Read, Write};

use crate::buffer::MessageBuffer;
use crate::crc::Crc16;
use crate::error::{Result, RpcError};
use crate::transport::Transport;

/// Frame header size: `u16` payload length + `u16` payload CRC.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Wraps any `Read + Write` byte stream (a TCP socket, UART, pipe, ...) with
/// eRPC's length+CRC frame header.
///
/// The underlying link is assumed to block until exactly the requested
/// number of bytes have passed, matching `underlying_send`/
/// `underlying_receive` in the spec. A `std::io::Read`/`Write` impl that
/// does partial reads/writes (e.g. a raw non-blocking socket) must be
/// wrapped to present that contract first.
pub struct FramedTransport<S> {
    stream: S,
    crc: Crc16,
}

impl<S: Read + Write + Send> FramedTransport<S> {
    /// Wrap `stream`, computing/verifying payload CRCs with the default seed
    /// (0xEF4A, spec §4.3).
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            crc: Crc16::default(),
        }
    }

    /// Wrap `stream` with an explicit CRC seed, e.g. one exchanged once at
    /// connection start to harden against framing drift (spec §4.4.1).
    pub fn with_seed(stream: S, seed: u16) -> Self {
        Self {
            stream,
            crc: Crc16::new(seed),
        }
    }

    /// Borrow the underlying stream, e.g. to set socket options.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

fn io_send_err(err: io::Error) -> RpcError {
    RpcError::SendFailed(err.to_string())
}

fn io_receive_err(err: io::Error) -> RpcError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        RpcError::ConnectionClosed
    } else {
        RpcError::ReceiveFailed(err.to_string())
    }
}

impl<S: Read + Write + Send> Transport for FramedTransport<S> {
    fn send(&mut self, buffer: &MessageBuffer) -> Result<()> {
        let used = buffer.used();
        if used < FRAME_HEADER_SIZE {
            return Err(RpcError::Fail);
        }
        let payload_len = used - FRAME_HEADER_SIZE;
        let payload = &buffer.data()[FRAME_HEADER_SIZE..used];
        let crc = self.crc.compute(payload);

        let mut frame = Vec::with_capacity(used);
        frame.extend_from_slice(&(payload_len as u16).to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(payload);

        self.stream.write_all(&frame).map_err(io_send_err)?;
        self.stream.flush().map_err(io_send_err)
    }

    fn receive(&mut self, buffer: &mut MessageBuffer) -> Result<()> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.stream.read_exact(&mut header).map_err(io_receive_err)?;
        let payload_length = u16::from_le_bytes([header[0], header[1]]) as usize;
        let expected_crc = u16::from_le_bytes([header[2], header[3]]);

        if payload_length + FRAME_HEADER_SIZE > buffer.capacity() {
            return Err(RpcError::BufferOverrun {
                position: 0,
                capacity: buffer.capacity() as u32,
                requested: (payload_length + FRAME_HEADER_SIZE) as u32,
            });
        }

        let mut payload = vec![0u8; payload_length];
        self.stream.read_exact(&mut payload).map_err(io_receive_err)?;

        let computed_crc = self.crc.compute(&payload);
        if computed_crc != expected_crc {
            return Err(RpcError::CrcCheckFailed {
                expected: expected_crc,
                computed: computed_crc,
            });
        }

        buffer.data_mut()[..FRAME_HEADER_SIZE].copy_from_slice(&header);
        buffer.data_mut()[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + payload_length].copy_from_slice(&payload);
        buffer.set_used(FRAME_HEADER_SIZE + payload_length);
        Ok(())
    }

    fn header_reserve_size(&self) -> usize {
        FRAME_HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as IoCursor;

    /// An in-memory duplex pipe pairing a read half with a write half, for
    /// exercising `FramedTransport` without a real socket.
    struct Loopback {
        read: IoCursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.read.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_then_receive_round_trips_payload() {
        let mut sender = FramedTransport::new(Loopback {
            read: IoCursor::new(Vec::new()),
            written: Vec::new(),
        });

        let mut out = MessageBuffer::with_capacity(64);
        {
            let mut cursor = out.write_cursor_at(FRAME_HEADER_SIZE);
            cursor.write(b"hello").unwrap();
        }
        out.set_used(FRAME_HEADER_SIZE + 5);
        sender.send(&out).unwrap();

        let wire_bytes = sender.stream().written.clone();

        let mut receiver = FramedTransport::new(Loopback {
            read: IoCursor::new(wire_bytes),
            written: Vec::new(),
        });
        let mut inbound = MessageBuffer::with_capacity(64);
        receiver.receive(&mut inbound).unwrap();
        assert_eq!(&inbound.used_slice()[FRAME_HEADER_SIZE..], b"hello");
    }

    #[test]
    fn wrong_crc_fails_receive_and_leaves_transport_usable() {
        // length=10 (spec scenario 3), crc16=0 which won't match any nonzero payload crc.
        let mut wire = Vec::new();
        wire.extend_from_slice(&10u16.to_le_bytes());
        wire.extend_from_slice(&0u16.to_le_bytes());
        wire.extend_from_slice(&[1u8; 10]);
        // A second, valid frame follows to prove the transport is still usable.
        let crc = Crc16::default().compute(b"next!");
        wire.extend_from_slice(&5u16.to_le_bytes());
        wire.extend_from_slice(&crc.to_le_bytes());
        wire.extend_from_slice(b"next!");

        let mut transport = FramedTransport::new(Loopback {
            read: IoCursor::new(wire),
            written: Vec::new(),
        });

        let mut inbound = MessageBuffer::with_capacity(64);
        let err = transport.receive(&mut inbound).unwrap_err();
        assert!(matches!(err, RpcError::CrcCheckFailed { .. }));

        let mut second = MessageBuffer::with_capacity(64);
        transport.receive(&mut second).unwrap();
        assert_eq!(&second.used_slice()[FRAME_HEADER_SIZE..], b"next!");
    }

    #[test]
    fn payload_larger_than_capacity_fails_with_overrun() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&100u16.to_le_bytes());
        wire.extend_from_slice(&0u16.to_le_bytes());
        wire.extend_from_slice(&[0u8; 100]);

        let mut transport = FramedTransport::new(Loopback {
            read: IoCursor::new(wire),
            written: Vec::new(),
        });
        let mut inbound = MessageBuffer::with_capacity(16);
        let err = transport.receive(&mut inbound).unwrap_err();
        assert!(matches!(err, RpcError::BufferOverrun { .. }));
    }
}
