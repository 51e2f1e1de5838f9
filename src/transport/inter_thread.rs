//! `InterThreadTransport`: an in-process, message-preserving transport used
//! for tests and arbitrated-client setups (spec §4.4.3).
//!
//! eRPC's C++ `InterThreadBufferTransport` pairs two peers over a semaphore
//! pair (`in_sem`/`out_sem`) guarding a single shared buffer slot, giving an
//! at-most-one-message-in-flight-per-direction guarantee. A bounded
//! `crossbeam_channel` of capacity 1 is the same guarantee expressed without
//! hand-rolled semaphores: a full channel blocks the sender exactly the way
//! `out_sem`/`in_sem` would, and `crossbeam` is already part of this
//! codebase's ambient stack.

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::buffer::MessageBuffer;
use crate::error::{Result, RpcError};
use crate::transport::Transport;

/// One endpoint of a same-process transport pair. Build pairs with
/// [`InterThreadTransport::pair`]; each endpoint is message-preserving, so
/// `header_reserve_size()` is 0 (spec §4.4.2).
pub struct InterThreadTransport {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
}

impl InterThreadTransport {
    /// Link two peers. Each side's `send` delivers directly to the other
    /// side's `receive`; at most one message may be in flight per direction
    /// at a time (a second `send` before the first is received blocks).
    pub fn pair() -> (InterThreadTransport, InterThreadTransport) {
        let (tx_a, rx_a) = bounded(1);
        let (tx_b, rx_b) = bounded(1);
        (
            InterThreadTransport {
                outbound: tx_a,
                inbound: rx_b,
            },
            InterThreadTransport {
                outbound: tx_b,
                inbound: rx_a,
            },
        )
    }

    /// Split into an independently cloneable sending half and an
    /// exclusively-owned receiving half, for [`crate::arbitrator::ArbitratedClient`]:
    /// many client threads share [`FrameSender`] to write requests/replies,
    /// while exactly one arbitrator thread owns [`FrameReceiver`] (spec §4.7).
    pub fn split(self) -> (FrameSender, FrameReceiver) {
        (
            FrameSender { outbound: self.outbound },
            FrameReceiver { inbound: self.inbound },
        )
    }
}

/// The cloneable write half of a split [`InterThreadTransport`].
#[derive(Clone)]
pub struct FrameSender {
    outbound: Sender<Vec<u8>>,
}

impl FrameSender {
    pub fn send_frame(&self, bytes: &[u8]) -> Result<()> {
        self.outbound.send(bytes.to_vec()).map_err(|_| RpcError::ConnectionClosed)
    }
}

/// The exclusively-owned read half of a split [`InterThreadTransport`].
pub struct FrameReceiver {
    inbound: Receiver<Vec<u8>>,
}

impl FrameReceiver {
    pub fn recv_frame(&mut self) -> Result<Vec<u8>> {
        self.inbound.recv().map_err(|_| RpcError::ConnectionClosed)
    }
}

impl Transport for InterThreadTransport {
    fn send(&mut self, buffer: &MessageBuffer) -> Result<()> {
        self.outbound
            .send(buffer.used_slice().to_vec())
            .map_err(|_| RpcError::ConnectionClosed)
    }

    fn receive(&mut self, buffer: &mut MessageBuffer) -> Result<()> {
        let data = self.inbound.recv().map_err(|_| RpcError::ConnectionClosed)?;
        if data.len() > buffer.capacity() {
            return Err(RpcError::BufferOverrun {
                position: 0,
                capacity: buffer.capacity() as u32,
                requested: data.len() as u32,
            });
        }
        buffer.data_mut()[..data.len()].copy_from_slice(&data);
        buffer.set_used(data.len());
        Ok(())
    }

    fn header_reserve_size(&self) -> usize {
        0
    }

    fn has_message_available(&self) -> bool {
        !self.inbound.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peers_exchange_messages_in_both_directions() {
        let (mut a, mut b) = InterThreadTransport::pair();

        let mut out = MessageBuffer::with_capacity(16);
        out.write_cursor().write(b"ping").unwrap();
        out.set_used(4);
        a.send(&out).unwrap();

        let mut inbound = MessageBuffer::with_capacity(16);
        b.receive(&mut inbound).unwrap();
        assert_eq!(inbound.used_slice(), b"ping");

        let mut reply = MessageBuffer::with_capacity(16);
        reply.write_cursor().write(b"pong").unwrap();
        reply.set_used(4);
        b.send(&reply).unwrap();

        let mut inbound2 = MessageBuffer::with_capacity(16);
        a.receive(&mut inbound2).unwrap();
        assert_eq!(inbound2.used_slice(), b"pong");
    }

    #[test]
    fn dropping_peer_surfaces_as_connection_closed() {
        let (mut a, b) = InterThreadTransport::pair();
        drop(b);
        let mut out = MessageBuffer::with_capacity(4);
        out.set_used(0);
        assert_eq!(a.send(&out), Err(RpcError::ConnectionClosed));
    }
}
