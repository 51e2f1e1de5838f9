//! `ClientManager`: drives a single RPC call from a generated stub (spec
//! §4.5), grounded on eRPC's `ClientManager::performRequest`/
//! `RequestContext` pair, collapsed here into one type since nothing in this
//! crate needs a request object outliving a single call.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::codec::{BasicCodec, Codec, CodecConfig, MessageType};
use crate::error::{Result, RpcError};
use crate::pool::{MessageBufferFactory, PooledBuffer};
use crate::transport::Transport;

/// Drives invocations and oneway calls over one transport, using one buffer
/// factory, with one shared sequence counter.
///
/// Sequence numbers are per-`ClientManager`, not per-method (spec §4.5): two
/// calls to different methods from the same manager still draw from the same
/// counter.
pub struct ClientManager<T, F> {
    transport: T,
    factory: F,
    sequence: AtomicU32,
    config: CodecConfig,
}

impl<T: Transport, F: MessageBufferFactory> ClientManager<T, F> {
    pub fn new(transport: T, factory: F) -> Self {
        Self::with_config(transport, factory, CodecConfig::default())
    }

    pub fn with_config(transport: T, factory: F, config: CodecConfig) -> Self {
        Self {
            transport,
            factory,
            sequence: AtomicU32::new(0),
            config,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Issue an `Invocation` and block for its `Reply`.
    ///
    /// `write_args` serializes the request body; `read_reply` deserializes
    /// the response body and produces the stub's return value. Both run
    /// against the sticky-status codec, so neither needs to check `Result`
    /// itself — a write/read failure is reported by the `finish()` calls this
    /// method already makes.
    pub fn invoke<Ret>(
        &mut self,
        service_id: u8,
        method_id: u8,
        capacity: usize,
        write_args: impl FnOnce(&mut dyn Codec),
        read_reply: impl FnOnce(&mut dyn Codec) -> Ret,
    ) -> Result<Ret> {
        let sequence = self.next_sequence();
        let header_reserve = self.transport.header_reserve_size();

        let mut outbound = PooledBuffer::new(&self.factory, capacity)?;
        {
            let mut codec = BasicCodec::writer(&mut outbound, header_reserve, self.config);
            codec.start_write_message(MessageType::Invocation, service_id, method_id, sequence);
            write_args(&mut codec);
            codec.finish()?;
            let used = codec.position();
            drop(codec);
            outbound.set_used(used);
        }
        self.transport.send(&outbound)?;
        drop(outbound);

        let mut inbound = PooledBuffer::new(&self.factory, capacity)?;
        self.transport.receive(&mut inbound)?;

        let result = {
            let mut codec = BasicCodec::reader(&mut inbound, header_reserve, self.config);
            let header = codec.start_read_message();
            codec.finish()?;
            let header = header.ok_or(RpcError::Fail)?;
            if header.message_type != MessageType::Reply
                || header.service != service_id
                || header.request != method_id
                || header.sequence != sequence
            {
                return Err(RpcError::ExpectedReply {
                    expected_service: service_id,
                    expected_request: method_id,
                    expected_sequence: sequence,
                    actual_service: header.service,
                    actual_request: header.request,
                    actual_sequence: header.sequence,
                });
            }
            let value = read_reply(&mut codec);
            codec.finish()?;
            value
        };
        drop(inbound);
        Ok(result)
    }

    /// Issue a `Oneway` call: send and return, with no reply expected.
    pub fn notify(&mut self, service_id: u8, method_id: u8, capacity: usize, write_args: impl FnOnce(&mut dyn Codec)) -> Result<()> {
        let sequence = self.next_sequence();
        let header_reserve = self.transport.header_reserve_size();

        let mut outbound = PooledBuffer::new(&self.factory, capacity)?;
        {
            let mut codec = BasicCodec::writer(&mut outbound, header_reserve, self.config);
            codec.start_write_message(MessageType::Oneway, service_id, method_id, sequence);
            write_args(&mut codec);
            codec.finish()?;
            let used = codec.position();
            drop(codec);
            outbound.set_used(used);
        }
        self.transport.send(&outbound)?;
        drop(outbound);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DynamicBufferFactory;
    use crate::transport::inter_thread::InterThreadTransport;

    #[test]
    fn invoke_round_trips_through_a_stub_server() {
        let (client_transport, server_transport) = InterThreadTransport::pair();
        let mut client = ClientManager::new(client_transport, DynamicBufferFactory);

        let server_thread = std::thread::spawn(move || {
            let mut transport = server_transport;
            let mut inbound = crate::buffer::MessageBuffer::with_capacity(64);
            transport.receive(&mut inbound).unwrap();

            let mut outbound = crate::buffer::MessageBuffer::with_capacity(64);
            {
                let mut reader = BasicCodec::reader(&mut inbound, 0, CodecConfig::default());
                let header = reader.start_read_message().unwrap();
                let a = reader.read_i32();
                let b = reader.read_i32();
                reader.finish().unwrap();

                let mut writer = BasicCodec::writer(&mut outbound, 0, CodecConfig::default());
                writer.start_write_message(MessageType::Reply, header.service, header.request, header.sequence);
                writer.write_i32(a + b);
                writer.finish().unwrap();
                let used = writer.position();
                outbound.set_used(used);
            }
            transport.send(&outbound).unwrap();
        });

        let sum = client
            .invoke(
                1,
                2,
                64,
                |codec| {
                    codec.write_i32(3);
                    codec.write_i32(4);
                },
                |codec| codec.read_i32(),
            )
            .unwrap();
        assert_eq!(sum, 7);
        server_thread.join().unwrap();
    }

    #[test]
    fn reply_for_wrong_method_is_expected_reply_error() {
        let (client_transport, server_transport) = InterThreadTransport::pair();
        let mut client = ClientManager::new(client_transport, DynamicBufferFactory);

        let server_thread = std::thread::spawn(move || {
            let mut transport = server_transport;
            let mut inbound = crate::buffer::MessageBuffer::with_capacity(64);
            transport.receive(&mut inbound).unwrap();

            let mut outbound = crate::buffer::MessageBuffer::with_capacity(64);
            let mut writer = BasicCodec::writer(&mut outbound, 0, CodecConfig::default());
            writer.start_write_message(MessageType::Reply, 99, 99, 0);
            writer.finish().unwrap();
            let used = writer.position();
            outbound.set_used(used);
            transport.send(&outbound).unwrap();
        });

        let err = client.invoke(1, 2, 64, |_| {}, |_: &mut dyn Codec| ()).unwrap_err();
        assert!(matches!(err, RpcError::ExpectedReply { .. }));
        server_thread.join().unwrap();
    }

    #[test]
    fn notify_does_not_wait_for_a_reply() {
        let (client_transport, server_transport) = InterThreadTransport::pair();
        let mut client = ClientManager::new(client_transport, DynamicBufferFactory);

        client.notify(1, 5, 64, |codec| codec.write_u8(42)).unwrap();

        let mut server_transport = server_transport;
        let mut inbound = crate::buffer::MessageBuffer::with_capacity(64);
        server_transport.receive(&mut inbound).unwrap();
        let mut reader = BasicCodec::reader(&mut inbound, 0, CodecConfig::default());
        let header = reader.start_read_message().unwrap();
        assert_eq!(header.message_type, MessageType::Oneway);
        assert_eq!(reader.read_u8(), 42);
    }
}
