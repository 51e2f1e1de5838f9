//! `Server`: the receive-dispatch loop (spec §4.6), grounded on
//! `erpc_server.cpp`'s `Server::run`/`Server::runOnce`.

use tracing::{debug, warn};

use crate::codec::{BasicCodec, Codec, CodecConfig, MessageType};
use crate::error::{Result, RpcError};
use crate::pool::{MessageBufferFactory, PooledBuffer};
use crate::service::{Invocation, ServiceTable};
use crate::transport::Transport;

/// Owns a transport, a buffer factory, and a [`ServiceTable`], and drives the
/// receive/dispatch loop described in spec §4.6.
pub struct Server<T, F> {
    transport: T,
    factory: F,
    services: ServiceTable,
    config: CodecConfig,
    message_capacity: usize,
}

impl<T: Transport, F: MessageBufferFactory> Server<T, F> {
    pub fn new(transport: T, factory: F, message_capacity: usize) -> Self {
        Self {
            transport,
            factory,
            services: ServiceTable::new(),
            config: CodecConfig::default(),
            message_capacity,
        }
    }

    pub fn services_mut(&mut self) -> &mut ServiceTable {
        &mut self.services
    }

    /// Run the receive/dispatch loop until the peer closes the connection,
    /// then return cleanly (spec §4.6 step 1).
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.poll() {
                Ok(()) => continue,
                Err(RpcError::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Receive and dispatch exactly one message.
    pub fn poll(&mut self) -> Result<()> {
        let header_reserve = self.transport.header_reserve_size();
        let mut inbound = PooledBuffer::new(&self.factory, self.message_capacity)?;
        self.transport.receive(&mut inbound)?;

        let header = {
            let mut codec = BasicCodec::reader(&mut inbound, header_reserve, self.config);
            let header = codec.start_read_message();
            match codec.finish() {
                Ok(()) => header,
                Err(RpcError::InvalidMessageVersion { .. }) => {
                    // Wrong version: no reply, continue (spec §4.6 step 2).
                    warn!("dropping message with unexpected codec version");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        };
        let header = header.expect("finish() returned Ok so header decode succeeded");

        debug!(service = header.service, request = header.request, sequence = header.sequence, "dispatching");

        let factory = &self.factory;
        let reply = match self.services.find(header.service) {
            None => {
                if header.message_type == MessageType::Invocation {
                    Some(Self::build_error_reply(
                        factory,
                        self.config,
                        self.message_capacity,
                        header.service,
                        header.request,
                        header.sequence,
                        header_reserve,
                    )?)
                } else {
                    None
                }
            }
            Some(service) => {
                let outcome = {
                    let mut codec = BasicCodec::reader(&mut inbound, header_reserve, self.config);
                    // Re-read the header to position the cursor past it for the service.
                    codec.start_read_message();
                    let invocation = Invocation {
                        method_id: header.request,
                        message_type: header.message_type,
                        sequence: header.sequence,
                        codec: &mut codec,
                        factory,
                        header_reserve,
                    };
                    service.handle_invocation(invocation)
                };
                match outcome {
                    Ok(reply) => reply.map(|buffer| PooledBuffer::adopt(factory, buffer)),
                    Err(err) if header.message_type == MessageType::Invocation => {
                        warn!(error = %err, "service failed to handle invocation");
                        Some(Self::build_error_reply(
                            factory,
                            self.config,
                            self.message_capacity,
                            header.service,
                            header.request,
                            header.sequence,
                            header_reserve,
                        )?)
                    }
                    Err(_) => None,
                }
            }
        };
        drop(inbound);

        if let Some(reply) = reply {
            self.transport.send(&reply)?;
        }
        Ok(())
    }

    /// A rudimentary error reply: same header fields as the failed call,
    /// `Reply` type, sequence preserved, an empty body (spec §4.6: "SHOULD
    /// still return a reply message with a rudimentary error header ... so
    /// the client does not block"). Takes `factory` by reference rather than
    /// `&self` so the returned [`PooledBuffer`] only borrows the factory
    /// field, not the whole `Server` — `poll` still needs `&mut self.transport`
    /// alongside the reply.
    fn build_error_reply(
        factory: &F,
        config: CodecConfig,
        message_capacity: usize,
        service: u8,
        request: u8,
        sequence: u32,
        header_reserve: usize,
    ) -> Result<PooledBuffer<'_>> {
        let mut buffer = PooledBuffer::new(factory, message_capacity)?;
        let mut codec = BasicCodec::writer(&mut buffer, header_reserve, config);
        codec.start_write_message(MessageType::Reply, service, request, sequence);
        codec.finish()?;
        let used = codec.position();
        drop(codec);
        buffer.set_used(used);
        Ok(buffer)
    }
}
