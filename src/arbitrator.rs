//! `ArbitratedClient`: demultiplexes a single shared transport between an
//! outbound client and an inbound server (spec §4.7), grounded on eRPC's
//! `erpc_arbitrated_client_manager.cpp` pending-reply table and dedicated
//! reader thread.
//!
//! Built specifically over [`crate::transport::inter_thread::InterThreadTransport`]'s
//! split sender/receiver halves (spec §4.4.2: inter-thread is "the one
//! non-framed transport built as part of the core contract... required by
//! §4.7's arbitrated-client model"), rather than generically over
//! [`crate::transport::Transport`] — a shared byte stream's single `&mut self`
//! `send`/`receive` pair cannot otherwise be split between a dedicated reader
//! thread and concurrent client-thread writers without serializing reads
//! behind writes, which is exactly the contention §4.7 rules out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::buffer::MessageBuffer;
use crate::codec::{BasicCodec, Codec, CodecConfig, MessageType};
use crate::error::{Result, RpcError};
use crate::pool::{MessageBufferFactory, PooledBuffer};
use crate::service::{Invocation, ServiceTable};
use crate::transport::inter_thread::{FrameReceiver, FrameSender};

#[derive(Default)]
struct PendingSlot {
    reply: Mutex<Option<MessageBuffer>>,
    ready: Condvar,
}

struct Shared<F> {
    sender: FrameSender,
    factory: F,
    sequence: AtomicU32,
    config: CodecConfig,
    pending: Mutex<HashMap<u32, Arc<PendingSlot>>>,
    services: Mutex<ServiceTable>,
}

/// A client/server pair sharing one [`crate::transport::inter_thread::InterThreadTransport`].
/// Cloning shares the same pending-reply table, sequence counter, and service
/// table — clone to hand one instance to each client thread (spec §5 mode 3).
pub struct ArbitratedClient<F> {
    shared: Arc<Shared<F>>,
}

impl<F> Clone for ArbitratedClient<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: MessageBufferFactory> ArbitratedClient<F> {
    pub fn new(sender: FrameSender, factory: F) -> Self {
        Self {
            shared: Arc::new(Shared {
                sender,
                factory,
                sequence: AtomicU32::new(0),
                config: CodecConfig::default(),
                pending: Mutex::new(HashMap::new()),
                services: Mutex::new(ServiceTable::new()),
            }),
        }
    }

    /// Register a service to handle inbound `Invocation`/`Oneway`/
    /// `Notification` messages the peer sends on this shared transport (e.g.
    /// callbacks). Call only before [`ArbitratedClient::run_arbitrator`]
    /// starts, or from a quiescent thread (spec §4.6).
    pub fn add_service(&self, service: Box<dyn crate::service::Service>) {
        self.shared.services.lock().add_service(service);
    }

    /// The single dedicated reader loop (spec §4.7). Takes ownership of the
    /// transport's receive half; run it on its own thread. Returns cleanly
    /// when the peer drops its end of the channel.
    pub fn run_arbitrator(&self, mut receiver: FrameReceiver, message_capacity: usize) -> Result<()> {
        loop {
            let raw = match receiver.recv_frame() {
                Ok(raw) => raw,
                Err(RpcError::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err),
            };
            self.dispatch_frame(raw, message_capacity);
        }
    }

    fn dispatch_frame(&self, raw: Vec<u8>, message_capacity: usize) {
        let mut inbound = MessageBuffer::from_vec(raw.clone());
        inbound.set_used(raw.len());

        let header = {
            let mut codec = BasicCodec::reader(&mut inbound, 0, self.shared.config);
            let header = codec.start_read_message();
            if codec.finish().is_err() {
                warn!("arbitrator dropping message with unreadable header");
                return;
            }
            header
        };
        let Some(header) = header else { return };

        match header.message_type {
            MessageType::Reply => {
                // Exactly one response buffer is delivered per sequence;
                // a missing or already-served entry is a silent drop (spec §4.7).
                let slot = self.shared.pending.lock().remove(&header.sequence);
                if let Some(slot) = slot {
                    *slot.reply.lock() = Some(inbound);
                    slot.ready.notify_one();
                }
            }
            MessageType::Invocation | MessageType::Oneway | MessageType::Notification => {
                self.dispatch_local(&mut inbound, header.service, header.request, header.message_type, header.sequence, message_capacity);
            }
        }
    }

    fn dispatch_local(
        &self,
        inbound: &mut MessageBuffer,
        service_id: u8,
        method_id: u8,
        message_type: MessageType,
        sequence: u32,
        message_capacity: usize,
    ) {
        let services = self.shared.services.lock();
        let reply = match services.find(service_id) {
            None => {
                if message_type == MessageType::Invocation {
                    self.build_error_reply(service_id, method_id, sequence, message_capacity)
                } else {
                    None
                }
            }
            Some(service) => {
                let factory = &self.shared.factory;
                let mut codec = BasicCodec::reader(inbound, 0, self.shared.config);
                codec.start_read_message();
                let invocation = Invocation {
                    method_id,
                    message_type,
                    sequence,
                    codec: &mut codec,
                    factory,
                    header_reserve: 0,
                };
                match service.handle_invocation(invocation) {
                    Ok(reply) => reply.map(|buffer| PooledBuffer::adopt(factory, buffer)),
                    Err(err) if message_type == MessageType::Invocation => {
                        warn!(error = %err, "arbitrated service failed to handle invocation");
                        drop(codec);
                        self.build_error_reply(service_id, method_id, sequence, message_capacity)
                    }
                    Err(_) => None,
                }
            }
        };
        drop(services);

        if let Some(reply) = reply {
            if let Err(err) = self.shared.sender.send_frame(reply.used_slice()) {
                warn!(error = %err, "arbitrator failed to send local reply");
            }
        }
    }

    fn build_error_reply(&self, service: u8, request: u8, sequence: u32, message_capacity: usize) -> Option<PooledBuffer<'_>> {
        let mut buffer = PooledBuffer::new(&self.shared.factory, message_capacity).ok()?;
        let mut codec = BasicCodec::writer(&mut buffer, 0, self.shared.config);
        codec.start_write_message(MessageType::Reply, service, request, sequence);
        codec.finish().ok()?;
        let used = codec.position();
        drop(codec);
        buffer.set_used(used);
        Some(buffer)
    }

    /// Issue an `Invocation` and block for its `Reply`, or [`RpcError::Timeout`]
    /// if `timeout` elapses first. Registers the pending-reply entry before
    /// sending, as the spec's race-free ordering requires (spec §4.7).
    pub fn invoke<Ret>(
        &self,
        service_id: u8,
        method_id: u8,
        capacity: usize,
        timeout: Option<Duration>,
        write_args: impl FnOnce(&mut dyn Codec),
        read_reply: impl FnOnce(&mut dyn Codec) -> Ret,
    ) -> Result<Ret> {
        let sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(PendingSlot::default());
        self.shared.pending.lock().insert(sequence, Arc::clone(&slot));

        let mut outbound = PooledBuffer::new(&self.shared.factory, capacity)?;
        {
            let mut codec = BasicCodec::writer(&mut outbound, 0, self.shared.config);
            codec.start_write_message(MessageType::Invocation, service_id, method_id, sequence);
            write_args(&mut codec);
            if let Err(err) = codec.finish() {
                self.shared.pending.lock().remove(&sequence);
                return Err(err);
            }
            let used = codec.position();
            drop(codec);
            outbound.set_used(used);
        }
        if let Err(err) = self.shared.sender.send_frame(outbound.used_slice()) {
            self.shared.pending.lock().remove(&sequence);
            return Err(err);
        }
        drop(outbound);

        let mut guard = slot.reply.lock();
        let mut inbound = loop {
            if let Some(buffer) = guard.take() {
                break buffer;
            }
            let timed_out = match timeout {
                Some(duration) => slot.ready.wait_for(&mut guard, duration).timed_out(),
                None => {
                    slot.ready.wait(&mut guard);
                    false
                }
            };
            if timed_out && guard.is_none() {
                self.shared.pending.lock().remove(&sequence);
                return Err(RpcError::Timeout);
            }
        };
        drop(guard);

        let mut codec = BasicCodec::reader(&mut inbound, 0, self.shared.config);
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
        Ok(value)
    }

    /// Issue a `Oneway` call with no reply expected.
    pub fn notify(&self, service_id: u8, method_id: u8, capacity: usize, write_args: impl FnOnce(&mut dyn Codec)) -> Result<()> {
        let sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
        let mut outbound = PooledBuffer::new(&self.shared.factory, capacity)?;
        let mut codec = BasicCodec::writer(&mut outbound, 0, self.shared.config);
        codec.start_write_message(MessageType::Oneway, service_id, method_id, sequence);
        write_args(&mut codec);
        codec.finish()?;
        let used = codec.position();
        drop(codec);
        outbound.set_used(used);
        self.shared.sender.send_frame(outbound.used_slice())?;
        drop(outbound);
        Ok(())
    }
}
