//! `Service`: the server-side counterpart of an interface (spec §3, §4.6),
//! grounded on `erpc_server.cpp`'s `Service`/`Server::findServiceWithId`
//! linked list, collapsed per spec §9 into an indexed `Vec` — "order of
//! registration must not affect dispatch semantics" is preserved; a linear
//! scan by `service_id` replaces the `next`-pointer walk.

use crate::buffer::MessageBuffer;
use crate::codec::{Codec, MessageType};
use crate::error::Result;
use crate::pool::MessageBufferFactory;

/// Everything a `Service::handle_invocation` implementation needs: which
/// method was called, under what message type and sequence, a codec already
/// positioned just past the message header ready to read arguments, and a
/// buffer factory to acquire an outbound buffer from if it needs to reply.
pub struct Invocation<'a> {
    pub method_id: u8,
    pub message_type: MessageType,
    pub sequence: u32,
    pub codec: &'a mut dyn Codec,
    pub factory: &'a dyn MessageBufferFactory,
    pub header_reserve: usize,
}

/// The server-side counterpart of one IDL interface: a unique `service_id`
/// and a method-id-keyed entry point. In generated code this would be the
/// `_service` class a code generator emits per interface; here it is
/// hand-written to play that role, exercising the runtime the way generated
/// code would (spec §1: "generated stubs [are] opaque callers of the codec
/// API").
///
/// `handle_invocation` reads the remaining arguments for `method_id`, calls
/// user code, and — for `Invocation` (never for `Oneway`) — writes a `Reply`
/// message (same service/method/sequence) into a freshly acquired buffer and
/// returns it for the server to send. Returning `Ok(None)` for an
/// `Invocation` means the implementation chose not to reply even though it
/// could have; the server does not second-guess this.
pub trait Service: Send + Sync {
    /// Unique id for this interface within a server (1..255; spec §3).
    fn service_id(&self) -> u8;

    fn handle_invocation(&self, invocation: Invocation<'_>) -> Result<Option<MessageBuffer>>;
}

/// An insertion-ordered table of registered services, linearly scanned by
/// id. Registration order never affects whether a lookup succeeds, only its
/// scan cost (spec §9 redesign note).
#[derive(Default)]
pub struct ServiceTable {
    services: Vec<Box<dyn Service>>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self { services: Vec::new() }
    }

    /// Append a service. Intended to be called only before the server
    /// starts, or from a quiescent thread (spec §4.6, §5).
    pub fn add_service(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    /// Remove the first service matching `service_id`, if any.
    pub fn remove_service(&mut self, service_id: u8) -> Option<Box<dyn Service>> {
        let index = self.services.iter().position(|s| s.service_id() == service_id)?;
        Some(self.services.remove(index))
    }

    /// Linear scan for a service by id (spec §3: "lookup is linear").
    pub fn find(&self, service_id: u8) -> Option<&dyn Service> {
        self.services
            .iter()
            .find(|s| s.service_id() == service_id)
            .map(|b| b.as_ref())
    }
}
