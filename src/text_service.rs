//! `TextService`: a hand-written stand-in for a generated interface stub,
//! exercising the client/server runtime the way a code generator's output
//! would (spec §1). Grounded on the `hello_world` example's
//! `TextService_interface` (`printText`, `stopServer`) from
//! `examples/hello_world/c/main_server.cpp`/`main_client.cpp`.

use crate::buffer::MessageBuffer;
use crate::client::ClientManager;
use crate::codec::{BasicCodec, Codec, CodecConfig, MessageType};
use crate::error::Result;
use crate::pool::{MessageBufferFactory, PooledBuffer};
use crate::service::{Invocation, Service};
use crate::transport::Transport;

/// Unique id this interface registers under in a [`crate::service::ServiceTable`].
pub const SERVICE_ID: u8 = 1;
/// `printText(text) -> bool`, an `Invocation`.
pub const PRINT_TEXT_METHOD: u8 = 1;
/// `stopServer()`, a `Oneway`.
pub const STOP_SERVER_METHOD: u8 = 2;

/// Buffer capacity large enough for any `TextService` call this module makes.
pub const MESSAGE_CAPACITY: usize = 512;

/// User-code counterpart of the C example's `TextService` class: decides what
/// happens when a peer calls `printText`/`stopServer`.
pub trait TextServiceHandler: Send + Sync {
    fn print_text(&self, text: &str) -> bool;
    fn stop_server(&self);
}

/// The server-side entry point a code generator would emit for this
/// interface: decodes arguments, calls `handler`, encodes the reply.
pub struct TextService<H> {
    handler: H,
}

impl<H: TextServiceHandler> TextService<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl<H: TextServiceHandler> Service for TextService<H> {
    fn service_id(&self) -> u8 {
        SERVICE_ID
    }

    fn handle_invocation(&self, invocation: Invocation<'_>) -> Result<Option<MessageBuffer>> {
        match invocation.method_id {
            PRINT_TEXT_METHOD => {
                let text = invocation.codec.read_string();
                invocation.codec.finish()?;
                let ok = self.handler.print_text(&text);
                if invocation.message_type != MessageType::Invocation {
                    return Ok(None);
                }
                let mut reply = PooledBuffer::new(invocation.factory, MESSAGE_CAPACITY)?;
                let mut writer = BasicCodec::writer(&mut reply, invocation.header_reserve, CodecConfig::default());
                writer.start_write_message(MessageType::Reply, SERVICE_ID, PRINT_TEXT_METHOD, invocation.sequence);
                writer.write_bool(ok);
                writer.finish()?;
                let used = writer.position();
                drop(writer);
                reply.set_used(used);
                Ok(Some(reply.into_inner()))
            }
            STOP_SERVER_METHOD => {
                invocation.codec.finish()?;
                self.handler.stop_server();
                Ok(None)
            }
            other => Err(crate::error::RpcError::InvalidArgument(format!(
                "TextService has no method {other}"
            ))),
        }
    }
}

/// Stub the code generator would emit for the client side: call `printText`
/// and block for its boolean reply.
pub fn print_text<T: Transport, F: MessageBufferFactory>(client: &mut ClientManager<T, F>, text: &str) -> Result<bool> {
    client.invoke(
        SERVICE_ID,
        PRINT_TEXT_METHOD,
        MESSAGE_CAPACITY,
        |codec| codec.write_string(text),
        |codec| codec.read_bool(),
    )
}

/// Stub for `stopServer()`: a fire-and-forget `Oneway` call.
pub fn stop_server<T: Transport, F: MessageBufferFactory>(client: &mut ClientManager<T, F>) -> Result<()> {
    client.notify(SERVICE_ID, STOP_SERVER_METHOD, MESSAGE_CAPACITY, |_| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DynamicBufferFactory;
    use crate::server::Server;
    use crate::transport::inter_thread::InterThreadTransport;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct RecordingHandler {
        seen: Arc<std::sync::Mutex<Vec<String>>>,
        stopped: Arc<AtomicBool>,
    }

    impl TextServiceHandler for RecordingHandler {
        fn print_text(&self, text: &str) -> bool {
            self.seen.lock().unwrap().push(text.to_string());
            true
        }

        fn stop_server(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn print_text_reaches_the_handler_and_returns_its_result() {
        let (client_transport, server_transport) = InterThreadTransport::pair();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));

        let mut server = Server::new(server_transport, DynamicBufferFactory, MESSAGE_CAPACITY);
        server.services_mut().add_service(Box::new(TextService::new(RecordingHandler {
            seen: Arc::clone(&seen),
            stopped: Arc::clone(&stopped),
        })));
        let server_thread = std::thread::spawn(move || server.poll().unwrap());

        let mut client = ClientManager::new(client_transport, DynamicBufferFactory);
        let ok = print_text(&mut client, "Hello world!").unwrap();
        server_thread.join().unwrap();

        assert!(ok);
        assert_eq!(seen.lock().unwrap().as_slice(), ["Hello world!"]);
        assert!(!stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_server_is_oneway_and_does_not_block() {
        let (client_transport, server_transport) = InterThreadTransport::pair();
        let stopped = Arc::new(AtomicBool::new(false));

        let mut server = Server::new(server_transport, DynamicBufferFactory, MESSAGE_CAPACITY);
        server.services_mut().add_service(Box::new(TextService::new(RecordingHandler {
            seen: Arc::new(std::sync::Mutex::new(Vec::new())),
            stopped: Arc::clone(&stopped),
        })));
        let server_thread = std::thread::spawn(move || server.poll().unwrap());

        let mut client = ClientManager::new(client_transport, DynamicBufferFactory);
        stop_server(&mut client).unwrap();
        server_thread.join().unwrap();

        assert!(stopped.load(Ordering::SeqCst));
    }
}
