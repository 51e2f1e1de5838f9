//! End-to-end smoke test over a real TCP socket: a server thread serving
//! `TextService` and a client in the test thread calling `printText` then
//! `stopServer`, exercising `FramedTransport` the way a real deployment would
//! (as opposed to the in-process `InterThreadTransport` the unit tests use).

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use erpc_core::client::ClientManager;
use erpc_core::pool::DynamicBufferFactory;
use erpc_core::server::Server;
use erpc_core::text_service::{self, TextService, TextServiceHandler, MESSAGE_CAPACITY};
use erpc_core::transport::framed::FramedTransport;

struct RecordingHandler {
    seen: Arc<Mutex<Vec<String>>>,
    run: Arc<AtomicBool>,
}

impl TextServiceHandler for RecordingHandler {
    fn print_text(&self, text: &str) -> bool {
        self.seen.lock().unwrap().push(text.to_string());
        true
    }

    fn stop_server(&self) {
        self.run.store(false, Ordering::SeqCst);
    }
}

#[test]
fn tcp_round_trip_print_text_then_stop() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let run = Arc::new(AtomicBool::new(true));
    let server_seen = Arc::clone(&seen);
    let server_run = Arc::clone(&run);

    let server_thread = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let transport = FramedTransport::new(stream);
        let mut server = Server::new(transport, DynamicBufferFactory, MESSAGE_CAPACITY + 64);
        server.services_mut().add_service(Box::new(TextService::new(RecordingHandler {
            seen: server_seen,
            run: server_run.clone(),
        })));
        while server_run.load(Ordering::SeqCst) {
            if server.poll().is_err() {
                break;
            }
        }
    });

    let stream = TcpStream::connect(addr).unwrap();
    let transport = FramedTransport::new(stream);
    let mut client = ClientManager::new(transport, DynamicBufferFactory);

    assert!(text_service::print_text(&mut client, "Hello world!").unwrap());
    assert!(text_service::print_text(&mut client, "Goodbye!").unwrap());
    text_service::stop_server(&mut client).unwrap();

    server_thread.join().unwrap();
    assert_eq!(seen.lock().unwrap().as_slice(), ["Hello world!", "Goodbye!"]);
}
