//! Hand-written counterpart of the `hello_world` C example's
//! `main_server.cpp`: binds a TCP listener, serves one connection with
//! `TextService`, and stops when the client calls `stopServer()`.

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use erpc_core::pool::DynamicBufferFactory;
use erpc_core::server::Server;
use erpc_core::text_service::{TextService, TextServiceHandler};
use erpc_core::transport::framed::FramedTransport;

const PORT: u16 = 5544;

struct PrintlnHandler {
    run: Arc<AtomicBool>,
}

impl TextServiceHandler for PrintlnHandler {
    fn print_text(&self, text: &str) -> bool {
        println!("{text}");
        true
    }

    fn stop_server(&self) {
        self.run.store(false, Ordering::SeqCst);
    }
}

fn main() -> std::io::Result<()> {
    erpc_core::logging::init_tracing();

    let listener = TcpListener::bind(("127.0.0.1", PORT))?;
    tracing::info!(port = PORT, "eRPC hello_world server listening");

    let (stream, peer) = listener.accept()?;
    tracing::info!(%peer, "client connected");

    let run = Arc::new(AtomicBool::new(true));
    let transport = FramedTransport::new(stream);
    let mut server = Server::new(transport, DynamicBufferFactory, erpc_core::text_service::MESSAGE_CAPACITY + 64);
    server
        .services_mut()
        .add_service(Box::new(TextService::new(PrintlnHandler { run: Arc::clone(&run) })));

    while run.load(Ordering::SeqCst) {
        if let Err(err) = server.poll() {
            tracing::warn!(error = %err, "server stopping");
            break;
        }
    }
    Ok(())
}
