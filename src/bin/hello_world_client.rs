//! Hand-written counterpart of the `hello_world` C example's
//! `main_client.cpp`: connects to the server, sends a few strings through
//! `printText`, then asks the server to stop.

use std::net::TcpStream;

use erpc_core::client::ClientManager;
use erpc_core::pool::DynamicBufferFactory;
use erpc_core::text_service;
use erpc_core::transport::framed::FramedTransport;

const PORT: u16 = 5544;

fn main() -> std::io::Result<()> {
    erpc_core::logging::init_tracing();

    let stream = TcpStream::connect(("127.0.0.1", PORT))?;
    let transport = FramedTransport::new(stream);
    let mut client = ClientManager::new(transport, DynamicBufferFactory);

    for line in ["Hello world!", "This is the eRPC Rust runtime.", "Goodbye!"] {
        match text_service::print_text(&mut client, line) {
            Ok(ok) => tracing::info!(line, ok, "printText replied"),
            Err(err) => {
                tracing::error!(error = %err, "printText failed");
                return Ok(());
            }
        }
    }

    if let Err(err) = text_service::stop_server(&mut client) {
        tracing::error!(error = %err, "stopServer failed");
    }
    Ok(())
}
