//! Fixed-document HTTP backend for exercising the relay.
//!
//! Run with: cargo run --example static_backend [PORT]
//!
//! Serves the same document for every request and closes the connection
//! after responding, which is exactly the end-of-stream signal the relay's
//! forwarder waits for. Pair it with a relay socket named for the port,
//! e.g. `static-3000.sock`.

use std::io::{Read, Write};
use std::net::TcpListener;

const DOCUMENT: &str = "<html><body><h1>sockbridge static backend</h1></body></html>\n";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port: u16 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 3000,
    };

    let listener = TcpListener::bind(("127.0.0.1", port))?;
    println!("Serving one document on 127.0.0.1:{}", port);

    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                eprintln!("accept failed: {}", e);
                continue;
            }
        };

        // Drain one request chunk; the content is irrelevant
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf);

        let response = format!(
            "HTTP/1.0 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{}",
            DOCUMENT.len(),
            DOCUMENT
        );
        if let Err(e) = stream.write_all(response.as_bytes()) {
            eprintln!("write failed: {}", e);
        }
        // dropping the stream closes the connection and ends the reply
    }

    Ok(())
}
