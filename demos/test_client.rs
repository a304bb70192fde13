//! Simple test client for the sockbridge relay.
//!
//! Run with: cargo run --example test_client -- <SOCKET_PATH>
//!
//! Expects a relay listening on the given socket with a backend behind it
//! (for example `cargo run --example static_backend` plus a relay on
//! `/tmp/static-3000.sock`).
//!
//! Tests:
//! 1. Single request/response round trip
//! 2. Several round trips on one connection
//! 3. Immediate close without sending

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sockbridge Relay Test Client ===\n");

    let socket_path = std::env::args()
        .nth(1)
        .ok_or("Usage: test_client <SOCKET_PATH>")?;

    // Test 1: single round trip
    println!("Test 1: single round trip");
    let mut stream = connect(&socket_path)?;
    stream.write_all(b"GET / HTTP/1.0\r\n\r\n")?;
    let reply = read_reply(&mut stream)?;
    println!("Reply ({} bytes):\n{}\n", reply.len(), String::from_utf8_lossy(&reply));
    drop(stream);

    // Test 2: several round trips on one connection
    println!("Test 2: several round trips on one connection");
    let mut stream = connect(&socket_path)?;
    for i in 1..=3 {
        stream.write_all(b"GET / HTTP/1.0\r\n\r\n")?;
        let reply = read_reply(&mut stream)?;
        println!("Round trip {}: {} bytes", i, reply.len());
    }
    drop(stream);
    println!();

    // Test 3: immediate close without sending
    println!("Test 3: immediate close without sending");
    let mut stream = connect(&socket_path)?;
    stream.shutdown(Shutdown::Write)?;
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf)?;
    println!(
        "Relay closed the connection cleanly: read returned {} bytes\n",
        n
    );

    println!("All tests completed.");
    Ok(())
}

fn connect(socket_path: &str) -> Result<UnixStream, Box<dyn std::error::Error>> {
    let stream = UnixStream::connect(socket_path)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;
    Ok(stream)
}

/// Read one reply. The relay writes the backend's whole reply in one go,
/// so a single bounded read captures it for these small replies.
fn read_reply(stream: &mut UnixStream) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut buf = vec![0u8; 64 * 1024];
    let n = stream.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}
