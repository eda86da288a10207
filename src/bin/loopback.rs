//! Loopback Demo
//!
//! Runs a TCP echo server and client on the loopback interface, relays the
//! echoed bytes through a queue, signals completion with an event and plays
//! the payload out on a converter.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kernel_io::{
    config::AppConfig,
    network::{Address, Socket, SocketKind},
    sync::{Event, Queue},
    Converter,
};

const EVENT_ECHOED: u32 = 0x1;
const EVENT_DONE: u32 = 0x2;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting loopback demo");

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => AppConfig::load_or_default()?,
    };

    // Server: accept one connection and echo until the peer closes
    let listener = Socket::open_configured(SocketKind::Stream, &config.socket)?;
    listener.bind(&Address::localhost(0))?;
    listener.listen(config.socket.default_backlog)?;
    let server_addr = listener.local_addr()?;
    tracing::info!("Echo server listening on {}", server_addr);

    let server = thread::Builder::new()
        .name("echo-server".into())
        .spawn(move || -> Result<u64> {
            let conn = listener.accept()?;
            let mut echoed = 0u64;
            loop {
                let data = conn.recv(512)?;
                if data.is_empty() {
                    break;
                }
                echoed += conn.sendall(&data)? as u64;
            }
            conn.close()?;
            Ok(echoed)
        })?;

    let queue = Arc::new(Queue::with_config(&config.queue)?);
    let event = Arc::new(Event::new());

    // Consumer: drain the queue into the converter
    let player = {
        let queue = Arc::clone(&queue);
        let event = Arc::clone(&event);
        let converter = Converter::from_config(&config.converter)?;
        thread::Builder::new()
            .name("player".into())
            .spawn(move || -> Result<usize> {
                event.read_mask(EVENT_ECHOED)?;
                let mut played = 0;
                while let Ok(chunk) = queue.read(config.queue.capacity) {
                    converter.async_convert(chunk.clone())?;
                    played += chunk.len();
                }
                converter.async_wait()?;
                event.write(EVENT_DONE)?;
                Ok(played)
            })?
    };

    // Client: send a payload and push the echo into the queue
    let started = Instant::now();
    let client = Socket::open(SocketKind::Stream)?;
    client.connect(&server_addr)?;

    let payload: Vec<u8> = (0u8..32).collect();
    client.sendall(&payload)?;

    let mut received = 0;
    while received < payload.len() {
        let data = client.recv(payload.len() - received)?;
        if data.is_empty() {
            break;
        }
        received += data.len();
        queue.write(&data)?;
        event.write(EVENT_ECHOED)?;
    }
    client.close()?;
    queue.close();

    event.read_mask(EVENT_DONE)?;

    let echoed = server
        .join()
        .map_err(|_| anyhow::anyhow!("echo server panicked"))??;
    let played = player
        .join()
        .map_err(|_| anyhow::anyhow!("player panicked"))??;

    println!("\n=== Loopback Summary ===");
    println!("  Echoed:  {} bytes", echoed);
    println!("  Played:  {} samples", played);
    println!("  Queue:   {:?}", queue.stats());
    println!("  Elapsed: {:.1?}", started.elapsed());

    Ok(())
}
