//! Fake agents for campaign tests.
//!
//! Agents use blocking `std::net` sockets on their own threads so they never
//! compete with the campaign's runtime.

#![allow(dead_code)]

use bytes::BytesMut;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use vantage::vpts::{encode_frame, FrameDecoder};

/// What an agent sends back after receiving the URL.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A well-formed page frame
    Page(Vec<u8>),
    /// Raw bytes, framed or not
    Raw(Vec<u8>),
    /// Nothing at all
    Silent,
}

/// Read one frame from a blocking socket.
pub fn read_url(stream: &mut TcpStream) -> Vec<u8> {
    let mut decoder = FrameDecoder::new();
    let mut acc = BytesMut::new();
    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).expect("agent read");
        assert!(n > 0, "coordinator closed before sending the url");
        acc.extend_from_slice(&buf[..n]);
        if let Some(url) = decoder.decode(&mut acc).expect("url frame") {
            return url.to_vec();
        }
    }
}

/// Connect, receive the URL, send `reply`, then hold the connection open
/// until the coordinator closes it. Returns the URL the agent was given.
pub fn spawn_agent(addr: SocketAddr, reply: Reply) -> JoinHandle<Vec<u8>> {
    spawn_agent_with(addr, reply, None)
}

/// Like [`spawn_agent`], signalling `replied` once the reply is on the wire.
pub fn spawn_agent_with(
    addr: SocketAddr,
    reply: Reply,
    replied: Option<mpsc::Sender<()>>,
) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).expect("agent connect");
        let url = read_url(&mut stream);

        match reply {
            Reply::Page(page) => stream.write_all(&encode_frame(&page)).expect("agent write"),
            Reply::Raw(raw) => stream.write_all(&raw).expect("agent write"),
            Reply::Silent => {}
        }
        if let Some(tx) = replied {
            let _ = tx.send(());
        }

        // Blocks until the coordinator shuts the connection down.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
        url
    })
}

/// Poll `cond` until it holds, panicking after ten seconds.
pub fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let start = Instant::now();
    while !cond() {
        assert!(start.elapsed() < Duration::from_secs(10), "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
