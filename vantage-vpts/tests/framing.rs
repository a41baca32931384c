//! Frame I/O over real loopback sockets.
//!
//! The far side of each connection is a plain blocking `std::net` socket on
//! its own thread, so its write pattern is fully under the test's control.

use std::io::{Read, Write};
use std::time::Duration;

use compio::net::TcpListener;
use vantage_vpts::{encode_frame, read_frame, write_frame, READ_SIZE};

/// Accept one connection while `peer` runs against the listener address.
async fn with_peer<F>(peer: F) -> (compio::net::TcpStream, std::thread::JoinHandle<Vec<u8>>)
where
    F: FnOnce(std::net::TcpStream) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = std::thread::spawn(move || {
        let stream = std::net::TcpStream::connect(addr).unwrap();
        peer(stream)
    });

    let (stream, _) = listener.accept().await.unwrap();
    (stream, handle)
}

#[compio::test]
async fn test_url_out_page_back() {
    let (mut stream, peer) = with_peer(|mut s| {
        let mut got = Vec::new();
        let mut buf = [0u8; 64];
        // "vpts{length=20}vpts" + 20 url bytes
        while got.len() < 39 {
            let n = s.read(&mut buf).unwrap();
            assert!(n > 0);
            got.extend_from_slice(&buf[..n]);
        }
        s.write_all(&encode_frame(b"<html>hi</html>")).unwrap();
        got
    })
    .await;

    let sent = write_frame(&mut stream, b"http://example.test/").await.unwrap();
    assert_eq!(sent, 39);

    let page = read_frame(&mut stream, READ_SIZE, None).await.unwrap();
    assert_eq!(&page[..], b"<html>hi</html>");

    let wire = peer.join().unwrap();
    assert_eq!(&wire[..], b"vpts{length=20}vptshttp://example.test/");
}

#[compio::test]
async fn test_dribbled_frame_with_split_markers() {
    let payload: Vec<u8> = b"}vpts".iter().copied().cycle().take(5000).collect();
    let expected = payload.clone();

    let (mut stream, peer) = with_peer(move |mut s| {
        s.set_nodelay(true).unwrap();
        let frame = encode_frame(&payload);
        let (head, body) = frame.split_at(40);
        for byte in head {
            s.write_all(&[*byte]).unwrap();
            std::thread::sleep(Duration::from_millis(1));
        }
        s.write_all(body).unwrap();
        Vec::new()
    })
    .await;

    let page = read_frame(&mut stream, 1, None).await.unwrap();
    assert_eq!(page.len(), 5000);
    assert_eq!(&page[..], &expected[..]);
    peer.join().unwrap();
}

#[compio::test]
async fn test_empty_page() {
    let (mut stream, peer) = with_peer(|mut s| {
        s.write_all(b"vpts{length=0}vpts").unwrap();
        Vec::new()
    })
    .await;

    let page = read_frame(&mut stream, READ_SIZE, None).await.unwrap();
    assert!(page.is_empty());
    peer.join().unwrap();
}

#[compio::test]
async fn test_peer_closes_before_declared_length() {
    let (mut stream, peer) = with_peer(|mut s| {
        s.write_all(b"vpts{length=100}vpts").unwrap();
        s.write_all(&[b'a'; 40]).unwrap();
        Vec::new()
    })
    .await;
    peer.join().unwrap();

    let err = read_frame(&mut stream, READ_SIZE, None).await.unwrap_err();
    assert!(err.is_protocol(), "{err}");
    assert!(err.to_string().contains("40 of 100"));
}

#[compio::test]
async fn test_peer_closes_without_header() {
    let (mut stream, peer) = with_peer(|mut s| {
        s.write_all(b"vpts{len").unwrap();
        Vec::new()
    })
    .await;
    peer.join().unwrap();

    let err = read_frame(&mut stream, READ_SIZE, None).await.unwrap_err();
    assert!(err.is_protocol());
}

#[compio::test]
async fn test_max_len_rejects_before_payload() {
    let (mut stream, peer) = with_peer(|mut s| {
        s.write_all(b"vpts{length=1048576}vpts").unwrap();
        Vec::new()
    })
    .await;

    let err = read_frame(&mut stream, READ_SIZE, Some(1024)).await.unwrap_err();
    assert!(err.is_protocol());
    assert!(err.to_string().contains("too large"));
    peer.join().unwrap();
}
