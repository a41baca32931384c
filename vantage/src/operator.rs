//! Operator cancellation.
//!
//! The accept loop listens on a cancellation channel alongside the socket.
//! A [`Canceller`] is the sending side; the stdin watcher owns one and
//! fires it when the operator enters a line ending in `q`. When every
//! canceller is dropped the channel disconnects, which the accept loop also
//! treats as a stop request.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Input that stops the accept loop: a line whose text ends in `q`.
pub const QUIT_TOKEN: &str = "q\n";

/// Receiving side consumed by [`Campaign::run`](crate::Campaign::run).
pub type CancelSignal = flume::Receiver<()>;

/// Sending side of the cancellation channel.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: flume::Sender<()>,
}

impl Canceller {
    /// Ask the accept loop to stop. Repeated calls are harmless.
    pub fn cancel(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Create a connected canceller / signal pair.
pub fn cancel_channel() -> (Canceller, CancelSignal) {
    let (tx, rx) = flume::bounded(1);
    (Canceller { tx }, rx)
}

/// True if `input`, read with its line terminators, contains the quit token.
pub fn is_quit(input: &str) -> bool {
    input.contains(QUIT_TOKEN)
}

/// Read operator lines until the quit token or end of input.
///
/// Blocks the calling thread. Fires `canceller` on the quit token; on end
/// of input or a read error it simply returns, dropping `canceller`.
pub fn watch_input<R: BufRead>(mut reader: R, canceller: Canceller) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) if is_quit(&line) => {
                info!("[Operator] quit requested");
                canceller.cancel();
                return;
            }
            Ok(_) => debug!("[Operator] ignoring input {:?}", line),
            Err(e) => {
                warn!("[Operator] input error: {}", e);
                return;
            }
        }
    }
    debug!("[Operator] input closed");
}

/// Watch stdin on a dedicated thread.
pub fn spawn_stdin_watcher(canceller: Canceller) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("vantage-operator".into())
        .spawn(move || watch_input(io::stdin().lock(), canceller))
}
