//! Timeout utilities for agent I/O
//!
//! Deadlines are served by a sleeper thread rather than compio's timer.
//! compio-runtime 0.3 keeps its timers in a max-heap and leaves cancelled
//! entries in it, so a timer only fires once the latest timer ever armed on
//! the same runtime has expired. A deadline here holds no matter what else
//! the runtime is sleeping on.

use crate::error::{Result, VantageError};
use futures::future::{select, Either};
use futures::FutureExt;
use std::future::Future;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// A one-shot deadline. Dropping it disarms the sleeper thread.
struct Alarm {
    fired: flume::Receiver<()>,
    _disarm: flume::Sender<()>,
}

impl Alarm {
    fn arm(after: Duration) -> io::Result<Self> {
        let (disarm_tx, disarm_rx) = flume::bounded::<()>(0);
        let (fire_tx, fire_rx) = flume::bounded(1);

        thread::Builder::new()
            .name("vantage-alarm".to_owned())
            .spawn(move || {
                if let Err(flume::RecvTimeoutError::Timeout) = disarm_rx.recv_timeout(after) {
                    let _ = fire_tx.send(());
                }
            })?;

        Ok(Self {
            fired: fire_rx,
            _disarm: disarm_tx,
        })
    }

    async fn expired(&self) {
        // the sleeper only exits without firing once we are dropped
        if self.fired.recv_async().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Race `fut` against an alarm set `after` from now.
///
/// `None` means the alarm rang first.
async fn race<F: Future>(after: Duration, fut: F) -> io::Result<Option<F::Output>> {
    let alarm = Alarm::arm(after)?;
    let expired = alarm.expired();
    futures::pin_mut!(fut);
    futures::pin_mut!(expired);

    Ok(match select(fut, expired).await {
        Either::Left((out, _)) => Some(out),
        Either::Right(((), _)) => None,
    })
}

/// Run `fut` with an optional deadline.
///
/// # Arguments
///
/// * `duration` - Maximum time to wait
///    - `None`: Block indefinitely (no timeout)
///    - `Some(duration)`: Wait up to duration
/// * `op` - Name of the step, used in the `TimedOut` error
///
/// # Returns
///
/// * The future's own result if it completed in time
/// * `Err(VantageError::TimedOut)` if the deadline elapsed first
pub async fn with_timeout<F, T>(duration: Option<Duration>, op: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match duration {
        None => fut.await,
        Some(d) => match race(d, fut).await? {
            Some(result) => result,
            None => Err(VantageError::TimedOut { op, after: d }),
        },
    }
}

/// Wait for `fut` until an optional deadline, reporting whether it finished.
///
/// Unlike [`with_timeout`] the output is not an error type; used when
/// waiting on completion signals. `Ok(None)` means the deadline passed.
pub async fn wait_until<F>(deadline: Option<Instant>, fut: F) -> io::Result<Option<F::Output>>
where
    F: Future,
{
    match deadline {
        None => Ok(Some(fut.await)),
        Some(at) => {
            let remaining = at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(fut.now_or_never());
            }
            race(remaining, fut).await
        }
    }
}
