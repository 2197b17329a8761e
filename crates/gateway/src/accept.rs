// Path: crates/gateway/src/accept.rs

//! The telnet accept loop.
//!
//! One loop, one piece of state: the current backoff. Accept failures are
//! absorbed with a multiplicative delay so a poisoned socket (fd
//! exhaustion, conntrack pressure) cannot spin the process; a successful
//! accept resets the delay to zero. The sleep between retries races the
//! process-wide cancel, so a control-plane shutdown never waits out a
//! 30-second backoff.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INITIAL_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// The multiplicative accept-failure backoff.
///
/// The first failure after a success (or after start) waits exactly the
/// initial delay; each consecutive failure doubles it up to the cap.
#[derive(Debug, Default)]
pub struct AcceptBackoff {
    current: Option<Duration>,
}

impl AcceptBackoff {
    /// A fresh backoff with no failure recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure and returns the delay to wait before retrying.
    pub fn advance(&mut self) -> Duration {
        let next = match self.current {
            None => INITIAL_DELAY,
            Some(previous) => MAX_DELAY.min(previous * 2),
        };
        self.current = Some(next);
        next
    }

    /// Records a success; the next failure starts over at the initial delay.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Spawns the accept loop, converting a panic inside it into the
/// process-wide cancel rather than a crash-kill.
pub fn spawn_accept_loop<F>(
    listener: TcpListener,
    cancel: CancellationToken,
    on_connection: F,
) -> JoinHandle<()>
where
    F: FnMut(TcpStream, std::net::SocketAddr) + Send + 'static,
{
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            let looped =
                AssertUnwindSafe(accept_loop(listener, cancel.clone(), on_connection))
                    .catch_unwind()
                    .await;
            if looped.is_err() {
                tracing::error!("accept loop panicked, initiating orderly shutdown");
                cancel.cancel();
            }
        }
    })
}

/// Accepts until cancelled. Every suspension point races the cancel token.
async fn accept_loop<F>(listener: TcpListener, cancel: CancellationToken, mut on_connection: F)
where
    F: FnMut(TcpStream, std::net::SocketAddr),
{
    let mut backoff = AcceptBackoff::new();
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                backoff.reset();
                holomush_telemetry::gateway_metrics().inc_accepted();
                on_connection(stream, peer);
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    return;
                }
                let delay = backoff.advance();
                holomush_telemetry::gateway_metrics().inc_accept_error();
                tracing::warn!(error = %e, retry_in = ?delay, "accept failed");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_waits_exactly_the_initial_delay() {
        let mut backoff = AcceptBackoff::new();
        assert_eq!(backoff.advance(), Duration::from_millis(100));
    }

    #[test]
    fn consecutive_failures_double_up_to_the_cap() {
        let mut backoff = AcceptBackoff::new();
        let mut delays = Vec::new();
        for _ in 0..12 {
            delays.push(backoff.advance());
        }
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        // 100ms * 2^8 = 25.6s, the next doubling clamps.
        assert_eq!(delays[8], Duration::from_millis(25_600));
        assert_eq!(delays[9], Duration::from_secs(30));
        assert_eq!(delays[11], Duration::from_secs(30));

        // delay(n) <= min(100ms * 2^n, 30s) for every n.
        for (n, delay) in delays.iter().enumerate() {
            let bound = Duration::from_secs(30)
                .min(Duration::from_millis(100 * 2u64.saturating_pow(n as u32)));
            assert!(*delay <= bound, "delay {delay:?} exceeds bound {bound:?}");
        }
    }

    #[test]
    fn success_resets_to_the_initial_delay() {
        let mut backoff = AcceptBackoff::new();
        backoff.advance();
        backoff.advance();
        backoff.advance();
        backoff.reset();
        assert_eq!(backoff.advance(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn loop_hands_off_connections_and_exits_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let task = spawn_accept_loop(listener, cancel.clone(), move |_stream, peer| {
            let _ = tx.send(peer);
        });

        let _client = TcpStream::connect(addr).await.unwrap();
        let peer = rx.recv().await.unwrap();
        assert!(peer.ip().is_loopback());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop must exit promptly on cancel")
            .unwrap();
    }

    #[tokio::test]
    async fn handler_panic_cancels_the_process() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();

        let task = spawn_accept_loop(listener, cancel.clone(), |_stream, _peer| {
            panic!("handler blew up inside the loop");
        });

        let _client = TcpStream::connect(addr).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), cancel.cancelled())
            .await
            .expect("panic must convert into a cancel");
        let _ = task.await;
    }
}
