//! TCP server accepting telemetry connections from the simulation.
//!
//! The listener runs an unbounded accept loop and spawns one task per
//! accepted connection. Each task owns its connection exclusively: it reads
//! newline-delimited UTF-8 text, skips blank lines, decodes the rest, and
//! forwards each sample to the shared sink. A connection ends on peer close
//! (normal) or a read error (logged, local to that connection).

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::decoder::decode;
use crate::sink::TelemetrySink;
use crate::stats::IngestStats;

/// Default port the simulation connects to.
pub const DEFAULT_PORT: u16 = 5050;

/// Fatal server errors. Connection-level read faults are not represented
/// here: they terminate one connection and are only logged.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening endpoint could not be established.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The accept loop failed after the endpoint was established.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// Listening endpoint for telemetry connections.
pub struct TelemetryServer {
    listener: TcpListener,
}

impl TelemetryServer {
    /// Bind the listening endpoint.
    ///
    /// Fails with [`ServerError::Bind`] if the address is unavailable; the
    /// caller treats that as fatal.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self { listener })
    }

    /// The address the server is actually listening on.
    ///
    /// Differs from the requested address when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listening socket itself fails.
    ///
    /// Never returns under normal operation. Each accepted connection gets
    /// its own task; the accept loop never waits on a handler and places no
    /// limit on concurrent connections. An accept error is fatal and
    /// returned to the caller.
    pub async fn serve(
        self,
        sink: Arc<dyn TelemetrySink>,
        stats: Arc<IngestStats>,
    ) -> Result<(), ServerError> {
        info!(
            "Telemetry server listening on {}",
            self.listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string())
        );

        loop {
            let (stream, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;

            debug!("Accepted connection from {}", peer);
            stats.record_connection_opened();

            let sink = Arc::clone(&sink);
            let stats = Arc::clone(&stats);
            tokio::spawn(async move {
                handle_connection(stream, peer, sink.as_ref(), &stats).await;
                stats.record_connection_closed();
                debug!("Connection from {} finished", peer);
            });
        }
    }
}

/// Read one connection to completion.
///
/// Never panics or propagates: EOF ends the loop normally, a read error is
/// logged and ends the loop. The stream is dropped exactly once on return,
/// whichever exit path is taken. A final line without a terminator is still
/// delivered by `read_line` before EOF, so partial trailing data is decoded
/// best-effort.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    sink: &dyn TelemetrySink,
    stats: &IngestStats,
) {
    let mut reader = BufReader::new(stream);
    let mut line_buf = String::with_capacity(256);

    loop {
        line_buf.clear();

        match reader.read_line(&mut line_buf).await {
            Ok(0) => {
                // EOF - peer closed, normal termination
                debug!("Connection from {} closed by peer", peer);
                break;
            }
            Ok(n) => {
                stats.record_line_bytes(n as u64);

                let line = line_buf.trim();
                if line.is_empty() {
                    stats.record_blank_line();
                    continue;
                }

                let sample = decode(line);
                stats.record_sample(&sample);
                sink.accept(&sample);
            }
            Err(e) => {
                // Includes non-UTF-8 input; fatal for this connection only
                warn!("Read error from {}: {}", peer, e);
                stats.record_read_error();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TelemetrySample;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::{sleep, timeout};

    /// Test double that records every accepted sample in order.
    #[derive(Default)]
    struct CollectingSink {
        samples: Mutex<Vec<TelemetrySample>>,
    }

    impl CollectingSink {
        fn speeds(&self) -> Vec<f64> {
            self.samples
                .lock()
                .unwrap()
                .iter()
                .map(|s| s.speed_mps)
                .collect()
        }

        fn len(&self) -> usize {
            self.samples.lock().unwrap().len()
        }
    }

    impl TelemetrySink for CollectingSink {
        fn accept(&self, sample: &TelemetrySample) {
            self.samples.lock().unwrap().push(*sample);
        }
    }

    async fn start_server() -> (SocketAddr, Arc<CollectingSink>, Arc<IngestStats>) {
        let server = TelemetryServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("bind on port 0");
        let addr = server.local_addr().expect("local addr");
        let sink = Arc::new(CollectingSink::default());
        let stats = Arc::new(IngestStats::new());

        let serve_sink: Arc<dyn TelemetrySink> = sink.clone();
        let serve_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            let _ = server.serve(serve_sink, serve_stats).await;
        });

        (addr, sink, stats)
    }

    /// Poll until the condition holds or a second passes.
    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(1), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached within timeout");
    }

    #[tokio::test]
    async fn test_lines_reach_sink_in_order() {
        let (addr, sink, stats) = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"speed_mps=1.0|throttle=0.1\n\nspeed_mps=2.0\n   \nspeed_mps=3.0\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 1).await;

        assert_eq!(sink.speeds(), vec![1.0, 2.0, 3.0]);
        assert_eq!(stats.blank_lines.load(Ordering::Relaxed), 2);
        assert_eq!(stats.total_samples.load(Ordering::Relaxed), 3);
        assert_eq!(stats.read_errors.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_blank_lines_produce_no_samples() {
        let (addr, sink, stats) = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"\n   \n\t\n").await.unwrap();
        client.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 1).await;

        assert_eq!(sink.len(), 0);
        assert_eq!(stats.blank_lines.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_garbage_line_still_yields_a_sample() {
        let (addr, sink, stats) = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"complete nonsense\nspeed_mps=4.5\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 1).await;

        // Malformed content is not an error: it decodes to all-undefined
        let samples = sink.samples.lock().unwrap().clone();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].defined_fields(), 0);
        assert_eq!(samples[1].speed_mps, 4.5);
        assert_eq!(stats.read_errors.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_partial_final_line_delivered_best_effort() {
        let (addr, sink, stats) = start_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        // Three terminated lines, then partial data with no terminator
        client
            .write_all(b"speed_mps=1.0\nspeed_mps=2.0\nspeed_mps=3.0\nspeed_mps=4.0")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 1).await;

        assert_eq!(sink.speeds(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stats.read_errors.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_two_connections_keep_their_own_order() {
        let (addr, sink, stats) = start_server().await;

        // Tag each connection through the steering field
        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();

        for i in 1..=3 {
            first
                .write_all(format!("steering=1|speed_mps={i}.0\n").as_bytes())
                .await
                .unwrap();
            second
                .write_all(format!("steering=2|speed_mps={i}.0\n").as_bytes())
                .await
                .unwrap();
        }
        first.shutdown().await.unwrap();
        second.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 2).await;

        let samples = sink.samples.lock().unwrap().clone();
        assert_eq!(samples.len(), 6);

        // Per-connection order is preserved even if the streams interleave
        for tag in [1.0, 2.0] {
            let speeds: Vec<f64> = samples
                .iter()
                .filter(|s| s.steering == tag)
                .map(|s| s.speed_mps)
                .collect();
            assert_eq!(speeds, vec![1.0, 2.0, 3.0]);
        }
    }

    #[tokio::test]
    async fn test_listener_keeps_accepting_while_connection_open() {
        let (addr, sink, stats) = start_server().await;

        // First connection stays open and idle
        let mut idle = TcpStream::connect(addr).await.unwrap();

        // Second connection is served without waiting for the first
        let mut active = TcpStream::connect(addr).await.unwrap();
        active.write_all(b"speed_mps=9.0\n").await.unwrap();
        active.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 1).await;
        assert_eq!(sink.speeds(), vec![9.0]);
        assert_eq!(stats.active_connections(), 1);

        idle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_error_is_local_to_one_connection() {
        let (addr, sink, stats) = start_server().await;

        // Invalid UTF-8 is a read fault terminating this connection only
        let mut faulty = TcpStream::connect(addr).await.unwrap();
        faulty.write_all(b"\xff\xfe\xfd\n").await.unwrap();
        faulty.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 1).await;
        assert_eq!(stats.read_errors.load(Ordering::Relaxed), 1);
        assert_eq!(sink.len(), 0);

        // The listener keeps serving fresh connections afterwards
        let mut healthy = TcpStream::connect(addr).await.unwrap();
        healthy.write_all(b"speed_mps=6.0\n").await.unwrap();
        healthy.shutdown().await.unwrap();

        wait_until(|| stats.connections_closed.load(Ordering::Relaxed) == 2).await;
        assert_eq!(sink.speeds(), vec![6.0]);
        assert_eq!(stats.read_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_bind_error_when_port_in_use() {
        let first = TelemetryServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = first.local_addr().unwrap();

        let second = TelemetryServer::bind(addr).await;
        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }
}
