//! Connection stream loop: pumps one client's events onto the wire.
//!
//! The loop writes a `connected` event, then waits for the first of:
//!
//! - an event: write it, reset the idle timer
//! - the event channel closing, or the hub's done signal: write `closing`, end
//! - the idle timer: cancel the connection token, end
//! - the connection token being cancelled by the transport side: end
//! - the keep-alive interval: write a comment frame
//!
//! Any write failure ends the loop with an error.

use crate::client::ClientReceiver;
use crate::error::SseError;
use crate::event::{Event, KEEP_ALIVE_FRAME};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Why a stream loop ended without a write error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The hub closed the client (shutdown, unsubscribe or replacement).
    Closed,
    /// No event arrived within the idle timeout.
    IdleTimeout,
    /// The connection token was cancelled from outside.
    Cancelled,
}

/// Run the stream loop for `client`, writing SSE frames to `writer`.
///
/// `cancel` represents the connection's lifetime. The idle timer cancels it;
/// the transport layer cancels it when the peer goes away.
pub async fn run<W>(
    mut client: ClientReceiver,
    writer: &mut W,
    cancel: CancellationToken,
    keep_alive: Option<Duration>,
) -> Result<StreamEnd, SseError>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &Event::connected(&client.id).encode()).await?;
    debug!(client_id = %client.id, "SSE stream connected");

    let idle = client.idle;
    let idle_timer = sleep(idle);
    tokio::pin!(idle_timer);

    let mut keep_alive = keep_alive.map(|period| {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(client_id = %client.id, "SSE stream cancelled");
                return Ok(StreamEnd::Cancelled);
            }
            event = client.events.recv() => match event {
                Some(event) => {
                    trace!(client_id = %client.id, event = %event.event, "Writing event");
                    write_frame(writer, &event.encode()).await?;
                    if !idle.is_zero() {
                        idle_timer.as_mut().reset(Instant::now() + idle);
                    }
                }
                None => {
                    write_frame(writer, &Event::closing(&client.id).encode()).await?;
                    debug!(client_id = %client.id, "SSE stream closed by hub");
                    return Ok(StreamEnd::Closed);
                }
            },
            _ = client.done.recv() => {
                write_frame(writer, &Event::closing(&client.id).encode()).await?;
                debug!(client_id = %client.id, "SSE stream closed by hub");
                return Ok(StreamEnd::Closed);
            }
            _ = &mut idle_timer, if !idle.is_zero() => {
                debug!(client_id = %client.id, idle_ms = idle.as_millis() as u64, "SSE stream idle, cancelling");
                cancel.cancel();
                return Ok(StreamEnd::IdleTimeout);
            }
            _ = tick(&mut keep_alive) => {
                write_frame(writer, KEEP_ALIVE_FRAME).await?;
            }
        }
    }
}

async fn tick(keep_alive: &mut Option<Interval>) {
    match keep_alive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn write_frame<W>(writer: &mut W, frame: &str) -> Result<(), SseError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
