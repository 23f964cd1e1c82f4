//! Continuous polling over a single connection.
//!
//! Both modes run two tasks: a watcher that waits for the caller's quit
//! future and raises a quit flag, and a poller that owns the connection and
//! the cursor. The caller awaits the poller before returning, so once a
//! polling call returns the connection is closed and no message is delivered
//! any more.

use crate::consumer::{fetch, BrokerConsumer};
use crate::error::{Error, Result};
use crate::proto::Message;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

/// What a polling loop did before it stopped.
#[derive(Debug, Default)]
pub struct PollSummary {
    /// Messages delivered to the handler or channel
    pub messages: u64,
    /// Fetch passes started
    pub polls: u64,
    /// Passes that ended with an error other than end of stream
    pub failed_polls: u64,
    /// The most recent of those errors
    pub last_error: Option<Error>,
}

/// Sleep for `interval`, waking early once quit is requested.
///
/// Returns whether the loop should stop.
async fn wait_or_quit(quit: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => *quit.borrow(),
        changed = quit.changed() => changed.is_err() || *quit.borrow(),
    }
}

fn spawn_watcher<Q>(quit: Q) -> (watch::Receiver<bool>, tokio::task::JoinHandle<()>)
where
    Q: Future<Output = ()> + Send + 'static,
{
    let (quit_tx, quit_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        quit.await;
        let _ = quit_tx.send(true);
    });
    (quit_rx, handle)
}

impl BrokerConsumer {
    /// Keep consuming until `quit` completes, logging errors without stopping.
    ///
    /// End of stream counts as "no data this poll". Cancellation takes effect
    /// between polls: an exchange already in flight always completes.
    pub async fn consume_until_quit<Q, F>(
        &mut self,
        poll_interval: Duration,
        quit: Q,
        mut handler: F,
    ) -> Result<PollSummary>
    where
        Q: Future<Output = ()> + Send + 'static,
        F: FnMut(Message) + Send + 'static,
    {
        let mut conn = self.broker.connect().await?;
        let (mut quit_rx, watcher) = spawn_watcher(quit);

        let broker = self.broker.clone();
        let mut cursor = self.cursor.clone();
        info!(
            "Polling {}:{} from offset {} every {poll_interval:?}",
            broker.topic(),
            broker.partition(),
            cursor.offset
        );

        let poller = tokio::spawn(async move {
            let mut summary = PollSummary::default();
            while !*quit_rx.borrow() {
                summary.polls += 1;
                let mut delivered = 0u64;
                let result = fetch(&broker, &mut cursor, &mut conn, |m| {
                    delivered += 1;
                    handler(m);
                    true
                })
                .await;
                summary.messages += delivered;

                match result {
                    Ok(_) => {}
                    Err(e) if e.is_end_of_stream() => {}
                    Err(e) => {
                        error!("ERROR: [{}] {e}", broker.topic());
                        summary.failed_polls += 1;
                        summary.last_error = Some(e);
                    }
                }

                if wait_or_quit(&mut quit_rx, poll_interval).await {
                    break;
                }
            }
            drop(conn);
            (cursor, summary)
        });

        // Wait until the last iteration finishes before returning
        let outcome = poller.await;
        watcher.abort();
        let (cursor, summary) = outcome?;
        self.cursor = cursor;

        info!(
            "Stopped polling {}:{} after {} messages, next offset {}",
            self.broker.topic(),
            self.broker.partition(),
            summary.messages,
            self.cursor.offset
        );
        Ok(summary)
    }

    /// Keep consuming until `quit` completes, sending every message on `tx`.
    ///
    /// Unlike [`consume_until_quit`](Self::consume_until_quit), the loop stops
    /// at the first error; end of stream stops it silently. Cancellation
    /// closes the connection, abandoning any exchange in flight, and closes
    /// the channel.
    ///
    /// Returns as soon as the loop stops, whatever the reason. When it stops
    /// on an error, end of stream or a dropped receiver, `quit` is not
    /// awaited; it is dropped unfinished. The error is reported in
    /// [`PollSummary::last_error`], not as `Err`.
    ///
    /// A message the receiver can no longer accept is not counted, and the
    /// cursor stays at the start of the pass that produced it.
    pub async fn consume_on_channel<Q>(
        &mut self,
        tx: mpsc::UnboundedSender<Message>,
        poll_interval: Duration,
        quit: Q,
    ) -> Result<PollSummary>
    where
        Q: Future<Output = ()> + Send + 'static,
    {
        let mut conn = self.broker.connect().await?;
        let (mut quit_rx, watcher) = spawn_watcher(quit);

        let broker = self.broker.clone();
        let mut cursor = self.cursor.clone();

        let poller = tokio::spawn(async move {
            let mut summary = PollSummary::default();
            while !*quit_rx.borrow() {
                summary.polls += 1;
                let mut delivered = 0u64;
                let result = tokio::select! {
                    biased;
                    _ = quit_rx.changed() => None,
                    result = fetch(&broker, &mut cursor, &mut conn, |m| {
                        let sent = tx.send(m).is_ok();
                        if sent {
                            delivered += 1;
                        }
                        sent
                    }) => Some(result),
                };
                summary.messages += delivered;

                match result {
                    None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) if e.is_end_of_stream() => break,
                    Some(Err(Error::ReceiverClosed { offset })) => {
                        info!(
                            "Receiver for {} dropped, stopping before offset {offset}",
                            broker.topic()
                        );
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Fatal error consuming {}: {e}", broker.topic());
                        summary.failed_polls += 1;
                        summary.last_error = Some(e);
                        break;
                    }
                }

                if tx.is_closed() {
                    info!("Receiver for {} dropped, stopping", broker.topic());
                    break;
                }
                if wait_or_quit(&mut quit_rx, poll_interval).await {
                    break;
                }
            }
            drop(conn);
            drop(tx);
            (cursor, summary)
        });

        let outcome = poller.await;
        watcher.abort();
        let (cursor, summary) = outcome?;
        self.cursor = cursor;
        Ok(summary)
    }
}
