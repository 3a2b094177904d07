//! Stream reader task.
//!
//! One reader runs per streaming cycle, spawned by the control worker after
//! it has enabled reading and sent `START_DATA`. It decodes frames until
//! reading is disabled or the link dies. A pending read is
//! raced against a liveness poll so a dropped link or a reset ends the loop
//! within one poll interval even if the device goes silent.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Session;
use super::state::SharedReader;
use crate::event::Event;
use crate::protocol::FrameDecoder;
use crate::transport::TransportProvider;
use crate::types::SessionPhase;

const READ_CHUNK: usize = 64;

/// Why the decode loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Disabled,
    LinkLost,
    EndOfStream,
    Failed,
}

/// Spawns a reader for the session's current link.
pub(crate) fn spawn<P: TransportProvider + 'static>(session: Arc<Session<P>>) -> JoinHandle<()> {
    tokio::spawn(async move { run(&session).await })
}

async fn run<P: TransportProvider + 'static>(session: &Session<P>) {
    if !session.connection_alive().await {
        session.events.log("Error. Connection is not alive.");
        return;
    }

    session.events.dispatch(Event::DataReadAttemptInProgress);
    let input = session.state.read().await.input.clone();

    let exit = match input {
        Some(input) => read_frames(session, &input).await,
        None => Exit::LinkLost,
    };
    tracing::debug!("reader loop ended: {:?}", exit);

    session.events.log("Data read completed.");
    session.events.dispatch(Event::DataReadStopped);

    let mut state = session.state.write().await;
    if state.phase == SessionPhase::Streaming {
        state.phase = SessionPhase::Connected;
    }
}

/// Decodes frames until reading is disabled, the link dies or I/O fails.
async fn read_frames<P: TransportProvider + 'static>(
    session: &Session<P>,
    input: &SharedReader,
) -> Exit {
    let mut guard = input.lock().await;
    let Some(reader) = guard.as_mut() else {
        return Exit::LinkLost;
    };
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut poll = tokio::time::interval(session.config.liveness_poll.max(Duration::from_millis(1)));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if !session.reading_enabled() {
            return Exit::Disabled;
        }
        if !session.connection_alive().await {
            // No partial frame is ever delivered.
            session.events.dispatch(Event::DataFrameArrived(None));
            return Exit::LinkLost;
        }

        if let Some(frame) = decoder.decode() {
            tracing::trace!("frame: {}", frame);
            session.events.dispatch(Event::DataFrameArrived(Some(frame)));
            continue;
        }

        tokio::select! {
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    session.events.log("Input stream closed by device.");
                    return Exit::EndOfStream;
                }
                Ok(n) => decoder.feed(&chunk[..n]),
                Err(e) => {
                    tracing::error!("error reading from input stream: {}", e);
                    session.events.log("Error reading from input stream.");
                    return Exit::Failed;
                }
            },
            _ = poll.tick() => {}
        }
    }
}
