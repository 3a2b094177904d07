//! Keep-alive supervisor.
//!
//! The device stops streaming unless it hears `STAY_CONNECTED` regularly.
//! The supervisor pings at a fixed period while reading is enabled and turns
//! a broken pipe into [`Event::BrokenConnection`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::Session;
use crate::error::is_broken_pipe;
use crate::event::Event;
use crate::protocol::CommandOpcode;
use crate::transport::TransportProvider;

/// Spawns the periodic supervisor. The first ping goes out immediately.
///
/// Runs until the handle is aborted.
pub(crate) fn spawn<P: TransportProvider + 'static>(session: Arc<Session<P>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = session.config.keep_alive_period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            tick(&session).await;
        }
    })
}

async fn tick<P: TransportProvider + 'static>(session: &Session<P>) {
    if !session.reading_enabled() {
        tracing::debug!("keep-alive idle, reading is disabled");
        return;
    }

    if !session.connection_alive().await {
        session.events.log(
            "Could not write stay connected command because socket and/or output stream were not ready.",
        );
        return;
    }

    match session
        .write_command(CommandOpcode::StayConnected, None)
        .await
    {
        Ok(true) => tracing::debug!("wrote stay connected command"),
        Ok(false) => session.events.log(
            "Could not write stay connected command because socket and/or output stream were not ready.",
        ),
        Err(e) if is_broken_pipe(&e) => {
            tracing::error!("keep-alive write failed: {}", e);
            session.events.log("Broken connection to CMS50FW!");
            session.events.dispatch(Event::BrokenConnection);
        }
        Err(e) => {
            tracing::error!("keep-alive write failed: {}", e);
            session.events.log("Could not write stay connected command.");
        }
    }
}
