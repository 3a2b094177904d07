//! Command writing for CMS50FW sessions.
//!
//! Every outbound command goes through [`Session::write_command`], which
//! checks the link first and holds the output stream lock for the whole
//! packet so commands from the control worker, the keep-alive and the
//! reader's start-up write never interleave.

use std::io;

use tokio::io::AsyncWriteExt;

use crate::protocol::{CommandOpcode, encode_command};
use crate::session::Session;
use crate::transport::TransportProvider;

impl<P: TransportProvider + 'static> Session<P> {
    /// Writes one command packet and flushes it.
    ///
    /// Returns `Ok(false)` without writing if the connection is not alive.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the write or flush fails, for example
    /// because the device was switched off or moved out of range.
    pub(crate) async fn write_command(
        &self,
        opcode: CommandOpcode,
        data: Option<u8>,
    ) -> io::Result<bool> {
        let output = {
            let radio_enabled = self.provider.radio_enabled();
            let state = self.state.read().await;
            if state.liveness(radio_enabled).is_alive() {
                state.output.clone()
            } else {
                None
            }
        };

        let Some(output) = output else {
            tracing::warn!(
                "could not write command {} to output stream: socket is not connected",
                opcode.name()
            );
            return Ok(false);
        };

        let packet = encode_command(opcode, data);
        tracing::trace!("writing {}: {}", opcode.name(), hex::encode(&packet));

        let mut writer = output.lock().await;
        writer.write_all(&packet).await?;
        writer.flush().await?;
        Ok(true)
    }
}
