use anyhow::Result;
use vellum_wire::{LocalSocketChannel, WireCodec};

use crate::config::FatalPolicy;
use crate::session::{Session, is_disconnect};

/// Drops the client after a failed command.
///
/// A hang-up is routine. Anything else is a protocol error: logged, and
/// returned when `policy` says to exit.
pub fn recover(
    err: anyhow::Error,
    policy: FatalPolicy,
    codec: &mut WireCodec<LocalSocketChannel>,
    session: &mut Session,
) -> Result<()> {
    if is_disconnect(&err) {
        log::info!("client went away: {err:#}");
    } else {
        log::error!("fatal client error: {err:#}");
        if policy == FatalPolicy::Exit {
            return Err(err);
        }
    }

    codec.channel_mut().disconnect();
    session.reset_connection();
    Ok(())
}
