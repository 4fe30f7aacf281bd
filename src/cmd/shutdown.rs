use crate::{Connection, Parse};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use slog::debug;

use crate::utils::{resp_ok, resp_wrong_arity};

/// Ask the server to stop.
///
/// The OK reply is flushed first; the session handler then fires the
/// server-wide shutdown trigger, which closes the listener and drains every
/// live session.
#[derive(Debug, Clone)]
pub struct Shutdown {
    valid: bool,
}

impl Shutdown {
    pub fn new() -> Shutdown {
        Shutdown { valid: true }
    }

    pub(crate) fn valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn parse_frames(_parse: &mut Parse) -> crate::Result<Shutdown> {
        Ok(Shutdown { valid: true })
    }

    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = if self.valid {
            resp_ok()
        } else {
            resp_wrong_arity("shutdown")
        };

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }
}

impl Default for Shutdown {
    fn default() -> Shutdown {
        Shutdown::new()
    }
}

impl Invalid for Shutdown {
    fn new_invalid() -> Shutdown {
        Shutdown { valid: false }
    }
}
