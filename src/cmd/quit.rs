use crate::{Connection, Parse};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use slog::debug;

use crate::utils::{resp_ok, resp_wrong_arity};

/// Ask the server to close the session.
///
/// The OK reply is flushed before the connection is torn down; the teardown
/// itself is the session handler's job.
#[derive(Debug, Clone)]
pub struct Quit {
    valid: bool,
}

impl Quit {
    pub fn new() -> Quit {
        Quit { valid: true }
    }

    pub(crate) fn valid(&self) -> bool {
        self.valid
    }

    pub(crate) fn parse_frames(_parse: &mut Parse) -> crate::Result<Quit> {
        Ok(Quit { valid: true })
    }

    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = if self.valid {
            resp_ok()
        } else {
            resp_wrong_arity("quit")
        };

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }
}

impl Default for Quit {
    fn default() -> Quit {
        Quit::new()
    }
}

impl Invalid for Quit {
    fn new_invalid() -> Quit {
        Quit { valid: false }
    }
}
