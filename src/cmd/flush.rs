use crate::{Connection, Db, Frame, Parse};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use slog::debug;

use crate::utils::{resp_ok, resp_wrong_arity};

/// Remove every entry from the store.
///
/// Flushing an already empty store is fine and replies OK as well. Pending
/// expiry bookkeeping goes with the entries.
#[derive(Debug, Clone)]
pub struct Flush {
    valid: bool,
}

impl Flush {
    pub fn new() -> Flush {
        Flush { valid: true }
    }

    pub(crate) fn parse_frames(_parse: &mut Parse) -> crate::Result<Flush> {
        Ok(Flush { valid: true })
    }

    pub(crate) async fn apply(
        self,
        db: &Db,
        dst: &mut Connection,
        name: &'static str,
    ) -> crate::Result<()> {
        let response = self.flush(db, name);

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn flush(self, db: &Db, name: &str) -> Frame {
        if !self.valid {
            return resp_wrong_arity(name);
        }
        db.flush();
        resp_ok()
    }
}

impl Default for Flush {
    fn default() -> Flush {
        Flush::new()
    }
}

impl Invalid for Flush {
    fn new_invalid() -> Flush {
        Flush { valid: false }
    }
}
