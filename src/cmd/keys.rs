use crate::{Connection, Db, Frame, Parse};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use bytes::Bytes;
use slog::debug;

use crate::utils::resp_wrong_arity;

/// Enumerate every live key matching a glob pattern.
///
/// The scan runs against the keyspace as it stands; order is unspecified
/// and expired keys never appear. A malformed pattern matches nothing.
#[derive(Debug, Clone)]
pub struct Keys {
    pattern: Bytes,
    valid: bool,
}

impl Keys {
    pub fn new(pattern: impl Into<Bytes>) -> Keys {
        Keys {
            pattern: pattern.into(),
            valid: true,
        }
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Keys> {
        let pattern = parse.next_bytes()?;
        Ok(Keys {
            pattern,
            valid: true,
        })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = self.keys(db);

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn keys(self, db: &Db) -> Frame {
        if !self.valid {
            return resp_wrong_arity("keys");
        }
        let mut response = Frame::array();
        for key in db.keys(&self.pattern) {
            response.push_bulk(key);
        }
        response
    }
}

impl Invalid for Keys {
    fn new_invalid() -> Keys {
        Keys {
            pattern: Bytes::new(),
            valid: false,
        }
    }
}
