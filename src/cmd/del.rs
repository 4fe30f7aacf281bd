use crate::{Connection, Db, Frame, Parse, ParseError};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use bytes::Bytes;
use slog::debug;

use crate::utils::resp_wrong_arity;

/// Remove the specified keys.
///
/// The reply is the number of keys that held a live entry and were removed.
/// Keys that are missing or already expired do not count.
#[derive(Debug, Clone)]
pub struct Del {
    keys: Vec<Bytes>,
    valid: bool,
}

impl Del {
    /// Get the keys
    pub fn keys(&self) -> &Vec<Bytes> {
        &self.keys
    }

    pub fn add_key(&mut self, key: Bytes) {
        self.keys.push(key);
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Del> {
        let mut del = Del::default();

        loop {
            match parse.next_bytes() {
                Ok(key) => del.add_key(key),
                Err(ParseError::EndOfStream) => break,
                Err(_) => return Ok(Del::new_invalid()),
            }
        }
        if del.keys.is_empty() {
            return Ok(Del::new_invalid());
        }

        Ok(del)
    }

    pub(crate) async fn apply(
        self,
        db: &Db,
        dst: &mut Connection,
        name: &'static str,
    ) -> crate::Result<()> {
        let response = self.del(db, name);

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn del(self, db: &Db, name: &str) -> Frame {
        if !self.valid {
            return resp_wrong_arity(name);
        }
        Frame::Integer(db.del(&self.keys))
    }
}

impl Default for Del {
    /// Create a new `Del` command which removes `key` vector.
    fn default() -> Del {
        Del {
            keys: vec![],
            valid: true,
        }
    }
}

impl Invalid for Del {
    fn new_invalid() -> Del {
        Del {
            keys: vec![],
            valid: false,
        }
    }
}
