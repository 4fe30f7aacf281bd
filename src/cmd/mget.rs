use crate::{Connection, Db, Frame, Parse, ParseError};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use bytes::Bytes;
use slog::debug;

use crate::utils::resp_wrong_arity;

/// Get the values of all specified keys.
///
/// The reply is an array with one slot per requested key, in request order.
/// Keys that are missing or expired yield nil; the rest yield their value.
#[derive(Debug, Clone)]
pub struct Mget {
    keys: Vec<Bytes>,
    valid: bool,
}

impl Mget {
    /// Get the keys
    pub fn keys(&self) -> &Vec<Bytes> {
        &self.keys
    }

    pub fn add_key(&mut self, key: Bytes) {
        self.keys.push(key);
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Mget> {
        let mut mget = Mget::default();

        loop {
            match parse.next_bytes() {
                Ok(key) => mget.add_key(key),
                Err(ParseError::EndOfStream) => break,
                Err(_) => return Ok(Mget::new_invalid()),
            }
        }
        if mget.keys.is_empty() {
            return Ok(Mget::new_invalid());
        }

        Ok(mget)
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = self.mget(db);

        debug!(LOGGER, "res, {:?}", response);

        // Write the response back to the client
        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn mget(self, db: &Db) -> Frame {
        if !self.valid {
            return resp_wrong_arity("mget");
        }
        let values = db.mget(&self.keys);
        Frame::Array(
            values
                .into_iter()
                .map(|value| match value {
                    Some(value) => Frame::Bulk(value),
                    None => Frame::Null,
                })
                .collect(),
        )
    }
}

impl Default for Mget {
    /// Create a new `Mget` command which fetches `key` vector.
    fn default() -> Mget {
        Mget {
            keys: vec![],
            valid: true,
        }
    }
}

impl Invalid for Mget {
    fn new_invalid() -> Mget {
        Mget {
            keys: vec![],
            valid: false,
        }
    }
}
