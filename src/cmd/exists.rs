use crate::{Connection, Db, Frame, Parse, ParseError};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use bytes::Bytes;
use slog::debug;

use crate::utils::resp_wrong_arity;

/// Count how many of the specified keys hold a live entry.
///
/// Keys are counted with multiplicity: naming the same present key twice
/// counts it twice.
#[derive(Debug, Clone)]
pub struct Exists {
    keys: Vec<Bytes>,
    valid: bool,
}

impl Exists {
    /// Get the keys
    pub fn keys(&self) -> &Vec<Bytes> {
        &self.keys
    }

    pub fn add_key(&mut self, key: Bytes) {
        self.keys.push(key)
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Exists> {
        let mut exists = Exists::default();

        loop {
            match parse.next_bytes() {
                Ok(key) => exists.add_key(key),
                Err(ParseError::EndOfStream) => break,
                Err(_) => return Ok(Exists::new_invalid()),
            }
        }
        if exists.keys.is_empty() {
            return Ok(Exists::new_invalid());
        }

        Ok(exists)
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = self.exists(db);

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn exists(self, db: &Db) -> Frame {
        if !self.valid {
            return resp_wrong_arity("exists");
        }
        Frame::Integer(db.exists(&self.keys))
    }
}

impl Default for Exists {
    fn default() -> Exists {
        Exists {
            keys: vec![],
            valid: true,
        }
    }
}

impl Invalid for Exists {
    fn new_invalid() -> Exists {
        Exists {
            keys: vec![],
            valid: false,
        }
    }
}
