use crate::cmd::Invalid;
use crate::{Connection, Db, Frame, Parse, ParseError};

use bytes::Bytes;
use tracing::debug;

use crate::utils::{resp_ok, resp_wrong_arity};

/// Set several keys to several values as one atomic step.
///
/// Either every pair is stored or, when the argument list does not pair up,
/// nothing is. Any previous time-to-live on the touched keys is discarded.
#[derive(Debug, Clone)]
pub struct Mset {
    keys: Vec<Bytes>,
    vals: Vec<Bytes>,
    valid: bool,
}

impl Mset {
    /// Get the keys
    pub fn keys(&self) -> &Vec<Bytes> {
        &self.keys
    }

    pub fn vals(&self) -> &Vec<Bytes> {
        &self.vals
    }

    pub fn add_key(&mut self, key: Bytes) {
        self.keys.push(key);
    }

    pub fn add_val(&mut self, val: Bytes) {
        self.vals.push(val);
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Mset> {
        let mut mset = Mset::default();

        loop {
            let key = match parse.next_bytes() {
                Ok(key) => key,
                Err(ParseError::EndOfStream) => break,
                Err(_) => return Ok(Mset::new_invalid()),
            };
            mset.add_key(key);
            if let Ok(val) = parse.next_bytes() {
                mset.add_val(val);
            } else {
                // Odd argument count: a key with no value. No key is mutated.
                return Ok(Mset::new_invalid());
            }
        }
        if mset.keys.is_empty() {
            return Ok(Mset::new_invalid());
        }

        Ok(mset)
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = self.mset(db);

        debug!(?response);

        // Write the response back to the client
        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn mset(self, db: &Db) -> Frame {
        if !self.valid {
            return resp_wrong_arity("mset");
        }
        let pairs = self.keys.into_iter().zip(self.vals).collect();
        db.mset(pairs);
        resp_ok()
    }
}

impl Default for Mset {
    /// Create a new `Mset` command which stores `key`/`value` vectors.
    fn default() -> Mset {
        Mset {
            keys: vec![],
            vals: vec![],
            valid: true,
        }
    }
}

impl Invalid for Mset {
    fn new_invalid() -> Mset {
        Mset {
            keys: vec![],
            vals: vec![],
            valid: false,
        }
    }
}
