use crate::{Connection, Db, Frame, Parse};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use bytes::Bytes;
use slog::debug;

use crate::utils::resp_wrong_arity;

/// Get the value of key.
///
/// If the key does not exist, or its time-to-live has passed, the special
/// value nil is returned.
#[derive(Debug, Clone)]
pub struct Get {
    /// Name of the key to get
    key: Bytes,

    valid: bool,
}

impl Get {
    /// Create a new `Get` command which fetches `key`.
    pub fn new(key: impl Into<Bytes>) -> Get {
        Get {
            key: key.into(),
            valid: true,
        }
    }

    /// Get the key
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Parse a `Get` instance from a received frame.
    ///
    /// The `Parse` argument provides a cursor-like API to read fields from the
    /// `Frame`. At this point, the entire frame has already been received from
    /// the socket.
    ///
    /// The `GET` string has already been consumed.
    ///
    /// # Format
    ///
    /// Expects an array frame containing two entries.
    ///
    /// ```text
    /// GET key
    /// ```
    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Get> {
        // The `GET` string has already been consumed. The next value is the
        // name of the key to get. If the next value is not present, then an
        // error is returned.
        let key = parse.next_bytes()?;

        Ok(Get { key, valid: true })
    }

    /// Apply the `Get` command to the specified `Db` instance.
    ///
    /// The response is written to `dst`. This is called by the server in
    /// order to execute a received command.
    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = self.get(db);

        debug!(LOGGER, "res, {:?}", response);

        // Write the response back to the client
        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn get(self, db: &Db) -> Frame {
        if !self.valid {
            return resp_wrong_arity("get");
        }
        match db.get(&self.key) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Null,
        }
    }
}

impl Invalid for Get {
    fn new_invalid() -> Get {
        Get {
            key: Bytes::new(),
            valid: false,
        }
    }
}
