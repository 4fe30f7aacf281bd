use crate::cmd::Invalid;
use crate::{Connection, Db, Frame, Parse, ParseError};

use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::utils::{resp_not_integer, resp_ok, resp_syntax_error, resp_wrong_arity};

/// Set `key` to hold the string `value`.
///
/// If `key` already holds a value, it is overwritten. Any previous time to
/// live associated with the key is discarded on successful SET operation.
///
/// # Options
///
/// Currently, the following options are supported:
///
/// * EX `seconds` -- Set the specified expire time, in seconds.
/// * PX `milliseconds` -- Set the specified expire time, in milliseconds.
#[derive(Debug)]
pub struct Set {
    /// the lookup key
    key: Bytes,

    /// the value to be stored
    value: Bytes,

    /// trailing expiration options, validated at execution time so a bad
    /// option becomes an error reply instead of a dropped connection
    options: Vec<Bytes>,

    valid: bool,
}

impl Set {
    /// Create a new `Set` command which sets `key` to `value` with no
    /// expiration.
    pub fn new(key: impl Into<Bytes>, value: Bytes) -> Set {
        Set {
            key: key.into(),
            value,
            options: vec![],
            valid: true,
        }
    }

    /// Get the key
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Get the value
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Parse a `Set` instance from a received frame.
    ///
    /// The `SET` string has already been consumed.
    ///
    /// # Format
    ///
    /// Expects an array frame containing at least 3 entries.
    ///
    /// ```text
    /// SET key value [EX seconds|PX milliseconds]
    /// ```
    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Set> {
        use ParseError::EndOfStream;

        // Read the key to set. This is a required field
        let key = parse.next_bytes()?;

        // Read the value to set. This is a required field.
        let value = parse.next_bytes()?;

        // Anything that follows is an expiration option. The tokens are kept
        // raw here; `set` decides whether they spell a valid option.
        let mut options = vec![];
        loop {
            match parse.next_bytes() {
                Ok(opt) => options.push(opt),
                // The `EndOfStream` error indicates there is no further data
                // to parse. In this case, it is a normal run time situation
                // and indicates there are no specified `SET` options.
                Err(EndOfStream) => break,
                // All other errors are bubbled up, resulting in the
                // connection being terminated.
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Set {
            key,
            value,
            options,
            valid: true,
        })
    }

    /// Apply the `Set` command to the specified `Db` instance.
    ///
    /// The response is written to `dst`. This is called by the server in
    /// order to execute a received command.
    #[instrument(skip(self, db, dst))]
    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = self.set(db);

        debug!(?response);
        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn set(self, db: &Db) -> Frame {
        if !self.valid {
            return resp_wrong_arity("set");
        }

        let mut expire = None;
        let mut options = self.options.iter();
        while let Some(opt) = options.next() {
            let is_ex = opt.eq_ignore_ascii_case(b"EX");
            let is_px = opt.eq_ignore_ascii_case(b"PX");
            if !is_ex && !is_px {
                return resp_syntax_error();
            }
            let amount = match options.next() {
                Some(amount) => amount,
                None => return resp_syntax_error(),
            };
            let amount = match atoi::atoi::<i64>(amount) {
                Some(amount) if amount > 0 => amount as u64,
                _ => return resp_not_integer(),
            };
            expire = Some(if is_ex {
                Duration::from_secs(amount)
            } else {
                Duration::from_millis(amount)
            });
        }

        db.set(self.key, self.value, expire);
        resp_ok()
    }
}

impl Invalid for Set {
    fn new_invalid() -> Set {
        Set {
            key: Bytes::new(),
            value: Bytes::new(),
            options: vec![],
            valid: false,
        }
    }
}
