use crate::cmd::Invalid;
use crate::config::LOGGER;
use crate::{Connection, Db, Frame, Parse};

use bytes::Bytes;
use slog::debug;
use std::time::Duration;

use crate::utils::{resp_not_integer, resp_wrong_arity};

/// Set a time-to-live on a key.
///
/// Serves both the second-granularity and the millisecond-granularity
/// variants; the multiplier is chosen at apply time. The reply is 1 when a
/// deadline was set and 0 when the key is missing or already expired. Only
/// strictly positive amounts are accepted; an expired key is never
/// resurrected.
#[derive(Debug, Clone)]
pub struct Expire {
    key: Bytes,

    /// raw amount, validated at execution time so a non-numeric argument
    /// earns the integer-range error rather than an arity error
    amount: Bytes,

    valid: bool,
}

impl Expire {
    pub fn new(key: impl Into<Bytes>, amount: impl Into<Bytes>) -> Expire {
        Expire {
            key: key.into(),
            amount: amount.into(),
            valid: true,
        }
    }

    /// Get the key
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Expire> {
        let key = parse.next_bytes()?;
        let amount = parse.next_bytes()?;

        Ok(Expire {
            key,
            amount,
            valid: true,
        })
    }

    pub(crate) async fn apply(
        self,
        db: &Db,
        dst: &mut Connection,
        is_millis: bool,
    ) -> crate::Result<()> {
        let response = self.expire(db, is_millis);

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn expire(self, db: &Db, is_millis: bool) -> Frame {
        if !self.valid {
            return resp_wrong_arity(if is_millis { "pexpire" } else { "expire" });
        }
        let ttl = match atoi::atoi::<i64>(&self.amount) {
            Some(ttl) if ttl > 0 => ttl,
            _ => return resp_not_integer(),
        };
        let ttl = if is_millis {
            ttl
        } else {
            match ttl.checked_mul(1000) {
                Some(ttl) => ttl,
                None => return resp_not_integer(),
            }
        };
        if db.expire(&self.key, Duration::from_millis(ttl as u64)) {
            Frame::Integer(1)
        } else {
            Frame::Integer(0)
        }
    }
}

impl Invalid for Expire {
    fn new_invalid() -> Expire {
        Expire {
            key: Bytes::new(),
            amount: Bytes::new(),
            valid: false,
        }
    }
}
