use crate::{Connection, Db, Frame, Parse};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use crate::db::Ttl;
use bytes::Bytes;
use slog::debug;

use crate::utils::resp_wrong_arity;

/// Report the remaining time-to-live of a key.
///
/// Replies -2 when the key is missing or expired, -1 when it carries no
/// deadline, and otherwise the remaining time rounded toward zero in the
/// requested unit.
#[derive(Debug, Clone)]
pub struct TTL {
    key: Bytes,
    valid: bool,
}

impl TTL {
    pub fn new(key: impl Into<Bytes>) -> TTL {
        TTL {
            key: key.into(),
            valid: true,
        }
    }

    /// Get the key
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<TTL> {
        let key = parse.next_bytes()?;

        Ok(TTL { key, valid: true })
    }

    pub(crate) async fn apply(
        self,
        db: &Db,
        dst: &mut Connection,
        is_millis: bool,
    ) -> crate::Result<()> {
        let response = self.ttl(db, is_millis);

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }

    pub fn ttl(self, db: &Db, is_millis: bool) -> Frame {
        if !self.valid {
            return resp_wrong_arity(if is_millis { "pttl" } else { "ttl" });
        }
        match db.ttl(&self.key) {
            Ttl::Missing => Frame::Integer(-2),
            Ttl::NoExpiry => Frame::Integer(-1),
            Ttl::ExpiresIn(remaining) => {
                let remaining = if is_millis {
                    remaining.as_millis() as i64
                } else {
                    remaining.as_secs() as i64
                };
                Frame::Integer(remaining)
            }
        }
    }
}

impl Invalid for TTL {
    fn new_invalid() -> TTL {
        TTL {
            key: Bytes::new(),
            valid: false,
        }
    }
}
