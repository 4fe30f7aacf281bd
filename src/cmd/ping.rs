use crate::{Connection, Frame, Parse, ParseError};

use crate::cmd::Invalid;
use crate::config::LOGGER;
use bytes::Bytes;
use slog::debug;

use crate::utils::{resp_str, resp_wrong_arity};

/// Returns PONG if no argument is provided, otherwise a bulk copy of the
/// argument.
///
/// This command is often used to test if a connection is still alive, or to
/// measure latency.
#[derive(Debug, Clone)]
pub struct Ping {
    /// optional message to be returned
    msg: Option<Bytes>,

    valid: bool,
}

impl Ping {
    /// Create a new `Ping` command with optional `msg`.
    pub fn new(msg: Option<Bytes>) -> Ping {
        Ping { msg, valid: true }
    }

    /// Parse a `Ping` instance from a received frame.
    ///
    /// The `PING` string has already been consumed.
    ///
    /// # Format
    ///
    /// Expects an array frame containing `PING` and an optional message.
    ///
    /// ```text
    /// PING [message]
    /// ```
    pub(crate) fn parse_frames(parse: &mut Parse) -> crate::Result<Ping> {
        match parse.next_bytes() {
            Ok(msg) => Ok(Ping::new(Some(msg))),
            Err(ParseError::EndOfStream) => Ok(Ping::new(None)),
            Err(err) => Err(err.into()),
        }
    }

    /// Apply the `Ping` command and return the message.
    ///
    /// The response is written to `dst`. This is called by the server in
    /// order to execute a received command.
    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = if !self.valid {
            resp_wrong_arity("ping")
        } else {
            match self.msg {
                None => resp_str("PONG"),
                Some(msg) => Frame::Bulk(msg),
            }
        };

        debug!(LOGGER, "res, {:?}", response);

        dst.write_frame(&response).await?;

        Ok(())
    }
}

impl Invalid for Ping {
    fn new_invalid() -> Ping {
        Ping {
            msg: None,
            valid: false,
        }
    }
}
