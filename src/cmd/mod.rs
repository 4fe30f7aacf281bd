mod get;
pub use get::Get;

mod set;
pub use set::Set;

mod mget;
pub use mget::Mget;

mod mset;
pub use mset::Mset;

mod del;
pub use del::Del;

mod exists;
pub use exists::Exists;

mod expire;
pub use expire::Expire;

mod ttl;
pub use ttl::TTL;

mod keys;
pub use keys::Keys;

mod flush;
pub use flush::Flush;

mod ping;
pub use ping::Ping;

mod quit;
pub use quit::Quit;

mod shutdown;
pub use shutdown::Shutdown;

mod unknown;
pub use unknown::Unknown;

use crate::{Connection, Db, Frame, Parse};

/// Enumeration of supported commands.
///
/// Methods called on `Command` are delegated to the command implementation.
#[derive(Debug)]
pub enum Command {
    Get(Get),
    Set(Set),
    Mget(Mget),
    Mset(Mset),
    Del(Del),
    Delete(Del),
    Exists(Exists),
    Expire(Expire),
    Pexpire(Expire),
    TTL(TTL),
    PTTL(TTL),
    Keys(Keys),
    Flush(Flush),
    Flushdb(Flush),
    Ping(Ping),
    Quit(Quit),
    Shutdown(Shutdown),

    Unknown(Unknown),
}

impl Command {
    /// Parse a command from a received frame.
    ///
    /// The `Frame` must be the array variant; its first entry names the
    /// command, case-insensitively.
    ///
    /// # Returns
    ///
    /// On success, the command value is returned. A request whose shape does
    /// not fit the named command still parses, into that command's invalid
    /// form, so the failure is reported as an error reply rather than a
    /// dropped connection. `Err` is reserved for protocol-level faults.
    pub fn from_frame(frame: Frame) -> crate::Result<Command> {
        // The frame value is decorated with `Parse`. `Parse` provides a
        // "cursor" like API which makes parsing the command easier.
        //
        // The frame value must be an array variant. Any other frame variants
        // result in an error being returned.
        let mut parse = Parse::new(frame)?;

        // All commands begin with the command name. The name is read and
        // converted to lower case in order to do case sensitive matching.
        // The spelling the client used is kept around for error reporting.
        let command_bytes = parse.next_bytes()?;
        let command_name = String::from_utf8_lossy(&command_bytes).to_lowercase();

        // Match the command name, delegating the rest of the parsing to the
        // specific command.
        let command = match &command_name[..] {
            "get" => Command::Get(transform_parse(Get::parse_frames(&mut parse), &mut parse)),
            "set" => Command::Set(transform_parse(Set::parse_frames(&mut parse), &mut parse)),
            "mget" => Command::Mget(transform_parse(Mget::parse_frames(&mut parse), &mut parse)),
            "mset" => Command::Mset(transform_parse(Mset::parse_frames(&mut parse), &mut parse)),
            "del" => Command::Del(transform_parse(Del::parse_frames(&mut parse), &mut parse)),
            "delete" => Command::Delete(transform_parse(Del::parse_frames(&mut parse), &mut parse)),
            "exists" => Command::Exists(transform_parse(
                Exists::parse_frames(&mut parse),
                &mut parse,
            )),
            "expire" => Command::Expire(transform_parse(
                Expire::parse_frames(&mut parse),
                &mut parse,
            )),
            "pexpire" => Command::Pexpire(transform_parse(
                Expire::parse_frames(&mut parse),
                &mut parse,
            )),
            "ttl" => Command::TTL(transform_parse(TTL::parse_frames(&mut parse), &mut parse)),
            "pttl" => Command::PTTL(transform_parse(TTL::parse_frames(&mut parse), &mut parse)),
            "keys" => Command::Keys(transform_parse(Keys::parse_frames(&mut parse), &mut parse)),
            "flush" => Command::Flush(transform_parse(Flush::parse_frames(&mut parse), &mut parse)),
            "flushdb" => Command::Flushdb(transform_parse(
                Flush::parse_frames(&mut parse),
                &mut parse,
            )),
            "ping" => Command::Ping(transform_parse(Ping::parse_frames(&mut parse), &mut parse)),
            "quit" => Command::Quit(transform_parse(Quit::parse_frames(&mut parse), &mut parse)),
            "shutdown" => Command::Shutdown(transform_parse(
                Shutdown::parse_frames(&mut parse),
                &mut parse,
            )),

            _ => {
                // The command is not recognized and an Unknown command is
                // returned.
                //
                // `return` is called here to skip the leftover-argument
                // check: there are most likely unconsumed fields remaining
                // in the `Parse` instance, and that is fine.
                return Ok(Command::Unknown(Unknown::new(String::from_utf8_lossy(
                    &command_bytes,
                ))));
            }
        };

        // The command has been successfully parsed
        Ok(command)
    }

    /// Apply the command to the specified `Db` instance.
    ///
    /// The response is written to `dst`. This is called by the server in
    /// order to execute a received command.
    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        use Command::*;

        match self {
            Get(cmd) => cmd.apply(db, dst).await,
            Set(cmd) => cmd.apply(db, dst).await,
            Mget(cmd) => cmd.apply(db, dst).await,
            Mset(cmd) => cmd.apply(db, dst).await,
            Del(cmd) => cmd.apply(db, dst, "del").await,
            Delete(cmd) => cmd.apply(db, dst, "delete").await,
            Exists(cmd) => cmd.apply(db, dst).await,
            Expire(cmd) => cmd.apply(db, dst, false).await,
            Pexpire(cmd) => cmd.apply(db, dst, true).await,
            TTL(cmd) => cmd.apply(db, dst, false).await,
            PTTL(cmd) => cmd.apply(db, dst, true).await,
            Keys(cmd) => cmd.apply(db, dst).await,
            Flush(cmd) => cmd.apply(db, dst, "flush").await,
            Flushdb(cmd) => cmd.apply(db, dst, "flushdb").await,
            Ping(cmd) => cmd.apply(dst).await,
            Unknown(cmd) => cmd.apply(dst).await,

            // `Quit` and `Shutdown` drive the session lifecycle and are
            // handled by the connection handler directly.
            Quit(_) | Shutdown(_) => Err("`QUIT`/`SHUTDOWN` are handled by the session".into()),
        }
    }

    /// Returns the command name
    pub(crate) fn get_name(&self) -> &str {
        match self {
            Command::Get(_) => "get",
            Command::Set(_) => "set",
            Command::Mget(_) => "mget",
            Command::Mset(_) => "mset",
            Command::Del(_) => "del",
            Command::Delete(_) => "delete",
            Command::Exists(_) => "exists",
            Command::Expire(_) => "expire",
            Command::Pexpire(_) => "pexpire",
            Command::TTL(_) => "ttl",
            Command::PTTL(_) => "pttl",
            Command::Keys(_) => "keys",
            Command::Flush(_) => "flush",
            Command::Flushdb(_) => "flushdb",
            Command::Ping(_) => "ping",
            Command::Quit(_) => "quit",
            Command::Shutdown(_) => "shutdown",

            Command::Unknown(cmd) => cmd.get_name(),
        }
    }
}

/// All commands should implement new_invalid() for invalid check
pub trait Invalid {
    fn new_invalid() -> Self;
}

fn transform_parse<T: Invalid>(parse_res: crate::Result<T>, parse: &mut Parse) -> T {
    match parse_res {
        Ok(cmd) => {
            if parse.check_finish() {
                cmd
            } else {
                T::new_invalid()
            }
        }
        Err(_) => T::new_invalid(),
    }
}
