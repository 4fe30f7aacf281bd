#[macro_use]
extern crate prometheus;

pub mod config;

pub mod cmd;

pub use cmd::Command;

mod connection;

pub use connection::Connection;

pub mod frame;

pub use frame::Frame;

pub mod db;

pub use db::Db;
use db::DbDropGuard;

pub mod glob;

mod parse;

use parse::{Parse, ParseError};

pub mod server;

pub mod metrics;
mod shutdown;
pub mod utils;

use shutdown::Shutdown;

/// Default port that the server listens on.
///
/// Used if no port is specified.
pub const DEFAULT_PORT: &str = "31337";

/// Default address the listener binds to.
pub const DEFAULT_LISTEN: &str = "127.0.0.1";

/// Error returned by most functions.
///
/// When writing a real application, one might want to consider a specialized
/// error handling crate or defining an error type as an `enum` of causes.
/// However, for our example, using a boxed `std::error::Error` is sufficient.
///
/// For performance reasons, boxing is avoided in any hot path. For example, in
/// `frame`, a custom error `enum` is defined. This is because the error is hit
/// and handled during normal execution when a partial frame is received on a
/// socket. `std::error::Error` is implemented for `frame::Error` which allows
/// it to be converted to `Box<dyn std::error::Error>`.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// A specialized `Result` type for canela operations.
///
/// This is defined as a convenience.
pub type Result<T> = std::result::Result<T, Error>;
