//! Binary request dispatch.
//!
//! A ready stream carries exactly one request: a 20-byte header followed by
//! the command's payload. The [`Dispatcher`] validates the envelope, maps the
//! opcode onto a [`Command`](crate::protocol::Command) and routes it to the
//! handler for its command set:
//!
//! - `dump`: immediate and condition-triggered core dumps;
//! - `eventpipe`: trace session start and stop;
//! - `profiler`: profiler attach;
//! - `process`: process information and start-up resume.
//!
//! Every request receives at most one reply. The only request that does not
//! reply straight away is a dump with a trigger condition: its stream moves
//! into the trigger registry and is answered when the trigger fires or is
//! cancelled.

mod dump;
mod errors;
mod eventpipe;
mod handler;
mod process;
mod profiler;
mod response;
mod router;

pub use self::errors::DispatchError;
pub use self::handler::Dispatcher;
pub use self::response::{Reply, ResponseWriter};
pub use self::router::{CommandRouter, RouteOutcome};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
