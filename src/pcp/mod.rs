//! PCP through an external command-line client
//!
//! The PCP wire protocol is left to the client. This module runs it:
//! - [`Command`] builds the command line and executes it
//! - [`parse_output`] turns the client's text output into a response
//! - [`Pcp`] / [`PcpWorker`] serialize concurrent callers onto one
//!   invocation at a time

pub mod clock;
pub mod command;
pub mod parse;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use command::Command;
pub use parse::{parse_line, parse_output, ParseError};
pub use worker::{new, Pcp, PcpWorker};
