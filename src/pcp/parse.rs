//! Parser for the PCP client's text output
//!
//! The client prints a banner, one column header and then one record per
//! PCP server it talked to, terminated by a blank line:
//!
//! ```text
//! Flow signaling succeeded.
//! PCP Server IP        Prot Int. IP               port   Dst. IP               port   Ext. IP               port Res State Ends
//! ::ffff:192.168.0.1   TCP  ::ffff:192.168.0.2   32100   ::                       0   ::ffff:1.2.3.4 32100   0  succ Sat Feb 13 19:41:56 2021
//! ```
//!
//! The first successful record with a routable external address wins.

use super::clock::Clock;
use crate::portmap::{Lifetime, MapError, Port, Protocol, Response};
use chrono::{Local, NaiveDateTime, TimeZone};
use std::net::IpAddr;
use std::str::{FromStr, SplitWhitespace};
use thiserror::Error;
use tracing::{debug, trace};

/// Banner printed when the server answered
pub(crate) const SUCCESS_BANNER: &str = "Flow signaling succeeded.";

/// Banner printed when no answer arrived in time
pub(crate) const TIMEOUT_BANNER: &str = "Flow signaling timed out.";

/// Result state of a granted mapping
const SUCCESS_STATE: &str = "succ";

/// What the client prints instead of an end time it doesn't know yet
const PENDING_END_TIME: &str = "-";

/// Number of fields up to and including the result state
const RESULT_FIELDS: usize = 10;

/// Format of the five-token end time, e.g. `Sat Feb 13 19:41:56 2021`
pub(crate) const END_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Errors in a single record line
#[derive(Debug, Error)]
pub enum ParseError {
    /// The line ended before all fields were read
    #[error("unexpected end of line, expected {field}")]
    UnexpectedEnd {
        /// Field that was missing
        field: &'static str,
    },

    /// A numeric field didn't hold a number in range
    #[error("invalid {field}: {token:?}")]
    InvalidNumber {
        /// Field that was malformed
        field: &'static str,
        /// Offending token
        token: String,
    },

    /// The external address is not an IP address
    #[error("unable to parse gateway IP address {0:?}")]
    GatewayIp(String),

    /// The end time doesn't match the expected format
    #[error("unable to parse lifetime: {0}")]
    EndTime(#[from] chrono::ParseError),

    /// The end time doesn't exist in the local time zone
    #[error("lifetime end {0:?} is not a valid local time")]
    LocalTime(String),

    /// The end time was the placeholder dash on an otherwise successful record
    #[error("delayed parse error: {0}")]
    PendingEndTime(#[source] Box<ParseError>),
}

impl ParseError {
    /// Whether the line simply ran out of fields
    ///
    /// Holds for a placeholder end time too, which ends the line early.
    pub fn is_end_of_input(&self) -> bool {
        match self {
            Self::UnexpectedEnd { .. } => true,
            Self::PendingEndTime(inner) => inner.is_end_of_input(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    LookingForStart,
    SkippingHeader,
    ParsingLines,
    Complete,
}

/// Parse the complete standard output of one client invocation
pub fn parse_output(output: &[u8], clock: &dyn Clock) -> Result<Response, MapError> {
    let text = String::from_utf8_lossy(output);
    let mut phase = Phase::LookingForStart;

    for line in text.lines() {
        match phase {
            Phase::LookingForStart => match line.trim_end() {
                SUCCESS_BANNER => phase = Phase::SkippingHeader,
                TIMEOUT_BANNER => return Err(MapError::NotDone),
                _ => {}
            },
            Phase::SkippingHeader => phase = Phase::ParsingLines,
            Phase::ParsingLines => {
                if line.trim().is_empty() {
                    phase = Phase::Complete;
                    continue;
                }
                let res = parse_line(line, clock)?;
                if is_link_local_unicast(&res.gateway_ip) {
                    debug!("Skipping link-local mapping at {}", res.gateway_ip);
                    continue;
                }
                return Ok(res);
            }
            Phase::Complete => break,
        }
    }

    trace!("No usable record in output (stopped in {:?})", phase);
    Err(MapError::NotFound)
}

/// Fields of one record that matter to the response
#[derive(Debug, Default)]
struct Record<'a> {
    protocol: &'a str,
    node_port: u16,
    gateway_ip: &'a str,
    gateway_port: u16,
    result_code: u16,
    state: &'a str,
    end_time: [&'a str; 5],
}

/// Whitespace tokenizer counting the fields it handed out
struct Fields<'a> {
    tokens: SplitWhitespace<'a>,
    parsed: usize,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace(),
            parsed: 0,
        }
    }

    fn text(&mut self, field: &'static str) -> Result<&'a str, ParseError> {
        let token = self
            .tokens
            .next()
            .ok_or(ParseError::UnexpectedEnd { field })?;
        self.parsed += 1;
        Ok(token)
    }

    fn number<T: FromStr>(&mut self, field: &'static str) -> Result<T, ParseError> {
        let token = self
            .tokens
            .next()
            .ok_or(ParseError::UnexpectedEnd { field })?;
        let value = token.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            token: token.to_string(),
        })?;
        self.parsed += 1;
        Ok(value)
    }

    fn scan(&mut self, rec: &mut Record<'a>) -> Result<(), ParseError> {
        self.text("server address")?;
        rec.protocol = self.text("protocol")?;
        self.text("internal address")?;
        rec.node_port = self.number("internal port")?;
        self.text("destination address")?;
        self.number::<u16>("destination port")?;
        rec.gateway_ip = self.text("external address")?;
        rec.gateway_port = self.number("external port")?;
        rec.result_code = self.number("result code")?;
        rec.state = self.text("result state")?;
        for slot in rec.end_time.iter_mut() {
            *slot = self.text("lifetime end")?;
        }
        Ok(())
    }
}

/// Parse one record line into a response
pub fn parse_line(line: &str, clock: &dyn Clock) -> Result<Response, MapError> {
    let mut fields = Fields::new(line);
    let mut rec = Record::default();

    let pending = match fields.scan(&mut rec) {
        Ok(()) => None,
        Err(e)
            if e.is_end_of_input()
                && fields.parsed >= RESULT_FIELDS
                && rec.end_time[0] == PENDING_END_TIME =>
        {
            Some(e)
        }
        Err(e) => return Err(e.into()),
    };

    if rec.result_code != 0 {
        return Err(MapError::Failed {
            code: rec.result_code,
            status: rec.state.to_string(),
        });
    }

    if rec.state != SUCCESS_STATE {
        return Err(MapError::NotDone);
    }

    // A successful record without an end time is still malformed.
    if let Some(e) = pending {
        return Err(ParseError::PendingEndTime(Box::new(e)).into());
    }

    let protocol = match rec.protocol {
        "TCP" => Protocol::TCP,
        "UDP" => Protocol::UDP,
        // The client prints anything but TCP and UDP as UNK.
        "UNK" => Protocol::SCTP,
        _ => Protocol::ANY,
    };

    let gateway_ip = rec
        .gateway_ip
        .parse::<IpAddr>()
        .map_err(|_| ParseError::GatewayIp(rec.gateway_ip.to_string()))?
        .to_canonical();

    let end_text = rec.end_time.join(" ");
    let end_naive = NaiveDateTime::parse_from_str(&end_text, END_TIME_FORMAT)
        .map_err(ParseError::EndTime)?;
    let end = Local
        .from_local_datetime(&end_naive)
        .earliest()
        .ok_or_else(|| ParseError::LocalTime(end_text.clone()))?;

    let remaining = (end - clock.now()).num_seconds();
    let lifetime = Lifetime(remaining.clamp(0, i64::from(u32::MAX)) as u32);

    Ok(Response {
        protocol,
        node_port: Port(rec.node_port),
        gateway_port: Port(rec.gateway_port),
        gateway_ip,
        lifetime,
    })
}

/// Whether `ip` is a link-local unicast address (169.254.0.0/16 or fe80::/10)
pub(crate) fn is_link_local_unicast(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}
