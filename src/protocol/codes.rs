//! Response code table for the wire protocol.
//!
//! Every request is answered with a coded line. Codes are two ASCII digits
//! grouped into bands:
//!
//! - `00`/`0X` — success / success with warnings
//! - `1X` — message framing errors
//! - `2X` — parsing and argument validation errors
//! - `3X` — serial transport and device errors
//! - `4X` — auxiliary bus errors
//! - `9X` — safety errors
//!
//! Warnings are composable: several may apply to one operation and are
//! rendered together on a single line. Errors are exclusive; the first error
//! found is the whole response. Some codes carry free-text detail supplied by
//! the device layer (for example a serial exception message), appended after
//! the generic message.

use bytes::Bytes;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Line terminator for both requests and responses.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Severity class of a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation completed; no caveats.
    Success,
    /// Operation completed but with a caveat the client should know about.
    Warning,
    /// Operation refused or failed; no state was changed.
    Error,
}

/// The closed set of protocol response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    /// `00` — completed without errors.
    Ok,
    /// `01` — command has no effect (state already matches).
    NoEffect,
    /// `02` — one or more arguments were out of range and were clamped.
    Clamped,
    /// `04` — safety interlock override is asserted.
    OverrideActive,
    /// `10` — message too short or empty.
    TooShort,
    /// `11` — message too long to parse.
    TooLong,
    /// `12` — message not terminated with CRLF.
    BadTerminator,
    /// `13` — message contains no commands.
    NoCommand,
    /// `14` — message contains too many tokens.
    TooManyTokens,
    /// `20` — command verb not recognized.
    UnknownCommand,
    /// `21` — fewer arguments than the command signature requires.
    TooFewArgs,
    /// `22` — more arguments than the command signature allows.
    TooManyArgs,
    /// `23` — an enumerated argument was not a recognized token.
    ArgNotRecognized,
    /// `24` — an argument was not of the expected type.
    ArgWrongType,
    /// `25` — a numeric argument was out of range (strict mode).
    ArgOutOfRange,
    /// `26` — requested operation mode conflicts with the modulation mode.
    ModeConflict,
    /// `30` — unexpected serial port error.
    PortError,
    /// `31` — unable to connect to the serial port.
    PortUnavailable,
    /// `32` — timeout waiting for the device.
    DeviceTimeout,
    /// `33` — the laser reported an error executing the command.
    LaserFault,
    /// `34` — the modulation controller returned an unexpected response.
    AuxRejected,
    /// `40` — auxiliary bus device unreachable.
    BusUnavailable,
    /// `90` — safety interlock is open.
    InterlockOpen,
}

impl Code {
    /// All codes, in wire order. Drives the lookup index and the table tests.
    pub const ALL: [Code; 23] = [
        Code::Ok,
        Code::NoEffect,
        Code::Clamped,
        Code::OverrideActive,
        Code::TooShort,
        Code::TooLong,
        Code::BadTerminator,
        Code::NoCommand,
        Code::TooManyTokens,
        Code::UnknownCommand,
        Code::TooFewArgs,
        Code::TooManyArgs,
        Code::ArgNotRecognized,
        Code::ArgWrongType,
        Code::ArgOutOfRange,
        Code::ModeConflict,
        Code::PortError,
        Code::PortUnavailable,
        Code::DeviceTimeout,
        Code::LaserFault,
        Code::AuxRejected,
        Code::BusUnavailable,
        Code::InterlockOpen,
    ];

    /// The two-digit wire key for this code.
    pub fn digits(self) -> &'static str {
        match self {
            Code::Ok => "00",
            Code::NoEffect => "01",
            Code::Clamped => "02",
            Code::OverrideActive => "04",
            Code::TooShort => "10",
            Code::TooLong => "11",
            Code::BadTerminator => "12",
            Code::NoCommand => "13",
            Code::TooManyTokens => "14",
            Code::UnknownCommand => "20",
            Code::TooFewArgs => "21",
            Code::TooManyArgs => "22",
            Code::ArgNotRecognized => "23",
            Code::ArgWrongType => "24",
            Code::ArgOutOfRange => "25",
            Code::ModeConflict => "26",
            Code::PortError => "30",
            Code::PortUnavailable => "31",
            Code::DeviceTimeout => "32",
            Code::LaserFault => "33",
            Code::AuxRejected => "34",
            Code::BusUnavailable => "40",
            Code::InterlockOpen => "90",
        }
    }

    /// The human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            Code::Ok => "Completed without errors",
            Code::NoEffect => "Command has no effect",
            Code::Clamped => "One or more of the arguments were out of range",
            Code::OverrideActive => "Safety interlock override is on",
            Code::TooShort => "Received message is too short or contains no data",
            Code::TooLong => "Received message is too long and cannot be parsed",
            Code::BadTerminator => "Received message is not terminated correctly",
            Code::NoCommand => "Received message contains no commands",
            Code::TooManyTokens => "Received message contains too many arguments",
            Code::UnknownCommand => "Command not recognized",
            Code::TooFewArgs => "Not enough arguments provided for this command",
            Code::TooManyArgs => "Too many arguments provided for this command",
            Code::ArgNotRecognized => "One or more provided arguments not recognized",
            Code::ArgWrongType => "One or more provided arguments are not of expected type",
            Code::ArgOutOfRange => "One or more provided arguments are not in range",
            Code::ModeConflict => {
                "Requested operation mode conflicts with the current modulation mode"
            }
            Code::PortError => "Unexpected serial port error",
            Code::PortUnavailable => "Unable to connect to specified serial port",
            Code::DeviceTimeout => "A timeout occurred while waiting for the device",
            Code::LaserFault => "Laser returned an error while executing command",
            Code::AuxRejected => "Modulation controller returned an unexpected response",
            Code::BusUnavailable => "Unable to reach auxiliary bus device",
            Code::InterlockOpen => "Safety interlock is open",
        }
    }

    /// Severity, derived from the numeric band.
    pub fn severity(self) -> Severity {
        match self {
            Code::Ok => Severity::Success,
            Code::NoEffect | Code::Clamped | Code::OverrideActive => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Look up a code by its two-digit wire key.
    pub fn from_digits(digits: &str) -> Option<Code> {
        static INDEX: Lazy<HashMap<&'static str, Code>> =
            Lazy::new(|| Code::ALL.iter().map(|c| (c.digits(), *c)).collect());
        INDEX.get(digits).copied()
    }
}

/// Render a coded line, appending optional detail text.
///
/// Unknown digit strings fail soft: they render as a distinguishable
/// unknown-code line rather than panicking, so a stray code from the device
/// layer can never take down a connection worker.
pub fn encode(digits: &str, detail: Option<&str>) -> Bytes {
    let line = match Code::from_digits(digits) {
        Some(code) => match detail {
            Some(text) => format!("{} : {} : {}", code.digits(), code.message(), text),
            None => format!("{} : {}", code.digits(), code.message()),
        },
        None => "?? : An unknown response code was returned".to_string(),
    };
    Bytes::from(format!("{line}{LINE_TERMINATOR}"))
}

/// A complete response to one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Mutating command completed; carries any accumulated warnings.
    Done { warnings: Vec<Code> },
    /// Operation refused or failed with an exclusive error code.
    Failed { code: Code, detail: Option<String> },
    /// Query completed; the payload is the whole response line.
    Payload(String),
}

impl Reply {
    /// Shorthand for a failure without detail text.
    pub fn failed(code: Code) -> Self {
        Reply::Failed { code, detail: None }
    }

    /// Encode this reply as a CRLF-terminated wire line.
    ///
    /// Multiple warnings compose into a single line: the codes space-joined,
    /// then the matching messages joined with `; `.
    pub fn encode(&self) -> Bytes {
        match self {
            Reply::Done { warnings } if warnings.is_empty() => encode(Code::Ok.digits(), None),
            Reply::Done { warnings } => {
                let digits: Vec<&str> = warnings.iter().map(|w| w.digits()).collect();
                let messages: Vec<&str> = warnings.iter().map(|w| w.message()).collect();
                Bytes::from(format!(
                    "{} : {}{}",
                    digits.join(" "),
                    messages.join("; "),
                    LINE_TERMINATOR
                ))
            }
            Reply::Failed { code, detail } => encode(code.digits(), detail.as_deref()),
            Reply::Payload(payload) => Bytes::from(format!("{payload}{LINE_TERMINATOR}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_round_trip_through_index() {
        for code in Code::ALL {
            assert_eq!(Code::from_digits(code.digits()), Some(code));
        }
    }

    #[test]
    fn severity_follows_band() {
        assert_eq!(Code::Ok.severity(), Severity::Success);
        assert_eq!(Code::OverrideActive.severity(), Severity::Warning);
        assert_eq!(Code::TooLong.severity(), Severity::Error);
        assert_eq!(Code::InterlockOpen.severity(), Severity::Error);
    }

    #[test]
    fn encode_known_code() {
        let line = encode("90", None);
        assert_eq!(&line[..], b"90 : Safety interlock is open\r\n".as_slice());
    }

    #[test]
    fn encode_appends_detail() {
        let line = encode("31", Some("No such file or directory"));
        assert_eq!(
            &line[..],
            b"31 : Unable to connect to specified serial port : No such file or directory\r\n"
                .as_slice()
        );
    }

    #[test]
    fn encode_unknown_code_fails_soft() {
        let line = encode("77", None);
        assert_eq!(
            &line[..],
            b"?? : An unknown response code was returned\r\n".as_slice()
        );
    }

    #[test]
    fn reply_without_warnings_is_plain_success() {
        let reply = Reply::Done { warnings: vec![] };
        assert_eq!(&reply.encode()[..], b"00 : Completed without errors\r\n".as_slice());
    }

    #[test]
    fn reply_composes_multiple_warnings() {
        let reply = Reply::Done {
            warnings: vec![Code::NoEffect, Code::OverrideActive],
        };
        assert_eq!(
            &reply.encode()[..],
            b"01 04 : Command has no effect; Safety interlock override is on\r\n".as_slice()
        );
    }

    #[test]
    fn payload_reply_is_bare_line() {
        let reply = Reply::Payload("50".to_string());
        assert_eq!(&reply.encode()[..], b"50\r\n".as_slice());
    }
}
