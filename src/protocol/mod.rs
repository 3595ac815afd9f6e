//! Wire protocol: framing, response codes, and argument validation.

pub mod codes;
pub mod framing;
pub mod validate;

pub use codes::{Code, Reply, Severity, LINE_TERMINATOR};
pub use framing::{frame, MAX_FRAME_LEN, MAX_TOKENS};
pub use validate::{validate, ArgSpec, ArgValue, Validated};
