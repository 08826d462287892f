//! DBGp wire protocol.
//!
//! Sub-modules:
//! - [`framer`]  : length-prefixed, NUL-terminated block I/O.
//! - [`command`] : outgoing command marshaling.
//! - [`response`]: XML decoding of engine replies.
//! - [`charset`] : XML declaration sniffing and transcoding.

pub mod charset;
pub mod command;
pub mod framer;
pub mod response;

pub use command::{marshal, Command};
pub use framer::{read_block, write_block, MAX_BLOCK_LEN};
pub use response::{
    unmarshal, unmarshal_init, Breakpoint, EngineFault, Init, Property, Reason, Response,
    StackFrame, Status, StopLocation,
};
