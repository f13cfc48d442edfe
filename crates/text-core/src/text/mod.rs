//! Text stream primitives
//!
//! Everything that reads or writes protocol bytes goes through
//! [`ByteCursor`]. The value helpers and [`PairArray`] build on it for the
//! small amount of value sub-syntax the toolkit understands.

pub mod cursor;
pub mod pair;
pub mod value;

pub use cursor::{scan_line_terminator, self_inclusive_length, ByteCursor, HeaderLine, LengthPlaceholder, Line};
pub use pair::{Pair, PairArray};
pub use value::{format_float, parse_bool, parse_float, parse_size, parse_string};

/// Carriage return
pub const CR: u8 = b'\r';
/// Line feed
pub const LF: u8 = b'\n';
/// Space
pub const SP: u8 = b' ';
/// Horizontal tab
pub const HT: u8 = b'\t';
/// Header name/value separator
pub const COLON: u8 = b':';
