//! Multipart framing helpers: boundary extraction from `Content-Type`
//! and per-part header parsing.

pub mod boundary;

pub use boundary::{extract_boundary, parse_part_header};
