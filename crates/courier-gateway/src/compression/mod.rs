//! Inbound stream decompression

mod zlib_stream;

pub use zlib_stream::{InflateError, ZlibStream, ZLIB_SUFFIX};
