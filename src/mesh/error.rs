use thiserror::Error;

/// Errors produced while decoding a mesh file into geometry.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unexpected end of data at byte {position}")]
    Truncated { position: usize },

    #[error("face references vertex {index} but only {vertex_count} vertices exist")]
    BadIndex { index: u32, vertex_count: usize },

    #[error("not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed number: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("malformed integer: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

/// Errors produced by the fetch-and-decode loader.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch mesh: {0}")]
    Fetch(String),

    #[error("failed to decode mesh: {0}")]
    Decode(#[from] DecodeError),
}
