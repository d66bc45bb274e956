//! Protocol-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: need {needed} more bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("VarInt encoding error: {0}")]
    VarInt(#[from] crate::types::VarIntError),

    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    #[error("length {len} exceeds limit of {max}")]
    LengthTooLarge { len: usize, max: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),
}
