//! Error taxonomy shared by the decoder, the record codec and the composer.

#[derive(Debug, thiserror::Error)]
pub enum MovieError {
    /// Bad signature, unsupported version or structurally impossible data.
    #[error("Format: {0}")]
    Format(String),
    #[error("Underrun: needed {needed} bits, {available} available")]
    Underrun { needed: usize, available: usize },
    #[error("Align: value needs {natural} bits, width is {width}")]
    Align { natural: u32, width: u32 },
    #[error("Negative value {0} for unsigned codec")]
    NegativeValue(i64),
    #[error("Movie clip not found: {0}")]
    ClipNotFound(String),
    #[error("Character id not found: {0}")]
    CharacterNotFound(u16),
    #[error("Unterminated string at byte {offset}")]
    UnterminatedString { offset: usize },
    #[error("Character table exhausted")]
    TableExhausted,
    #[error("Snapshot: {0}")]
    Snapshot(String),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

impl MovieError {
    /// True for the recoverable "named clip / referenced id absent" family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MovieError::ClipNotFound(_) | MovieError::CharacterNotFound(_))
    }
}

impl From<bincode::Error> for MovieError {
    fn from(e: bincode::Error) -> Self {
        MovieError::Snapshot(e.to_string())
    }
}
