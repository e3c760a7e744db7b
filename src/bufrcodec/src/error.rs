use thiserror::Error;

pub type Result<A, E = BufrError> = std::result::Result<A, E>;

/// Error taxonomy for the codec, the table loaders, and the domain mapper.
#[derive(Debug, Error)]
pub enum BufrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no master table loaded after initialisation")]
    TableLoadFailed,

    #[error("unknown descriptor {0:06}")]
    UnknownDescriptor(u32),

    #[error("descriptor cycle detected at {0:06}")]
    DescriptorCycle(u32),

    #[error("section 4 ended before expansion finished")]
    TruncatedMessage,

    #[error("invalid BUFR magic in section 0")]
    InvalidMagic,

    #[error("unsupported BUFR edition {0}")]
    InvalidEdition(u8),

    #[error("section 5 terminator is not '7777'")]
    InvalidTerminator,

    #[error("{path}:{line}: malformed table entry")]
    ParseError { path: String, line: usize },

    #[error("{0}: Coverage-JSON input unparseable or missing 'coverages'")]
    DomainInputError(String),

    #[error("Coverage-JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("end of bit stream")]
    EndOfStream,
}
