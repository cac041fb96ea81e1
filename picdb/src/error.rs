//! Error types for picdb operations.

/// Alias for `Result<T, picdb::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by picdb operations.
///
/// Every fallible core operation returns exactly one of these kinds; there
/// is no nested/wrapped variant hierarchy to unwind through.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error from the underlying database file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A row or header allocation could not be satisfied.
    #[error("out of memory allocating {0} metadata rows")]
    OutOfMemory(u32),

    /// An argument was structurally invalid (e.g. resolution bounds).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A database filename failed validation.
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// A picture identifier failed validation (empty or too long).
    #[error("invalid picture id: {0}")]
    InvalidPictId(String),

    /// A resolution token did not map to `thumb`/`small`/`orig`.
    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    /// A CLI subcommand was not recognized.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// No row with the given picture id exists.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// `num_files == max_files`; no empty slot is available.
    #[error("database is full ({max_files} files)")]
    FullDatabase {
        /// The database's configured capacity.
        max_files: u32,
    },

    /// A `NON_EMPTY` row already has this exact picture id.
    #[error("duplicate picture id: {0}")]
    DuplicateId(String),

    /// `num_files`/`max_files` exceeds `MAX_MAX_FILES` on open.
    #[error("too many files: {0} exceeds the {1} limit")]
    TooManyFiles(u32, u32),

    /// The image provider failed to decode or resize a buffer.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// A CLI invocation was missing required arguments.
    #[error("not enough arguments: {0}")]
    NotEnoughArguments(String),
}

impl Error {
    /// Maps an error to the positive exit-code taxonomy used by the CLI:
    /// one static code per error kind.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::OutOfMemory(_) => 2,
            Self::InvalidArgument(_) => 3,
            Self::InvalidFilename(_) => 4,
            Self::InvalidPictId(_) => 5,
            Self::InvalidResolution(_) => 6,
            Self::InvalidCommand(_) => 7,
            Self::FileNotFound(_) => 8,
            Self::FullDatabase { .. } => 9,
            Self::DuplicateId(_) => 10,
            Self::TooManyFiles(..) => 11,
            Self::ImageDecode(_) => 12,
            Self::NotEnoughArguments(_) => 13,
        }
    }
}
