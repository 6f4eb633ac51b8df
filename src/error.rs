use core::fmt;

/// The high-level class of an error.
///
/// The engine distinguishes:
/// - **Format** errors: the bytes at an offset cannot be interpreted as a legal
///   CBOR item (reserved additional info, truncation, stray break markers).
///   Always fatal for the current evaluation.
/// - **TypeMismatch** errors: a lazy value was asked to materialize as a
///   representation incompatible with its value type.
/// - **TagDecode** errors: a registered tag decoder could not parse its
///   payload (bad date string, invalid URI). Never downgraded to opaque.
/// - **QueryCompile** errors: a malformed stage tree, surfaced before any
///   evaluation begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Framing/structure failure in the raw bytes.
    Format,
    /// Incompatible materialization request.
    TypeMismatch,
    /// A tag decoder rejected its payload.
    TagDecode,
    /// The compiled stage tree is invalid.
    QueryCompile,
}

/// A structured error code identifying the reason an operation was rejected.
///
/// This enum is intentionally stable and string-free to remain hot-path friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Unexpected end-of-input while decoding.
    UnexpectedEof,
    /// Arithmetic overflow while computing a length/offset.
    LengthOverflow,
    /// Reserved additional-info value (28..30) was used.
    ReservedAdditionalInfo,
    /// Indefinite-length encoding on a major type that forbids it.
    IndefiniteLengthIllegal,
    /// A break marker (`0xff`) outside any indefinite-length container.
    UnexpectedBreak,
    /// A chunk of an indefinite-length string has the wrong major type or is
    /// itself indefinite.
    InvalidChunk,
    /// Invalid UTF-8 in a text string.
    Utf8Invalid,
    /// A two-byte simple value encoding a value below 32.
    UnsupportedSimpleValue,
    /// Nesting depth limit exceeded.
    DepthLimitExceeded,

    /// Expected an integer or float at the current location.
    ExpectedNumber,
    /// Expected a text string at the current location.
    ExpectedString,
    /// Expected a byte string at the current location.
    ExpectedBytes,
    /// Expected a boolean at the current location.
    ExpectedBool,
    /// Expected a null/undefined at the current location.
    ExpectedNull,
    /// Expected a sequence (array) at the current location.
    ExpectedSequence,
    /// Expected a dictionary (map) at the current location.
    ExpectedDictionary,
    /// Expected a semantic tag at the current location.
    ExpectedTag,

    /// A date-time tag payload is not a valid RFC 3339 date.
    InvalidDateTime,
    /// A URI tag payload is not a parseable URI.
    InvalidUri,
    /// A timestamp tag payload is not a number.
    InvalidTimestamp,
    /// An embedded-CBOR tag payload is not a definite byte string.
    InvalidNestedItem,
    /// An unregistered tag was encountered under the `Fail` policy.
    UnknownTagRejected,

    /// The compiled pipeline has no stages.
    EmptyPipeline,
    /// An entry stage appears outside its matching container selector.
    MisplacedEntryStage,
    /// A consume stage appears where the select statement forbids it.
    MisplacedConsumeStage,
    /// A select statement container holds non-entry children.
    InvalidSelectStatement,
    /// `begin`/`end` strategy calls are not strictly paired.
    UnbalancedSelect,
    /// Raw extraction is not defined for projection (rebuild) queries.
    ExtractUnsupported,
}

/// An engine error with structured classification, a stable code, and a byte offset.
///
/// Offsets are meaningful for `Format`, `TypeMismatch` and `TagDecode` errors.
/// For `QueryCompile` errors, `offset` is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    /// The error kind.
    pub kind: ErrorKind,
    /// The error code.
    pub code: ErrorCode,
    /// Byte offset into the input where the error was detected (0 for compile errors).
    pub offset: usize,
}

impl Error {
    /// Construct a format error at `offset`.
    #[inline]
    #[must_use]
    pub const fn format(code: ErrorCode, offset: usize) -> Self {
        Self {
            kind: ErrorKind::Format,
            code,
            offset,
        }
    }

    /// Construct a type-mismatch error at `offset`.
    #[inline]
    #[must_use]
    pub const fn type_mismatch(code: ErrorCode, offset: usize) -> Self {
        Self {
            kind: ErrorKind::TypeMismatch,
            code,
            offset,
        }
    }

    /// Construct a tag-decode error at `offset`.
    #[inline]
    #[must_use]
    pub const fn tag_decode(code: ErrorCode, offset: usize) -> Self {
        Self {
            kind: ErrorKind::TagDecode,
            code,
            offset,
        }
    }

    /// Construct a query-compile error.
    #[inline]
    #[must_use]
    pub const fn compile(code: ErrorCode) -> Self {
        Self {
            kind: ErrorKind::QueryCompile,
            code,
            offset: 0,
        }
    }

    /// Returns true iff this error was raised while compiling a query.
    #[inline]
    #[must_use]
    pub const fn is_compile(self) -> bool {
        matches!(self.kind, ErrorKind::QueryCompile)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.code {
            ErrorCode::UnexpectedEof => "unexpected end of input",
            ErrorCode::LengthOverflow => "length overflow",
            ErrorCode::ReservedAdditionalInfo => "reserved additional info value",
            ErrorCode::IndefiniteLengthIllegal => "indefinite length illegal for this major type",
            ErrorCode::UnexpectedBreak => "break marker outside indefinite-length container",
            ErrorCode::InvalidChunk => "invalid indefinite-length string chunk",
            ErrorCode::Utf8Invalid => "text must be valid UTF-8",
            ErrorCode::UnsupportedSimpleValue => "two-byte simple value below 32",
            ErrorCode::DepthLimitExceeded => "nesting depth limit exceeded",

            ErrorCode::ExpectedNumber => "expected integer or float",
            ErrorCode::ExpectedString => "expected text string",
            ErrorCode::ExpectedBytes => "expected byte string",
            ErrorCode::ExpectedBool => "expected boolean",
            ErrorCode::ExpectedNull => "expected null or undefined",
            ErrorCode::ExpectedSequence => "expected sequence",
            ErrorCode::ExpectedDictionary => "expected dictionary",
            ErrorCode::ExpectedTag => "expected semantic tag",

            ErrorCode::InvalidDateTime => "date-time tag payload is not a valid RFC 3339 date",
            ErrorCode::InvalidUri => "URI tag payload is not a parseable URI",
            ErrorCode::InvalidTimestamp => "timestamp tag payload is not a number",
            ErrorCode::InvalidNestedItem => {
                "embedded-CBOR tag payload is not a definite byte string"
            }
            ErrorCode::UnknownTagRejected => "unregistered semantic tag rejected by policy",

            ErrorCode::EmptyPipeline => "query pipeline has no stages",
            ErrorCode::MisplacedEntryStage => "entry stage outside its container selector",
            ErrorCode::MisplacedConsumeStage => "consume stage misplaced in select statement",
            ErrorCode::InvalidSelectStatement => "select statement holds non-entry children",
            ErrorCode::UnbalancedSelect => "begin/end strategy calls are not paired",
            ErrorCode::ExtractUnsupported => "raw extraction undefined for projection queries",
        };

        match self.kind {
            ErrorKind::Format => write!(f, "cbor format error at {}: {msg}", self.offset),
            ErrorKind::TypeMismatch => {
                write!(f, "cbor type mismatch at {}: {msg}", self.offset)
            }
            ErrorKind::TagDecode => write!(f, "cbor tag decode failed at {}: {msg}", self.offset),
            ErrorKind::QueryCompile => write!(f, "query compile failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
