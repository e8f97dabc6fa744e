// Author: Lukas Bower
// Purpose: Define HiveFS wire types and constants shared across components.

//! HiveFS wire data model shared by the codec and both endpoints.

use core::fmt;

use alloc::string::String;
use alloc::vec::Vec;

/// Well-known port of the naming server's client-facing service interface.
pub const SERVICE_PORT: u16 = 6000;

/// Well-known port of the naming server's registration interface.
pub const REGISTRATION_PORT: u16 = 6001;

/// Upper bound on a single frame, header included.
pub const MAX_FRAME: u32 = 1 << 20;

/// Possible errors produced while encoding or decoding HiveFS frames.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    /// Input buffer was shorter than the declared frame length.
    #[error("truncated frame")]
    Truncated,
    /// Encountered an unknown message type.
    #[error("unsupported message type {0}")]
    Unsupported(u8),
    /// Encountered malformed UTF-8 data.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// Declared frame size does not match the actual byte count.
    #[error("length mismatch: declared {declared} actual {actual}")]
    LengthMismatch {
        /// Frame length declared in the header.
        declared: u32,
        /// Actual byte length observed.
        actual: usize,
    },
    /// Frame exceeds [`MAX_FRAME`].
    #[error("frame of {0} bytes exceeds limit")]
    Oversize(usize),
    /// A path field is not in canonical form.
    #[error("malformed path on the wire")]
    InvalidPath,
    /// A stub reference carried an unusable target address.
    #[error("malformed stub address on the wire")]
    InvalidAddress,
    /// An error reply named a kind this endpoint does not know.
    #[error("unknown error kind in reply")]
    UnknownErrorKind,
}

/// Failure kinds carried at the interface layer.
///
/// The `Display` form is the wire string; [`ErrorKind::parse`] is its
/// inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation targets a path the responder does not know.
    NotFound,
    /// Malformed path, illegal component, or bad bounds.
    InvalidArgument,
    /// Byte range falls outside the file.
    OutOfBounds,
    /// A required argument was absent. Unconstructible from this crate's
    /// own surface; kept for peers that can transmit absent arguments.
    NullArg,
    /// Server not started, already registered, and similar state faults.
    IllegalState,
    /// Transport, marshalling, or unexpected remote failure.
    RemoteInvocation,
    /// Local filesystem failure on the storage server.
    IoError,
}

impl ErrorKind {
    /// Parse the wire string back into a kind.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "NotFound" => Self::NotFound,
            "InvalidArgument" => Self::InvalidArgument,
            "OutOfBounds" => Self::OutOfBounds,
            "NullArg" => Self::NullArg,
            "IllegalState" => Self::IllegalState,
            "RemoteInvocation" => Self::RemoteInvocation,
            "IoError" => Self::IoError,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "NotFound",
            Self::InvalidArgument => "InvalidArgument",
            Self::OutOfBounds => "OutOfBounds",
            Self::NullArg => "NullArg",
            Self::IllegalState => "IllegalState",
            Self::RemoteInvocation => "RemoteInvocation",
            Self::IoError => "IoError",
        };
        write!(f, "{text}")
    }
}

/// Interface-layer failure: a kind plus a human-readable message.
///
/// This is what a remote method raises, what travels in an error reply,
/// and what the caller's stub rethrows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    /// Failure kind, stable across the wire.
    pub kind: ErrorKind,
    /// Human-readable description; advisory only.
    pub message: String,
}

impl RemoteError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorKind::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Shorthand for [`ErrorKind::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Shorthand for [`ErrorKind::OutOfBounds`].
    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfBounds, message)
    }

    /// Shorthand for [`ErrorKind::IllegalState`].
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalState, message)
    }

    /// Shorthand for [`ErrorKind::RemoteInvocation`].
    pub fn remote_invocation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteInvocation, message)
    }

    /// Shorthand for [`ErrorKind::IoError`].
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IoError, message)
    }
}

/// Remote interfaces a stub or skeleton can speak for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Iface {
    /// Naming server, client-facing operations.
    Service = 0,
    /// Naming server, storage-server registration.
    Registration = 1,
    /// Storage server, byte operations.
    Storage = 2,
    /// Storage server, control operations.
    Command = 3,
}

impl Iface {
    pub(crate) fn from_raw(value: u8) -> Result<Self, WireError> {
        Ok(match value {
            0 => Self::Service,
            1 => Self::Registration,
            2 => Self::Storage,
            3 => Self::Command,
            other => return Err(WireError::Unsupported(other)),
        })
    }
}

impl fmt::Display for Iface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Service => "service",
            Self::Registration => "registration",
            Self::Storage => "storage",
            Self::Command => "command",
        };
        write!(f, "{name}")
    }
}

/// Transportable form of a stub: the interface it satisfies and the
/// `host:port` target it connects to. Returned across calls so a receiver
/// can rebuild a working stub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StubRef {
    /// Interface the referenced skeleton dispatches for.
    pub iface: Iface,
    /// Target address in `host:port` form.
    pub addr: String,
}

/// Request envelope: a caller-chosen tag plus the operation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Call identifier, echoed by the reply.
    pub tag: u16,
    /// The concrete operation.
    pub body: RequestBody,
}

/// Reply envelope mirroring the request tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Tag of the request being answered.
    pub tag: u16,
    /// The concrete reply payload.
    pub body: ResponseBody,
}

/// One variant per remote operation across the four interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Naming: is the path a directory node?
    IsDirectory {
        /// Canonical path to test.
        path: String,
    },
    /// Naming: names of a directory's immediate children.
    List {
        /// Canonical directory path.
        path: String,
    },
    /// Naming: add a file node and place it on a storage server.
    CreateFile {
        /// Canonical path of the new file.
        path: String,
    },
    /// Naming: add a directory node.
    CreateDirectory {
        /// Canonical path of the new directory.
        path: String,
    },
    /// Naming: remove a file or directory subtree.
    DeleteEntry {
        /// Canonical path to remove.
        path: String,
    },
    /// Naming: which storage server holds this file?
    GetStorage {
        /// Canonical file path.
        path: String,
    },
    /// Naming: announce a storage server and its pre-existing files.
    Register {
        /// Stub for the server's byte operations.
        storage: StubRef,
        /// Stub for the server's control operations.
        command: StubRef,
        /// Canonical paths of files already present under the local root.
        files: Vec<String>,
    },
    /// Storage: byte length of a file.
    Size {
        /// Canonical file path.
        path: String,
    },
    /// Storage: read a byte range.
    Read {
        /// Canonical file path.
        path: String,
        /// Offset into the file.
        offset: i64,
        /// Number of bytes requested.
        length: i32,
    },
    /// Storage: write bytes at an offset, extending the file as needed.
    Write {
        /// Canonical file path.
        path: String,
        /// Offset within the file.
        offset: i64,
        /// Payload bytes.
        data: Vec<u8>,
    },
    /// Command: create an empty file, making parent directories.
    Create {
        /// Canonical path of the new file.
        path: String,
    },
    /// Command: remove a file or directory subtree from local disk.
    Remove {
        /// Canonical path to remove.
        path: String,
    },
}

impl RequestBody {
    /// The interface this operation belongs to.
    #[must_use]
    pub fn iface(&self) -> Iface {
        match self {
            Self::IsDirectory { .. }
            | Self::List { .. }
            | Self::CreateFile { .. }
            | Self::CreateDirectory { .. }
            | Self::DeleteEntry { .. }
            | Self::GetStorage { .. } => Iface::Service,
            Self::Register { .. } => Iface::Registration,
            Self::Size { .. } | Self::Read { .. } | Self::Write { .. } => Iface::Storage,
            Self::Create { .. } | Self::Remove { .. } => Iface::Command,
        }
    }
}

/// Reply payloads, one per operation, plus the tagged error reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Reply to [`RequestBody::IsDirectory`].
    IsDirectory {
        /// Whether the path names a directory node.
        value: bool,
    },
    /// Reply to [`RequestBody::List`].
    List {
        /// Immediate child names.
        names: Vec<String>,
    },
    /// Reply to [`RequestBody::CreateFile`].
    CreateFile {
        /// `false` if the path already existed.
        created: bool,
    },
    /// Reply to [`RequestBody::CreateDirectory`].
    CreateDirectory {
        /// `false` if the path already existed.
        created: bool,
    },
    /// Reply to [`RequestBody::DeleteEntry`].
    DeleteEntry {
        /// `false` if a storage server refused the removal.
        deleted: bool,
    },
    /// Reply to [`RequestBody::GetStorage`].
    GetStorage {
        /// Stub of the storage server holding the file's bytes.
        stub: StubRef,
    },
    /// Reply to [`RequestBody::Register`].
    Register {
        /// Paths the registering server must delete locally.
        evict: Vec<String>,
    },
    /// Reply to [`RequestBody::Size`].
    Size {
        /// Byte length of the file.
        size: i64,
    },
    /// Reply to [`RequestBody::Read`].
    Read {
        /// Bytes read from the requested range.
        data: Vec<u8>,
    },
    /// Reply to [`RequestBody::Write`]; carries nothing.
    Write,
    /// Reply to [`RequestBody::Create`].
    Create {
        /// `false` for root or an existing entry.
        created: bool,
    },
    /// Reply to [`RequestBody::Remove`].
    Remove {
        /// `false` for root or a missing entry.
        deleted: bool,
    },
    /// Error reply carrying the failure kind and message.
    Error {
        /// Failure kind to rethrow at the caller.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl From<RemoteError> for ResponseBody {
    fn from(err: RemoteError) -> Self {
        Self::Error {
            kind: err.kind,
            message: err.message,
        }
    }
}
