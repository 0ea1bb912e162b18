//! Exit codes and machine-readable error reports.

use crate::library::LibraryError;
use crate::scheduler::SyncError;
use crate::store::StoreError;
use serde::Serialize;

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    /// Unexpected failure: configuration, store, transform, I/O.
    GeneralError = 1,
    /// The named asset does not exist.
    NotFound = 2,
    /// A sync pass ran and failed; the dirty flag is still set.
    SyncFailed = 3,
    /// Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix, e.g. `GS002`.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "GS000",
            Self::GeneralError => "GS001",
            Self::NotFound => "GS002",
            Self::SyncFailed => "GS003",
            Self::Interrupted => "GS130",
        }
    }

    /// Choose an exit code for an error escaping `run_app`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(
                LibraryError::NotFound(_) | LibraryError::Store(StoreError::NotFound(_)),
            ) = cause.downcast_ref::<LibraryError>()
            {
                return Self::NotFound;
            }
            if let Some(StoreError::NotFound(_)) = cause.downcast_ref::<StoreError>() {
                return Self::NotFound;
            }
            if cause.downcast_ref::<SyncError>().is_some() {
                return Self::SyncFailed;
            }
        }
        Self::GeneralError
    }
}

/// Error report printed under `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    /// Source chain below `message`, outermost first.
    pub causes: Vec<String>,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
