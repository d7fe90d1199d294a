//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Run completed, nothing left unexplained          |
//! | 1    | Run completed, discrepancies found               |
//! | 2    | CLI usage error (bad args, unknown file type)    |
//! | 3    | Invalid match config                             |
//! | 4    | Malformed input record (shape error)             |
//! | 5    | I/O or load failure (unreadable file, bad JSON)  |

/// Success - run completed and every record was matched.
pub const EXIT_SUCCESS: u8 = 0;

/// Discrepancies found. Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_RECON_DISCREPANCIES: u8 = 1;

/// Usage error - bad arguments, unsupported input extension.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or holds an out-of-range value.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// A statement line or invoice could not be canonicalized.
pub const EXIT_RECON_SHAPE: u8 = 4;

/// Cannot read inputs, write output, or parse the JSON/CSV container.
pub const EXIT_IO: u8 = 5;
