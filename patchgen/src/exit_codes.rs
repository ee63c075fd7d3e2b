//! Stable exit codes for patchgen CLI commands.

/// Command succeeded; for `run` and `validate` the patch is clean.
pub const OK: i32 = 0;
/// Usage, configuration or I/O error.
pub const INVALID: i32 = 1;
/// The response yielded no files or diff (`Parse`, `EmptyExtraction`, `MalformedResponse`).
pub const EXTRACTION_FAILED: i32 = 2;
/// The patch carries validation errors, per-file failures or does not apply.
pub const PATCH_INVALID: i32 = 3;
/// TwoStep produced an empty patch: every replacement matched the original.
pub const NO_CHANGES: i32 = 4;
