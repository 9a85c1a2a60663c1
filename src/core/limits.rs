/*!
 * Pipeline Limits and Constants
 *
 * Centralized location for defaults, wire sizes, and exit codes.
 */

use super::types::Candidate;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Bytes per candidate on every pipe (u32, little-endian)
pub const WORD_WIDTH: usize = std::mem::size_of::<Candidate>();

// =============================================================================
// RANGE DEFAULTS
// =============================================================================

/// Smallest candidate the feeder may emit
pub const MIN_CANDIDATE: Candidate = 2;

/// Default upper bound (inclusive)
pub const DEFAULT_HI: Candidate = 35;

// =============================================================================
// PIPE LIMITS
// =============================================================================

/// Smallest capacity Linux accepts for F_SETPIPE_SZ (one page)
/// [LINUX-COMPAT]
pub const MIN_PIPE_CAPACITY: usize = 4096;

// =============================================================================
// EXIT CODES
// =============================================================================

/// Stage finished its drain normally
pub const EXIT_OK: i32 = 0;

/// Stage hit a pipe, process or output error (or an injected crash)
pub const EXIT_STAGE_FAILED: i32 = 1;

/// Stage body panicked; the panic never unwinds into the forking caller
pub const EXIT_PANICKED: i32 = 101;
