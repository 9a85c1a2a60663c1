/*!
 * Pipe Module
 * Unix pipes carrying fixed-width candidates between stage processes
 */

pub mod codec;
pub mod pipe;
pub mod types;

// Re-export public API
pub use pipe::{capacity_of, pipe};
pub use types::{PipeError, ReceiveEnd, SendEnd};
