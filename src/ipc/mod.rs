/*!
 * IPC Module
 * Inter-process communication between pipeline stages
 */

pub mod pipe;

pub use pipe::pipe::pipe;
pub use pipe::{PipeError, ReceiveEnd, SendEnd};
