//! Request and response models shared by the client, cache, and transports.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{RequestBody, RequestOptions, StatusValidator};
pub use responses::{Response, ResponseLike, ResponseSource};
