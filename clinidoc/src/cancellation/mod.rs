//! Cancellation support for batch runs.

mod token;

pub use token::CancellationToken;
