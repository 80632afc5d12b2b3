//! Wire-level API clients.

pub mod gemini;
