//! Shared types for the formula engine.
//!
//! - [`span`]: byte-offset spans and on-demand line/column lookup
//! - [`token`]: the token vocabulary produced by `formula-lexer`
//! - [`error`]: lexer errors and the error kind / severity taxonomy shared by
//!   the checker and the runtime

pub mod error;
pub mod span;
pub mod token;
