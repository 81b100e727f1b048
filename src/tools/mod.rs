//! Service operations
//!
//! Each function takes the shared [`Database`](crate::db::Database) and
//! reports failures as [`AppError`](crate::error::AppError).

pub mod batches;
pub mod ingredients;
pub mod status;
pub mod urls;
