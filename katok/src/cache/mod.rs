//! Cache storage for locally persisted state.

mod file;
mod traits;

pub use file::FileCache;
pub use traits::{CacheStorage, CacheStorageExt};

/// Cache key layout.
pub mod keys {
    use crate::models::UserId;

    /// Settings of one user.
    pub fn settings(user: UserId) -> String {
        format!("settings/{}", user)
    }
}
