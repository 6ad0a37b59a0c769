//! Collaborators the repositories call out to: credential hashing and file storage.

pub mod password;
pub mod storage;

pub use password::{BcryptHasher, PasswordHasher};
pub use storage::{FileCategory, FileStore, LocalFileStore, StoredFile};
