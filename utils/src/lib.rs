//! Shared infrastructure utilities for lspbridge.
//!
//! - **`atomic_write`**: crash-safe replacement of files the server asked us
//!   to edit (temp + rename, permissions preserved)

pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_with_options,
};
