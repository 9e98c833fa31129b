//! Command implementations.

pub mod fetch;
pub mod hostdir;
pub mod info;
pub mod list;
pub mod remove;
