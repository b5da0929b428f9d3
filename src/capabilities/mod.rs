//! Host-side capability objects exposed to the UI through the router.

pub mod local_file_system;

pub use local_file_system::LocalFileSystem;
