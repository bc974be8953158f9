// Library exports for mailsheet crate
// This allows tests and the binary to use the modules

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod gmail_client;
pub mod sheets_client;

// Mailbox → sheet synchronization
pub mod sync;
