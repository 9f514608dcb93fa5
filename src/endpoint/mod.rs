//! Endpoint launch configuration
//!
//! - `protocol` - protocol versions and their total order
//! - `cipher` - cipher suite catalogue with minimum protocol versions
//! - `options` - per-endpoint launch options and their invariants

pub mod cipher;
pub mod options;
pub mod protocol;

pub use cipher::Cipher;
pub use options::{CertKeyPair, EndpointOptions, Role};
pub use protocol::Protocol;
