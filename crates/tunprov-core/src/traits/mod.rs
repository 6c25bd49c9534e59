//! Core traits for the provisioning engine
//!
//! This module defines the abstract interfaces behind which the external
//! world is hidden:
//!
//! - [`TunnelCli`]: the external tunneling tool (create / list / info /
//!   route-dns / token operations)
//! - [`CredentialStore`]: read-only filesystem access used by credential
//!   discovery, injectable so snapshot diffing can be tested without real
//!   file I/O

pub mod credential_store;
pub mod tunnel_cli;

pub use credential_store::CredentialStore;
pub use tunnel_cli::TunnelCli;
