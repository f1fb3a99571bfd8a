//! Chosen-ciphertext attacks against block cipher modes.
//!
//! - [`cbc::crack`] recovers CBC plaintext from an oracle that only says whether padding is valid.
//! - [`ecb::crack_unknown_suffix`] recovers the secret an ECB encryption oracle appends to its
//!   input, measuring block length and any unknown prefix on the way.
//!
//! Oracles are anything implementing [`oracle::PaddingOracle`] or [`oracle::EncryptionOracle`],
//! including plain closures. The attacks never see a key.
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::missing_errors_doc)]

pub mod bytes_ext;
pub mod cbc;
pub mod cookie;
pub mod crypto;
pub mod ecb;
pub mod error;
pub mod hex;
pub mod oracle;

pub use error::{Error, Result};
