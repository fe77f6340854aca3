#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! ### Supported algorithms
//!
//! #### Key-exchange:
//! see [`algorithm::Kex`].
//!
//! #### Encryption:
//! see [`algorithm::Cipher`].
//!
//! #### MACs:
//! see [`algorithm::Hmac`].
//!
//! #### Compression:
//! see [`algorithm::Compress`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

mod error;
pub use error::{Error, Result};

pub mod wire;

pub mod algorithm;
pub mod side;

pub mod service;

pub mod stream;
pub use stream::Stream;

mod session;
pub use session::Session;

/// The I/O capabilities required from the underlying transport stream.
pub trait Pipe: futures::AsyncBufRead + futures::AsyncWrite + Unpin + Send {}

impl<T: futures::AsyncBufRead + futures::AsyncWrite + Unpin + Send> Pipe for T {}
