#![forbid(unsafe_code)]

//! Error kinds the selection engine surfaces to its callers.
//!
//! Both types travel inside `anyhow::Error`; callers that care about the
//! kind, like the commands and the tests, recover them with
//! `Error::downcast_ref`.

use thiserror::Error;

/// A selection or rotation operation ran against an empty video table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("there are no videos in the library")]
pub struct NoVideosError;

/// `add_video` was handed something that is not an absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not a valid video url: {0:?}")]
pub struct InvalidInputError(pub String);
