#![forbid(unsafe_code)]

//! Shared privilege checks for the dailytube commands.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Fails fast when a command is started as root. Every command writes into
/// `DATA_ROOT`, and a root-owned database there breaks later unprivileged
/// runs.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!(
            "{process} must not be run as root; use a regular user or a dedicated service account"
        );
    }
    Ok(())
}
