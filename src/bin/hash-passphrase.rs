//! Prints an argon2 PHC string for `ADMIN_PASSPHRASE_HASH`.
//!
//! Usage: `hash-passphrase <passphrase>`, or pipe the passphrase on stdin.

use std::io::{self, BufRead};

use anyhow::{Context, bail};
use geoattend::auth::password::hash_password;

fn main() -> anyhow::Result<()> {
    let passphrase = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => io::stdin()
            .lock()
            .lines()
            .next()
            .context("no passphrase on stdin")?
            .context("failed to read stdin")?,
    };
    if passphrase.is_empty() {
        bail!("passphrase must not be empty");
    }

    let hash = hash_password(&passphrase).map_err(|e| anyhow::anyhow!("hashing failed: {e}"))?;
    println!("{hash}");
    Ok(())
}
