use argon2::{
    Argon2,
    password_hash::{
        Error, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

/// PHC string for `passphrase`, suitable for `ADMIN_PASSPHRASE_HASH`.
pub fn hash_password(passphrase: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)?
        .to_string())
}

/// Fails on a mismatch as well as on a malformed stored hash.
pub fn verify_password(passphrase: &str, hashed: &str) -> Result<(), Error> {
    let parsed = PasswordHash::new(hashed)?;
    Argon2::default().verify_password(passphrase.as_bytes(), &parsed)
}
