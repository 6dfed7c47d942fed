//! Endpoint secret generation.

use rand::RngCore;

/// Prefix identifying Hookrelay endpoint secrets.
pub const SECRET_PREFIX: &str = "whsec_";

/// Raw entropy per secret, before encoding.
const SECRET_BYTES: usize = 32;

/// Generate a fresh high-entropy endpoint secret.
///
/// The secret is returned to the caller exactly once, at endpoint creation
/// or rotation; it is never re-exposed by any read API afterwards.
pub fn generate_endpoint_secret() -> String {
    let mut raw = [0u8; SECRET_BYTES];
    rand::rng().fill_bytes(&mut raw);
    format!(
        "{SECRET_PREFIX}{}",
        fast32::base64::RFC4648_NOPAD.encode(&raw)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_prefixed_and_unique() {
        let a = generate_endpoint_secret();
        let b = generate_endpoint_secret();
        assert!(a.starts_with(SECRET_PREFIX));
        assert!(a.len() > SECRET_PREFIX.len() + 40);
        assert_ne!(a, b);
    }
}
