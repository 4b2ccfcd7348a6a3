//! AES-256-GCM encryption of phone numbers at rest.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::AuthError;

const NONCE_LEN: usize = 12;

fn cipher(key: &[u8; 32]) -> Aes256Gcm {
    Aes256Gcm::new(key.into())
}

/// Seal a phone number as `base64url(nonce || ciphertext || tag)` with a
/// fresh random nonce.
pub fn encrypt(key: &[u8; 32], plaintext: &str) -> Result<String, AuthError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher(key)
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| AuthError::Crypto("phone number could not be sealed".into()))?;

    let mut stored = Vec::with_capacity(NONCE_LEN + sealed.len());
    stored.extend_from_slice(nonce.as_slice());
    stored.extend_from_slice(&sealed);
    Ok(URL_SAFE_NO_PAD.encode(stored))
}

pub fn decrypt(key: &[u8; 32], stored: &str) -> Result<String, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(stored)
        .map_err(|e| AuthError::Crypto(format!("stored phone number is not base64url: {e}")))?;
    if bytes.len() <= NONCE_LEN {
        return Err(AuthError::Crypto("stored phone number is truncated".into()));
    }

    let (nonce, sealed) = bytes.split_at(NONCE_LEN);
    let opened = cipher(key)
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| AuthError::Crypto("phone number could not be opened".into()))?;
    String::from_utf8(opened)
        .map_err(|e| AuthError::Crypto(format!("phone number is not utf-8: {e}")))
}

/// Normalize a phone number to `+digits`. Returns `None` when the input
/// does not look like an E.164 number.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    let allowed = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'));
    if !allowed || !(8..=15).contains(&digits.len()) {
        return None;
    }
    Some(format!("+{digits}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt() {
        let key = [7u8; 32];
        let sealed = encrypt(&key, "+16135550100").unwrap();
        assert_ne!(sealed, "+16135550100");
        assert_eq!(decrypt(&key, &sealed).unwrap(), "+16135550100");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt(&[1u8; 32], "+16135550100").unwrap();
        assert!(decrypt(&[2u8; 32], &sealed).is_err());
    }

    #[test]
    fn truncated_input_fails() {
        let key = [5u8; 32];
        assert!(decrypt(&key, "AAAA").is_err());
        assert!(decrypt(&key, "not base64 !").is_err());
    }

    #[test]
    fn nonce_differs_per_call() {
        let key = [3u8; 32];
        assert_ne!(encrypt(&key, "a").unwrap(), encrypt(&key, "a").unwrap());
    }

    #[test]
    fn phone_numbers_are_normalized() {
        assert_eq!(
            normalize_phone_number("+1 (613) 555-0100").as_deref(),
            Some("+16135550100")
        );
        assert!(normalize_phone_number("call me").is_none());
        assert!(normalize_phone_number("123").is_none());
    }
}
