use anyhow::{anyhow, Result};
use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Separator between a cookie value and its signature.
/// Base64url output never contains it, so the last occurrence splits.
const SIGNATURE_SEPARATOR: char = ':';

/// HMAC-SHA256 signer for visit cookies
#[derive(Clone)]
pub struct CookieSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

impl CookieSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    /// Signer with a per-process key (signed cookies won't survive restarts)
    pub fn random() -> Self {
        let key: [u8; 32] = rand::random();
        Self { key: key.to_vec() }
    }

    fn mac(&self, name: &str, value: &str) -> Result<Hmac<Sha256>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| anyhow!("Failed to create HMAC: {}", e))?;

        // Bind the value to its cookie name
        mac.update(name.as_bytes());
        mac.update(b"=");
        mac.update(value.as_bytes());
        Ok(mac)
    }

    /// Append a signature to `value`
    pub fn sign(&self, name: &str, value: &str) -> Result<String> {
        let signature = self.mac(name, value)?.finalize().into_bytes();
        Ok(format!(
            "{}{}{}",
            value,
            SIGNATURE_SEPARATOR,
            BASE64_URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Return the original value if the signature matches
    pub fn verify(&self, name: &str, signed: &str) -> Result<String> {
        let (value, signature_b64) = signed
            .rsplit_once(SIGNATURE_SEPARATOR)
            .ok_or_else(|| anyhow!("Cookie '{}' is not signed", name))?;

        let provided = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| anyhow!("Invalid signature encoding on cookie '{}'", name))?;

        let expected = self.mac(name, value)?.finalize().into_bytes();

        if expected.ct_eq(&provided[..]).into() {
            Ok(value.to_string())
        } else {
            Err(anyhow!("Signature verification failed for cookie '{}'", name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = CookieSigner::new("test_secret_key_for_hmac_signing");

        let signed = signer.sign("last_visit", "2024-03-15 12:30:45.000000").unwrap();
        assert!(signed.starts_with("2024-03-15 12:30:45.000000:"));

        let value = signer.verify("last_visit", &signed).unwrap();
        assert_eq!(value, "2024-03-15 12:30:45.000000");
    }

    #[test]
    fn test_tampered_value_rejected() {
        let signer = CookieSigner::new("test_secret_key_for_hmac_signing");
        let signed = signer.sign("visits", "3").unwrap();
        let tampered = signed.replacen('3', "300", 1);

        assert!(signer.verify("visits", &tampered).is_err());
    }

    #[test]
    fn test_signature_bound_to_name() {
        let signer = CookieSigner::new("test_secret_key_for_hmac_signing");
        let signed = signer.sign("visits", "3").unwrap();

        assert!(signer.verify("last_visit", &signed).is_err());
    }

    #[test]
    fn test_other_key_rejected() {
        let signed = CookieSigner::new("one").sign("visits", "3").unwrap();

        assert!(CookieSigner::new("two").verify("visits", &signed).is_err());
        assert!(CookieSigner::random().verify("visits", &signed).is_err());
    }

    #[test]
    fn test_unsigned_value_rejected() {
        let signer = CookieSigner::new("test_secret_key_for_hmac_signing");

        assert!(signer.verify("visits", "3").is_err());
        assert!(signer.verify("visits", "3:not*base64").is_err());
    }
}
