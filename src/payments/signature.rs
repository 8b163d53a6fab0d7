//! Webhook signature verification
//!
//! Paystack signs every webhook body with HMAC-SHA512 keyed by the account's
//! secret key and sends the lowercase hex digest in `x-paystack-signature`.
//! The digest must be computed over the body bytes exactly as received.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::warn;

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook signature (header lookups are case-insensitive)
pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
        }
    }

    /// Check `signature` against the raw request body.
    ///
    /// Never fails: an absent body or header, a malformed digest, or any
    /// internal error yields `false`.
    pub fn verify(&self, body: Option<&[u8]>, signature: Option<&str>) -> bool {
        let (Some(body), Some(signature)) = (body, signature) else {
            warn!("Webhook signature check without body or signature");
            return false;
        };

        // Only the exact lowercase hex form is accepted
        if signature.is_empty()
            || !signature
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            warn!("Webhook signature is not lowercase hex");
            return false;
        }

        let Ok(provided) = hex::decode(signature) else {
            warn!("Webhook signature has odd length");
            return false;
        };

        let Ok(mut mac) = HmacSha512::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(body);

        // verify_slice compares in constant time
        let valid = mac.verify_slice(&provided).is_ok();
        if !valid {
            warn!("Webhook signature verification failed");
        }
        valid
    }

    /// Lowercase hex HMAC-SHA512 of `body`
    pub fn sign(&self, body: &[u8]) -> String {
        match HmacSha512::new_from_slice(&self.secret) {
            Ok(mut mac) => {
                mac.update(body);
                hex::encode(mac.finalize().into_bytes())
            }
            Err(_) => String::new(),
        }
    }
}
