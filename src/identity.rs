use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::Config;

pub type HmacSha256 = Hmac<Sha256>;

/// Turns raw biometric material into an opaque token that can be compared for
/// equality without keeping the material itself.
///
/// The output is stable across restarts: with no pepper it is the SHA-256 of
/// the payload, otherwise the HMAC-SHA-256 under the configured pepper. Either
/// way it is 64 lowercase hex digits.
#[derive(Clone, Default)]
pub struct IdentityHasher {
    pepper: Option<Vec<u8>>,
}

impl IdentityHasher {
    /// An unkeyed hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// A hasher keyed with a deployment-wide secret.
    pub fn with_pepper(pepper: impl AsRef<[u8]>) -> Self {
        Self {
            pepper: Some(pepper.as_ref().to_vec()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        match config.biometric_pepper() {
            Some(pepper) => Self::with_pepper(pepper),
            None => Self::new(),
        }
    }

    pub fn digest(&self, raw: impl AsRef<[u8]>) -> String {
        let bytes = match self.pepper {
            Some(ref key) => {
                let mut mac =
                    HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(raw.as_ref());
                mac.finalize().into_bytes().to_vec()
            }
            None => Sha256::digest(raw.as_ref()).to_vec(),
        };
        HEXLOWER.encode(&bytes)
    }
}
