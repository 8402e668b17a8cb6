//! Signing seam for command Interests and produced Data.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::name::{Component, Name};
use crate::protocol::{Data, Signature};
use crate::tlv::{types, Element};

/// Which key signs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SigningInfo {
    /// SHA-256 digest, no key.
    #[default]
    Digest,
    /// Key of the named identity.
    Identity(Name),
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("no key for identity {0}")]
    UnknownIdentity(Name),
}

pub trait Signer {
    /// Append the signed-command components (timestamp, nonce, SignatureInfo,
    /// SignatureValue) to `name`.
    fn sign_command(&mut self, name: Name, info: &SigningInfo) -> Result<Name, SignerError>;

    fn sign_data(&mut self, data: &mut Data, info: &SigningInfo) -> Result<(), SignerError>;
}

/// DigestSha256 signatures. Rejects identity signing.
#[derive(Debug, Default)]
pub struct DigestSigner {
    last_timestamp: u64,
}

impl DigestSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `data` carries a DigestSha256 signature matching its contents.
    pub fn verify_data(data: &Data) -> bool {
        match &data.signature {
            Some(signature) if signature.signature_type == Signature::DIGEST_SHA256 => {
                let digest = Sha256::digest(data.signed_portion(signature));
                digest.as_slice() == signature.value.as_slice()
            }
            _ => false,
        }
    }

    /// Milliseconds since the epoch, strictly increasing across calls.
    fn next_timestamp(&mut self) -> u64 {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.last_timestamp = wall.max(self.last_timestamp + 1);
        self.last_timestamp
    }

    fn digest_signature() -> Signature {
        Signature {
            signature_type: Signature::DIGEST_SHA256,
            key_locator: None,
            value: Vec::new(),
        }
    }
}

fn require_digest(info: &SigningInfo) -> Result<(), SignerError> {
    match info {
        SigningInfo::Digest => Ok(()),
        SigningInfo::Identity(identity) => Err(SignerError::UnknownIdentity(identity.clone())),
    }
}

impl Signer for DigestSigner {
    fn sign_command(&mut self, name: Name, info: &SigningInfo) -> Result<Name, SignerError> {
        require_digest(info)?;
        let mut nonce = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut nonce);
        let signature = Self::digest_signature();
        let name = name
            .append_number(self.next_timestamp())
            .append(Component::from(&nonce[..]))
            .append(Component::new(signature.info_element().encode()));

        let mut hasher = Sha256::new();
        for component in name.components() {
            let mut encoded = Vec::new();
            component.encode_to(&mut encoded);
            hasher.update(&encoded);
        }
        let value = Element::new(types::SIGNATURE_VALUE, hasher.finalize().to_vec());
        Ok(name.append(Component::new(value.encode())))
    }

    fn sign_data(&mut self, data: &mut Data, info: &SigningInfo) -> Result<(), SignerError> {
        require_digest(info)?;
        let mut signature = Self::digest_signature();
        signature.value = Sha256::digest(data.signed_portion(&signature)).to_vec();
        data.signature = Some(signature);
        Ok(())
    }
}
