//! Public address derivation
//!
//! The aggregator only needs a pure `record -> address` mapping. The
//! shipped implementation produces compressed-key P2PKH mainnet addresses:
//!
//! ```text
//! hex secret → secp256k1 pubkey (33 bytes) → SHA-256 → RIPEMD-160 → 0x00 ‖ hash → Base58Check
//! ```

use crate::records::Record;
use ripemd::Ripemd160;
use secp256k1::{PublicKey, Secp256k1, SecretKey, SignOnly};
use sha2::{Digest, Sha256};

/// Mainnet P2PKH version byte
const P2PKH_VERSION: u8 = 0x00;

/// Maps a record to the public identifier the balance endpoint understands
///
/// Must be pure: the same record always yields the same identifier.
/// `None` means the record is not a usable secret and contributes nothing.
pub trait AddressDeriver: Send + Sync {
    fn derive(&self, record: &Record) -> Option<String>;
}

pub struct P2pkhDeriver {
    secp: Secp256k1<SignOnly>,
}

impl P2pkhDeriver {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::signing_only(),
        }
    }
}

impl Default for P2pkhDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressDeriver for P2pkhDeriver {
    fn derive(&self, record: &Record) -> Option<String> {
        let hex_str = record.as_str();
        if hex_str.len() > 64 {
            return None;
        }
        // Finders often drop leading zeros
        let padded = format!("{:0>64}", hex_str);
        let bytes = hex::decode(padded).ok()?;
        let secret = SecretKey::from_slice(&bytes).ok()?;
        let public = PublicKey::from_secret_key(&self.secp, &secret);

        let hash160 = Ripemd160::digest(Sha256::digest(public.serialize()));

        let mut payload = Vec::with_capacity(21);
        payload.push(P2PKH_VERSION);
        payload.extend_from_slice(&hash160);
        Some(bs58::encode(payload).with_check().into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector_secret_one() {
        let deriver = P2pkhDeriver::new();
        let address = deriver.derive(&Record::new("1")).unwrap();
        assert_eq!(address, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
    }

    #[test]
    fn test_padding_is_transparent() {
        let deriver = P2pkhDeriver::new();
        let short = deriver.derive(&Record::new("1")).unwrap();
        let full = deriver
            .derive(&Record::new(
                "0000000000000000000000000000000000000000000000000000000000000001",
            ))
            .unwrap();
        assert_eq!(short, full);
    }

    #[test]
    fn test_deterministic() {
        let deriver = P2pkhDeriver::new();
        let record = Record::new("e9873d79c6d87dc0fb6a5778633389f4453213303da61f20bd67fc233aa33262");
        assert_eq!(deriver.derive(&record), deriver.derive(&record));
    }

    #[test]
    fn test_invalid_secrets_rejected() {
        let deriver = P2pkhDeriver::new();
        // Zero is not a valid secret key
        assert!(deriver.derive(&Record::new("0")).is_none());
        // Curve order n is out of range
        assert!(deriver
            .derive(&Record::new(
                "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141"
            ))
            .is_none());
        // More than 32 bytes
        assert!(deriver.derive(&Record::new(&"1".repeat(65))).is_none());
    }
}
