// Admin-key signing for EVM transactions and EIP-191 message signatures
// Uses secp256k1 ECDSA with recoverable signatures, keccak256 digests.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use super::ChainError;
use crate::address::WalletAddress;

/// Unsigned legacy (pre-EIP-2718) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTx {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: WalletAddress,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTx {
    fn encode_fields(&self, out: &mut Vec<u8>) {
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        Address::from(self.to.to_bytes()).encode(out);
        self.value.encode(out);
        Bytes::from(self.data.clone()).encode(out);
    }

    /// EIP-155 signing payload: rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]).
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut fields = Vec::new();
        self.encode_fields(&mut fields);
        self.chain_id.encode(&mut fields);
        0u8.encode(&mut fields);
        0u8.encode(&mut fields);
        wrap_list(fields)
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_payload())
    }

    fn encode_signed(&self, v: u64, r: U256, s: U256) -> Vec<u8> {
        let mut fields = Vec::new();
        self.encode_fields(&mut fields);
        v.encode(&mut fields);
        r.encode(&mut fields);
        s.encode(&mut fields);
        wrap_list(fields)
    }
}

fn wrap_list(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);
    out
}

/// The admin wallet's private key. Debug output never includes the secret.
pub struct AdminSigner {
    secret: SecretKey,
    address: WalletAddress,
}

impl std::fmt::Debug for AdminSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl AdminSigner {
    /// Parse a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(key: &str) -> Result<Self, ChainError> {
        let trimmed = key.trim();
        let raw = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
            .map_err(|e| ChainError::Signing(format!("invalid private key hex: {e}")))?;
        let secret = SecretKey::from_slice(&raw)
            .map_err(|e| ChainError::Signing(format!("invalid private key: {e}")))?;
        let secp = Secp256k1::new();
        let address = address_of(&PublicKey::from_secret_key(&secp, &secret));
        Ok(Self { secret, address })
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    fn sign_digest(&self, digest: &B256) -> Result<(u8, U256, U256), ChainError> {
        let secp = Secp256k1::new();
        let msg = Message::from_slice(digest.as_slice())
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        let sig = secp.sign_ecdsa_recoverable(&msg, &self.secret);
        let (rec_id, compact) = sig.serialize_compact();
        let r = U256::from_be_slice(&compact[..32]);
        let s = U256::from_be_slice(&compact[32..]);
        Ok((rec_id.to_i32() as u8, r, s))
    }

    /// Sign with EIP-155 replay protection and return the raw transaction bytes.
    pub fn sign_transaction(&self, tx: &LegacyTx) -> Result<Vec<u8>, ChainError> {
        let (rec_id, r, s) = self.sign_digest(&tx.signing_hash())?;
        let v = rec_id as u64 + tx.chain_id * 2 + 35;
        Ok(tx.encode_signed(v, r, s))
    }

    /// `personal_sign` over a UTF-8 message, 65 bytes `r || s || v` with v in {27, 28}.
    pub fn sign_message(&self, message: &str) -> Result<[u8; 65], ChainError> {
        let (rec_id, r, s) = self.sign_digest(&personal_message_hash(message))?;
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&r.to_be_bytes::<32>());
        out[32..64].copy_from_slice(&s.to_be_bytes::<32>());
        out[64] = rec_id + 27;
        Ok(out)
    }
}

/// EIP-191 version 0x45 digest, as produced by wallet `personal_sign`.
pub fn personal_message_hash(message: &str) -> B256 {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message.as_bytes());
    keccak256(data)
}

fn address_of(public: &PublicKey) -> WalletAddress {
    let uncompressed = public.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(bytes)
}

/// Recover the wallet that produced a `personal_sign` signature.
pub fn recover_message_signer(message: &str, signature: &[u8]) -> Result<WalletAddress, ChainError> {
    if signature.len() != 65 {
        return Err(ChainError::Signing(format!(
            "expected 65-byte signature, got {}",
            signature.len()
        )));
    }
    let v = signature[64];
    let rec = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        _ => return Err(ChainError::Signing(format!("invalid recovery byte {v}"))),
    };
    let rec_id =
        RecoveryId::from_i32(rec as i32).map_err(|e| ChainError::Signing(e.to_string()))?;
    let sig = RecoverableSignature::from_compact(&signature[..64], rec_id)
        .map_err(|e| ChainError::Signing(e.to_string()))?;

    let digest = personal_message_hash(message);
    let msg =
        Message::from_slice(digest.as_slice()).map_err(|e| ChainError::Signing(e.to_string()))?;
    let secp = Secp256k1::new();
    let public = secp
        .recover_ecdsa(&msg, &sig)
        .map_err(|e| ChainError::Signing(e.to_string()))?;
    Ok(address_of(&public))
}

#[cfg(test)]
mod tests {
    use super::*;

    // well-known throwaway keys
    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const WEB3_DOCS_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn derives_addresses() {
        let one = AdminSigner::from_hex(KEY_ONE).unwrap();
        assert_eq!(
            one.address().as_str(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        let docs = AdminSigner::from_hex(WEB3_DOCS_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(
            docs.address().to_checksum(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(AdminSigner::from_hex("0x1234").is_err());
        assert!(AdminSigner::from_hex("not hex").is_err());
        assert!(AdminSigner::from_hex(&format!("0x{}", "00".repeat(32))).is_err());
    }

    #[test]
    fn eip155_signing_payload_matches_reference_vector() {
        let tx = LegacyTx {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21_000,
            to: WalletAddress::parse("0x3535353535353535353535353535353535353535").unwrap(),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: vec![],
            chain_id: 1,
        };
        assert_eq!(
            hex::encode(tx.signing_payload()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn signed_transaction_is_an_rlp_list_with_eip155_v() {
        let signer = AdminSigner::from_hex(WEB3_DOCS_KEY).unwrap();
        let tx = LegacyTx {
            nonce: 0,
            gas_price: U256::from(5_000_000_000u64),
            gas_limit: 200_000,
            to: WalletAddress::parse("0x7ed9054c48088bb8cfc5c5fbc32775b9455a13f7").unwrap(),
            value: U256::ZERO,
            data: vec![0xa9, 0x05, 0x9c, 0xbb],
            chain_id: 56,
        };
        let raw = signer.sign_transaction(&tx).unwrap();
        // long list header
        assert!(raw[0] >= 0xf7);
        let header_len = 1 + (raw[0] - 0xf7) as usize;
        assert_eq!(raw.len() - header_len, {
            let mut n = 0usize;
            for b in &raw[1..header_len] {
                n = (n << 8) | *b as usize;
            }
            n
        });
        // v = recid + 56*2 + 35 -> 147 or 148, encoded as 0x81 0x93 / 0x81 0x94
        let v_pos = raw
            .windows(2)
            .position(|w| w == [0x81, 0x93] || w == [0x81, 0x94]);
        assert!(v_pos.is_some());
    }

    #[test]
    fn personal_sign_round_trips_through_recovery() {
        let signer = AdminSigner::from_hex(WEB3_DOCS_KEY).unwrap();
        let sig = signer.sign_message("Web3D admin authorization 1700000000").unwrap();
        assert!(sig[64] == 27 || sig[64] == 28);
        let who = recover_message_signer("Web3D admin authorization 1700000000", &sig).unwrap();
        assert_eq!(&who, signer.address());

        let other = recover_message_signer("Web3D admin authorization 1700000001", &sig).unwrap();
        assert_ne!(&other, signer.address());
    }

    #[test]
    fn recovery_rejects_malformed_signatures() {
        assert!(recover_message_signer("m", &[0u8; 64]).is_err());
        let mut sig = [1u8; 65];
        sig[64] = 5;
        assert!(recover_message_signer("m", &sig).is_err());
    }
}
