//! Challenge personalization.
//!
//! An assertion signs `SHA-256(SHA-256(chainId ‖ account ‖ salt) ‖
//! SHA-256(calldata))`, so a signature authorizes exactly one payload against
//! one account manager on one chain.

use alloy_primitives::{Address, B256, U256};
use sha2::{Digest, Sha256};

/// The challenge an assertion over `calldata` must sign.
///
/// `chain_id` is written as a 32-byte big-endian word, followed by the
/// 20-byte `account` and the 32-byte `salt`, with no separators.
pub fn personalize(chain_id: u64, account: Address, salt: B256, calldata: &[u8]) -> B256 {
    let mut domain = Sha256::new();
    domain.update(U256::from(chain_id).to_be_bytes::<32>());
    domain.update(account.as_slice());
    domain.update(salt.as_slice());
    let domain = domain.finalize();

    let mut outer = Sha256::new();
    outer.update(domain);
    outer.update(Sha256::digest(calldata));
    B256::from_slice(&outer.finalize())
}
