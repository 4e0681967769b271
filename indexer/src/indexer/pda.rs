//! Program-derived address (PDA) derivation.
//!
//! The verifier needs the on-chain address of an agent account before it
//! can probe for its existence. PDAs are found the same way the runtime
//! finds them: hash a seed sequence plus a bump byte plus the program id
//! until the result lands off the ed25519 curve.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use crate::types::primitives::Pubkey;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

fn is_on_curve(bytes: [u8; 32]) -> bool {
    CompressedEdwardsY(bytes).decompress().is_some()
}

/// Find the canonical PDA and bump seed for a seed sequence under a program.
///
/// Returns `None` in the astronomically unlikely case that every bump from
/// 255 down to 0 lands on-curve.
#[must_use]
pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    for bump in (0..=u8::MAX).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.as_bytes());
        hasher.update(PDA_MARKER);
        let hash: [u8; 32] = hasher.finalize().into();
        if !is_on_curve(hash) {
            return Some((Pubkey::from_bytes(hash), bump));
        }
    }
    None
}

/// The agent registration PDA: `"agent" || asset`.
#[must_use]
pub fn agent_pda(program_id: &Pubkey, asset: &Pubkey) -> Option<(Pubkey, u8)> {
    find_program_address(&[b"agent", asset.as_bytes()], program_id)
}

/// The validation PDA: `"validation" || asset || validator || u32_le(nonce)`.
#[must_use]
pub fn validation_pda(
    program_id: &Pubkey,
    asset: &Pubkey,
    validator: &Pubkey,
    nonce: u32,
) -> Option<(Pubkey, u8)> {
    find_program_address(
        &[
            b"validation",
            asset.as_bytes(),
            validator.as_bytes(),
            &nonce.to_le_bytes(),
        ],
        program_id,
    )
}

/// The per-key metadata PDA: `"agent_meta" || asset || first_16_bytes(sha256(key))`.
#[must_use]
pub fn metadata_pda(program_id: &Pubkey, asset: &Pubkey, key: &str) -> Option<(Pubkey, u8)> {
    let digest = Sha256::digest(key.as_bytes());
    find_program_address(
        &[b"agent_meta", asset.as_bytes(), &digest[..16]],
        program_id,
    )
}

/// The registry config PDA: `"registry_config" || collection`.
#[must_use]
pub fn registry_config_pda(program_id: &Pubkey, collection: &Pubkey) -> Option<(Pubkey, u8)> {
    find_program_address(&[b"registry_config", collection.as_bytes()], program_id)
}

/// The singleton root config PDA: `"root_config"`.
#[must_use]
pub fn root_config_pda(program_id: &Pubkey) -> Option<(Pubkey, u8)> {
    find_program_address(&[b"root_config"], program_id)
}
