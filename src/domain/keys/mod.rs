//! Key & address resolution
//!
//! Turns caller-supplied credential and address strings into typed principals
//! and derives holding (associated token) accounts without touching the network.

use solana_sdk::{
    pubkey,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use std::str::FromStr;

use crate::shared::errors::PaymentError;
use crate::shared::types::Role;

/// Token-2022 program id
pub const TOKEN_2022_PROGRAM_ID: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

const KEYPAIR_LENGTH: usize = 64;

/// Whether a holding account may be derived for an owner that is not a valid
/// ed25519 point (a program-derived address). Must be asked for explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerCurve {
    RequireOnCurve,
    AllowOffCurve,
}

#[derive(Debug)]
enum Identity {
    Signing(Keypair),
    AddressOnly(Pubkey),
}

/// A keyed identity on the ledger, bound to the role it plays in one payment
#[derive(Debug)]
pub struct Principal {
    role: Role,
    identity: Identity,
}

impl Principal {
    pub fn signing(role: Role, keypair: Keypair) -> Self {
        Self {
            role,
            identity: Identity::Signing(keypair),
        }
    }

    pub fn address_only(role: Role, address: Pubkey) -> Self {
        Self {
            role,
            identity: Identity::AddressOnly(address),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pubkey(&self) -> Pubkey {
        match &self.identity {
            Identity::Signing(keypair) => keypair.pubkey(),
            Identity::AddressOnly(address) => *address,
        }
    }

    pub fn keypair(&self) -> Option<&Keypair> {
        match &self.identity {
            Identity::Signing(keypair) => Some(keypair),
            Identity::AddressOnly(_) => None,
        }
    }

    pub fn can_sign(&self) -> bool {
        self.keypair().is_some()
    }

    /// Signing key, or `MalformedCredential` if this principal is address-only
    pub fn require_keypair(&self) -> Result<&Keypair, PaymentError> {
        self.keypair()
            .ok_or_else(|| PaymentError::malformed(self.role, "principal has no signing key"))
    }
}

/// Parse a signing credential. Accepts base58 text or a JSON array of bytes,
/// both encoding the 64-byte secret+public keypair.
pub fn parse_credential(role: Role, credential: &str) -> Result<Principal, PaymentError> {
    let trimmed = credential.trim();
    if trimmed.is_empty() {
        return Err(PaymentError::malformed(role, "empty credential"));
    }

    let bytes = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(trimmed)
            .map_err(|e| PaymentError::malformed(role, format!("invalid JSON byte array: {}", e)))?
    } else {
        bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| PaymentError::malformed(role, format!("invalid base58: {}", e)))?
    };

    if bytes.len() != KEYPAIR_LENGTH {
        return Err(PaymentError::malformed(
            role,
            format!("expected {} key bytes, got {}", KEYPAIR_LENGTH, bytes.len()),
        ));
    }

    let keypair = Keypair::from_bytes(&bytes)
        .map_err(|e| PaymentError::malformed(role, format!("inconsistent keypair: {}", e)))?;
    Ok(Principal::signing(role, keypair))
}

/// Parse a public address into an address-only principal
pub fn parse_address(role: Role, address: &str) -> Result<Principal, PaymentError> {
    let pubkey = Pubkey::from_str(address.trim())
        .map_err(|e| PaymentError::malformed(role, format!("invalid address: {}", e)))?;
    Ok(Principal::address_only(role, pubkey))
}

/// Canonical holding account for (owner, mint) under the given token program
pub fn holding_account(
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
    curve: OwnerCurve,
) -> Result<Pubkey, PaymentError> {
    if curve == OwnerCurve::RequireOnCurve && !owner.is_on_curve() {
        return Err(PaymentError::malformed(
            Role::Destination,
            format!("owner {} is off-curve; off-curve derivation was not requested", owner),
        ));
    }
    Ok(get_associated_token_address_with_program_id(
        owner,
        mint,
        token_program,
    ))
}

pub fn is_token_program(program: &Pubkey) -> bool {
    *program == spl_token::id() || *program == TOKEN_2022_PROGRAM_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base58_and_json_credentials() {
        let keypair = Keypair::new();

        let b58 = keypair.to_base58_string();
        let principal = parse_credential(Role::Funder, &b58).unwrap();
        assert_eq!(principal.pubkey(), keypair.pubkey());
        assert!(principal.can_sign());
        assert_eq!(principal.role(), Role::Funder);

        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let principal = parse_credential(Role::FeePayer, &json).unwrap();
        assert_eq!(principal.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = parse_credential(Role::Funder, "[1,2,3]").unwrap_err();
        assert!(matches!(
            err,
            PaymentError::MalformedCredential { role: Role::Funder, .. }
        ));

        let short = bs58::encode([7u8; 32]).into_string();
        assert!(parse_credential(Role::FeePayer, &short).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_credential(Role::Funder, "not-base58-0OIl").is_err());
        assert!(parse_credential(Role::Funder, "[1, 2,").is_err());
        assert!(parse_credential(Role::Funder, "   ").is_err());
    }

    #[test]
    fn test_address_only_principal_cannot_sign() {
        let address = Pubkey::new_unique();
        let principal = parse_address(Role::Destination, &address.to_string()).unwrap();
        assert_eq!(principal.pubkey(), address);
        assert!(!principal.can_sign());
        assert!(principal.require_keypair().is_err());

        assert!(parse_address(Role::Destination, "xyz").is_err());
    }

    #[test]
    fn test_holding_account_matches_ata_derivation() {
        let owner = Keypair::new().pubkey();
        let mint = Pubkey::new_unique();

        let derived =
            holding_account(&owner, &mint, &spl_token::id(), OwnerCurve::RequireOnCurve).unwrap();
        assert_eq!(
            derived,
            get_associated_token_address_with_program_id(&owner, &mint, &spl_token::id())
        );

        let token_2022 =
            holding_account(&owner, &mint, &TOKEN_2022_PROGRAM_ID, OwnerCurve::RequireOnCurve)
                .unwrap();
        assert_ne!(derived, token_2022);
    }

    #[test]
    fn test_off_curve_owner_requires_explicit_opt_in() {
        let (pda, _) = Pubkey::find_program_address(&[b"vault"], &spl_token::id());
        let mint = Pubkey::new_unique();

        assert!(holding_account(&pda, &mint, &spl_token::id(), OwnerCurve::RequireOnCurve).is_err());
        assert!(holding_account(&pda, &mint, &spl_token::id(), OwnerCurve::AllowOffCurve).is_ok());
    }
}
