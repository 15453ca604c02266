//! Token claims as seen by the client.
//!
//! The client never holds the signing key. Claims are read without
//! signature verification and only used for expiry checks and as a hint
//! in current-user resolution; the server stays the authority.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use plannr_shared::TokenClaims;

use crate::error::ClientResult;

pub fn decode_claims(token: &str) -> ClientResult<TokenClaims> {
    let header = decode_header(token)?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

/// A token without `exp` never expires on the client side.
pub fn is_expired(claims: &TokenClaims, now: DateTime<Utc>) -> bool {
    claims.exp.is_some_and(|exp| now.timestamp() >= exp)
}
