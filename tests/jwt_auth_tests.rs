// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that tokens created by `create_jwt` decode with the
//! settings the auth middleware uses.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use pickem_rewards::middleware::auth::{create_jwt, Claims};

#[test]
fn test_jwt_roundtrip() {
    let signing_key = b"test_signing_key_32_bytes_long!!";

    let token = create_jwt("user-42", signing_key).expect("Failed to create JWT");

    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    let decoded = decode::<Claims>(&token, &key, &validation).expect("Failed to decode JWT");

    assert_eq!(decoded.claims.sub, "user-42");
    assert!(decoded.claims.exp > decoded.claims.iat);
}

#[test]
fn test_jwt_rejected_with_other_key() {
    let token = create_jwt("user-42", b"test_signing_key_32_bytes_long!!").unwrap();

    let key = DecodingKey::from_secret(b"a_completely_different_signing_key");
    let validation = Validation::new(Algorithm::HS256);
    assert!(decode::<Claims>(&token, &key, &validation).is_err());
}
