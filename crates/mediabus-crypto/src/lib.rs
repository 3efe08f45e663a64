//! Opaque signed-token codec for MediaBus.
//!
//! A `SignedToken` is `base64url(payload) + "." + base64url(HMAC-SHA256(secret, base64url(payload)))`.
//! The payload is never re-parsed before the signature is checked: verification
//! HMACs the exact base64 substring that was received, so a rewrite that changes
//! key ordering in a JSON re-serialization can never silently invalidate or
//! (worse) resurrect a forged cookie.

mod canonical;
mod error;
#[cfg(test)]
mod proptests;
mod token;

pub use canonical::{read_str_field as canonical_read_str, read_uint_field as canonical_read_uint, CanonicalObject};
pub use error::TokenError;
pub use token::{sign, verify, TokenCodec};
