//! ID token verification.
//!
//! Sign-in itself happens against the external identity provider; this
//! server only verifies the tokens it issues.

pub mod token;
