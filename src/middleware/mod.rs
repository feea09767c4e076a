pub mod auth;
pub mod firebase;

pub use auth::{require_auth, require_email_match, SharedVerifier, VerifiedIdentity};
pub use firebase::FirebaseVerifier;
