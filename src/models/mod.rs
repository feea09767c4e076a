pub mod artifact;
pub mod like;
pub mod results;

pub use artifact::{Artifact, ArtifactWithLikes, NewArtifact, OwnerQuery, SearchQuery};
pub use like::{Like, NewLike};
pub use results::{DeleteResult, InsertResult, UpdateResult};

/// Open map of client-supplied fields beyond the typed core ones.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// Key under which the store id is exposed. Clients can never set it.
pub const ID_KEY: &str = "_id";

/// Moves `key` out of `fields` when it holds a string. Any other value,
/// `null` included, stays in `fields` untouched.
fn take_string(fields: &mut Extra, key: &str) -> Option<String> {
    match fields.remove(key) {
        Some(serde_json::Value::String(value)) => Some(value),
        Some(other) => {
            fields.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

/// Puts a typed core field back into a field map.
fn put_string(fields: &mut Extra, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), serde_json::Value::String(value));
    }
}
