use serde::{Deserialize, Serialize};

use super::{put_string, take_string, Extra, ID_KEY};

/// Derived attribute name; never persisted.
pub const LIKES_COUNT_KEY: &str = "likes_count";

const ARTIFACT_NAME: &str = "artifact_name";
const ADDER_EMAIL: &str = "adder_email";

/// Artifact document as stored and served
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adder_email: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Artifact {
    /// The document body without its id.
    pub fn body(&self) -> NewArtifact {
        NewArtifact {
            artifact_name: self.artifact_name.clone(),
            adder_email: self.adder_email.clone(),
            extra: self.extra.clone(),
        }
    }

    /// Shallow merge: every top-level key in `patch` replaces the stored one.
    /// `_id` is ignored.
    pub fn merged(&self, patch: Extra) -> NewArtifact {
        let mut doc = self.body().into_fields();
        for (key, value) in patch {
            if key != ID_KEY {
                doc.insert(key, value);
            }
        }
        NewArtifact::from(doc)
    }

    /// Whether `email` is the recorded owner of this artifact.
    pub fn is_owned_by(&self, email: Option<&str>) -> bool {
        matches!((self.adder_email.as_deref(), email), (Some(owner), Some(caller)) if owner == caller)
    }

    /// Case-insensitive, unanchored substring match on `artifact_name`.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.artifact_name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&needle.to_lowercase()))
    }
}

/// Request body for creating an artifact; also the persisted body shape.
///
/// Core fields are typed only when the client sent a string. Any other value
/// (`null`, numbers, objects) is kept as sent in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Extra")]
pub struct NewArtifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adder_email: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NewArtifact {
    /// All fields as one flat map.
    pub fn into_fields(self) -> Extra {
        let mut fields = self.extra;
        put_string(&mut fields, ARTIFACT_NAME, self.artifact_name);
        put_string(&mut fields, ADDER_EMAIL, self.adder_email);
        fields
    }
}

impl From<Extra> for NewArtifact {
    /// Drops keys the store owns or derives.
    fn from(mut fields: Extra) -> Self {
        fields.remove(ID_KEY);
        fields.remove(LIKES_COUNT_KEY);
        Self {
            artifact_name: take_string(&mut fields, ARTIFACT_NAME),
            adder_email: take_string(&mut fields, ADDER_EMAIL),
            extra: fields,
        }
    }
}

/// Artifact augmented with the number of likes referencing it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactWithLikes {
    #[serde(flatten)]
    pub artifact: Artifact,
    pub likes_count: i64,
}

/// Query for GET /artifacts
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

impl SearchQuery {
    /// An empty `?name=` means no filter.
    pub fn filter(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// Query for the per-user listings (`?email=`)
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rosetta() -> Artifact {
        let extra = json!({ "artifact_type": "Inscription", "discovered_by": "Bouchard" });
        Artifact {
            id: "a1".to_string(),
            artifact_name: Some("Rosetta Stone".to_string()),
            adder_email: Some("a@x.com".to_string()),
            extra: extra.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_name_contains_case_insensitive() {
        let artifact = rosetta();
        assert!(artifact.name_contains("rosetta"));
        assert!(artifact.name_contains("TTA ST"));
        assert!(!artifact.name_contains("antikythera"));
    }

    #[test]
    fn test_name_contains_without_name() {
        let mut artifact = rosetta();
        artifact.artifact_name = None;
        assert!(!artifact.name_contains("a"));
    }

    #[test]
    fn test_merged_replaces_only_given_keys() {
        let artifact = rosetta();
        let patch = json!({ "artifact_name": "X", "_id": "hijack" });
        let merged = artifact.merged(patch.as_object().cloned().unwrap());

        assert_eq!(merged.artifact_name.as_deref(), Some("X"));
        assert_eq!(merged.adder_email.as_deref(), Some("a@x.com"));
        assert_eq!(merged.extra, artifact.extra);
    }

    #[test]
    fn test_merged_null_is_kept() {
        let patch = json!({ "adder_email": null });
        let merged = rosetta().merged(patch.as_object().cloned().unwrap());

        assert_eq!(merged.adder_email, None);
        assert_eq!(merged.extra["adder_email"], Value::Null);
    }

    #[test]
    fn test_merged_non_string_core_field_is_kept() {
        let patch = json!({ "artifact_name": 42 });
        let merged = rosetta().merged(patch.as_object().cloned().unwrap());

        assert_eq!(merged.artifact_name, None);
        assert_eq!(merged.extra["artifact_name"], 42);
    }

    #[test]
    fn test_body_keeps_non_string_core_values_verbatim() {
        let sent = json!({
            "artifact_name": null,
            "adder_email": ["a@x.com"],
            "artifact_type": "Coin",
            "_id": "client-id",
            "likes_count": 99
        });
        let body: NewArtifact = serde_json::from_value(sent).unwrap();

        assert_eq!(body.artifact_name, None);
        assert_eq!(body.adder_email, None);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "artifact_name": null, "adder_email": ["a@x.com"], "artifact_type": "Coin" })
        );
    }

    #[test]
    fn test_body_types_string_core_fields() {
        let body: NewArtifact =
            serde_json::from_value(json!({ "artifact_name": "Rosetta Stone", "era": "Ptolemaic" }))
                .unwrap();

        assert_eq!(body.artifact_name.as_deref(), Some("Rosetta Stone"));
        assert!(!body.extra.contains_key("artifact_name"));
        assert_eq!(body.clone().into_fields().len(), 2);
    }

    #[test]
    fn test_serialize_with_likes_flattens() {
        let value = serde_json::to_value(ArtifactWithLikes {
            artifact: rosetta(),
            likes_count: 3,
        })
        .unwrap();

        assert_eq!(value["_id"], "a1");
        assert_eq!(value["artifact_name"], "Rosetta Stone");
        assert_eq!(value["artifact_type"], "Inscription");
        assert_eq!(value["likes_count"], 3);
    }

    #[test]
    fn test_is_owned_by() {
        let artifact = rosetta();
        assert!(artifact.is_owned_by(Some("a@x.com")));
        assert!(!artifact.is_owned_by(Some("A@x.com")));
        assert!(!artifact.is_owned_by(None));
    }

    #[test]
    fn test_empty_search_is_no_filter() {
        let query = SearchQuery { name: Some(String::new()) };
        assert_eq!(query.filter(), None);
    }
}
