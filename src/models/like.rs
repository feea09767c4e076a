use serde::{Deserialize, Serialize};

use super::{take_string, Extra, ID_KEY};

/// Like document: one user's like of one artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Like {
    pub fn is_owned_by(&self, email: Option<&str>) -> bool {
        matches!((self.user_email.as_deref(), email), (Some(owner), Some(caller)) if owner == caller)
    }
}

/// Request body for POST /likes
///
/// `artifactId` and `userEmail` are typed only when sent as strings; other
/// values are kept as sent in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Extra")]
pub struct NewLike {
    pub artifact_id: Option<String>,
    pub user_email: Option<String>,
    pub extra: Extra,
}

impl From<Extra> for NewLike {
    fn from(mut fields: Extra) -> Self {
        fields.remove(ID_KEY);
        Self {
            artifact_id: take_string(&mut fields, "artifactId"),
            user_email: take_string(&mut fields, "userEmail"),
            extra: fields,
        }
    }
}
