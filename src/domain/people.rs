use serde::{Deserialize, Serialize};

/// Identity a face entry falls back to when its person is removed.
pub const UNKNOWN_PERSON: &str = "unknown";

/// `Manual` people are created through the API; `Auto` people are
/// registered by the reconciliation pipeline when no known identity
/// clears the match threshold.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default, strum_macros::Display, strum_macros::EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "lowercase")]
pub enum PersonKind {
    Manual,
    #[default]
    Auto,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: PersonKind,
    pub portrait: Option<String>,
    pub added: Option<i64>,
    pub modified: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PersonForAdd {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PersonKind>,
    pub portrait: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PersonForInsert {
    pub id: String,
    pub name: Option<String>,
    pub kind: PersonKind,
    pub portrait: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersonForUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PersonKind>,
    pub portrait: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PeopleQuery {
    pub name: Option<String>,
    pub after: Option<i64>,
}
