//! Wire types exchanged with the perks backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant discount record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perk {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub merchant: String,
    pub discount_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of a create-perk call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerk {
    pub title: String,
    pub description: String,
    pub category: String,
    pub merchant: String,
    pub discount_percent: f64,
}

impl NewPerk {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Partial update; absent fields are left untouched by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
}

impl PerkPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Registration payload for a throwaway test user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCredentials {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl TestCredentials {
    /// Fresh credentials that cannot collide with earlier runs against the
    /// same live store: a random uuid goes into the name, a millisecond
    /// timestamp plus a short uuid fragment into the email.
    pub fn generate(label: &str) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        let stamp = Utc::now().timestamp_millis();
        let slug = label.trim().to_lowercase().replace(char::is_whitespace, ".");

        Self {
            name: format!("{} {}", label.trim(), uuid),
            email: format!("{}.{}.{}@example.com", slug, stamp, &uuid[..8]),
            password: format!("Run-P3rk-{}!", &uuid[..8]),
        }
    }

    /// Email as the backend stores it
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// User summary embedded in the registration response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// `POST /auth/register` success body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerkEnvelope {
    pub perk: Perk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerkListEnvelope {
    pub perks: Vec<Perk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAck {
    pub ok: bool,
}

/// Error body the backend sends with non-success statuses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perk_uses_backend_field_names() {
        let json = serde_json::json!({
            "_id": "65f0c0ffee",
            "title": "Gym Pass",
            "description": "Monthly pass",
            "category": "fitness",
            "merchant": "Iron Works",
            "discountPercent": 12,
            "createdBy": "user-1",
            "createdAt": "2024-03-01T10:00:00Z"
        });

        let perk: Perk = serde_json::from_value(json).unwrap();
        assert_eq!(perk.id, "65f0c0ffee");
        assert_eq!(perk.discount_percent, 12.0);
        assert_eq!(perk.created_by.as_deref(), Some("user-1"));
        assert!(perk.created_at.is_some());
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = PerkPatch {
            category: Some("tech".into()),
            discount_percent: Some(40.0),
            ..Default::default()
        };

        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "category": "tech", "discountPercent": 40.0 }));
        assert!(!patch.is_empty());
        assert!(PerkPatch::default().is_empty());
    }

    #[test]
    fn test_generated_credentials_are_unique() {
        let a = TestCredentials::generate("UI Tester");
        let b = TestCredentials::generate("UI Tester");

        assert_ne!(a.email, b.email);
        assert_ne!(a.name, b.name);
        assert!(a.email.starts_with("ui.tester."));
        assert_eq!(a.normalized_email(), a.email);
    }

    #[test]
    fn test_registered_user_accepts_mongo_id() {
        let user: RegisteredUser =
            serde_json::from_value(serde_json::json!({ "_id": "abc", "name": "n" })).unwrap();
        assert_eq!(user.id, "abc");
    }
}
