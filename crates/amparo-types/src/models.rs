use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Listing visibility for an owned collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Listings return only the caller's records.
    Owner,
    /// Listings return every record regardless of owner.
    All,
}

/// A record that belongs to exactly one user.
///
/// The CRUD handlers in amparo-api are written once against this trait; each
/// entity supplies its storage collection, listing scope, server-side stamps
/// and validation rules. Ownership is enforced by the handlers: `owner_id` is
/// stamped from the caller's credential at creation and carried over from the
/// stored record on update, so whatever a client sends for it is ignored.
pub trait OwnedResource: Serialize + DeserializeOwned + Send + 'static {
    /// Storage table name, also the route segment under `/api/`.
    const COLLECTION: &'static str;

    const LIST_SCOPE: ListScope = ListScope::Owner;

    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
    fn owner_id(&self) -> Uuid;
    fn set_owner_id(&mut self, owner: Uuid);

    /// Server-side stamps applied once, when the record is created.
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        let _ = now;
    }

    /// Server-side stamps applied when this record replaces `existing`.
    fn stamp_replaced(&mut self, existing: &Self, now: DateTime<Utc>) {
        let _ = (existing, now);
    }

    /// Domain validation. The message becomes the 400 response body.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

// -- Entities --
//
// Inbound binding is lax on purpose: unknown fields are ignored and absent
// fields default, so clients may omit server-controlled fields entirely.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub alert_type: String,
    pub status: String,
    pub location: String,
    pub activated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyConfig {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub notify_on_alert: bool,
    pub activate_safe_zone: bool,
    pub alert_message: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyContact {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub energy_level: i32,
    pub hunger_level: i32,
    pub last_fed_at: DateTime<Utc>,
    pub last_attended_at: DateTime<Utc>,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyMessage {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub content: String,
    pub sent: bool,
    pub sent_at: DateTime<Utc>,
    /// Contact ids as strings on the wire; each must parse as a UUID.
    pub selected_contacts: Vec<String>,
}

// -- Trait impls --

impl OwnedResource for EmergencyAlert {
    const COLLECTION: &'static str = "alerts";
    // TODO: decide whether alert listings should be owner-scoped; today every
    // authenticated caller sees all alerts.
    const LIST_SCOPE: ListScope = ListScope::All;

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn set_owner_id(&mut self, owner: Uuid) {
        self.owner_id = owner;
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.activated_at = now;
    }

    /// The activation time is fixed at creation; updates cannot rewrite it.
    fn stamp_replaced(&mut self, existing: &Self, _now: DateTime<Utc>) {
        self.activated_at = existing.activated_at;
    }
}

impl OwnedResource for EmergencyConfig {
    const COLLECTION: &'static str = "configurations";

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn set_owner_id(&mut self, owner: Uuid) {
        self.owner_id = owner;
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn stamp_replaced(&mut self, _existing: &Self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl OwnedResource for EmergencyContact {
    const COLLECTION: &'static str = "contacts";

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn set_owner_id(&mut self, owner: Uuid) {
        self.owner_id = owner;
    }
}

impl OwnedResource for Pet {
    const COLLECTION: &'static str = "pets";

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn set_owner_id(&mut self, owner: Uuid) {
        self.owner_id = owner;
    }

    /// A pet starts alive and cared for; after that the vitals are whatever
    /// the client writes.
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.last_fed_at = now;
        self.last_attended_at = now;
        self.is_alive = true;
    }
}

impl OwnedResource for EmergencyMessage {
    const COLLECTION: &'static str = "messages";

    fn id(&self) -> Uuid {
        self.id
    }
    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
    fn set_owner_id(&mut self, owner: Uuid) {
        self.owner_id = owner;
    }

    /// Messages are stored unsent; dispatch is outside this service.
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.sent = false;
        self.sent_at = now;
    }

    fn validate(&self) -> Result<(), String> {
        for contact_id in &self.selected_contacts {
            if contact_id.parse::<Uuid>().is_err() {
                return Err(format!("invalid contact id '{}'", contact_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_update_keeps_activation_time() {
        let mut original = EmergencyAlert::default();
        original.stamp_created(Utc::now());

        let mut replacement = EmergencyAlert {
            activated_at: Utc::now() + chrono::Duration::hours(5),
            status: "resolved".into(),
            ..Default::default()
        };
        replacement.stamp_replaced(&original, Utc::now());

        assert_eq!(replacement.activated_at, original.activated_at);
        assert_eq!(replacement.status, "resolved");
    }

    #[test]
    fn config_update_refreshes_timestamp() {
        let mut config = EmergencyConfig::default();
        config.stamp_created(Utc::now() - chrono::Duration::days(1));
        let stamped = config.updated_at;

        let mut replacement = EmergencyConfig::default();
        let now = Utc::now();
        replacement.stamp_replaced(&config, now);

        assert_eq!(replacement.updated_at, now);
        assert!(replacement.updated_at > stamped);
    }

    #[test]
    fn pet_starts_alive_and_cared_for() {
        let mut pet = Pet {
            is_alive: false,
            ..Default::default()
        };
        let now = Utc::now();
        pet.stamp_created(now);

        assert!(pet.is_alive);
        assert_eq!(pet.last_fed_at, now);
        assert_eq!(pet.last_attended_at, now);
    }

    #[test]
    fn message_starts_unsent() {
        let mut message = EmergencyMessage {
            sent: true,
            ..Default::default()
        };
        let now = Utc::now();
        message.stamp_created(now);

        assert!(!message.sent);
        assert_eq!(message.sent_at, now);
    }

    #[test]
    fn message_rejects_malformed_contact_id() {
        let message = EmergencyMessage {
            selected_contacts: vec![Uuid::new_v4().to_string(), "not-a-uuid".into()],
            ..Default::default()
        };

        let err = message.validate().unwrap_err();
        assert!(err.contains("not-a-uuid"));
    }

    #[test]
    fn message_accepts_uuid_contact_ids() {
        let message = EmergencyMessage {
            selected_contacts: vec![Uuid::new_v4().to_string(), Uuid::new_v4().to_string()],
            ..Default::default()
        };

        assert!(message.validate().is_ok());
    }

    #[test]
    fn binding_is_lax() {
        // Absent fields default, unknown fields are ignored.
        let alert: EmergencyAlert =
            serde_json::from_str(r#"{"alert_type":"panic","junk_field":42}"#).unwrap();
        assert_eq!(alert.alert_type, "panic");
        assert_eq!(alert.id, Uuid::nil());
        assert!(alert.resolved_at.is_none());
    }
}
