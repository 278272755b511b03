//! Application-level events fanned out to UI consumers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened to a cart line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartAction {
    Added,
    Updated,
    Removed,
}

/// Typed event derived from a raw change payload.
///
/// Each variant is named `<domain>:<verb>`; update variants carry the row
/// before and after the change when the platform provides both.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    #[serde(rename = "property:created")]
    PropertyCreated { property: Value },

    #[serde(rename = "property:updated")]
    PropertyUpdated {
        property_id: String,
        before: Option<Value>,
        after: Value,
    },

    #[serde(rename = "property:status_changed")]
    PropertyStatusChanged {
        property_id: String,
        old_status: Option<String>,
        new_status: String,
        before: Option<Value>,
        after: Value,
    },

    #[serde(rename = "property:deleted")]
    PropertyDeleted { property_id: String, before: Value },

    #[serde(rename = "order:created")]
    OrderCreated { order: Value },

    #[serde(rename = "order:updated")]
    OrderUpdated {
        order_id: String,
        before: Option<Value>,
        after: Value,
    },

    #[serde(rename = "order:status_changed")]
    OrderStatusChanged {
        order_id: String,
        old_status: Option<String>,
        new_status: String,
        before: Option<Value>,
        after: Value,
    },

    #[serde(rename = "notification:received")]
    NotificationReceived { notification: Value },

    #[serde(rename = "cart:updated")]
    CartUpdated { action: CartAction, item: Value },
}

impl AppEvent {
    /// Event name, e.g. `order:created`.
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::PropertyCreated { .. } => "property:created",
            AppEvent::PropertyUpdated { .. } => "property:updated",
            AppEvent::PropertyStatusChanged { .. } => "property:status_changed",
            AppEvent::PropertyDeleted { .. } => "property:deleted",
            AppEvent::OrderCreated { .. } => "order:created",
            AppEvent::OrderUpdated { .. } => "order:updated",
            AppEvent::OrderStatusChanged { .. } => "order:status_changed",
            AppEvent::NotificationReceived { .. } => "notification:received",
            AppEvent::CartUpdated { .. } => "cart:updated",
        }
    }

    /// Domain part of the name, e.g. `order`.
    pub fn domain(&self) -> &'static str {
        let name = self.name();
        name.split_once(':').map_or(name, |(domain, _)| domain)
    }
}

/// Which events a listener receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    /// Every event.
    All,
    /// Every event of one domain (`order:*`).
    Domain(String),
    /// One exact event name (`order:created`).
    Name(String),
}

impl Topic {
    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            Topic::All => true,
            Topic::Domain(domain) => event.domain() == domain,
            Topic::Name(name) => event.name() == name,
        }
    }
}

impl From<&str> for Topic {
    /// `*` is every event, `domain:*` a whole domain, anything else an
    /// exact name.
    fn from(s: &str) -> Self {
        if s == "*" {
            Topic::All
        } else if let Some(domain) = s.strip_suffix(":*") {
            Topic::Domain(domain.to_string())
        } else {
            Topic::Name(s.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_names_follow_domain_verb_convention() {
        let event = AppEvent::OrderStatusChanged {
            order_id: "o1".to_string(),
            old_status: Some("pending".to_string()),
            new_status: "paid".to_string(),
            before: None,
            after: json!({"id": "o1"}),
        };
        assert_eq!(event.name(), "order:status_changed");
        assert_eq!(event.domain(), "order");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "order:status_changed");
        assert_eq!(value["new_status"], "paid");
    }

    #[test]
    fn test_topic_parsing() {
        let created = AppEvent::PropertyCreated { property: json!({}) };
        assert_eq!(Topic::from("*"), Topic::All);
        assert!(Topic::from("property:*").matches(&created));
        assert!(Topic::from("property:created").matches(&created));
        assert!(!Topic::from("property:deleted").matches(&created));
        assert!(!Topic::from("order:*").matches(&created));
    }

    #[test]
    fn test_cart_event_serialization() {
        let event = AppEvent::CartUpdated {
            action: CartAction::Removed,
            item: json!({"id": 4}),
        };
        let text = serde_json::to_string(&event).unwrap();
        let back: AppEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
        assert!(text.contains("\"action\":\"removed\""));
    }
}
