// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Recorded fitness activity.

use crate::db::collections;
use crate::models::{Id, Timestamp};
use crate::store::{Actor, Resource};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Kind of activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    #[default]
    Any,
    Walking,
    Running,
    Swimming,
    Cycling,
}

impl ActivityType {
    /// Types that cover distance.
    pub const MOVING: [ActivityType; 4] = [
        ActivityType::Walking,
        ActivityType::Running,
        ActivityType::Swimming,
        ActivityType::Cycling,
    ];

    pub fn is_moving(self) -> bool {
        Self::MOVING.contains(&self)
    }
}

/// Stored activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_activity"))]
pub struct Activity {
    #[serde(default)]
    pub id: Id,
    /// Owner
    #[serde(default)]
    pub user_id: Id,
    #[serde(rename = "type", default)]
    pub activity_type: ActivityType,
    /// Distance in kilometres
    #[validate(range(min = 0.0, message = "value must not be negative"))]
    pub value: f64,
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(default)]
    pub created_date: Timestamp,
}

fn validate_activity(activity: &Activity) -> Result<(), ValidationError> {
    if activity.user_id.is_empty() {
        return Err(ValidationError::new("user_id")
            .with_message(Cow::from("activity must have an owner")));
    }
    if !activity.value.is_finite() {
        return Err(ValidationError::new("value").with_message(Cow::from("value must be finite")));
    }
    if activity.end <= activity.start {
        return Err(ValidationError::new("end").with_message(Cow::from("end must be after start")));
    }
    Ok(())
}

impl Resource for Activity {
    const COLLECTION: &'static str = collections::ACTIVITIES;

    fn id(&self) -> &Id {
        &self.id
    }

    fn created_date(&self) -> Timestamp {
        self.created_date
    }

    fn assign(&mut self, id: Id, created_date: Timestamp) {
        self.id = id;
        self.created_date = created_date;
    }

    fn can_be_read_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.user_id)
    }

    fn can_be_updated_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.user_id)
    }

    fn can_be_deleted_by(&self, actor: &Actor) -> bool {
        actor.is_self_or_admin(&self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn activity() -> Activity {
        let start = Utc::now();
        Activity {
            id: Id::default(),
            user_id: Id::from("u1"),
            activity_type: ActivityType::Running,
            value: 5.0,
            start,
            end: start + Duration::minutes(30),
            created_date: Timestamp::default(),
        }
    }

    #[test]
    fn test_moving_category() {
        assert!(!ActivityType::Any.is_moving());
        for t in ActivityType::MOVING {
            assert!(t.is_moving());
        }
    }

    #[test]
    fn test_type_uses_lowercase_names() {
        let json = serde_json::to_value(activity()).unwrap();
        assert_eq!(json["type"], "running");
        let t: ActivityType = serde_json::from_value(serde_json::json!("cycling")).unwrap();
        assert_eq!(t, ActivityType::Cycling);
    }

    #[test]
    fn test_validation_rules() {
        assert!(activity().validate().is_ok());

        let mut a = activity();
        a.end = a.start;
        assert!(a.validate().is_err());

        let mut a = activity();
        a.value = -1.0;
        assert!(a.validate().is_err());

        let mut a = activity();
        a.user_id = Id::default();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_owner_or_admin_permissions() {
        let a = activity();
        assert!(a.can_be_updated_by(&Actor::user("u1")));
        assert!(a.can_be_updated_by(&Actor::admin("root")));
        assert!(!a.can_be_read_by(&Actor::user("u2")));
    }
}
