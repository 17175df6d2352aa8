//! Segment definitions
//!
//! A segment is a named, reusable rule set. Conditions are typed: each
//! [`SegmentField`] declares its operator set and the value shape it expects,
//! and a [`Condition`] cannot be constructed (or deserialized) unless all of
//! that lines up.

pub mod condition;
pub mod defaults;
pub mod field;
pub mod operator;
pub mod value;

pub use condition::{Condition, MatchType, SegmentRules};
pub use defaults::default_segments;
pub use field::{FieldSpec, FieldType, SegmentField};
pub use operator::ConditionOperator;
pub use value::{ConditionValue, GeoRadius, NumberRange, ValueKind};

use serde::{Deserialize, Serialize};

/// Segment identifier
pub type SegmentId = u64;

fn default_active() -> bool {
    true
}

/// A named rule set for selecting members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: SegmentRules,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Segment {
    pub fn new(id: SegmentId, name: impl Into<String>, rules: SegmentRules) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            rules,
            is_active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
