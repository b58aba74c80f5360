use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::game::entity::EntityId;
use crate::util::vec2::Vec2;

/// Value stored under a blackboard key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlackboardValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vec2(Vec2),
    Text(String),
}

impl From<bool> for BlackboardValue {
    fn from(value: bool) -> Self {
        BlackboardValue::Bool(value)
    }
}

impl From<i64> for BlackboardValue {
    fn from(value: i64) -> Self {
        BlackboardValue::Int(value)
    }
}

impl From<f32> for BlackboardValue {
    fn from(value: f32) -> Self {
        BlackboardValue::Float(value)
    }
}

impl From<Vec2> for BlackboardValue {
    fn from(value: Vec2) -> Self {
        BlackboardValue::Vec2(value)
    }
}

impl From<String> for BlackboardValue {
    fn from(value: String) -> Self {
        BlackboardValue::Text(value)
    }
}

impl From<&str> for BlackboardValue {
    fn from(value: &str) -> Self {
        BlackboardValue::Text(value.to_string())
    }
}

/// Per-agent key/value store shared by all nodes of one tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blackboard {
    values: HashMap<String, BlackboardValue>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: HashMap<String, BlackboardValue>) -> Self {
        Self { values }
    }

    pub fn set(&mut self, key: &str, value: impl Into<BlackboardValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&BlackboardValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<BlackboardValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            BlackboardValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Missing or non-boolean keys read as false
    pub fn flag(&self, key: &str) -> bool {
        self.get_bool(key).unwrap_or(false)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            BlackboardValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Floats, with integers widened
    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.values.get(key)? {
            BlackboardValue::Float(value) => Some(*value),
            BlackboardValue::Int(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn get_vec2(&self, key: &str) -> Option<Vec2> {
        match self.values.get(key)? {
            BlackboardValue::Vec2(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            BlackboardValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Entity ids are stored as integers
    pub fn get_entity(&self, key: &str) -> Option<EntityId> {
        self.get_int(key).and_then(|id| EntityId::try_from(id).ok())
    }

    pub fn set_entity(&mut self, key: &str, id: EntityId) {
        match i64::try_from(id) {
            Ok(id) => self.set(key, id),
            Err(_) => {
                self.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut bb = Blackboard::new();
        bb.set("alive", true);
        bb.set("hp", 0.5f32);
        bb.set("count", 3i64);
        bb.set("pos", Vec2::new(1.0, 2.0));
        bb.set("mode", "wander");

        assert_eq!(bb.get_bool("alive"), Some(true));
        assert_eq!(bb.get_float("hp"), Some(0.5));
        assert_eq!(bb.get_float("count"), Some(3.0));
        assert_eq!(bb.get_int("hp"), None);
        assert_eq!(bb.get_vec2("pos"), Some(Vec2::new(1.0, 2.0)));
        assert_eq!(bb.get_text("mode"), Some("wander"));
        assert!(!bb.flag("missing"));
        assert!(!bb.flag("hp"));
    }

    #[test]
    fn test_entity_ids() {
        let mut bb = Blackboard::new();
        bb.set_entity("target.id", 42);
        assert_eq!(bb.get_entity("target.id"), Some(42));

        bb.set("target.id", -1i64);
        assert_eq!(bb.get_entity("target.id"), None);
    }

    #[test]
    fn test_remove() {
        let mut bb = Blackboard::new();
        bb.set("k", 1i64);
        assert!(bb.contains("k"));
        assert_eq!(bb.remove("k"), Some(BlackboardValue::Int(1)));
        assert!(bb.is_empty());
    }

    #[test]
    fn test_deserialize_untagged_values() {
        let bb: Blackboard = serde_json::from_str(
            r#"{ "aggressive": true, "patrol": 4, "range": 7.5, "home": { "x": 1.0, "y": -2.0 }, "label": "scout" }"#,
        )
        .unwrap();

        assert_eq!(bb.get_bool("aggressive"), Some(true));
        assert_eq!(bb.get_int("patrol"), Some(4));
        assert_eq!(bb.get_float("range"), Some(7.5));
        assert_eq!(bb.get_vec2("home"), Some(Vec2::new(1.0, -2.0)));
        assert_eq!(bb.get_text("label"), Some("scout"));
    }
}
