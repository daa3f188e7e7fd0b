//! Card fields
//!
//! Inputs collected from the end-user form. A `[field:name]` shortcode reads
//! the submitted value; the declared type supplies the fallback value when
//! the resolver runs with the type-default policy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

/// Input widget type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free numeric input
    #[default]
    Number,
    /// Bounded numeric slider
    Slider,
    /// Free text input
    Text,
    /// Dropdown
    Select,
    /// Radio group
    Radio,
    /// Checkbox, submitted as 1 / 0
    Checkbox,
}

impl FieldType {
    /// Whether submissions of this type are numeric
    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Slider | Self::Checkbox)
    }

    /// Value substituted for a missing submission
    #[must_use]
    pub fn type_default(self) -> Value {
        if self.is_numeric() {
            Value::Number(0.0)
        } else {
            Value::Text(String::new())
        }
    }
}

/// One selectable option of a select or radio field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OptionRepr")]
pub struct FieldOption {
    /// Display label
    pub label: String,
    /// Submitted value
    pub value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionRepr {
    Bare(String),
    Full { label: String, value: Value },
}

impl From<OptionRepr> for FieldOption {
    fn from(repr: OptionRepr) -> Self {
        match repr {
            OptionRepr::Bare(s) => Self {
                label: s.clone(),
                value: Value::Text(s),
            },
            OptionRepr::Full { label, value } => Self { label, value },
        }
    }
}

/// A form input referenced by `[field:name]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardField {
    /// Row identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Shortcode key
    pub field_name: String,

    /// Form label
    #[serde(default)]
    pub label: String,

    /// Widget type
    #[serde(default)]
    pub field_type: FieldType,

    /// Options for select / radio widgets
    #[serde(default)]
    pub options: Vec<FieldOption>,

    /// Whether the form requires a value
    #[serde(default)]
    pub required: bool,

    /// Explicit default overriding the type default
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl CardField {
    /// Create optional field of the given type
    #[must_use]
    pub fn new(field_name: impl Into<String>, field_type: FieldType) -> Self {
        let field_name = field_name.into();
        Self {
            id: Uuid::new_v4(),
            label: field_name.clone(),
            field_name,
            field_type,
            options: Vec::new(),
            required: false,
            default_value: None,
        }
    }

    /// Mark required
    #[inline]
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// With explicit default
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Value used when the form did not submit this field
    ///
    /// Required fields have no fallback.
    #[must_use]
    pub fn fallback_value(&self) -> Option<Value> {
        if self.required {
            return None;
        }
        Some(
            self.default_value
                .clone()
                .unwrap_or_else(|| self.field_type.type_default()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_defaults() {
        assert_eq!(FieldType::Slider.type_default(), Value::Number(0.0));
        assert_eq!(FieldType::Select.type_default(), Value::Text(String::new()));
    }

    #[test]
    fn fallback_respects_required_and_explicit_default() {
        assert_eq!(CardField::new("area", FieldType::Number).fallback_value(), Some(Value::Number(0.0)));
        assert_eq!(CardField::new("area", FieldType::Number).required().fallback_value(), None);
        assert_eq!(
            CardField::new("type", FieldType::Select).with_default("oil").fallback_value(),
            Some(Value::from("oil"))
        );
    }

    #[test]
    fn options_accept_bare_and_full_forms() {
        let field: CardField = serde_json::from_str(
            r#"{"field_name": "type", "field_type": "select",
                "options": ["oil", {"label": "Gas", "value": "gas"}]}"#,
        )
        .unwrap();

        assert_eq!(field.options[0].label, "oil");
        assert_eq!(field.options[1].value, Value::from("gas"));
    }
}
