use std::collections::HashSet;
use std::str::FromStr;

use itemflow_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::{FieldConfigurationId, FieldId, FieldSetId};

/// Value type a field configuration instantiates a field with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single-line text.
    Text,
    /// Multi-line text.
    TextArea,
    /// Numeric value.
    Number,
    /// Boolean flag.
    Boolean,
    /// Date-only value.
    Date,
    /// Date-time value.
    DateTime,
    /// One option of a list.
    Select,
    /// Several options of a list.
    MultiSelect,
    /// Reference to a tenant user.
    User,
}

impl FieldType {
    /// Returns a stable storage value for the field type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::TextArea => "text_area",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::User => "user",
        }
    }
}

impl FromStr for FieldType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(Self::Text),
            "text_area" => Ok(Self::TextArea),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "select" => Ok(Self::Select),
            "multi_select" => Ok(Self::MultiSelect),
            "user" => Ok(Self::User),
            _ => Err(AppError::Validation(format!(
                "unknown field type '{value}'"
            ))),
        }
    }
}

/// Typed, tenant-scoped instantiation of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfiguration {
    id: FieldConfigurationId,
    field_id: FieldId,
    field_name: NonEmptyString,
    name: NonEmptyString,
    field_type: FieldType,
}

impl FieldConfiguration {
    /// Creates a validated field configuration.
    pub fn new(
        id: FieldConfigurationId,
        field_id: FieldId,
        field_name: impl Into<String>,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> AppResult<Self> {
        Ok(Self {
            id,
            field_id,
            field_name: NonEmptyString::new(field_name)?,
            name: NonEmptyString::new(name)?,
            field_type,
        })
    }

    /// Returns the configuration identifier.
    #[must_use]
    pub fn id(&self) -> FieldConfigurationId {
        self.id
    }

    /// Returns the underlying field.
    #[must_use]
    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    /// Returns the underlying field name.
    #[must_use]
    pub fn field_name(&self) -> &NonEmptyString {
        &self.field_name
    }

    /// Returns the configuration display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the configured value type.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Position of one field configuration inside a field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSetEntry {
    field_configuration: FieldConfiguration,
    order_index: u32,
}

impl FieldSetEntry {
    /// Creates a field set entry.
    #[must_use]
    pub fn new(field_configuration: FieldConfiguration, order_index: u32) -> Self {
        Self {
            field_configuration,
            order_index,
        }
    }

    /// Returns the referenced field configuration.
    #[must_use]
    pub fn field_configuration(&self) -> &FieldConfiguration {
        &self.field_configuration
    }

    /// Returns the ordering value.
    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }
}

/// Snapshot of an ordered field set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    id: FieldSetId,
    name: NonEmptyString,
    entries: Vec<FieldSetEntry>,
}

impl FieldSet {
    /// Creates a validated field set snapshot ordered by entry index.
    ///
    /// A field may be represented by only one configuration per set.
    pub fn new(
        id: FieldSetId,
        name: impl Into<String>,
        mut entries: Vec<FieldSetEntry>,
    ) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;

        let mut configuration_ids = HashSet::new();
        let mut field_ids = HashSet::new();
        for entry in &entries {
            let configuration = &entry.field_configuration;
            if !configuration_ids.insert(configuration.id) {
                return Err(AppError::Validation(format!(
                    "field set '{name}' contains field configuration '{}' more than once",
                    configuration.name
                )));
            }
            if !field_ids.insert(configuration.field_id) {
                return Err(AppError::Validation(format!(
                    "field set '{name}' contains field '{}' more than once",
                    configuration.field_name
                )));
            }
        }

        entries.sort_by_key(FieldSetEntry::order_index);

        Ok(Self { id, name, entries })
    }

    /// Returns the field set identifier.
    #[must_use]
    pub fn id(&self) -> FieldSetId {
        self.id
    }

    /// Returns the field set display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns entries in order.
    #[must_use]
    pub fn entries(&self) -> &[FieldSetEntry] {
        &self.entries
    }

    /// Iterates the field configurations in entry order.
    pub fn field_configurations(&self) -> impl Iterator<Item = &FieldConfiguration> {
        self.entries.iter().map(FieldSetEntry::field_configuration)
    }

    /// Finds a field configuration of this set by identifier.
    #[must_use]
    pub fn field_configuration(&self, id: FieldConfigurationId) -> Option<&FieldConfiguration> {
        self.field_configurations()
            .find(|configuration| configuration.id == id)
    }

    /// Finds the configuration representing a field in this set.
    #[must_use]
    pub fn configuration_for_field(&self, field_id: FieldId) -> Option<&FieldConfiguration> {
        self.field_configurations()
            .find(|configuration| configuration.field_id == field_id)
    }
}
