//! Entity schema generation
//!
//! Turns a [`TypeDescriptor`] into the [`Entity`] the extraction and storage
//! collaborators work from. Generation runs once per job at startup and any
//! failure aborts the job before coordination begins.

use std::collections::HashSet;
use std::sync::Arc;

use crawlgate_common::SchemaError;
use tracing::debug;

use super::descriptor::{PropertyDescriptor, PropertyType, TypeDescriptor};
use super::types::{DataType, Entity, EntityTable, Field, LinkRule, RESERVED_FIELD_NAMES};
use crate::table_name::{self, Clock, SystemClock};

/// Storage type for a declared property type
///
/// Types without a dedicated column type (bool, decimal, lists, unknown
/// names) are stored as text.
pub fn data_type_for(property_type: &PropertyType) -> DataType {
    match property_type {
        PropertyType::Int32 => DataType::Int,
        PropertyType::Int64 => DataType::Bigint,
        PropertyType::Float32 => DataType::Float,
        PropertyType::Float64 => DataType::Double,
        PropertyType::String => DataType::Text,
        PropertyType::DateTime => DataType::Time,
        PropertyType::Bool
        | PropertyType::Decimal
        | PropertyType::Other(_)
        | PropertyType::List(_) => DataType::Text,
    }
}

fn is_reserved(name: &str) -> bool {
    RESERVED_FIELD_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Derives entity schemas, resolving table suffixes against a clock
#[derive(Clone)]
pub struct SchemaGenerator {
    clock: Arc<dyn Clock>,
}

impl Default for SchemaGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl SchemaGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn generate(&self, descriptor: &TypeDescriptor) -> Result<Entity, SchemaError> {
        let entity_name = descriptor.type_name.trim();
        if entity_name.is_empty() {
            return Err(SchemaError::Malformed("type name is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for property in &descriptor.properties {
            if property.name.trim().is_empty() {
                return Err(SchemaError::Malformed(format!(
                    "'{}' declares a property without a name",
                    entity_name
                )));
            }
            if is_reserved(&property.name) {
                return Err(SchemaError::ReservedFieldName {
                    entity: entity_name.to_string(),
                    field: property.name.clone(),
                });
            }
            if !seen.insert(property.name.as_str()) {
                return Err(SchemaError::Malformed(format!(
                    "'{}' declares property '{}' more than once",
                    entity_name, property.name
                )));
            }
        }

        let mut fields = Vec::new();
        let mut link_extractors = Vec::new();

        for property in &descriptor.properties {
            let Some(field) = build_field(entity_name, property)? else {
                continue;
            };

            if let Some(link) = &property.link {
                link_extractors.push(LinkRule {
                    source_field: field.name.clone(),
                    target: link.target.clone(),
                    carry_fields: link.carry_fields.clone(),
                });
            }

            fields.push(field);
        }

        for link in &link_extractors {
            if let Some(missing) = link.carry_fields.iter().find(|name| !seen.contains(name.as_str())) {
                return Err(SchemaError::Malformed(format!(
                    "link on '{}.{}' carries unknown property '{}'",
                    entity_name, link.source_field, missing
                )));
            }
        }

        let table = match &descriptor.table {
            Some(spec) if spec.name.trim().is_empty() => {
                return Err(SchemaError::Malformed(format!(
                    "table annotation on '{}' has no name",
                    entity_name
                )));
            },
            Some(spec) => Some(EntityTable {
                database: spec.database.clone(),
                name: table_name::resolve(&spec.name, spec.suffix, self.clock.today()),
            }),
            None => None,
        };

        let entity = Entity {
            name: entity_name.to_string(),
            table,
            multi: descriptor.root_selector.is_some(),
            root_selector: descriptor.root_selector.clone(),
            fields,
            link_extractors,
            shared_value_rules: descriptor.shared_values.clone(),
            target_urls_rules: descriptor.target_urls.clone(),
        };

        debug!(
            entity = %entity.name,
            fields = entity.fields.len(),
            table = ?entity.table_name(),
            multi = entity.multi,
            "Generated entity schema"
        );

        Ok(entity)
    }

    /// Generate every descriptor, failing on the first invalid one
    pub fn generate_all<'a, I>(&self, descriptors: I) -> Result<Vec<Entity>, SchemaError>
    where
        I: IntoIterator<Item = &'a TypeDescriptor>,
    {
        descriptors.into_iter().map(|d| self.generate(d)).collect()
    }
}

/// Field for an annotated property, `None` for plain properties
fn build_field(entity: &str, property: &PropertyDescriptor) -> Result<Option<Field>, SchemaError> {
    let Some(rule) = &property.extraction else {
        if property.link.is_some() {
            return Err(SchemaError::Malformed(format!(
                "'{}.{}' has a link rule but no extraction rule",
                entity, property.name
            )));
        }
        return Ok(None);
    };

    if rule.selector.expression.trim().is_empty() {
        return Err(SchemaError::Malformed(format!(
            "'{}.{}' has an empty selector expression",
            entity, property.name
        )));
    }

    let data_type = data_type_for(&property.property_type);
    if rule.length.is_some() && data_type != DataType::Text {
        return Err(SchemaError::LengthOnNonText {
            entity: entity.to_string(),
            field: property.name.clone(),
            data_type: data_type.to_string(),
        });
    }

    Ok(Some(Field {
        name: property.name.clone(),
        selector: rule.selector.clone(),
        data_type,
        multi: property.property_type.is_list(),
        not_null: rule.not_null,
        ignore_store: rule.ignore_store,
        length: rule.length,
        option: rule.option,
        formatters: property.formatters.clone(),
    }))
}
