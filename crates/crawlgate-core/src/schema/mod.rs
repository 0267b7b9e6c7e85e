//! Extraction schema derivation
//!
//! Declarative [`TypeDescriptor`]s go in, validated [`Entity`] schemas come out.

pub mod descriptor;
pub mod generator;
pub mod types;

pub use descriptor::{
    ExtractionRule, LinkAnnotation, PropertyDescriptor, PropertyType, TypeDescriptor,
    TypeDescriptorBuilder,
};
pub use generator::{data_type_for, SchemaGenerator};
pub use types::{
    DataType, Entity, EntityTable, Field, FieldOption, FormatterRef, LinkRule, Selector,
    SelectorType, SharedValueRule, TableSpec, TargetUrlsRule, RESERVED_FIELD_NAMES,
};
