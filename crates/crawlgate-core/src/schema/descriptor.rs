//! Declarative type descriptors
//!
//! A descriptor is the plain-data description of one record type: its
//! properties in declaration order, each optionally carrying an extraction
//! rule, a formatter chain and a link rule, plus type-level table and root
//! selector annotations. Descriptors are built in code with
//! [`TypeDescriptor::builder`] or loaded from JSON.

use serde::{Deserialize, Serialize};

use super::types::{FieldOption, FormatterRef, Selector, SharedValueRule, TableSpec, TargetUrlsRule};
use crate::table_name::TableSuffix;

/// Declared type of a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    DateTime,
    Bool,
    Decimal,
    /// Any other declared type, kept by name
    Other(String),
    /// Sequence of values
    List(Box<PropertyType>),
}

impl PropertyType {
    pub fn list_of(inner: PropertyType) -> Self {
        PropertyType::List(Box::new(inner))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, PropertyType::List(_))
    }
}

/// Extraction annotation on a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub selector: Selector,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub ignore_store: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default)]
    pub option: FieldOption,
}

impl ExtractionRule {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            not_null: false,
            ignore_store: false,
            length: None,
            option: FieldOption::None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn ignore_store(mut self) -> Self {
        self.ignore_store = true;
        self
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn option(mut self, option: FieldOption) -> Self {
        self.option = option;
        self
    }
}

/// Link annotation: the property's value is a URL to follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAnnotation {
    pub target: Selector,
    #[serde(default)]
    pub carry_fields: Vec<String>,
}

/// One declared property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formatters: Vec<FormatterRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkAnnotation>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            extraction: None,
            formatters: Vec::new(),
            link: None,
        }
    }

    pub fn extract(mut self, rule: ExtractionRule) -> Self {
        self.extraction = Some(rule);
        self
    }

    pub fn format(mut self, formatter: FormatterRef) -> Self {
        self.formatters.push(formatter);
        self
    }

    pub fn link_to(mut self, link: LinkAnnotation) -> Self {
        self.link = Some(link);
        self
    }
}

/// Declarative description of one record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_selector: Option<Selector>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub shared_values: Vec<SharedValueRule>,
    #[serde(default)]
    pub target_urls: Vec<TargetUrlsRule>,
}

impl TypeDescriptor {
    pub fn builder(type_name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            descriptor: TypeDescriptor {
                type_name: type_name.into(),
                table: None,
                root_selector: None,
                properties: Vec::new(),
                shared_values: Vec::new(),
                target_urls: Vec::new(),
            },
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Fluent builder for [`TypeDescriptor`]
pub struct TypeDescriptorBuilder {
    descriptor: TypeDescriptor,
}

impl TypeDescriptorBuilder {
    pub fn table(
        mut self,
        database: impl Into<String>,
        name: impl Into<String>,
        suffix: TableSuffix,
    ) -> Self {
        self.descriptor.table = Some(TableSpec {
            database: database.into(),
            name: name.into(),
            suffix,
        });
        self
    }

    pub fn root_selector(mut self, selector: Selector) -> Self {
        self.descriptor.root_selector = Some(selector);
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.descriptor.properties.push(property);
        self
    }

    pub fn shared_value(mut self, name: impl Into<String>, selector: Selector) -> Self {
        self.descriptor.shared_values.push(SharedValueRule {
            name: name.into(),
            selector,
        });
        self
    }

    pub fn target_urls(mut self, rule: TargetUrlsRule) -> Self {
        self.descriptor.target_urls.push(rule);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}
