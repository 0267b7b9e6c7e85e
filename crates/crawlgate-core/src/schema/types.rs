//! Entity schema produced by the generator
//!
//! These records are handed to the extraction and pipeline collaborators.
//! Selectors and formatters are carried verbatim; nothing here executes them.

use serde::{Deserialize, Serialize};

use crate::table_name::TableSuffix;

/// Column names the storage pipeline adds to every table
pub const RESERVED_FIELD_NAMES: [&str; 2] = ["cdate", "__id"];

/// Extraction language a selector expression is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectorType {
    #[default]
    XPath,
    Css,
    Regex,
    JsonPath,
    /// Value taken from the request environment (url, index, shared values)
    Environment,
}

/// Opaque extraction rule passed through to the extraction collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub expression: String,
    #[serde(rename = "type", default)]
    pub selector_type: SelectorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl Selector {
    pub fn new(selector_type: SelectorType, expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            selector_type,
            argument: None,
        }
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(SelectorType::XPath, expression)
    }

    pub fn css(expression: impl Into<String>) -> Self {
        Self::new(SelectorType::Css, expression)
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }
}

/// Storage type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int,
    Bigint,
    Float,
    Double,
    Text,
    Time,
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            DataType::Int => "int",
            DataType::Bigint => "bigint",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Text => "text",
            DataType::Time => "time",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which part of a matched node the extraction collaborator returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldOption {
    #[default]
    None,
    InnerHtml,
    OuterHtml,
    Count,
}

/// Named downstream transform with its arguments, applied in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatterRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

impl FormatterRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments<I, S>(name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }
}

/// One extracted column of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub selector: Selector,
    pub data_type: DataType,
    pub multi: bool,
    pub not_null: bool,
    pub ignore_store: bool,
    /// Only ever set for [`DataType::Text`]
    pub length: Option<u32>,
    pub option: FieldOption,
    pub formatters: Vec<FormatterRef>,
}

/// Marks a field's extracted value as a URL to enqueue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRule {
    /// Field whose value is followed
    pub source_field: String,
    /// Root selector applied to the followed page
    pub target: Selector,
    /// Extra request properties copied from sibling fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carry_fields: Vec<String>,
}

/// Value extracted once per page and made available to every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedValueRule {
    pub name: String,
    pub selector: Selector,
}

/// Page regions and URL patterns whose links are followed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TargetUrlsRule {
    #[serde(default)]
    pub region_xpaths: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Table naming as declared on the type, before suffix resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub database: String,
    pub name: String,
    #[serde(default)]
    pub suffix: TableSuffix,
}

/// Physical table an entity is stored into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTable {
    pub database: String,
    /// Base name with the resolved suffix applied
    pub name: String,
}

/// Extraction schema for one record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub table: Option<EntityTable>,
    /// The root selector yields several records per page
    pub multi: bool,
    pub root_selector: Option<Selector>,
    pub fields: Vec<Field>,
    pub link_extractors: Vec<LinkRule>,
    pub shared_value_rules: Vec<SharedValueRule>,
    pub target_urls_rules: Vec<TargetUrlsRule>,
}

impl Entity {
    pub fn table_name(&self) -> Option<&str> {
        self.table.as_ref().map(|t| t.name.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields the storage pipeline persists
    pub fn stored_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.ignore_store)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
