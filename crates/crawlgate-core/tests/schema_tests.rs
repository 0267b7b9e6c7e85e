//! Schema generation from declarative descriptors

use chrono::NaiveDate;
use crawlgate_common::SchemaError;
use crawlgate_core::schema::{
    DataType, ExtractionRule, FieldOption, FormatterRef, LinkAnnotation, PropertyDescriptor,
    PropertyType, Selector, SelectorType, TargetUrlsRule, TypeDescriptor,
};
use crawlgate_core::table_name::{FixedClock, TableSuffix};
use crawlgate_core::SchemaGenerator;
use std::sync::Arc;

fn generator_on(year: i32, month: u32, day: u32) -> SchemaGenerator {
    let today = NaiveDate::from_ymd_opt(year, month, day).unwrap();
    SchemaGenerator::new(Arc::new(FixedClock(today)))
}

fn text(name: &str, xpath: &str) -> PropertyDescriptor {
    PropertyDescriptor::new(name, PropertyType::String)
        .extract(ExtractionRule::new(Selector::xpath(xpath)))
}

#[test]
fn test_reserved_names_are_rejected_in_any_case() {
    for reserved in ["cdate", "__id", "CDate", "__ID"] {
        let descriptor = TypeDescriptor::builder("Product")
            .property(text("title", "//h1"))
            .property(text(reserved, "//span"))
            .build();

        let err = SchemaGenerator::default().generate(&descriptor).unwrap_err();
        assert!(
            matches!(err, SchemaError::ReservedFieldName { ref field, .. } if field == reserved),
            "{reserved} should be reserved, got {err:?}"
        );
    }
}

#[test]
fn test_reserved_name_rejected_without_extraction_rule() {
    let descriptor = TypeDescriptor::builder("Product")
        .property(PropertyDescriptor::new("cdate", PropertyType::DateTime))
        .build();

    assert!(matches!(
        SchemaGenerator::default().generate(&descriptor),
        Err(SchemaError::ReservedFieldName { .. })
    ));
}

#[test]
fn test_length_only_allowed_on_text() {
    let descriptor = TypeDescriptor::builder("Product")
        .property(
            PropertyDescriptor::new("price", PropertyType::Float64)
                .extract(ExtractionRule::new(Selector::css(".price")).length(10)),
        )
        .build();

    let err = SchemaGenerator::default().generate(&descriptor).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::LengthOnNonText { ref field, ref data_type, .. }
            if field == "price" && data_type == "double"
    ));
}

#[test]
fn test_fields_follow_declaration_order() {
    let descriptor = TypeDescriptor::builder("Listing")
        .property(text("title", "//h1"))
        .property(PropertyDescriptor::new("scratch", PropertyType::String))
        .property(
            PropertyDescriptor::new("published", PropertyType::DateTime)
                .extract(ExtractionRule::new(Selector::xpath("//time")).not_null()),
        )
        .property(
            PropertyDescriptor::new("tags", PropertyType::list_of(PropertyType::String))
                .extract(ExtractionRule::new(Selector::css(".tag"))),
        )
        .property(
            PropertyDescriptor::new("raw", PropertyType::String).extract(
                ExtractionRule::new(Selector::css("#body"))
                    .ignore_store()
                    .option(FieldOption::InnerHtml),
            ),
        )
        .build();

    let entity = SchemaGenerator::default().generate(&descriptor).unwrap();

    let names: Vec<_> = entity.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["title", "published", "tags", "raw"]);

    let published = entity.field("published").unwrap();
    assert_eq!(published.data_type, DataType::Time);
    assert!(published.not_null);

    let tags = entity.field("tags").unwrap();
    assert!(tags.multi);
    assert_eq!(tags.data_type, DataType::Text);
    assert_eq!(tags.selector.selector_type, SelectorType::Css);

    let raw = entity.field("raw").unwrap();
    assert_eq!(raw.option, FieldOption::InnerHtml);

    let stored: Vec<_> = entity.stored_fields().map(|f| f.name.as_str()).collect();
    assert_eq!(stored, ["title", "published", "tags"]);
}

#[test]
fn test_root_selector_makes_entity_multi() {
    let single = TypeDescriptor::builder("Page").property(text("title", "//h1")).build();
    let multi = TypeDescriptor::builder("Row")
        .root_selector(Selector::xpath("//table/tr"))
        .property(text("cell", "./td[1]"))
        .build();

    let generator = SchemaGenerator::default();
    assert!(!generator.generate(&single).unwrap().multi);
    assert!(generator.generate(&multi).unwrap().multi);
}

#[test]
fn test_table_suffix_resolves_against_clock() {
    // 2024-03-17 is a Sunday
    let generator = generator_on(2024, 3, 17);
    let build = |suffix| {
        TypeDescriptor::builder("Item")
            .table("crawl", "items", suffix)
            .property(text("name", "//h2"))
            .build()
    };

    let cases = [
        (TableSuffix::None, "items"),
        (TableSuffix::Today, "items_2024_03_17"),
        (TableSuffix::MostRecentMonday, "items_2024_03_11"),
        (TableSuffix::FirstDayOfCurrentMonth, "items_2024_03_01"),
    ];

    for (suffix, expected) in cases {
        let entity = generator.generate(&build(suffix)).unwrap();
        assert_eq!(entity.table_name(), Some(expected), "{suffix:?}");
        assert_eq!(entity.table.as_ref().unwrap().database, "crawl");
    }
}

#[test]
fn test_link_rules_and_entity_rules_are_carried() {
    let descriptor = TypeDescriptor::builder("Category")
        .property(text("name", "//h1"))
        .property(
            text("next", "//a[@rel='next']/@href").link_to(LinkAnnotation {
                target: Selector::xpath("//div[@class='product']"),
                carry_fields: vec!["name".to_string()],
            }),
        )
        .property(
            text("price", "//span[@class='price']")
                .format(FormatterRef::new("trim"))
                .format(FormatterRef::with_arguments("replace", [",", ""])),
        )
        .shared_value("site", Selector::new(SelectorType::Environment, "url"))
        .target_urls(TargetUrlsRule {
            region_xpaths: vec!["//div[@class='pager']".to_string()],
            patterns: vec![r"page=\d+".to_string()],
        })
        .build();

    let entity = SchemaGenerator::default().generate(&descriptor).unwrap();

    assert_eq!(entity.link_extractors.len(), 1);
    assert_eq!(entity.link_extractors[0].source_field, "next");
    assert_eq!(entity.link_extractors[0].carry_fields, ["name"]);

    let price = entity.field("price").unwrap();
    let formatters: Vec<_> = price.formatters.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(formatters, ["trim", "replace"]);

    assert_eq!(entity.shared_value_rules[0].name, "site");
    assert_eq!(entity.target_urls_rules[0].patterns, [r"page=\d+"]);
}

#[test]
fn test_link_carrying_unknown_property_is_malformed() {
    let descriptor = TypeDescriptor::builder("Category")
        .property(text("next", "//a/@href").link_to(LinkAnnotation {
            target: Selector::xpath("//div"),
            carry_fields: vec!["missing".to_string()],
        }))
        .build();

    assert!(matches!(
        SchemaGenerator::default().generate(&descriptor),
        Err(SchemaError::Malformed(_))
    ));
}

#[test]
fn test_descriptor_from_json() {
    let json = r#"{
        "type_name": "Quote",
        "table": { "database": "crawl", "name": "quotes", "suffix": "today" },
        "root_selector": { "expression": "//div[@class='quote']" },
        "properties": [
            {
                "name": "text",
                "type": "string",
                "extraction": { "selector": { "expression": ".text", "type": "css" }, "length": 500 }
            },
            { "name": "author", "type": "string",
              "extraction": { "selector": { "expression": ".//small" } } },
            { "name": "note", "type": "bool" }
        ]
    }"#;

    let descriptor = TypeDescriptor::from_json(json).unwrap();
    let entity = generator_on(2024, 5, 2).generate(&descriptor).unwrap();

    assert_eq!(entity.name, "Quote");
    assert_eq!(entity.table_name(), Some("quotes_2024_05_02"));
    assert!(entity.multi);
    assert_eq!(entity.fields.len(), 2);
    assert_eq!(entity.field("text").unwrap().length, Some(500));
    assert_eq!(entity.field("author").unwrap().selector.selector_type, SelectorType::XPath);

    let serialized: serde_json::Value = serde_json::from_str(&entity.to_json().unwrap()).unwrap();
    assert_eq!(serialized["name"], "Quote");
}
