//! OpenSearch index configuration and mappings.
//!
//! Translates the engine-neutral [`IndexSchema`] declared by an indexing
//! strategy into the settings and mappings body OpenSearch expects when a
//! physical index is created.

use serde_json::{json, Map, Value};

use content_indexer_shared::{FieldKind, IndexSchema, SchemaField};

/// Default number of primary shards for new physical indices.
pub const DEFAULT_SHARDS: u32 = 1;

/// Default number of replicas for new physical indices.
pub const DEFAULT_REPLICAS: u32 = 1;

/// Cluster-level settings applied to every physical index this provider creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            number_of_shards: DEFAULT_SHARDS,
            number_of_replicas: DEFAULT_REPLICAS,
        }
    }
}

impl IndexConfig {
    pub fn new(number_of_shards: u32, number_of_replicas: u32) -> Self {
        Self {
            number_of_shards,
            number_of_replicas,
        }
    }
}

/// The OpenSearch field type for a schema field kind.
fn field_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "text",
        FieldKind::Keyword => "keyword",
        FieldKind::Integer => "long",
        FieldKind::Float => "double",
        FieldKind::Boolean => "boolean",
        FieldKind::Date => "date",
        FieldKind::GeoPoint => "geo_point",
    }
}

fn field_mapping(field: &SchemaField) -> Value {
    let mut mapping = Map::new();
    mapping.insert("type".to_string(), json!(field_type(field.kind)));
    if !field.searchable {
        mapping.insert("index".to_string(), json!(false));
    }
    if field.stored {
        mapping.insert("store".to_string(), json!(true));
    }
    Value::Object(mapping)
}

/// Build the create-index body for `schema`.
///
/// Every declared field becomes an explicit mapping property. Fields that
/// are not searchable are mapped with `"index": false` so they can still be
/// returned but never matched.
pub fn get_index_settings(schema: &IndexSchema, config: &IndexConfig) -> Value {
    let properties: Map<String, Value> = schema
        .fields()
        .iter()
        .map(|field| (field.name.clone(), field_mapping(field)))
        .collect();

    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas
        },
        "mappings": {
            "properties": properties
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let schema = IndexSchema::base()
            .keyword("category")
            .with(SchemaField::new("location", FieldKind::GeoPoint))
            .with(SchemaField::new("rating", FieldKind::Float).stored());
        let settings = get_index_settings(&schema, &IndexConfig::new(3, 2));

        assert_eq!(settings["settings"]["number_of_shards"], 3);
        assert_eq!(settings["settings"]["number_of_replicas"], 2);

        let properties = &settings["mappings"]["properties"];
        assert_eq!(properties["object_id"]["type"], "keyword");
        assert_eq!(properties["name"]["type"], "text");
        assert_eq!(properties["indexed_at"]["type"], "date");
        assert_eq!(properties["category"]["type"], "keyword");
        assert_eq!(properties["location"]["type"], "geo_point");
        assert_eq!(properties["rating"]["type"], "double");
        assert_eq!(properties["rating"]["store"], true);
    }

    #[test]
    fn test_not_searchable_field_is_not_indexed() {
        let settings = get_index_settings(&IndexSchema::base(), &IndexConfig::default());
        let url = &settings["mappings"]["properties"]["url"];

        assert_eq!(url["type"], "keyword");
        assert_eq!(url["index"], false);
        assert!(settings["mappings"]["properties"]["name"].get("index").is_none());
    }

    #[test]
    fn test_integer_maps_to_long() {
        let schema = IndexSchema::empty().integer("order");
        let settings = get_index_settings(&schema, &IndexConfig::default());

        assert_eq!(settings["mappings"]["properties"]["order"]["type"], "long");
        assert_eq!(settings["settings"]["number_of_shards"], DEFAULT_SHARDS);
    }
}
