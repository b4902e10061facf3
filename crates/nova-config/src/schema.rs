use schemars::schema::{RootSchema, Schema, SchemaObject};
use schemars::schema_for;

use crate::NovaConfig;

/// JSON schema for `nova.toml`, for editor integration and CI validation.
#[must_use]
pub fn json_schema() -> RootSchema {
    let mut schema = schema_for!(NovaConfig);
    apply_semantic_constraints(&mut schema);
    schema
}

fn apply_semantic_constraints(schema: &mut RootSchema) {
    for key in ["owner", "name"] {
        if let Some(property) = property_mut(schema, "BridgeCallConfig", key) {
            property.string().min_length = Some(1);
        }
    }
    if let Some(property) = property_mut(schema, "BridgeCallConfig", "descriptor") {
        property.string().pattern = Some(r"^\(.*\).+$".to_owned());
    }
}

fn property_mut<'a>(
    schema: &'a mut RootSchema,
    definition_name: &str,
    property_name: &str,
) -> Option<&'a mut SchemaObject> {
    let Schema::Object(definition) = schema.definitions.get_mut(definition_name)? else {
        return None;
    };
    match definition.object().properties.get_mut(property_name)? {
        Schema::Object(property) => Some(property),
        Schema::Bool(_) => None,
    }
}
