use nova_config::json_schema;
use pretty_assertions::assert_eq;
use serde_json::json;

fn schema_value() -> serde_json::Value {
    serde_json::to_value(json_schema()).expect("schema serializes")
}

#[test]
fn top_level_sections_are_described() {
    let value = schema_value();
    for key in ["classpath", "inference", "logging"] {
        assert!(
            value.pointer(&format!("/properties/{key}")).is_some(),
            "missing {key}"
        );
    }
    assert_eq!(value.pointer("/additionalProperties"), Some(&json!(false)));
}

#[test]
fn bridge_calls_require_owner_and_name() {
    let value = schema_value();
    let bridge = value
        .pointer("/definitions/BridgeCallConfig")
        .expect("BridgeCallConfig definition exists");

    assert_eq!(bridge.pointer("/required"), Some(&json!(["name", "owner"])));
    assert_eq!(
        bridge.pointer("/properties/owner/minLength"),
        Some(&json!(1))
    );
    assert_eq!(
        bridge.pointer("/properties/descriptor/pattern"),
        Some(&json!(r"^\(.*\).+$"))
    );
}

#[test]
fn inference_defaults_are_published() {
    let value = schema_value();
    assert_eq!(
        value.pointer("/definitions/InferenceConfig/properties/dup_literal_idiom/default"),
        Some(&json!(true))
    );
    assert_eq!(
        value.pointer("/definitions/LoggingConfig/properties/level/default"),
        Some(&json!("info"))
    );
}
