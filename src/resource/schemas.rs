//! Custom schema functions for fields `schemars`'s derive can't express on its own.
use schemars::{gen::SchemaGenerator, schema::Schema};
use serde_json::{from_value, json};

pub fn port(_: &mut SchemaGenerator) -> Schema {
    from_value(json!({
        "type": "integer",
        "minimum": 1,
        "maximum": 65535,
    }))
    .unwrap()
}

pub fn non_negative_i32(_: &mut SchemaGenerator) -> Schema {
    from_value(json!({
        "type": "integer",
        "minimum": 0,
    }))
    .unwrap()
}

pub fn positive_i64(_: &mut SchemaGenerator) -> Schema {
    from_value(json!({
        "type": "integer",
        "format": "int64",
        "minimum": 1,
    }))
    .unwrap()
}
