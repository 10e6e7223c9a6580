//! 工具参数 JSON Schema 生成（schemars）
//!
//! 由参数结构体自动生成 function calling 的 parameters，避免手写 schema 与实际解析不一致。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 生成类型 T 的参数 schema；去掉 `$schema` 元字段（部分 OpenAI 兼容端点会拒绝）
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({"type": "object", "properties": {}})
    });
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Query {
        /// 搜索词
        query: String,
        limit: Option<u32>,
    }

    #[test]
    fn test_schema_has_required_fields_and_no_meta() {
        let schema = parameters_schema::<Query>();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["query"].is_object());
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["query"]);
    }
}
