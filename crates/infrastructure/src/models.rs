use aws_sdk_dynamodb::types::AttributeValue;
use domain::{Record, StorageError};
use std::collections::HashMap;

/// DynamoDB に保存するドキュメント
///
/// `PK` にコレクション名、`SK` にレコード ID を置き、
/// レコード本体は `Data` 属性に JSON 文字列として持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentItem {
    pub collection: String,
    pub id: String,
    pub data: Record,
}

impl DocumentItem {
    pub fn new(collection: &str, id: &str, data: Record) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        }
    }

    /// 主キーだけの AttributeValue マップ
    pub fn key(collection: &str, id: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            ("PK".to_string(), AttributeValue::S(collection.to_string())),
            ("SK".to_string(), AttributeValue::S(id.to_string())),
        ])
    }

    /// DynamoDB AttributeValue マップに変換
    pub fn to_attribute_map(&self) -> Result<HashMap<String, AttributeValue>, StorageError> {
        let mut map = Self::key(&self.collection, &self.id);
        map.insert(
            "Data".to_string(),
            AttributeValue::S(serde_json::to_string(&self.data)?),
        );
        Ok(map)
    }

    /// DynamoDB AttributeValue マップから復元
    pub fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Result<Self, StorageError> {
        let collection = string_attribute(map, "PK")?;
        let id = string_attribute(map, "SK")?;
        let data = serde_json::from_str(&string_attribute(map, "Data")?)?;

        Ok(Self {
            collection,
            id,
            data,
        })
    }
}

fn string_attribute(map: &HashMap<String, AttributeValue>, name: &str) -> Result<String, StorageError> {
    map.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| StorageError::Serialization(format!("Missing {name}")))
}
