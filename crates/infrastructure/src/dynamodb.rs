use crate::models::DocumentItem;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::get_item::builders::GetItemFluentBuilder;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, ReturnValue,
    ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use domain::{merge_fields, record_id, Record, StorageAdapter, StorageError};
use shared::StorageConfig;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const TABLE_READY_POLL_ATTEMPTS: u32 = 30;
const TABLE_READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// DynamoDB をドキュメントストアとして使うストレージ
///
/// クライアントは最初の操作で作成し、同時にテーブルが無ければ作る。
pub struct DynamoDbAdapter {
    table_name: String,
    region: String,
    endpoint: Option<String>,
    client: OnceCell<Client>,
}

impl DynamoDbAdapter {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            table_name: config.dynamodb_table.clone(),
            region: config.aws_region.clone(),
            endpoint: config.dynamodb_endpoint.clone(),
            client: OnceCell::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn client(&self) -> Result<&Client, StorageError> {
        self.client
            .get_or_try_init(|| async {
                let mut loader =
                    aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));
                if let Some(endpoint) = &self.endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                let client = Client::new(&loader.load().await);

                self.ensure_table(&client).await?;
                Ok::<_, StorageError>(client)
            })
            .await
    }

    /// テーブルが存在することを確認し、なければ作成
    async fn ensure_table(&self, client: &Client) -> Result<(), StorageError> {
        match client.describe_table().table_name(&self.table_name).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_resource_not_found_exception() {
                    return Err(dynamodb_error(service_error));
                }
            }
        }

        info!(table = %self.table_name(), "DynamoDB テーブルを作成します");

        let created = client
            .create_table()
            .table_name(&self.table_name)
            .billing_mode(BillingMode::PayPerRequest)
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("PK")
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(dynamodb_error)?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name("SK")
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(dynamodb_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("PK")
                    .key_type(KeyType::Hash)
                    .build()
                    .map_err(dynamodb_error)?,
            )
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name("SK")
                    .key_type(KeyType::Range)
                    .build()
                    .map_err(dynamodb_error)?,
            )
            .send()
            .await;

        if let Err(e) = created {
            // 別プロセスが同時に作成した場合は待つだけでよい
            let service_error = e.into_service_error();
            if !service_error.is_resource_in_use_exception() {
                return Err(dynamodb_error(service_error));
            }
        }

        for _ in 0..TABLE_READY_POLL_ATTEMPTS {
            let output = client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await
                .map_err(dynamodb_error)?;

            if output.table().and_then(|t| t.table_status()) == Some(&TableStatus::Active) {
                debug!(table = %self.table_name(), "DynamoDB テーブルが利用可能になりました");
                return Ok(());
            }
            tokio::time::sleep(TABLE_READY_POLL_INTERVAL).await;
        }

        Err(StorageError::Backend(format!(
            "DynamoDB table {} did not become active",
            self.table_name
        )))
    }

    /// 1 件取得のリクエスト（強い整合性）
    fn get_request(&self, client: &Client, collection: &str, id: &str) -> GetItemFluentBuilder {
        client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(DocumentItem::key(collection, id)))
            .consistent_read(true)
    }

    /// コレクション全件のクエリ（強い整合性）
    fn query_request(&self, client: &Client, collection: &str) -> QueryFluentBuilder {
        client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("PK = :pk")
            .expression_attribute_values(":pk", AttributeValue::S(collection.to_string()))
            .consistent_read(true)
    }

    async fn put(&self, item: &DocumentItem, must_exist: bool) -> Result<bool, StorageError> {
        let client = self.client().await?;
        let mut request = client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item.to_attribute_map()?));
        if must_exist {
            request = request.condition_expression("attribute_exists(PK)");
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if must_exist && service_error.is_conditional_check_failed_exception() {
                    Ok(false)
                } else {
                    Err(dynamodb_error(service_error))
                }
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for DynamoDbAdapter {
    async fn insert(&self, collection: &str, item: Record) -> Result<Record, StorageError> {
        let id = record_id(&item)
            .ok_or_else(|| StorageError::Serialization("record has no string id".to_string()))?
            .to_string();

        let document = DocumentItem::new(collection, &id, item);
        self.put(&document, false).await?;
        Ok(document.data)
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        let client = self.client().await?;
        let mut records = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .query_request(client, collection)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(dynamodb_error)?;

            for item in output.items() {
                records.push(DocumentItem::from_attribute_map(item)?.data);
            }

            start_key = output.last_evaluated_key().cloned();
            if start_key.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, StorageError> {
        let client = self.client().await?;
        let output = self
            .get_request(client, collection, id)
            .send()
            .await
            .map_err(dynamodb_error)?;

        output
            .item()
            .map(|item| DocumentItem::from_attribute_map(item).map(|d| d.data))
            .transpose()
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StorageError> {
        let Some(mut data) = self.find_by_id(collection, id).await? else {
            return Ok(None);
        };
        merge_fields(&mut data, fields);

        let document = DocumentItem::new(collection, id, data);
        if self.put(&document, true).await? {
            Ok(Some(document.data))
        } else {
            // 取得後に削除された
            Ok(None)
        }
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let client = self.client().await?;
        let output = client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(DocumentItem::key(collection, id)))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(dynamodb_error)?;

        Ok(output.attributes().is_some())
    }
}

fn dynamodb_error<E>(e: E) -> StorageError
where
    E: std::error::Error + 'static,
{
    StorageError::Backend(DisplayErrorContext(e).to_string())
}
