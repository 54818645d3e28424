//! Table service client, speaking OData JSON with minimal metadata.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{Map, Value};

use super::{
    check_status, encode_segment, header_str, ignore_conflict, AzureRequest, ConnectionString,
    RestClient, ServiceKind,
};
use crate::errors::StorageResult;
use crate::models::TableEntity;
use crate::storage::backend::{BackendFuture, TableBackend};

const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const CONTINUATION_PARTITION: &str = "x-ms-continuation-NextPartitionKey";
const CONTINUATION_ROW: &str = "x-ms-continuation-NextRowKey";

/// Entities of a storage table, over the Table REST API.
pub struct AzureTableBackend {
    rest: RestClient,
}

impl AzureTableBackend {
    pub fn new(conn: &ConnectionString) -> StorageResult<Self> {
        Ok(Self {
            rest: RestClient::new(conn, ServiceKind::Table)?,
        })
    }
}

/// Attach the OData headers every table call needs.
fn odata(req: AzureRequest) -> AzureRequest {
    req.header("Accept", ACCEPT_JSON)
        .header("DataServiceVersion", "3.0")
        .header("MaxDataServiceVersion", "3.0;NetFx")
}

/// Key literal inside an entity address: quotes doubled, then encoded.
fn encode_key(key: &str) -> String {
    encode_segment(&key.replace('\'', "''"))
}

fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "/{}(PartitionKey='{}',RowKey='{}')",
        encode_segment(table),
        encode_key(partition_key),
        encode_key(row_key)
    )
}

fn partition_filter(partition_key: &str) -> String {
    format!("PartitionKey eq '{}'", partition_key.replace('\'', "''"))
}

fn entity_resource(table: &str, partition_key: &str, row_key: &str) -> String {
    format!("entity {table}({partition_key}, {row_key})")
}

/// Build a [`TableEntity`] from one OData JSON object.  Only string
/// properties are kept; metadata annotations are dropped.
fn entity_from_json(object: &Map<String, Value>) -> TableEntity {
    let text = |name: &str| object.get(name).and_then(Value::as_str).unwrap_or_default();
    let mut entity = TableEntity::new(text("PartitionKey"), text("RowKey"));
    entity.timestamp = object
        .get("Timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));
    entity.etag = object
        .get("odata.etag")
        .and_then(Value::as_str)
        .map(str::to_string);
    for (name, value) in object {
        if matches!(name.as_str(), "PartitionKey" | "RowKey" | "Timestamp")
            || name.starts_with("odata.")
            || name.contains("@odata.")
        {
            continue;
        }
        if let Value::String(s) = value {
            entity.set(name, s.as_str());
        }
    }
    entity
}

fn entity_to_json(entity: &TableEntity) -> Value {
    let mut object = Map::new();
    object.insert("PartitionKey".into(), Value::String(entity.partition_key.clone()));
    object.insert("RowKey".into(), Value::String(entity.row_key.clone()));
    for (name, value) in &entity.properties {
        object.insert(name.clone(), Value::String(value.clone()));
    }
    Value::Object(object)
}

async fn read_json(resp: reqwest::Response, operation: &'static str) -> StorageResult<Value> {
    let body = resp.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| anyhow::anyhow!("{operation}: malformed JSON response: {e}").into())
}

impl TableBackend for AzureTableBackend {
    fn create_table_if_not_exists(&self, table: &str) -> BackendFuture<'_, ()> {
        let table = table.to_string();
        Box::pin(async move {
            let body = serde_json::json!({ "TableName": table }).to_string();
            let req = odata(AzureRequest::new(Method::POST, "/Tables"))
                .header("Prefer", "return-no-content")
                .body("application/json", body);
            let resp = self.rest.send(req).await?;
            ignore_conflict(check_status(resp, "CreateTable", &table).await)
        })
    }

    fn query_partition(
        &self,
        table: &str,
        partition_key: &str,
    ) -> BackendFuture<'_, Vec<TableEntity>> {
        let table = table.to_string();
        let filter = partition_filter(partition_key);
        Box::pin(async move {
            let path = format!("/{}()", encode_segment(&table));
            let mut entities = Vec::new();
            let mut continuation: Option<(String, String)> = None;
            loop {
                let mut req =
                    odata(AzureRequest::new(Method::GET, path.as_str())).query("$filter", filter.as_str());
                if let Some((next_pk, next_rk)) = continuation.take() {
                    req = req.query("NextPartitionKey", next_pk);
                    if !next_rk.is_empty() {
                        req = req.query("NextRowKey", next_rk);
                    }
                }
                let resp =
                    check_status(self.rest.send(req).await?, "QueryEntities", &table).await?;
                let next_pk = header_str(&resp, CONTINUATION_PARTITION).map(str::to_string);
                let next_rk = header_str(&resp, CONTINUATION_ROW)
                    .unwrap_or_default()
                    .to_string();

                let page = read_json(resp, "QueryEntities").await?;
                if let Some(values) = page.get("value").and_then(Value::as_array) {
                    entities.extend(
                        values
                            .iter()
                            .filter_map(Value::as_object)
                            .map(entity_from_json),
                    );
                }

                match next_pk {
                    Some(pk) => continuation = Some((pk, next_rk)),
                    None => break,
                }
            }
            Ok(entities)
        })
    }

    fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendFuture<'_, TableEntity> {
        let path = entity_path(table, partition_key, row_key);
        let resource = entity_resource(table, partition_key, row_key);
        Box::pin(async move {
            let req = odata(AzureRequest::new(Method::GET, path));
            let resp = check_status(self.rest.send(req).await?, "GetEntity", &resource).await?;
            let etag = header_str(&resp, "ETag").map(str::to_string);
            let value = read_json(resp, "GetEntity").await?;
            let object = value.as_object().ok_or_else(|| {
                anyhow::anyhow!("GetEntity: expected a JSON object for {resource}")
            })?;
            let mut entity = entity_from_json(object);
            if etag.is_some() {
                entity.etag = etag;
            }
            Ok(entity)
        })
    }

    fn upsert_replace(&self, table: &str, entity: TableEntity) -> BackendFuture<'_, ()> {
        let path = entity_path(table, &entity.partition_key, &entity.row_key);
        let resource = entity_resource(table, &entity.partition_key, &entity.row_key);
        let body = entity_to_json(&entity).to_string();
        Box::pin(async move {
            // No If-Match: the service inserts or replaces.
            let req = odata(AzureRequest::new(Method::PUT, path)).body("application/json", body);
            check_status(self.rest.send(req).await?, "InsertOrReplaceEntity", &resource).await?;
            Ok(())
        })
    }

    fn delete_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> BackendFuture<'_, ()> {
        let path = entity_path(table, partition_key, row_key);
        let resource = entity_resource(table, partition_key, row_key);
        Box::pin(async move {
            let req = odata(AzureRequest::new(Method::DELETE, path)).header("If-Match", "*");
            check_status(self.rest.send(req).await?, "DeleteEntity", &resource).await?;
            Ok(())
        })
    }
}
