//! Queue service client.

use chrono::{DateTime, Utc};
use reqwest::Method;
use std::time::Duration;

use super::{
    check_status, encode_segment, ignore_conflict, read_records, AzureRequest, ConnectionString,
    RestClient, ServiceKind,
};
use crate::errors::StorageResult;
use crate::models::QueueMessage;
use crate::storage::backend::{BackendFuture, QueueBackend};
use crate::xml::{render_queue_message, XmlRecord};

/// Upper bound the service accepts for `numofmessages`.
pub const MAX_MESSAGES_PER_CALL: u32 = 32;

/// A storage queue, over the Queue REST API.
pub struct AzureQueueBackend {
    rest: RestClient,
}

impl AzureQueueBackend {
    pub fn new(conn: &ConnectionString) -> StorageResult<Self> {
        Ok(Self {
            rest: RestClient::new(conn, ServiceKind::Queue)?,
        })
    }

    async fn get_messages(
        &self,
        queue: &str,
        req: AzureRequest,
        operation: &'static str,
        with_receipt: bool,
    ) -> StorageResult<Vec<QueueMessage>> {
        let resp = check_status(self.rest.send(req).await?, operation, queue).await?;
        let list = read_records(resp, operation, &["QueueMessage"]).await?;
        Ok(list
            .records
            .into_iter()
            .map(|r| message_from_record(r, with_receipt))
            .collect())
    }
}

fn queue_path(queue: &str) -> String {
    format!("/{}", encode_segment(queue))
}

fn messages_path(queue: &str) -> String {
    format!("/{}/messages", encode_segment(queue))
}

fn clamp_count(max: u32) -> String {
    max.clamp(1, MAX_MESSAGES_PER_CALL).to_string()
}

/// `InsertionTime` is an RFC 1123 date.
fn parse_insertion_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| httpdate::parse_http_date(s).ok())
        .map(DateTime::<Utc>::from)
}

fn message_from_record(mut record: XmlRecord, with_receipt: bool) -> QueueMessage {
    let inserted_on = parse_insertion_time(record.field("InsertionTime"));
    QueueMessage {
        id: record.fields.remove("MessageId").unwrap_or_default(),
        pop_receipt: if with_receipt {
            record.fields.remove("PopReceipt")
        } else {
            None
        },
        text: record.fields.remove("MessageText").unwrap_or_default(),
        inserted_on,
    }
}

impl QueueBackend for AzureQueueBackend {
    fn create_queue_if_not_exists(&self, queue: &str) -> BackendFuture<'_, ()> {
        let queue = queue.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, queue_path(&queue));
            let resp = self.rest.send(req).await?;
            ignore_conflict(check_status(resp, "CreateQueue", &queue).await)
        })
    }

    fn peek(&self, queue: &str, max: u32) -> BackendFuture<'_, Vec<QueueMessage>> {
        let queue = queue.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::GET, messages_path(&queue))
                .query("peekonly", "true")
                .query("numofmessages", clamp_count(max));
            self.get_messages(&queue, req, "PeekMessages", false).await
        })
    }

    fn send(&self, queue: &str, text: &str) -> BackendFuture<'_, ()> {
        let queue = queue.to_string();
        let body = render_queue_message(text);
        Box::pin(async move {
            let req = AzureRequest::new(Method::POST, messages_path(&queue))
                .body("application/xml", body);
            check_status(self.rest.send(req).await?, "PutMessage", &queue).await?;
            Ok(())
        })
    }

    fn receive(
        &self,
        queue: &str,
        max: u32,
        visibility_timeout: Duration,
    ) -> BackendFuture<'_, Vec<QueueMessage>> {
        let queue = queue.to_string();
        Box::pin(async move {
            // The service requires a visibility timeout of at least one second.
            let visibility = visibility_timeout.as_secs().max(1);
            let req = AzureRequest::new(Method::GET, messages_path(&queue))
                .query("numofmessages", clamp_count(max))
                .query("visibilitytimeout", visibility.to_string());
            self.get_messages(&queue, req, "GetMessages", true).await
        })
    }

    fn delete_message(&self, queue: &str, id: &str, pop_receipt: &str) -> BackendFuture<'_, ()> {
        let path = format!("{}/{}", messages_path(queue), encode_segment(id));
        let id = id.to_string();
        let pop_receipt = pop_receipt.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::DELETE, path).query("popreceipt", pop_receipt);
            check_status(self.rest.send(req).await?, "DeleteMessage", &id).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::collections::HashMap;

    fn record(pairs: &[(&str, &str)]) -> XmlRecord {
        XmlRecord {
            tag: "QueueMessage".to_string(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_clamp_count() {
        assert_eq!(clamp_count(0), "1");
        assert_eq!(clamp_count(10), "10");
        assert_eq!(clamp_count(500), "32");
    }

    #[test]
    fn test_parse_insertion_time() {
        let t = parse_insertion_time(Some("Fri, 09 Oct 2009 21:04:30 GMT")).unwrap();
        assert_eq!(t.year(), 2009);
        assert_eq!(t.hour(), 21);
        assert!(parse_insertion_time(Some("yesterday")).is_none());
        assert!(parse_insertion_time(None).is_none());
    }

    #[test]
    fn test_peeked_message_never_carries_receipt() {
        let r = record(&[
            ("MessageId", "m1"),
            ("PopReceipt", "r1"),
            ("MessageText", "Order #42 - Shipped"),
        ]);
        let m = message_from_record(r, false);
        assert_eq!(m.id, "m1");
        assert_eq!(m.text, "Order #42 - Shipped");
        assert!(m.pop_receipt.is_none());
    }

    #[test]
    fn test_received_message_carries_receipt() {
        let r = record(&[("MessageId", "m1"), ("PopReceipt", "r1"), ("MessageText", "x")]);
        let m = message_from_record(r, true);
        assert_eq!(m.pop_receipt.as_deref(), Some("r1"));
        assert!(m.inserted_on.is_none());
    }

    #[test]
    fn test_message_paths() {
        assert_eq!(queue_path("order-events"), "/order-events");
        assert_eq!(messages_path("order-events"), "/order-events/messages");
    }
}
