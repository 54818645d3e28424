//! Blob service client.

use bytes::Bytes;
use reqwest::Method;

use super::{
    check_status, encode_path, encode_segment, header_str, ignore_conflict, read_records,
    AzureRequest, ConnectionString, RestClient, ServiceKind,
};
use crate::errors::StorageResult;
use crate::storage::backend::{BackendFuture, BlobBackend, CopyStatus};

/// Block blobs in a container, over the Blob REST API.
pub struct AzureBlobBackend {
    rest: RestClient,
}

impl AzureBlobBackend {
    pub fn new(conn: &ConnectionString) -> StorageResult<Self> {
        Ok(Self {
            rest: RestClient::new(conn, ServiceKind::Blob)?,
        })
    }
}

fn container_path(container: &str) -> String {
    format!("/{}", encode_segment(container))
}

fn blob_path(container: &str, name: &str) -> String {
    format!("/{}/{}", encode_segment(container), encode_path(name))
}

/// Map the `x-ms-copy-status` header.  A blob that was never the target of
/// a copy has no such header and counts as complete.
fn parse_copy_status(status: Option<&str>, description: Option<&str>) -> CopyStatus {
    match status.unwrap_or("success") {
        "pending" => CopyStatus::Pending,
        "success" => CopyStatus::Success,
        other => CopyStatus::Failed(description.unwrap_or(other).to_string()),
    }
}

fn copy_status_of(resp: &reqwest::Response) -> CopyStatus {
    parse_copy_status(
        header_str(resp, "x-ms-copy-status"),
        header_str(resp, "x-ms-copy-status-description"),
    )
}

impl BlobBackend for AzureBlobBackend {
    fn create_container_if_not_exists(&self, container: &str) -> BackendFuture<'_, ()> {
        let container = container.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, container_path(&container))
                .query("restype", "container");
            let resp = self.rest.send(req).await?;
            ignore_conflict(check_status(resp, "CreateContainer", &container).await)
        })
    }

    fn list_blob_names(&self, container: &str) -> BackendFuture<'_, Vec<String>> {
        let container = container.to_string();
        Box::pin(async move {
            let mut names = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let mut req = AzureRequest::new(Method::GET, container_path(&container))
                    .query("restype", "container")
                    .query("comp", "list");
                if let Some(m) = marker.take() {
                    req = req.query("marker", m);
                }
                let resp = check_status(self.rest.send(req).await?, "ListBlobs", &container).await?;
                let page = read_records(resp, "ListBlobs", &["Blob"]).await?;
                names.extend(
                    page.records
                        .into_iter()
                        .filter_map(|mut r| r.fields.remove("Name")),
                );
                match page.next_marker {
                    Some(m) => marker = Some(m),
                    None => break,
                }
            }
            Ok(names)
        })
    }

    fn upload(&self, container: &str, name: &str, data: Bytes) -> BackendFuture<'_, ()> {
        let path = blob_path(container, name);
        let name = name.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, path)
                .header("x-ms-blob-type", "BlockBlob")
                .body("application/octet-stream", data);
            check_status(self.rest.send(req).await?, "PutBlob", &name).await?;
            Ok(())
        })
    }

    fn delete_if_exists(&self, container: &str, name: &str) -> BackendFuture<'_, bool> {
        let path = blob_path(container, name);
        let name = name.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::DELETE, path);
            match check_status(self.rest.send(req).await?, "DeleteBlob", &name).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    fn start_copy(
        &self,
        container: &str,
        source: &str,
        destination: &str,
    ) -> BackendFuture<'_, CopyStatus> {
        let source_url = self.rest.source_url(&blob_path(container, source));
        let path = blob_path(container, destination);
        let source = source.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, path).header("x-ms-copy-source", source_url);
            let resp = check_status(self.rest.send(req).await?, "CopyBlob", &source).await?;
            Ok(copy_status_of(&resp))
        })
    }

    fn copy_status(&self, container: &str, destination: &str) -> BackendFuture<'_, CopyStatus> {
        let path = blob_path(container, destination);
        let destination = destination.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::HEAD, path);
            let resp =
                check_status(self.rest.send(req).await?, "GetBlobProperties", &destination)
                    .await?;
            Ok(copy_status_of(&resp))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_path_keeps_virtual_directories() {
        assert_eq!(
            blob_path("product-images", "2024/red shoe.png"),
            "/product-images/2024/red%20shoe.png"
        );
        assert_eq!(container_path("product-images"), "/product-images");
    }

    #[test]
    fn test_parse_copy_status() {
        assert_eq!(parse_copy_status(Some("pending"), None), CopyStatus::Pending);
        assert_eq!(parse_copy_status(Some("success"), None), CopyStatus::Success);
        assert_eq!(parse_copy_status(None, None), CopyStatus::Success);
        assert_eq!(
            parse_copy_status(Some("failed"), Some("500 InternalError")),
            CopyStatus::Failed("500 InternalError".to_string())
        );
        assert_eq!(
            parse_copy_status(Some("aborted"), None),
            CopyStatus::Failed("aborted".to_string())
        );
    }

    #[test]
    fn test_new_uses_blob_endpoint() {
        let cs = ConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        let backend = AzureBlobBackend::new(&cs).unwrap();
        assert_eq!(
            backend.rest.source_url("/c/b"),
            "http://127.0.0.1:10000/devstoreaccount1/c/b"
        );
    }
}
