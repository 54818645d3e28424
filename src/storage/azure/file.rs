//! File service client.  Only the share root directory is addressed.

use bytes::Bytes;
use reqwest::Method;

use super::{
    check_status, encode_path, encode_segment, ignore_conflict, read_records, AzureRequest,
    ConnectionString, RestClient, ServiceKind,
};
use crate::errors::StorageResult;
use crate::models::DirectoryEntry;
use crate::storage::backend::{BackendFuture, FileShareBackend};

/// Files at the root of a share, over the File REST API.
pub struct AzureFileShareBackend {
    rest: RestClient,
}

impl AzureFileShareBackend {
    pub fn new(conn: &ConnectionString) -> StorageResult<Self> {
        Ok(Self {
            rest: RestClient::new(conn, ServiceKind::File)?,
        })
    }
}

fn share_path(share: &str) -> String {
    format!("/{}", encode_segment(share))
}

fn file_path(share: &str, name: &str) -> String {
    format!("/{}/{}", encode_segment(share), encode_path(name))
}

/// `x-ms-range` value covering `len` bytes from `offset`.  `len` must be > 0.
fn range_header(offset: u64, len: u64) -> String {
    format!("bytes={}-{}", offset, offset + len - 1)
}

impl FileShareBackend for AzureFileShareBackend {
    fn create_share_if_not_exists(&self, share: &str) -> BackendFuture<'_, ()> {
        let share = share.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, share_path(&share)).query("restype", "share");
            let resp = self.rest.send(req).await?;
            ignore_conflict(check_status(resp, "CreateShare", &share).await)
        })
    }

    fn list_root(&self, share: &str) -> BackendFuture<'_, Vec<DirectoryEntry>> {
        let share = share.to_string();
        Box::pin(async move {
            let mut entries = Vec::new();
            let mut marker: Option<String> = None;
            loop {
                let mut req = AzureRequest::new(Method::GET, share_path(&share))
                    .query("restype", "directory")
                    .query("comp", "list");
                if let Some(m) = marker.take() {
                    req = req.query("marker", m);
                }
                let resp = check_status(self.rest.send(req).await?, "ListDirectory", &share)
                    .await?;
                let page = read_records(resp, "ListDirectory", &["File", "Directory"]).await?;
                for mut record in page.records {
                    if let Some(name) = record.fields.remove("Name") {
                        entries.push(DirectoryEntry {
                            name,
                            is_directory: record.tag == "Directory",
                        });
                    }
                }
                match page.next_marker {
                    Some(m) => marker = Some(m),
                    None => break,
                }
            }
            Ok(entries)
        })
    }

    fn create_file(&self, share: &str, name: &str, length: u64) -> BackendFuture<'_, ()> {
        let path = file_path(share, name);
        let name = name.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, path)
                .header("x-ms-type", "file")
                .header("x-ms-content-length", length.to_string());
            check_status(self.rest.send(req).await?, "CreateFile", &name).await?;
            Ok(())
        })
    }

    fn write_range(
        &self,
        share: &str,
        name: &str,
        offset: u64,
        data: Bytes,
    ) -> BackendFuture<'_, ()> {
        let path = file_path(share, name);
        let name = name.to_string();
        Box::pin(async move {
            // The service rejects empty ranges.
            if data.is_empty() {
                return Ok(());
            }
            let req = AzureRequest::new(Method::PUT, path)
                .query("comp", "range")
                .header("x-ms-range", range_header(offset, data.len() as u64))
                .header("x-ms-write", "update")
                .body("application/octet-stream", data);
            check_status(self.rest.send(req).await?, "PutRange", &name).await?;
            Ok(())
        })
    }

    fn delete_if_exists(&self, share: &str, name: &str) -> BackendFuture<'_, bool> {
        let path = file_path(share, name);
        let name = name.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::DELETE, path);
            match check_status(self.rest.send(req).await?, "DeleteFile", &name).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            }
        })
    }

    fn rename(&self, share: &str, source: &str, destination: &str) -> BackendFuture<'_, ()> {
        let source_url = self.rest.source_url(&file_path(share, source));
        let path = file_path(share, destination);
        let source = source.to_string();
        Box::pin(async move {
            let req = AzureRequest::new(Method::PUT, path)
                .query("comp", "rename")
                .header("x-ms-file-rename-source", source_url);
            check_status(self.rest.send(req).await?, "RenameFile", &source).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header_is_inclusive() {
        assert_eq!(range_header(0, 1), "bytes=0-0");
        assert_eq!(range_header(0, 1024), "bytes=0-1023");
        assert_eq!(range_header(512, 512), "bytes=512-1023");
    }

    #[test]
    fn test_file_paths() {
        assert_eq!(share_path("contracts"), "/contracts");
        assert_eq!(file_path("contracts", "Q1 lease.pdf"), "/contracts/Q1%20lease.pdf");
    }

    #[test]
    fn test_development_storage_has_no_file_service() {
        let cs = ConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        assert!(AzureFileShareBackend::new(&cs).is_err());
    }
}
