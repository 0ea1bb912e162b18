//! Google Drive v3 REST client.
//!
//! Only the handful of `files` endpoints the sync pass needs are covered:
//! listing with a `q` filter, folder creation, multipart upload and the
//! `trashed` patch. Authentication is a bearer access token supplied by
//! configuration; obtaining and refreshing it is left to the operator.

use crate::archive::{
    ArchiveError, ArchiveResult, DirectoryId, NameQuery, RemoteArchive, RemoteObject,
    FOLDER_MEDIA_TYPE,
};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Listings longer than this many pages are refused, not truncated.
pub const MAX_LIST_PAGES: usize = 1000;

const PAGE_SIZE: &str = "1000";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";
const MULTIPART_BOUNDARY: &str = "gallery_sync_upload_boundary";
const USER_AGENT: &str = concat!("gallery-sync/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`DriveArchive`].
#[derive(Debug, Clone)]
pub struct DriveSettings {
    pub api_base: String,
    pub upload_base: String,
    pub access_token: String,
    pub timeout: Duration,
}

impl DriveSettings {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            access_token: access_token.into(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<RemoteObject>,
}

#[derive(Debug)]
enum ListFailure {
    Request(String),
    TooManyPages,
}

impl std::fmt::Display for ListFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(message) => f.write_str(message),
            Self::TooManyPages => write!(f, "more than {} pages", MAX_LIST_PAGES),
        }
    }
}

/// Remote archive backed by the Drive v3 HTTP API.
pub struct DriveArchive {
    client: Client,
    settings: DriveSettings,
}

impl DriveArchive {
    pub fn new(settings: DriveSettings) -> ArchiveResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ArchiveError::Client(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn list_raw(&self, q: &str) -> Result<Vec<RemoteObject>, ListFailure> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let url = format!("{}/files", self.settings.api_base);
            let mut request = self
                .client
                .get(&url)
                .bearer_auth(&self.settings.access_token)
                .query(&[("q", q), ("fields", LIST_FIELDS), ("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .map_err(|e| ListFailure::Request(e.to_string()))?;
            let page: FileList = checked(response)
                .map_err(ListFailure::Request)?
                .json()
                .map_err(|e| ListFailure::Request(e.to_string()))?;
            objects.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(objects),
            }
        }

        Err(ListFailure::TooManyPages)
    }
}

impl RemoteArchive for DriveArchive {
    fn list_by_name(&self, query: &NameQuery) -> ArchiveResult<Vec<RemoteObject>> {
        let q = drive_query(query);
        log::debug!("Listing remote objects: {}", q);
        self.list_raw(&q).map_err(|failure| match failure {
            ListFailure::TooManyPages => ArchiveError::TooManyPages {
                query: q.clone(),
                pages: MAX_LIST_PAGES,
            },
            ListFailure::Request(message) => ArchiveError::List {
                query: q.clone(),
                message,
            },
        })
    }

    fn ensure_directory(&self, name: &str) -> ArchiveResult<DirectoryId> {
        let dir_err = |message: String| ArchiveError::Directory {
            name: name.to_string(),
            message,
        };

        let q = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_value(name),
            FOLDER_MEDIA_TYPE
        );
        let existing = self
            .list_raw(&q)
            .map_err(|failure| dir_err(failure.to_string()))?;
        if let Some(existing) = existing.into_iter().next() {
            return Ok(DirectoryId(existing.id));
        }

        log::info!("Creating remote directory '{}'", name);
        let response = self
            .client
            .post(format!("{}/files", self.settings.api_base))
            .bearer_auth(&self.settings.access_token)
            .query(&[("fields", "id,name,mimeType")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MEDIA_TYPE,
                "parents": ["root"],
            }))
            .send()
            .map_err(|e| dir_err(e.to_string()))?;
        let created: RemoteObject = checked(response)
            .map_err(dir_err)?
            .json()
            .map_err(|e| dir_err(e.to_string()))?;
        Ok(DirectoryId(created.id))
    }

    fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        media_type: &str,
        parent: &DirectoryId,
    ) -> ArchiveResult<RemoteObject> {
        let upload_err = |message: String| ArchiveError::Upload {
            name: name.to_string(),
            message,
        };

        let metadata = json!({
            "name": name,
            "mimeType": media_type,
            "parents": [parent.0],
        });
        let body = multipart_related_body(&metadata, media_type, &bytes);

        let response = self
            .client
            .post(format!("{}/files", self.settings.upload_base))
            .bearer_auth(&self.settings.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name,mimeType")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()
            .map_err(|e| upload_err(e.to_string()))?;
        checked(response)
            .map_err(upload_err)?
            .json()
            .map_err(|e| upload_err(e.to_string()))
    }

    fn trash(&self, id: &str) -> ArchiveResult<()> {
        let trash_err = |message: String| ArchiveError::Trash {
            id: id.to_string(),
            message,
        };

        let response = self
            .client
            .patch(format!("{}/files/{}", self.settings.api_base, id))
            .bearer_auth(&self.settings.access_token)
            .json(&json!({ "trashed": true }))
            .send()
            .map_err(|e| trash_err(e.to_string()))?;
        checked(response).map_err(trash_err)?;
        Ok(())
    }
}

/// Turn a non-success response into its status line plus body.
fn checked(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(format!("HTTP {}: {}", status, body.trim()))
}

/// Drive `q` expression for a [`NameQuery`], excluding trashed objects.
fn drive_query(query: &NameQuery) -> String {
    let clause = match query {
        NameQuery::Contains(s) => format!("name contains '{}'", escape_query_value(s)),
        NameQuery::Exact(s) => format!("name = '{}'", escape_query_value(s)),
    };
    format!("{} and trashed = false", clause)
}

fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn multipart_related_body(metadata: &serde_json::Value, media_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            m = metadata,
            t = media_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}
