//! Dropbox API v2 client
//!
//! Covers the folder listing, temporary link, file properties template and
//! property search endpoints. Errors come back as HTTP 409 with a JSON body
//! whose `error[".tag"]` names the failure.

use super::{RemoteStore, StoreError};
use crate::types::{
    Cursor, FileEntry, Page, PropertyField, PropertyQuery, SearchMatch, SearchPage, TemplateId,
    TemplateSpec,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const DROPBOX_API_URL: &str = "https://api.dropboxapi.com/2";
const USER_AGENT: &str = "facetag/0.1.0";
const ALREADY_EXISTS_TAG: &str = "property_group_already_exists";

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<ListEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
enum ListEntry {
    File {
        path_lower: String,
        server_modified: DateTime<Utc>,
        size: u64,
    },
    Folder {},
    Deleted {},
}

#[derive(Debug, Deserialize)]
struct TemporaryLinkResponse {
    link: String,
}

#[derive(Debug, Deserialize)]
struct AddTemplateResponse {
    template_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    matches: Vec<SearchResponseMatch>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseMatch {
    path: String,
    #[serde(default)]
    is_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: String,
    #[serde(default)]
    error: Option<ApiErrorTag>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorTag {
    #[serde(rename = ".tag")]
    tag: Option<String>,
}

#[derive(Debug, Serialize)]
struct PropertyGroupBody<'a> {
    path: &'a str,
    property_groups: [PropertyGroup<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PropertyGroup<'a> {
    template_id: &'a str,
    fields: &'a [PropertyField],
}

/// Dropbox API client authenticated with a bearer access token
pub struct DropboxClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl DropboxClient {
    pub fn new(access_token: String) -> Result<Self, StoreError> {
        Self::with_base_url(access_token, DROPBOX_API_URL.to_string())
    }

    /// Client against a different API root (proxies, test servers)
    pub fn with_base_url(access_token: String, base_url: String) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST a JSON RPC call and decode the JSON response
    async fn rpc<B, R>(&self, endpoint: &str, body: &B) -> Result<R, StoreError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(endpoint = %endpoint, "Calling Dropbox API");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(decode_error(status.as_u16(), &text));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| StoreError::Parse(format!("{}: {}", endpoint, e)))
    }
}

/// Map an error response onto [`StoreError`]
fn decode_error(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => {
            let tag = parsed.error.and_then(|e| e.tag);
            if tag.as_deref() == Some(ALREADY_EXISTS_TAG) {
                return StoreError::PropertyGroupAlreadyExists;
            }
            StoreError::Api {
                status,
                tag,
                summary: parsed.error_summary,
            }
        }
        // Non-409 failures are often plain text
        Err(_) => StoreError::Api {
            status,
            tag: None,
            summary: body.to_string(),
        },
    }
}

fn into_page(response: ListFolderResponse) -> Page<FileEntry> {
    let items = response
        .entries
        .into_iter()
        .filter_map(|entry| match entry {
            ListEntry::File {
                path_lower,
                server_modified,
                size,
            } => Some(FileEntry {
                path: path_lower,
                last_modified: server_modified,
                size_bytes: size,
            }),
            ListEntry::Folder {} | ListEntry::Deleted {} => None,
        })
        .collect();

    Page {
        items,
        cursor: Cursor::new(response.cursor),
        has_more: response.has_more,
    }
}

fn into_search_page(response: SearchResponse) -> SearchPage {
    SearchPage {
        matches: response
            .matches
            .into_iter()
            .map(|m| SearchMatch {
                path: m.path,
                is_deleted: m.is_deleted,
            })
            .collect(),
        cursor: response
            .cursor
            .filter(|c| !c.is_empty())
            .map(Cursor::new),
    }
}

#[async_trait]
impl RemoteStore for DropboxClient {
    async fn list_folder(&self, path: &str, limit: Option<u32>) -> Result<Page<FileEntry>, StoreError> {
        let mut body = json!({ "path": path });
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }
        let response: ListFolderResponse = self.rpc("files/list_folder", &body).await?;
        Ok(into_page(response))
    }

    async fn list_folder_continue(&self, cursor: &Cursor) -> Result<Page<FileEntry>, StoreError> {
        let body = json!({ "cursor": cursor.as_str() });
        let response: ListFolderResponse = self.rpc("files/list_folder/continue", &body).await?;
        Ok(into_page(response))
    }

    async fn temporary_link(&self, path: &str) -> Result<String, StoreError> {
        let body = json!({ "path": path });
        let response: TemporaryLinkResponse = self.rpc("files/get_temporary_link", &body).await?;
        Ok(response.link)
    }

    async fn add_template(&self, template: &TemplateSpec) -> Result<TemplateId, StoreError> {
        let fields: Vec<_> = template
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "description": f.description, "type": "string" }))
            .collect();
        let body = json!({
            "name": template.name,
            "description": template.description,
            "fields": fields,
        });
        let response: AddTemplateResponse = self
            .rpc("file_properties/templates/add_for_user", &body)
            .await?;
        Ok(TemplateId::new(response.template_id))
    }

    async fn add_properties(
        &self,
        path: &str,
        template_id: &TemplateId,
        fields: &[PropertyField],
    ) -> Result<(), StoreError> {
        let body = PropertyGroupBody {
            path,
            property_groups: [PropertyGroup {
                template_id: template_id.as_str(),
                fields,
            }],
        };
        let _: IgnoredAny = self.rpc("file_properties/properties/add", &body).await?;
        Ok(())
    }

    async fn overwrite_properties(
        &self,
        path: &str,
        template_id: &TemplateId,
        fields: &[PropertyField],
    ) -> Result<(), StoreError> {
        let body = PropertyGroupBody {
            path,
            property_groups: [PropertyGroup {
                template_id: template_id.as_str(),
                fields,
            }],
        };
        let _: IgnoredAny = self
            .rpc("file_properties/properties/overwrite", &body)
            .await?;
        Ok(())
    }

    async fn search_properties(&self, query: &PropertyQuery) -> Result<SearchPage, StoreError> {
        let queries: Vec<_> = query
            .field_names
            .iter()
            .map(|field| {
                json!({
                    "query": query.query,
                    "mode": { ".tag": "field_name", "field_name": field },
                    "logical_operator": "or_operator",
                })
            })
            .collect();
        let body = json!({ "queries": queries, "template_filter": "filter_none" });
        let response: SearchResponse = self
            .rpc("file_properties/properties/search", &body)
            .await?;
        Ok(into_search_page(response))
    }

    async fn search_properties_continue(&self, cursor: &Cursor) -> Result<SearchPage, StoreError> {
        let body = json!({ "cursor": cursor.as_str() });
        let response: SearchResponse = self
            .rpc("file_properties/properties/search/continue", &body)
            .await?;
        Ok(into_search_page(response))
    }
}
