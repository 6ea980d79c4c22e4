//! Azure Face API (v1.0) client

use super::{FaceError, FaceService};
use crate::types::{Candidate, FaceId, FaceIdentification, IdentityId};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const USER_AGENT: &str = "facetag/0.1.0";
const GROUP_EXISTS_CODE: &str = "PersonGroupExists";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedFaceResponse {
    face_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyResponse {
    face_id: String,
    #[serde(default)]
    candidates: Vec<CandidateResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateResponse {
    person_id: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePersonResponse {
    person_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Azure Face API client
pub struct AzureFaceClient {
    http_client: reqwest::Client,
    endpoint: String,
    subscription_key: String,
}

impl AzureFaceClient {
    /// Client for a full endpoint such as
    /// `https://westus.api.cognitive.microsoft.com/face/v1.0`
    pub fn new(endpoint: String, subscription_key: String) -> Result<Self, FaceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FaceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_key,
        })
    }

    /// Endpoint URL for a region name
    pub fn endpoint_for_location(location: &str) -> String {
        format!("https://{}.api.cognitive.microsoft.com/face/v1.0", location)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, FaceError> {
        let url = format!("{}/{}", self.endpoint, path);
        tracing::debug!(method = %method, path = %path, "Calling Face API");

        let mut request = self
            .http_client
            .request(method, &url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FaceError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(decode_error(status.as_u16(), &text))
    }

    async fn send_json<R: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: serde_json::Value,
    ) -> Result<R, FaceError> {
        self.send(method, path, Some(body))
            .await?
            .json::<R>()
            .await
            .map_err(|e| FaceError::Parse(format!("{}: {}", path, e)))
    }
}

fn decode_error(status: u16, body: &str) -> FaceError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .unwrap_or(ErrorDetail {
            code: String::new(),
            message: body.to_string(),
        });

    if detail.code == GROUP_EXISTS_CODE {
        return FaceError::GroupExists;
    }

    match status {
        401 => FaceError::InvalidKey,
        429 => FaceError::RateLimitExceeded,
        _ => FaceError::Api {
            status,
            code: detail.code,
            message: detail.message,
        },
    }
}

#[async_trait]
impl FaceService for AzureFaceClient {
    async fn detect_faces(&self, image_url: &str) -> Result<Vec<FaceId>, FaceError> {
        let faces: Vec<DetectedFaceResponse> = self
            .send_json(
                reqwest::Method::POST,
                "detect?returnFaceId=true",
                json!({ "url": image_url }),
            )
            .await?;

        Ok(faces.into_iter().map(|f| FaceId::new(f.face_id)).collect())
    }

    async fn identify(
        &self,
        group_id: &str,
        face_ids: &[FaceId],
        max_candidates: u32,
        min_confidence: f64,
    ) -> Result<Vec<FaceIdentification>, FaceError> {
        let ids: Vec<&str> = face_ids.iter().map(FaceId::as_str).collect();
        let response: Vec<IdentifyResponse> = self
            .send_json(
                reqwest::Method::POST,
                "identify",
                json!({
                    "personGroupId": group_id,
                    "faceIds": ids,
                    "maxNumOfCandidatesReturned": max_candidates,
                    "confidenceThreshold": min_confidence,
                }),
            )
            .await?;

        Ok(response
            .into_iter()
            .map(|r| FaceIdentification {
                face_id: FaceId::new(r.face_id),
                candidates: r
                    .candidates
                    .into_iter()
                    .map(|c| Candidate {
                        identity_id: IdentityId::new(c.person_id),
                        confidence: c.confidence,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn create_group(&self, group_id: &str, name: &str) -> Result<(), FaceError> {
        self.send(
            reqwest::Method::PUT,
            &format!("persongroups/{}", group_id),
            Some(json!({ "name": name })),
        )
        .await?;
        Ok(())
    }

    async fn create_person(&self, group_id: &str, name: &str) -> Result<IdentityId, FaceError> {
        let response: CreatePersonResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("persongroups/{}/persons", group_id),
                json!({ "name": name }),
            )
            .await?;
        Ok(IdentityId::new(response.person_id))
    }

    async fn add_person_face(
        &self,
        group_id: &str,
        person_id: &IdentityId,
        image_url: &str,
    ) -> Result<(), FaceError> {
        self.send(
            reqwest::Method::POST,
            &format!(
                "persongroups/{}/persons/{}/persistedFaces",
                group_id, person_id
            ),
            Some(json!({ "url": image_url })),
        )
        .await?;
        Ok(())
    }

    async fn train_group(&self, group_id: &str) -> Result<(), FaceError> {
        self.send(
            reqwest::Method::POST,
            &format!("persongroups/{}/train", group_id),
            None,
        )
        .await?;
        Ok(())
    }
}
