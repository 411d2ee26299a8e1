use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{JobId, ModelId, NodeId};

/// The two kinds of work the executor performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    #[serde(rename = "text")]
    GenerateText,
    #[serde(rename = "image")]
    GenerateImage,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GenerateText => write!(f, "text"),
            Self::GenerateImage => write!(f, "image"),
        }
    }
}

/// Server-side job lifecycle. A job transitions exactly once out of
/// `Pending`/`Running` into a terminal status and is never resurrected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final payload of a successful job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResult {
    Image {
        #[serde(rename = "imageId")]
        image_id: String,
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Text {
        text: String,
    },
}

/// One-shot view of a job's server-side state, as returned by
/// `GET /jobs/{id}`. Used by the recovery path.
#[derive(Clone, Debug, Deserialize)]
pub struct JobSnapshot {
    #[serde(rename = "jobId")]
    pub job_id: JobId,
    #[serde(rename = "blockId")]
    pub block_id: NodeId,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Submission body for a text generation job (`POST /jobs/generate-text`).
#[derive(Clone, Debug, Serialize)]
pub struct TextJobRequest {
    pub block_id: NodeId,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    pub model: ModelId,
}

/// Submission body for an image generation job (`POST /jobs/generate-image`).
#[derive(Clone, Debug, Serialize)]
pub struct ImageJobRequest {
    pub block_id: NodeId,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    pub model: ModelId,
    pub is_variation: bool,
}

/// A unit of work to submit, one variant per job kind.
#[derive(Clone, Debug)]
pub enum JobRequest {
    Text(TextJobRequest),
    Image(ImageJobRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Text(_) => JobKind::GenerateText,
            Self::Image(_) => JobKind::GenerateImage,
        }
    }

    pub fn block_id(&self) -> &NodeId {
        match self {
            Self::Text(r) => &r.block_id,
            Self::Image(r) => &r.block_id,
        }
    }

    /// Executor endpoint path for this request.
    pub(crate) fn path(&self) -> &'static str {
        match self {
            Self::Text(_) => "/jobs/generate-text",
            Self::Image(_) => "/jobs/generate-image",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_result_distinguishes_variants() {
        let text: JobResult = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(text, JobResult::Text { text: "hi".into() });

        let image: JobResult =
            serde_json::from_str(r#"{"imageId":"42","imageUrl":"/api/images/42"}"#).unwrap();
        assert_eq!(
            image,
            JobResult::Image {
                image_id: "42".into(),
                image_url: "/api/images/42".into()
            }
        );
    }

    #[test]
    fn snapshot_parses_executor_shape() {
        let raw = r#"{
            "jobId": "j1",
            "blockId": "b1",
            "type": "text",
            "status": "completed",
            "result": {"text": "done"},
            "error": null
        }"#;
        let snapshot: JobSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.kind, JobKind::GenerateText);
        assert!(snapshot.status.is_terminal());
        assert_eq!(snapshot.result, Some(JobResult::Text { text: "done".into() }));
    }

    #[test]
    fn text_request_serializes_snake_case() {
        let request = TextJobRequest {
            block_id: "b1".into(),
            prompt: "write".into(),
            input: None,
            image_urls: Some(vec!["/api/images/1".into()]),
            model: "default".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["block_id"], "b1");
        assert_eq!(json["image_urls"][0], "/api/images/1");
        assert!(json.get("input").is_none());
    }
}
