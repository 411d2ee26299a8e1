//! Block payloads: the tagged data carried by each canvas node.
//!
//! A [`Block`] pairs an identifier and position with a [`BlockData`] sum type.
//! Every reader of block data matches the enum exhaustively; there is no
//! duck-typed escape hatch.

use serde::{Deserialize, Serialize};

use crate::types::{BlockStatus, JobId, ModelId, NodeId, Position};

/// Where an image block's pixels came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// Uploaded by the user.
    #[default]
    Upload,
    /// Produced by a generation job.
    Generated,
}

/// Payload of a text block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBlock {
    /// Current displayed content. Streaming chunks replace this wholesale;
    /// the executor sends the running total, not deltas.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: ModelId,
    #[serde(default)]
    pub status: BlockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<NodeId>,
    #[serde(default)]
    pub auto_run: bool,
}

/// Payload of an image block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default)]
    pub source: ImageSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default)]
    pub status: BlockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_block_id: Option<NodeId>,
    #[serde(default)]
    pub auto_run: bool,
    /// True when this block was spawned as a variation of another image.
    #[serde(default)]
    pub variation: bool,
}

/// Tagged block payload, one variant per block kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockData {
    Text(TextBlock),
    Image(ImageBlock),
}

impl BlockData {
    pub fn status(&self) -> BlockStatus {
        match self {
            BlockData::Text(t) => t.status,
            BlockData::Image(i) => i.status,
        }
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            BlockData::Text(t) => t.job_id.as_ref(),
            BlockData::Image(i) => i.job_id.as_ref(),
        }
    }

    pub fn prompt(&self) -> Option<&str> {
        match self {
            BlockData::Text(t) => t.prompt.as_deref(),
            BlockData::Image(i) => i.prompt.as_deref(),
        }
    }

    pub fn auto_run(&self) -> bool {
        match self {
            BlockData::Text(t) => t.auto_run,
            BlockData::Image(i) => i.auto_run,
        }
    }
}

/// A node on the canvas: identity, position, payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub position: Position,
    pub data: BlockData,
}

impl Block {
    /// Build a text block with empty content and the given prompt.
    #[must_use]
    pub fn text(id: NodeId, position: Position, model: impl Into<ModelId>) -> Self {
        Block {
            id,
            position,
            data: BlockData::Text(TextBlock {
                model: model.into(),
                ..Default::default()
            }),
        }
    }

    /// Build an empty image block.
    #[must_use]
    pub fn image(id: NodeId, position: Position) -> Self {
        Block {
            id,
            position,
            data: BlockData::Image(ImageBlock::default()),
        }
    }

    pub fn status(&self) -> BlockStatus {
        self.data.status()
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.data.job_id()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.data.prompt()
    }

    pub(crate) fn set_status(&mut self, status: BlockStatus) {
        match &mut self.data {
            BlockData::Text(t) => t.status = status,
            BlockData::Image(i) => i.status = status,
        }
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        match &mut self.data {
            BlockData::Text(t) => t.error = error,
            BlockData::Image(i) => i.error = error,
        }
    }

    pub(crate) fn set_job(&mut self, job_id: Option<JobId>) {
        match &mut self.data {
            BlockData::Text(t) => t.job_id = job_id,
            BlockData::Image(i) => i.job_id = job_id,
        }
    }

    /// Read and clear the one-shot auto-run latch.
    pub(crate) fn take_auto_run(&mut self) -> bool {
        match &mut self.data {
            BlockData::Text(t) => std::mem::take(&mut t.auto_run),
            BlockData::Image(i) => std::mem::take(&mut i.auto_run),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_data_tag_roundtrip() {
        let block = Block::text("a".into(), Position::new(10.0, 20.0), "gpt-test");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["data"]["type"], "text");
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn image_block_defaults() {
        let block = Block::image("b".into(), Position::default());
        match &block.data {
            BlockData::Image(img) => {
                assert_eq!(img.source, ImageSource::Upload);
                assert!(img.image_url.is_none());
                assert!(!img.variation);
            }
            BlockData::Text(_) => panic!("expected image payload"),
        }
    }

    #[test]
    fn take_auto_run_is_one_shot() {
        let mut block = Block::text("c".into(), Position::default(), "m");
        if let BlockData::Text(t) = &mut block.data {
            t.auto_run = true;
        }
        assert!(block.take_auto_run());
        assert!(!block.take_auto_run());
    }
}
