use serde::{Deserialize, Serialize};

/// Face bounding box in original image coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FaceBbox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBbox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// Raw output of the detection + embedding models for one face.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: FaceBbox,
    pub kps: Vec<[f32; 2]>,
    pub det_score: f32,
    pub embedding: Vec<f32>,
}

/// One row of the embedding store. The vector itself never goes over the
/// wire; identity association does.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRecord {
    pub id: String,
    pub person_ref: Option<String>,
    pub image_ref: Option<String>,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub added: Option<i64>,
}

/// A similarity hit against the embedding index.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatch {
    pub vector_id: String,
    pub person_ref: String,
    pub similarity: f32,
}

/// One face as returned by the detect endpoint, after reconciliation.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledFace {
    pub vector_id: String,
    pub person_ref: String,
    pub bbox: FaceBbox,
    pub kps: Vec<[f32; 2]>,
    pub det_score: f32,
    pub recognized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}
