use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::{inputs, GraphOptimizationLevel, Session, SessionOutputs};
use parking_lot::Mutex;

use crate::domain::face::{DetectedFace, FaceBbox};
use crate::error::{Error, Result};
use crate::tools::log::{log_info, LogServiceType};

/// ArcFace w600k_r50 embedding size. The embedding index and the dimension
/// invariant on writes are pinned to this.
pub const EMBEDDING_DIM: usize = 512;

const DETECTION_SIZE: u32 = 640;
const RECOGNITION_SIZE: u32 = 112;
const DETECTION_STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_POINT: usize = 2;
const KEYPOINT_COUNT: usize = 5;

const DETECTION_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;

const DETECTION_MODEL: &str = "scrfd_500m_bnkps.onnx";
const RECOGNITION_MODEL: &str = "w600k_r50.onnx";
const DETECTION_MODEL_URL: &str = "https://huggingface.co/ykk648/face_lib/resolve/main/face_detect/scrfd_onnx/scrfd_500m_bnkps.onnx";
const DETECTION_MODEL_URL_FALLBACK: &str = "https://github.com/deepinsight/insightface/releases/download/v0.7/scrfd_500m_bnkps.onnx";
const RECOGNITION_MODEL_URL: &str = "https://huggingface.co/maze/faceX/resolve/e010b5098c3685fd00b22dd2aec6f37320e3d850/w600k_r50.onnx";

struct Detection {
    bbox: FaceBbox,
    kps: Vec<[f32; 2]>,
    score: f32,
}

/// SCRFD detection + ArcFace embedding sessions. Sessions are loaded once
/// and reused across requests; inference runs on blocking threads with the
/// session locked.
pub struct FaceRecognizer {
    models_dir: PathBuf,
    detection_session: Mutex<Option<Session>>,
    recognition_session: Mutex<Option<Session>>,
}

impl FaceRecognizer {
    pub fn new(models_dir: PathBuf) -> Self {
        Self {
            models_dir,
            detection_session: Mutex::new(None),
            recognition_session: Mutex::new(None),
        }
    }

    pub fn loaded(&self) -> bool {
        self.detection_session.lock().is_some() && self.recognition_session.lock().is_some()
    }

    pub async fn initialize(&self, auto_download: bool) -> Result<()> {
        tokio::fs::create_dir_all(&self.models_dir).await?;
        if auto_download {
            self.download_models().await?;
        }
        let detection_path = self.models_dir.join(DETECTION_MODEL);
        let recognition_path = self.models_dir.join(RECOGNITION_MODEL);
        if !detection_path.exists() {
            return Err(Error::RecognitionModelNotFound(DETECTION_MODEL.to_string()));
        }
        if !recognition_path.exists() {
            return Err(Error::RecognitionModelNotFound(RECOGNITION_MODEL.to_string()));
        }

        *self.detection_session.lock() = Some(preload_model(&detection_path)?);
        *self.recognition_session.lock() = Some(preload_model(&recognition_path)?);
        log_info(LogServiceType::Recognition, format!("Face models loaded from {:?}", self.models_dir));
        Ok(())
    }

    async fn download_models(&self) -> Result<()> {
        let detection_path = self.models_dir.join(DETECTION_MODEL);
        if !detection_path.exists() {
            if let Err(error) = download_file(DETECTION_MODEL_URL, &detection_path).await {
                log_info(LogServiceType::Recognition, format!("Primary detection model source failed ({}), trying fallback", error));
                download_file(DETECTION_MODEL_URL_FALLBACK, &detection_path).await?;
            }
        }
        let recognition_path = self.models_dir.join(RECOGNITION_MODEL);
        if !recognition_path.exists() {
            download_file(RECOGNITION_MODEL_URL, &recognition_path).await?;
        }
        Ok(())
    }

    /// Decode an image and return every detected face with its embedding.
    pub fn extract_faces(&self, buffer_image: &[u8]) -> Result<Vec<DetectedFace>> {
        let img = image::load_from_memory(buffer_image)?;
        let detections = self.detect(&img)?;
        let mut faces = Vec::with_capacity(detections.len());
        for detection in detections {
            let crop = crop_face(&img, &detection.bbox);
            let embedding = self.embed(&crop)?;
            faces.push(DetectedFace {
                bbox: detection.bbox,
                kps: detection.kps,
                det_score: detection.score,
                embedding,
            });
        }
        Ok(faces)
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let guard = self.detection_session.lock();
        let session = guard.as_ref().ok_or(crate::model::error::Error::RecognitionModelsNotLoaded)?;

        let (tensor, scale) = preprocess_detection(image)?;
        let input_name = session.inputs.first().ok_or(Error::Error { message: "Detection model has no inputs".into() })?.name.clone();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.len() < DETECTION_STRIDES.len() * 3 {
            return Err(Error::Error { message: format!("Unexpected detection model outputs: {:?}", output_names) });
        }
        let outputs: SessionOutputs = session.run(inputs![input_name => tensor.view()]?)?;

        let (width, height) = image.dimensions();
        let mut raw = Vec::new();
        // SCRFD emits scores, boxes and keypoints per stride, in that output
        // order: score_8..32, bbox_8..32, kps_8..32.
        for (position, stride) in DETECTION_STRIDES.iter().enumerate() {
            let scores: Vec<f32> = outputs[output_names[position].as_str()].try_extract_tensor::<f32>()?.iter().copied().collect();
            let boxes: Vec<f32> = outputs[output_names[position + 3].as_str()].try_extract_tensor::<f32>()?.iter().copied().collect();
            let keypoints: Vec<f32> = outputs[output_names[position + 6].as_str()].try_extract_tensor::<f32>()?.iter().copied().collect();
            decode_stride(*stride, &scores, &boxes, &keypoints, scale, width as f32, height as f32, &mut raw);
        }

        let keep = nms(&raw, NMS_IOU_THRESHOLD);
        let mut kept = vec![false; raw.len()];
        for index in keep {
            kept[index] = true;
        }
        let detections = raw.into_iter().enumerate().filter(|(index, _)| kept[*index]).map(|(_, detection)| detection).collect();
        Ok(detections)
    }

    fn embed(&self, face_crop: &DynamicImage) -> Result<Vec<f32>> {
        let guard = self.recognition_session.lock();
        let session = guard.as_ref().ok_or(crate::model::error::Error::RecognitionModelsNotLoaded)?;

        let tensor = preprocess_recognition(face_crop)?;
        let input_name = session.inputs.first().ok_or(Error::Error { message: "Recognition model has no inputs".into() })?.name.clone();
        let output_name = session.outputs.first().ok_or(Error::Error { message: "Recognition model has no outputs".into() })?.name.clone();
        let outputs: SessionOutputs = session.run(inputs![input_name => tensor.view()]?)?;

        let binding = outputs[output_name.as_str()].try_extract_tensor::<f32>()?;
        let mut embedding: Vec<f32> = binding.iter().copied().collect();
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }
        Ok(embedding)
    }
}

fn preload_model(path: &Path) -> Result<Session> {
    Ok(Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)?)
}

async fn download_file(url: &str, path: &Path) -> Result<()> {
    log_info(LogServiceType::Recognition, format!("Downloading model {} to {:?}", url, path));
    let response = reqwest::get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    // A truncated download would otherwise surface later as an opaque
    // session creation failure.
    if bytes.len() < 1024 {
        return Err(Error::Error { message: format!("Model download from {} is suspiciously small ({} bytes)", url, bytes.len()) });
    }
    tokio::fs::write(path, &bytes).await?;
    Ok(())
}

/// Letterbox to 640x640 NCHW BGR, normalized to [-1, 1]. Returns the scale
/// needed to map detections back into original coordinates.
fn preprocess_detection(image: &DynamicImage) -> Result<(Array4<f32>, f32)> {
    let (width, height) = image.dimensions();
    let scale = DETECTION_SIZE as f32 / width.max(height) as f32;
    let resized_w = ((width as f32 * scale) as u32).max(1);
    let resized_h = ((height as f32 * scale) as u32).max(1);
    let resized = image.resize_exact(resized_w, resized_h, FilterType::Triangle);
    let mut padded = DynamicImage::new_rgb8(DETECTION_SIZE, DETECTION_SIZE);
    image::imageops::overlay(&mut padded, &resized, 0, 0);
    let rgb = padded.to_rgb8();

    let size = DETECTION_SIZE as usize;
    let mut data = Vec::with_capacity(3 * size * size);
    // Channel order is BGR, as for every insightface export.
    for channel in [2usize, 1, 0] {
        for pixel in rgb.pixels() {
            data.push((pixel[channel] as f32 - 127.5) / 128.0);
        }
    }
    let tensor = Array4::from_shape_vec((1, 3, size, size), data)?;
    Ok((tensor, scale))
}

fn preprocess_recognition(face_crop: &DynamicImage) -> Result<Array4<f32>> {
    let resized = face_crop.resize_exact(RECOGNITION_SIZE, RECOGNITION_SIZE, FilterType::Triangle);
    let rgb = resized.to_rgb8();
    let size = RECOGNITION_SIZE as usize;
    let mut data = Vec::with_capacity(3 * size * size);
    for channel in [0usize, 1, 2] {
        for pixel in rgb.pixels() {
            data.push((pixel[channel] as f32 - 127.5) / 128.0);
        }
    }
    Ok(Array4::from_shape_vec((1, 3, size, size), data)?)
}

fn crop_face(image: &DynamicImage, bbox: &FaceBbox) -> DynamicImage {
    let x1 = bbox.x1.max(0.0) as u32;
    let y1 = bbox.y1.max(0.0) as u32;
    let x2 = (bbox.x2.min(image.width() as f32) as u32).max(x1 + 1);
    let y2 = (bbox.y2.min(image.height() as f32) as u32).max(y1 + 1);
    image.crop_imm(x1, y1, x2 - x1, y2 - y1)
}

/// Distance-decode one SCRFD stride: grid cell centers plus per-anchor
/// left/top/right/bottom offsets, everything expressed in stride units.
#[allow(clippy::too_many_arguments)]
fn decode_stride(stride: usize, scores: &[f32], boxes: &[f32], keypoints: &[f32], scale: f32, width: f32, height: f32, out: &mut Vec<Detection>) {
    let columns = DETECTION_SIZE as usize / stride;
    let grid = columns * columns;
    let count = (grid * ANCHORS_PER_POINT).min(scores.len());
    for index in 0..count {
        let score = scores[index];
        if score < DETECTION_THRESHOLD {
            continue;
        }
        if boxes.len() < (index + 1) * 4 || keypoints.len() < (index + 1) * KEYPOINT_COUNT * 2 {
            continue;
        }
        let point = index / ANCHORS_PER_POINT;
        let cx = ((point % columns) * stride) as f32;
        let cy = ((point / columns) * stride) as f32;

        let left = boxes[index * 4] * stride as f32;
        let top = boxes[index * 4 + 1] * stride as f32;
        let right = boxes[index * 4 + 2] * stride as f32;
        let bottom = boxes[index * 4 + 3] * stride as f32;

        let x1 = ((cx - left) / scale).clamp(0.0, width);
        let y1 = ((cy - top) / scale).clamp(0.0, height);
        let x2 = ((cx + right) / scale).clamp(0.0, width);
        let y2 = ((cy + bottom) / scale).clamp(0.0, height);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let mut kps = Vec::with_capacity(KEYPOINT_COUNT);
        for k in 0..KEYPOINT_COUNT {
            let kx = (cx + keypoints[(index * KEYPOINT_COUNT + k) * 2] * stride as f32) / scale;
            let ky = (cy + keypoints[(index * KEYPOINT_COUNT + k) * 2 + 1] * stride as f32) / scale;
            kps.push([kx.clamp(0.0, width), ky.clamp(0.0, height)]);
        }

        out.push(Detection {
            bbox: FaceBbox { x1, y1, x2, y2 },
            kps,
            score,
        });
    }
}

fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..detections.len()).collect();
    indices.sort_by(|a, b| detections[*b].score.partial_cmp(&detections[*a].score).unwrap_or(std::cmp::Ordering::Equal));
    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::new();
    for (rank, &index) in indices.iter().enumerate() {
        if suppressed[index] {
            continue;
        }
        keep.push(index);
        for &other in indices.iter().skip(rank + 1) {
            if !suppressed[other] && iou(&detections[index].bbox, &detections[other].bbox) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }
    keep
}

fn iou(a: &FaceBbox, b: &FaceBbox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);
    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }
    let intersection = (x2 - x1) * (y2 - y1);
    let union = a.width() * a.height() + b.width() * b.height() - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
