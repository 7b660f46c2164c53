use serde::{Deserialize, Serialize};

use super::face::FaceBbox;

/// One detected face embedded in an image record. `vector_id` points at the
/// matching row of the embedding store.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FaceEntry {
    pub vector_id: String,
    pub person_ref: String,
    pub bbox: FaceBbox,
    #[serde(default)]
    pub kps: Vec<[f32; 2]>,
    pub det_score: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub file_key: String,
    pub user_ref: Option<String>,
    pub album_ref: Option<String>,
    pub faces: Vec<FaceEntry>,
    pub added: Option<i64>,
    pub modified: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageForAdd {
    pub file_key: String,
    pub user_ref: Option<String>,
    pub album_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageForInsert {
    pub id: String,
    pub file_key: String,
    pub user_ref: Option<String>,
    pub album_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageForUpdate {
    pub file_key: Option<String>,
    pub user_ref: Option<String>,
    pub album_ref: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ImagesQuery {
    pub album: Option<String>,
    pub user: Option<String>,
    pub after: Option<i64>,
}

/// Merge a face entry into an image record's face list, keyed by vector id:
/// the first entry with the same vector id is replaced, otherwise the entry
/// is appended. No dedup by spatial overlap.
pub fn merge_face_entry(faces: &mut Vec<FaceEntry>, entry: FaceEntry) {
    if let Some(existing) = faces.iter_mut().find(|f| f.vector_id == entry.vector_id) {
        *existing = entry;
    } else {
        faces.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vector_id: &str, person_ref: &str) -> FaceEntry {
        FaceEntry {
            vector_id: vector_id.to_string(),
            person_ref: person_ref.to_string(),
            bbox: FaceBbox { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 },
            kps: vec![],
            det_score: 0.9,
        }
    }

    #[test]
    fn merge_appends_unknown_vector_id() {
        let mut faces = vec![entry("a", "p1")];
        merge_face_entry(&mut faces, entry("b", "p2"));
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].vector_id, "b");
    }

    #[test]
    fn merge_replaces_same_vector_id() {
        let mut faces = vec![entry("a", "p1"), entry("b", "p2")];
        merge_face_entry(&mut faces, entry("a", "p3"));
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].person_ref, "p3");
        assert_eq!(faces[1].person_ref, "p2");
    }

    #[test]
    fn merge_twice_with_same_vector_id_does_not_duplicate() {
        let mut faces = vec![];
        merge_face_entry(&mut faces, entry("a", "p1"));
        merge_face_entry(&mut faces, entry("a", "p1"));
        assert_eq!(faces.len(), 1);
    }
}
