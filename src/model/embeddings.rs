use std::collections::HashMap;

use crate::domain::face::FaceMatch;
use crate::tools::log::{log_info, LogServiceType};
use crate::tools::recognition::cosine_similarity;

use super::{error::{Error, Result}, ModelController};

/// Brute-force cosine index over every stored embedding.
///
/// The public surface is kept small (add + k-NN search + identity
/// reassignment) so the implementation can later delegate to a dedicated
/// vector engine without touching callers. At the scale of one backend
/// process a linear scan over a few thousand 512-d vectors is not the
/// bottleneck; the ONNX sessions are.
pub struct EmbeddingIndex {
    dim: usize,
    vector_ids: Vec<String>,
    person_refs: Vec<Option<String>>,
    embeddings: Vec<Vec<f32>>,
    positions: HashMap<String, usize>,
}

impl EmbeddingIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vector_ids: Vec::new(),
            person_refs: Vec::new(),
            embeddings: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vector_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vector_ids.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn add(&mut self, vector_id: String, person_ref: Option<String>, embedding: Vec<f32>) {
        if let Some(position) = self.positions.get(&vector_id) {
            self.person_refs[*position] = person_ref;
            self.embeddings[*position] = embedding;
        } else {
            self.positions.insert(vector_id.clone(), self.vector_ids.len());
            self.vector_ids.push(vector_id);
            self.person_refs.push(person_ref);
            self.embeddings.push(embedding);
        }
    }

    /// k-NN by cosine similarity over entries that carry an identity.
    /// Results at or above `threshold`, best first.
    pub fn find_similar(&self, embedding: &[f32], k: usize, threshold: f32) -> Vec<FaceMatch> {
        let mut results: Vec<FaceMatch> = self
            .embeddings
            .iter()
            .enumerate()
            .filter_map(|(position, candidate)| {
                let person_ref = self.person_refs[position].clone()?;
                let similarity = cosine_similarity(embedding, candidate);
                if similarity >= threshold {
                    Some(FaceMatch {
                        vector_id: self.vector_ids[position].clone(),
                        person_ref,
                        similarity,
                    })
                } else {
                    None
                }
            })
            .collect();

        results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    pub fn reassign_person(&mut self, from: &str, to: Option<&str>) {
        for person_ref in self.person_refs.iter_mut() {
            if person_ref.as_deref() == Some(from) {
                *person_ref = to.map(|t| t.to_string());
            }
        }
    }

    pub fn clear(&mut self) {
        self.vector_ids.clear();
        self.person_refs.clear();
        self.embeddings.clear();
        self.positions.clear();
    }
}


impl ModelController {

	/// Reload the in-memory index from the embedding table. Called once at
	/// startup; afterwards commits keep the index in step.
	pub async fn rebuild_embedding_index(&self) -> Result<usize> {
		let embeddings = self.store.get_embeddings().await?;
		let mut index = self.index.write().await;
		index.clear();
		for record in embeddings {
			index.add(record.id, record.person_ref, record.embedding);
		}
		let count = index.len();
		log_info(LogServiceType::Database, format!("Embedding index loaded with {} vectors", count));
		Ok(count)
	}

	pub async fn search_similar_faces(&self, embedding: &[f32], limit: usize) -> Result<Vec<FaceMatch>> {
		let index = self.index.read().await;
		if embedding.len() != index.dim() {
			return Err(Error::EmbeddingDimMismatch { expected: index.dim(), got: embedding.len() });
		}
		Ok(index.find_similar(embedding, limit, self.settings.match_threshold))
	}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(direction: (f32, f32)) -> Vec<f32> {
        let norm = (direction.0 * direction.0 + direction.1 * direction.1).sqrt();
        vec![direction.0 / norm, direction.1 / norm]
    }

    #[test]
    fn find_similar_orders_by_similarity() {
        let mut index = EmbeddingIndex::new(2);
        index.add("a".to_string(), Some("p1".to_string()), unit((1.0, 0.0)));
        index.add("b".to_string(), Some("p2".to_string()), unit((1.0, 0.2)));
        index.add("c".to_string(), Some("p3".to_string()), unit((0.0, 1.0)));

        let matches = index.find_similar(&unit((1.0, 0.1)), 5, 0.5);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].person_ref, "p2");
        assert_eq!(matches[1].person_ref, "p1");
        assert!(matches[0].similarity >= matches[1].similarity);
    }

    #[test]
    fn find_similar_skips_unassigned_entries() {
        let mut index = EmbeddingIndex::new(2);
        index.add("a".to_string(), None, unit((1.0, 0.0)));
        let matches = index.find_similar(&unit((1.0, 0.0)), 5, 0.5);
        assert!(matches.is_empty());
    }

    #[test]
    fn reassign_person_rewrites_identity() {
        let mut index = EmbeddingIndex::new(2);
        index.add("a".to_string(), Some("p1".to_string()), unit((1.0, 0.0)));
        index.reassign_person("p1", Some("p2"));
        let matches = index.find_similar(&unit((1.0, 0.0)), 1, 0.9);
        assert_eq!(matches[0].person_ref, "p2");

        index.reassign_person("p2", None);
        assert!(index.find_similar(&unit((1.0, 0.0)), 1, 0.9).is_empty());
    }

    #[test]
    fn add_with_same_vector_id_updates_in_place() {
        let mut index = EmbeddingIndex::new(2);
        index.add("a".to_string(), Some("p1".to_string()), unit((1.0, 0.0)));
        index.add("a".to_string(), Some("p2".to_string()), unit((1.0, 0.0)));
        assert_eq!(index.len(), 1);
        let matches = index.find_similar(&unit((1.0, 0.0)), 1, 0.9);
        assert_eq!(matches[0].person_ref, "p2");
    }
}
