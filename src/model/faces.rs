use nanoid::nanoid;
use tokio::io::AsyncReadExt;

use crate::domain::face::{DetectedFace, ReconciledFace};
use crate::domain::image::FaceEntry;
use crate::domain::people::{PersonForInsert, PersonKind};
use crate::error::Result as RsResult;
use crate::sources::Source;
use crate::tools::log::{log_info, LogServiceType};

use super::error::Error;
use super::ModelController;

/// How many index hits are considered when deciding an identity. Only the
/// best one is used; the margin is for future disambiguation.
const MATCH_CANDIDATES: usize = 5;

/// Everything one detected face writes in a single transaction: the
/// embedding row, the merged face entry, and the person registration when
/// no known identity matched.
#[derive(Debug, Clone)]
pub struct FaceCommit {
    pub image_ref: String,
    pub embedding: Vec<f32>,
    pub face: FaceEntry,
    pub new_person: Option<PersonForInsert>,
}

impl ModelController {

	/// The detection pipeline: load the image record, fetch its file from
	/// the bucket, run detection + embedding extraction, and reconcile each
	/// face against the embedding index.
	pub async fn process_image_faces(&self, image_id: &str) -> RsResult<Vec<ReconciledFace>> {
		let image = self.get_image(image_id).await?;
		let reader = self.bucket.get_file(&image.file_key).await?;
		let mut bytes = Vec::with_capacity(reader.size.unwrap_or(0) as usize);
		let mut stream = reader.stream;
		stream.read_to_end(&mut bytes).await?;

		let recognizer = self.recognizer.clone();
		let detected = tokio::task::spawn_blocking(move || recognizer.extract_faces(&bytes)).await
			.map_err(|_| crate::Error::Error { message: "Face extraction task aborted".to_string() })??;
		if detected.is_empty() {
			return Err(Error::NoFacesDetected(image_id.to_string()).into());
		}

		let mut reconciled = Vec::with_capacity(detected.len());
		for face in detected {
			let outcome = self.reconcile_face(&image.id, face).await?;
			reconciled.push(outcome);
		}
		let recognized = reconciled.iter().filter(|f| f.recognized).count();
		log_info(LogServiceType::Recognition, format!("Image {}: {} faces, {} recognized, {} new", image.id, reconciled.len(), recognized, reconciled.len() - recognized));
		Ok(reconciled)
	}

	/// Decide the identity of one embedding: best index hit at or above the
	/// match threshold wins, otherwise a fresh person is registered. The
	/// embedding, the face entry and any new person commit atomically; the
	/// in-memory index is only updated after the commit succeeds.
	pub async fn reconcile_face(&self, image_ref: &str, face: DetectedFace) -> RsResult<ReconciledFace> {
		let matches = self.search_similar_faces(&face.embedding, MATCH_CANDIDATES).await?;
		let best = matches.into_iter().next();

		let (person_ref, recognized, similarity, new_person) = match best {
			Some(hit) => (hit.person_ref, true, Some(hit.similarity), None),
			None => {
				let person = PersonForInsert {
					id: nanoid!(),
					name: None,
					kind: PersonKind::Auto,
					portrait: None,
				};
				(person.id.clone(), false, None, Some(person))
			}
		};

		let entry = FaceEntry {
			vector_id: nanoid!(),
			person_ref: person_ref.clone(),
			bbox: face.bbox.clone(),
			kps: face.kps.clone(),
			det_score: face.det_score,
		};
		self.store.commit_face(FaceCommit {
			image_ref: image_ref.to_string(),
			embedding: face.embedding.clone(),
			face: entry.clone(),
			new_person,
		}).await?;
		self.index.write().await.add(entry.vector_id.clone(), Some(person_ref.clone()), face.embedding);

		Ok(ReconciledFace {
			vector_id: entry.vector_id,
			person_ref,
			bbox: face.bbox,
			kps: face.kps,
			det_score: face.det_score,
			recognized,
			similarity,
		})
	}
}

#[cfg(test)]
mod tests {
	use crate::domain::face::FaceBbox;
	use crate::domain::image::ImageForAdd;
	use crate::domain::people::PersonKind;
	use crate::model::store::SqliteStore;
	use crate::sources::path_provider::PathProvider;
	use crate::tools::recognition::{FaceRecognizer, EMBEDDING_DIM};

	use super::*;

	async fn test_controller() -> (tempfile::TempDir, ModelController) {
		let dir = tempfile::tempdir().unwrap();
		let store = SqliteStore::open(dir.path().join("test.db")).await.unwrap();
		let bucket = PathProvider::new_for_local(dir.path().join("bucket"));
		let recognizer = FaceRecognizer::new(dir.path().join("models"));
		let settings = crate::model::ServerSettings { bucket: "media".to_string(), token: "FORTESTONLY".to_string(), match_threshold: 0.5 };
		let mc = ModelController::new(store, bucket, recognizer, settings).await.unwrap();
		(dir, mc)
	}

	fn axis_embedding(axis: usize) -> Vec<f32> {
		let mut embedding = vec![0.0f32; EMBEDDING_DIM];
		embedding[axis] = 1.0;
		embedding
	}

	fn detected(embedding: Vec<f32>) -> DetectedFace {
		DetectedFace {
			bbox: FaceBbox { x1: 10.0, y1: 10.0, x2: 60.0, y2: 70.0 },
			kps: vec![[20.0, 25.0], [40.0, 25.0], [30.0, 40.0], [22.0, 55.0], [38.0, 55.0]],
			det_score: 0.92,
			embedding,
		}
	}

	#[tokio::test]
	async fn first_face_registers_a_new_person() {
		let (_dir, mc) = test_controller().await;
		let image = mc.add_image(ImageForAdd { file_key: "k1".to_string(), user_ref: None, album_ref: None }).await.unwrap();

		let face = mc.reconcile_face(&image.id, detected(axis_embedding(0))).await.unwrap();
		assert!(!face.recognized);
		assert!(face.similarity.is_none());

		let person = mc.get_person(&face.person_ref).await.unwrap();
		assert_eq!(person.kind, PersonKind::Auto);
		let faces = mc.get_image_faces(&image.id).await.unwrap();
		assert_eq!(faces.len(), 1);
		assert_eq!(faces[0].vector_id, face.vector_id);
		assert_eq!(mc.get_person_faces(&person.id).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn matching_embedding_reuses_the_person() {
		let (_dir, mc) = test_controller().await;
		let image = mc.add_image(ImageForAdd { file_key: "k1".to_string(), user_ref: None, album_ref: None }).await.unwrap();
		let other = mc.add_image(ImageForAdd { file_key: "k2".to_string(), user_ref: None, album_ref: None }).await.unwrap();

		let first = mc.reconcile_face(&image.id, detected(axis_embedding(0))).await.unwrap();
		let second = mc.reconcile_face(&other.id, detected(axis_embedding(0))).await.unwrap();

		assert!(second.recognized);
		assert_eq!(second.person_ref, first.person_ref);
		assert!(second.similarity.unwrap() > 0.99);
		assert_eq!(mc.get_person_faces(&first.person_ref).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn distant_embedding_registers_a_second_person() {
		let (_dir, mc) = test_controller().await;
		let image = mc.add_image(ImageForAdd { file_key: "k1".to_string(), user_ref: None, album_ref: None }).await.unwrap();

		let first = mc.reconcile_face(&image.id, detected(axis_embedding(0))).await.unwrap();
		let second = mc.reconcile_face(&image.id, detected(axis_embedding(1))).await.unwrap();

		assert!(!second.recognized);
		assert_ne!(second.person_ref, first.person_ref);
		let faces = mc.get_image_faces(&image.id).await.unwrap();
		assert_eq!(faces.len(), 2);
	}

	#[tokio::test]
	async fn dim_mismatch_leaves_no_partial_write() {
		let (_dir, mc) = test_controller().await;
		let image = mc.add_image(ImageForAdd { file_key: "k1".to_string(), user_ref: None, album_ref: None }).await.unwrap();

		let error = mc.reconcile_face(&image.id, detected(vec![1.0, 0.0])).await.unwrap_err();
		assert!(matches!(error, crate::Error::Model(Error::EmbeddingDimMismatch { .. })));

		assert!(mc.get_image_faces(&image.id).await.unwrap().is_empty());
		assert!(mc.get_people(Default::default()).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn merge_people_moves_faces_and_embeddings() {
		let (_dir, mc) = test_controller().await;
		let image = mc.add_image(ImageForAdd { file_key: "k1".to_string(), user_ref: None, album_ref: None }).await.unwrap();

		let first = mc.reconcile_face(&image.id, detected(axis_embedding(0))).await.unwrap();
		let second = mc.reconcile_face(&image.id, detected(axis_embedding(1))).await.unwrap();

		mc.merge_people(&second.person_ref, &first.person_ref).await.unwrap();

		assert!(mc.get_person(&second.person_ref).await.is_err());
		assert_eq!(mc.get_person_faces(&first.person_ref).await.unwrap().len(), 2);
		let faces = mc.get_image_faces(&image.id).await.unwrap();
		assert!(faces.iter().all(|f| f.person_ref == first.person_ref));

		// the index follows: a third face near the merged-away embedding
		// resolves to the surviving person
		let third = mc.reconcile_face(&image.id, detected(axis_embedding(1))).await.unwrap();
		assert!(third.recognized);
		assert_eq!(third.person_ref, first.person_ref);
	}

	#[tokio::test]
	async fn removed_person_leaves_unknown_faces() {
		let (_dir, mc) = test_controller().await;
		let image = mc.add_image(ImageForAdd { file_key: "k1".to_string(), user_ref: None, album_ref: None }).await.unwrap();

		let face = mc.reconcile_face(&image.id, detected(axis_embedding(0))).await.unwrap();
		mc.remove_person(&face.person_ref).await.unwrap();

		let faces = mc.get_image_faces(&image.id).await.unwrap();
		assert_eq!(faces[0].person_ref, crate::domain::people::UNKNOWN_PERSON);

		// unassigned embeddings no longer vote on identities
		let again = mc.reconcile_face(&image.id, detected(axis_embedding(0))).await.unwrap();
		assert!(!again.recognized);
	}
}
