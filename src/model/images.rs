use nanoid::nanoid;

use crate::domain::image::{FaceEntry, ImageForAdd, ImageForInsert, ImageForUpdate, ImageRecord, ImagesQuery};

use super::{check_id, error::{Error, Result}, ModelController};


impl ModelController {

	pub async fn get_images(&self, query: ImagesQuery) -> Result<Vec<ImageRecord>> {
		let images = self.store.get_images(query).await?;
		Ok(images)
	}

	pub async fn get_image(&self, image_id: &str) -> Result<ImageRecord> {
		check_id("image", image_id)?;
		let image = self.store.get_image(image_id).await?.ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;
		Ok(image)
	}

	pub async fn add_image(&self, new_image: ImageForAdd) -> Result<ImageRecord> {
		let image = ImageForInsert {
			id: nanoid!(),
			file_key: new_image.file_key,
			user_ref: new_image.user_ref,
			album_ref: new_image.album_ref,
		};
		self.store.add_image(image.clone()).await?;
		let image = self.get_image(&image.id).await?;
		Ok(image)
	}

	pub async fn update_image(&self, image_id: &str, update: ImageForUpdate) -> Result<ImageRecord> {
		check_id("image", image_id)?;
		self.store.get_image(image_id).await?.ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;
		self.store.update_image(image_id, update).await?;
		let image = self.get_image(image_id).await?;
		Ok(image)
	}

	pub async fn remove_image(&self, image_id: &str) -> Result<ImageRecord> {
		check_id("image", image_id)?;
		let existing = self.store.get_image(image_id).await?;
		if let Some(existing) = existing {
			self.store.remove_image(image_id.to_string()).await?;
			Ok(existing)
		} else {
			Err(Error::ImageNotFound(image_id.to_string()))
		}
	}

	pub async fn get_image_faces(&self, image_id: &str) -> Result<Vec<FaceEntry>> {
		let image = self.get_image(image_id).await?;
		Ok(image.faces)
	}
}
