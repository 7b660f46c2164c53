pub mod image;
pub mod people;
pub mod face;
