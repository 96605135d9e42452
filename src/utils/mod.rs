pub mod format;
pub mod media;
pub mod staging;
