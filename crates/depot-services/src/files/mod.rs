pub mod limit;
pub mod mime;
pub mod service;

pub use service::{FileService, UploadRequest};
