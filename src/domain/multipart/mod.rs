//! Multipart form-data encoding of buffered voice packets

mod boundary;
mod encoder;

pub use boundary::{Boundary, BOUNDARY_LEN};
pub use encoder::{encode, encoded_len, MultipartBody, MultipartSection, MultipartSelection};
