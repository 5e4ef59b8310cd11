//! veriface-imgproc — preprocessing for captured face and document
//! images, run before embedding extraction.

pub mod preprocess;

pub use preprocess::{
    clahe_normalize, preprocess_image, remove_glare, sharpen, PreprocessError,
};
