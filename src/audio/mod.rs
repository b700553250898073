pub mod decode;
pub mod envelope;
pub mod preprocess;
pub mod probe;
