pub mod extraction;
pub mod import;
pub mod normalize;
pub mod processor;
pub mod text_records;
