pub mod retrieval_qa;

pub use retrieval_qa::{QaResponse, RetrievalQa};
