pub mod chat;
pub mod document_qa;
pub mod documents;
pub mod fallback;
pub mod status;
