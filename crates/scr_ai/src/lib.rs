pub mod cache;
pub mod chat;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod openai;
pub mod retrieve;
pub mod segment;
pub mod websearch;
