//! Qdrant-backed hybrid lexical/vector index

mod client;
mod search;

pub(crate) use client::QdrantVectorIndex;
