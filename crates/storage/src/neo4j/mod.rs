//! Neo4j-backed graph of catalog object relationships

mod client;

pub(crate) use client::Neo4jGraphStore;
