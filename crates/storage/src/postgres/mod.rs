//! Postgres relational catalog client

mod client;

pub(crate) use client::PostgresCatalogDb;
