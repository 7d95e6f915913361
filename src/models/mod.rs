pub mod cleanup;
pub mod environment;
pub mod graph;
pub mod inventory;
pub mod provider;
pub mod record;
