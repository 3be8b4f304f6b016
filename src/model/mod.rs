pub mod mapping_store;
pub mod materializer;
pub mod session;
pub mod tree_builder;
