pub mod manager;
pub mod reader;
pub(crate) mod shared;
