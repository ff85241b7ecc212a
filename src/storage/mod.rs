pub mod memory;
pub mod provider;
