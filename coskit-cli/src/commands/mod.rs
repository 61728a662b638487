pub mod blob;
pub mod consent;
pub mod serve;
