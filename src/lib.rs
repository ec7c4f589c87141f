pub mod handle;
pub mod vm;
