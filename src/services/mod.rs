pub mod backend;
pub mod file_ops;
pub mod local;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;
