pub mod checker;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod replacer;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_utils;
