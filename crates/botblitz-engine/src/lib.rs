pub mod cancel;
pub mod draft;
pub mod mode;
pub mod scoring;
pub mod season;
pub mod session;
pub mod weekly;

#[cfg(test)]
pub(crate) mod testing;
