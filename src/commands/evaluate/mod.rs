mod accumulator;
mod dedup;
mod query_builder;
mod questions;
mod run;
#[cfg(test)]
mod tests;

pub(crate) use query_builder::QueryOptions;
pub(crate) use run::search_question;
pub use run::run;
