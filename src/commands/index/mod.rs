mod parser;
mod run;

pub use parser::DocumentParser;
pub use run::run;
