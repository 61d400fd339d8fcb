pub mod architecture;
pub mod engine;
pub mod errors;
pub mod formatter;
pub mod labels;
pub mod models;
pub mod normalizer;
pub mod objectid;
pub mod ordering;
pub mod parser;
pub mod prompt_template;
pub mod session;
pub mod token_counter;
pub mod tool;
