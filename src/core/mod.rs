pub mod config;
pub mod distribution;
pub mod enumerate;
pub mod operator;
pub mod parser;
pub mod summary;
