pub mod circuit;
pub mod graph;
pub mod indices;
pub mod parser;
