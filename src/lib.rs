pub mod cli;
pub mod driver;
pub mod exit;
pub mod ids;
pub mod lang;
pub mod manifest;
pub mod mutation;
pub mod rewrite;
pub mod source_range;
pub mod tree;
pub mod typing;
pub mod visitor;
