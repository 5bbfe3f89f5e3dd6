// src/tree/mod.rs
pub mod builder;
pub mod cleaner;
pub mod patterns;

pub use builder::{build_tree, BuiltTree, FullText, TreeBuilder, XCounts};
pub use cleaner::{clean, CleanOptions};
