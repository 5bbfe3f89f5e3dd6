// src/lib.rs
//! Safety data sheet extraction: positioned lines are read from a PDF (or
//! OCR), grouped into the sixteen-section tree, cleaned, and handed to a set
//! of rules that each extract one field with its location on the page.
pub mod config;
pub mod extractors;
pub mod lines;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod tree;
pub mod utils;
