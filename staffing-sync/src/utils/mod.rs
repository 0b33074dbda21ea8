//! Utility modules

pub mod batch_writer;

pub use batch_writer::BatchWriter;
