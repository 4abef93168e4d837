pub mod source_scanner;

pub use source_scanner::{enumerate_sources, Source, SourceScanner};
