// Collaborators around the comparison engine: corpus discovery, extraction, reporting.

pub mod corpus;
pub mod export;
pub mod extract;

pub use corpus::{Corpus, CorpusError, DocumentSet};
pub use export::{ExportError, ReportPaths, RunSummary};
pub use extract::{extract_entities, ExtractError, Extraction, Extractor, RasterExtractor};
