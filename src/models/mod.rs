//! Data models for docforge.
//!
//! Structured documentation records and the schema trait the pipeline is
//! generic over.

mod documentation;

pub use documentation::{
    Documentation, DocumentationSchema, Param, YamlDocumentation, YamlField,
};
