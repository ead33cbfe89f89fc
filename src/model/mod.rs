//! Structured cube definitions and the model registry.
//!
//! Definitions arrive already parsed (an external loader owns any textual
//! authoring format) and are validated on registration. After
//! [`ModelRegistry`] is built the model is immutable.

pub mod cube;
pub mod dimension;
pub mod join;
pub mod measure;
pub mod registry;
pub mod segment;

pub use cube::Cube;
pub use dimension::{Dimension, DimensionType, Granularity};
pub use join::{Join, JoinKey, Relationship};
pub use measure::{Aggregation, FormatHint, Measure};
pub use registry::{JoinEdge, ModelRegistry, ModelRegistryBuilder, TraversedEdge};
pub use segment::Segment;
