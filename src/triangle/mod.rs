//! Loss triangle data structures and source loading

mod data;
pub mod loader;

pub use data::{Development, LinkRatio, Triangle, ValueType};
pub use loader::{
    get_column, load_source, load_source_from_reader, SourceRecord, TriangleAccessor,
    TriangleSource,
};
