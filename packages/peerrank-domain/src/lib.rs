pub mod entity;
pub mod job;
pub mod ranking;
pub mod text;

pub use entity::EntityKind;
pub use job::{JobKind, JobOutcome, JobStatus, UnknownValue};
pub use ranking::{RankedEdge, ScoredCandidate};
