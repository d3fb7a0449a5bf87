//! An in-process, thread-safe memory of time-stamped rigid transformations
//! between named coordinate frames.
//!
//! Writers record transformations on links between frames as they arrive,
//! each at its own rate; readers ask for the transformation between any two
//! connected frames at an arbitrary time and get an answer interpolated
//! from the recorded samples and composed along the shortest chain of
//! links.

pub mod dump;
pub mod error;
pub mod graph;
pub mod interpolation;
pub mod link;
pub mod memory;
pub mod path;
pub mod transform;

use arrayvec::ArrayString;

/// Frame identifier strings
pub type FrameIdString = ArrayString<64>;

pub use dump::MemoryDump;
pub use error::{LinkFailure, TransformError, TransformResult};
pub use graph::FrameGraph;
pub use interpolation::{interpolate, slerp};
pub use link::Link;
pub use memory::{DiagnosticsSink, LogDiagnostics, TransMem, TransformWarning};
pub use path::BEST_TIME_STEP;
pub use transform::{RigidTransform, StampedTransform};

pub use cu29::clock::{CuDuration, CuTime, CuTimeRange};
pub use glam::{DMat4, DQuat, DVec3};
