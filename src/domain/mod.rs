pub mod ids;
pub mod model;

pub use ids::{QueueId, SourceRef, TrackId};
pub use model::{PlayerState, Queue, RepeatMode, Track};
