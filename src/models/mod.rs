pub mod exposure;
pub mod song;

pub use exposure::{ExposureRecord, ANONYMOUS_VIEWER};
pub use song::{Granularity, Line, Segment, SegmentKey, Song};
