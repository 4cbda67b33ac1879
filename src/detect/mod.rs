mod backend;
mod backends;
mod port;
mod registry;
mod result;

pub use backend::{DetectionInput, DetectorBackend, DetectorOptions, PerformanceMode};
pub use backends::{BlobBackend, StubBackend, StubGate, StubHandle, StubStep};
pub use port::{Completion, DetectionPort, Rejected};
pub use registry::BackendRegistry;
pub use result::{Classification, Detection, Landmark, LandmarkKind, Point, Rect};
