pub mod blob;
pub mod stub;

pub use blob::BlobBackend;
pub use stub::{StubBackend, StubGate, StubHandle, StubStep};
