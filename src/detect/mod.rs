mod backend;
mod backends;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{ScriptStep, ScriptedBackend, StubBackend};
pub use result::{BoundingBox, Detection, PersonFilter, DEFAULT_MIN_CONFIDENCE, PERSON_CLASS_ID};
