//! Tasks: the type catalog, the run contract and the bundled task bodies.

pub mod bodies;
pub mod context;
pub mod error;
pub mod kind;
pub mod navigation;
pub mod registry;
pub mod scheduled;
pub mod stamina;

pub use context::TaskContext;
pub use error::{FailureCategory, TaskError};
pub use kind::TaskType;
pub use navigation::ScreenLocation;
pub use registry::{KeySource, TaskFactory, TaskRegistry};
pub use scheduled::{Schedule, ScheduledTask, TaskBody};
pub use stamina::StaminaCache;
