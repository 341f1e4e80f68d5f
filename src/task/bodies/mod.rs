// Task bodies bundled with the scheduler
pub mod daily_missions;
pub mod gather;
pub mod initialize;
pub mod routine;

pub use daily_missions::DailyMissions;
pub use gather::Gather;
pub use initialize::Initialize;
pub use routine::{Routine, RoutineSpec};
