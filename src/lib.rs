pub mod adb;
pub mod config;
pub mod geometry;
pub mod queue;
pub mod slots;
pub mod status;
pub mod task;
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;
