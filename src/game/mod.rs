pub mod constants;
pub mod entity;
pub mod performance;
pub mod progression;
pub mod spatial;
pub mod stats;
pub mod systems;
pub mod world;
