pub mod ai;
pub mod collision;
pub mod detection;
pub mod movement;
pub mod navigation;
pub mod physics;
