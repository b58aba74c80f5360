pub mod log_once;
pub mod vec2;
