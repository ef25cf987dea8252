pub mod angle;
pub mod geodesy;
pub mod screen;

pub use angle::*;
pub use geodesy::*;
pub use screen::*;
