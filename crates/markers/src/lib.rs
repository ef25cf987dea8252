//! Directional photo markers: FOV geometry, gesture handling, and the
//! per-owner marker layer.

pub mod controller;
pub mod fov;
pub mod gesture;
pub mod host;
pub mod input;
pub mod layer;

pub use controller::*;
pub use fov::*;
pub use gesture::*;
pub use host::*;
pub use input::*;
pub use layer::*;
