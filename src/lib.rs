pub mod controller;
pub mod error;
pub mod map_cal;
pub mod match_image;
pub mod operation;
pub mod world;

pub use controller::Controller;
pub use error::{NavError, NavResult};
