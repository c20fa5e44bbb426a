//! Image matching: confidence-ranked template matching and template assets

pub mod matcher;
pub mod template;
pub mod types;


pub use matcher::ImageMatcher;
pub use template::TemplateStore;
pub use types::{MatchResult, MatchResultList, Rect};
