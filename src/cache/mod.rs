pub mod cache;

pub use self::cache::{CachedImage, ImageCache};
