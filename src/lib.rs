pub mod cache;
pub mod config;
pub mod decoder;
pub mod geometry;
pub mod page;
pub mod view;

pub use cache::ImageCache;
pub use config::ViewerConfig;
pub use decoder::{DecodeService, FileTileDecoder, TileDecoder, TileRequester};
pub use geometry::{GeometryProvider, LayoutConfig, StackedLayout, TileId, TileSource, ZoomLevel};
pub use page::{CompositeImage, TileLoadMap};
pub use view::{ImageSurface, RasterSurface, Renderer, ScrollDirection, ViewHooks, Viewport};
