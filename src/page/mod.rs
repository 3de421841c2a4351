pub mod composite_image;
pub mod tile_load_map;

pub use composite_image::{CompositeImage, TileLocation};
pub use tile_load_map::TileLoadMap;
