pub mod page_info;
pub mod provider;
pub mod rect;
pub mod stacked_layout;
pub mod tile_source;

pub use self::page_info::{DocumentLayout, GroupPage, PageEntry, PageGroup, PageLookup};
pub use self::provider::{AnchorPosition, GeometryProvider, LayoutConfig};
pub use self::rect::{Dimensions, Offset, Rect};
pub use self::stacked_layout::{Orientation, StackedLayout};
pub use self::tile_source::{TileId, TileSource, ZoomLevel};
