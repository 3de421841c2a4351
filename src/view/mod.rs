pub mod hooks;
pub mod renderer;
pub mod surface;
pub mod viewport;

pub use self::hooks::{RenderedPageInfo, ViewHooks};
pub use self::renderer::{RenderStats, Renderer};
pub use self::surface::{ImageSurface, RasterSurface};
pub use self::viewport::{ScrollDirection, Viewport};
