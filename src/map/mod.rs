//! Map rendering: base tiles, projection and the radar overlay.

pub mod overlay;
pub mod tiles;
pub mod view;

pub use overlay::RadarOverlayLayer;
pub use tiles::TileManager;
pub use view::MapView;
