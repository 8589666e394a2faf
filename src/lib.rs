//! # Fuda
//!
//! Label placement and lifecycle engine for real-time interactive maps.
//!
//! ## Overview
//!
//! `fuda` decides, frame by frame, which text and icon labels of the rendered
//! map tiles are shown, where, and how opaque. Labels fade in when they get
//! screen space and fade out when they lose it; state is retained across
//! frames so fades stay smooth while the camera moves.
//!
//! The core is the [`PlacementScheduler`]. It works against a few seams the
//! host can implement or take from this crate:
//!
//! * [`GlyphService`](glyphs::GlyphService): asynchronous glyph loading
//!   ([`FontGlyphService`](glyphs::FontGlyphService) uses `fontdb` + `fontdue`),
//! * [`ScreenCollisions`](collision::ScreenCollisions): screen-space occupancy
//!   ([`ScreenCollisionGrid`](collision::ScreenCollisionGrid)),
//! * [`Projector`](projection::Projector): world to screen mapping
//!   ([`PlanarProjector`](projection::PlanarProjector)),
//! * [`TextCanvas`](canvas::TextCanvas): receives the placed labels
//!   ([`RecordingCanvas`](canvas::RecordingCanvas)).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fuda::{
//!     PlacementConfig, PlacementScheduler,
//!     canvas::RecordingCanvas,
//!     collision::ScreenCollisionGrid,
//!     geometry::{ScreenSize, WorldPoint},
//!     glyphs::FontGlyphService,
//!     projection::PlanarProjector,
//!     text_element::{TextElement, TextElementGroup},
//!     tile::{DataSourceTileList, LabelTile, TileKey},
//!     view_state::ViewState,
//! };
//!
//! let fonts = Arc::new(FontGlyphService::with_system_fonts());
//! let mut scheduler = PlacementScheduler::new(
//!     PlacementConfig::default(),
//!     Arc::clone(&fonts),
//!     ScreenCollisionGrid::default(),
//!     RecordingCanvas::new(10_000),
//! )
//! .unwrap();
//!
//! let mut tile = LabelTile::new(TileKey::new(0, 0, 0));
//! tile.add_group(TextElementGroup::new(
//!     1.0,
//!     vec![TextElement::point("Berlin", WorldPoint::new(0.0, 0.0, 0.0))],
//! ));
//! let tiles = [DataSourceTileList::new("places", vec![Arc::new(tile)])];
//!
//! let screen = ScreenSize::new(800.0, 600.0);
//! let view = ViewState::new(10.0, WorldPoint::new(0.0, 0.0, 100.0), screen);
//! let projector = PlanarProjector::new(WorldPoint::origin(), 1.0, screen);
//!
//! for frame in 0..3 {
//!     scheduler.place_text(&tiles, &view, &projector, frame as f64 * 16.0);
//!     // resolve glyph loads between frames
//!     fonts.process_pending();
//! }
//! ```

pub mod canvas;
pub mod collision;
pub mod config;
pub mod element_state;
pub mod error;
pub mod geometry;
pub mod glyphs;
pub mod group_state;
pub mod placement;
pub mod projection;
pub mod render_state;
pub mod state_cache;
pub mod text_element;
pub mod text_layout;
pub mod tile;
pub mod view_state;

// common re-exports
pub use config::PlacementConfig;
pub use error::ConfigError;
pub use placement::{PlacementScheduler, PlacementStats};
pub use render_state::{FadeState, RenderState};
pub use state_cache::TextElementStateCache;

// re-export dependencies
pub use euclid;
pub use fontdb;
pub use fontdue;
pub use parking_lot;
