//! # Phylogeny Capture Library
//!
//! Extracts a directed phylogenetic graph from a raster image of a tree
//! diagram. The image is binarized, thinned to a one pixel wide skeleton,
//! end and branch points are detected and joined by traced segments, small
//! noise clusters are removed and the remaining segments are oriented away
//! from a declared root, with recognized words attached to the leaves.
//!
//! ## Core Features
//!
//! - **Phase state machine**: `None < Image < Words < Segments < Dusted < Phylogeny`,
//!   each phase committed only when it completed
//! - **Trait-based stages**: plug in thinning and text recognition backends
//! - **Cooperative cancellation**: long loops poll a [`CancellationCheck`]
//! - **GeoJSON / JSON export** and a debug overlay renderer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use capture::{CaptureManager, Phase};
//! use phylo_common::Point;
//!
//! let mut manager = CaptureManager::new();
//! manager.load_image("tree.png")?;
//! manager.run_to(Phase::Dusted)?;
//!
//! manager.set_root(Point::new(12, 140))?;
//! let state = manager.run_to(Phase::Phylogeny)?;
//! println!("{} edges", state.graph().map(|g| g.edge_count()).unwrap_or(0));
//!
//! manager.report()?.save_geojson("tree.geojson", None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Pipeline
//!
//! ```rust,no_run
//! use capture::{CaptureConfig, Pipeline, ZhangSuenThinning};
//!
//! let config = CaptureConfig::default()
//!     .with_brightness_threshold(0.6)?
//!     .with_dust(12.0, 30.0)?;
//! let pipeline = Pipeline::builder()
//!     .with_config(config)
//!     .with_thinning(ZhangSuenThinning)
//!     .build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algorithms;
pub mod cancel;
pub mod config;
pub mod error;
pub mod io;
pub mod manager;
pub mod pipeline;
pub mod render;
pub mod traits;
pub mod types;

pub use algorithms::*;
pub use cancel::{CancellationCheck, CancellationToken, NeverCancel};
pub use config::CaptureConfig;
pub use error::{CaptureError, Result};
pub use io::CaptureReport;
pub use manager::{CaptureCommand, CaptureManager};
pub use pipeline::{CaptureState, Pipeline, PhylogenyArtifacts, SegmentArtifacts, builder::PipelineBuilder};
pub use render::{OverlayStyle, render_overlay};
pub use traits::*;
pub use types::{BinaryMatrix, Phase, RecognizedText, RootSide, Segment};
