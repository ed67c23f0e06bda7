//! EchoRenderer: an offline physically-based spectral-approximate
//! path-tracing renderer core.
//!
//! This crate is the rendering core only (spec.md §1 "In scope"): scene
//! preparation, the ray aggregator family, instance composition, the
//! material/BxDF layer, sampling, the evaluator, and the tile-based
//! accumulation engine. CLI, image I/O, scene-description parsing, and
//! post-process passes are external collaborators the crate's public types
//! are designed to be driven from, not things it implements itself.
//!
//! Module layout mirrors the component dependency order of spec.md §2
//! (leaves first): [`math`] and [`token`] have no crate-internal
//! dependencies; [`sampling`], [`geometry`], and [`arena`] build on those;
//! [`aggregator`] and [`material`] build on those in turn; [`instance`] and
//! [`prepare`] compose the prepared scene; [`texture`], [`scene`], and
//! [`evaluate`] drive a single camera ray; [`render`] owns the concurrent
//! tile-worker/device layer on top of everything else.

pub mod aggregator;
pub mod arena;
pub mod color;
pub mod error;
pub mod evaluate;
pub mod fpi;
pub mod geometry;
pub mod instance;
pub mod material;
pub mod math;
pub mod prepare;
pub mod render;
pub mod sampling;
pub mod scene;
pub mod texture;
pub mod token;

pub use error::{EchoError, Result};
pub use evaluate::{AlbedoPixelWorker, AcceleratorQualityWorker, PathTracer, PixelEvaluator, PixelSample};
pub use instance::{PowerDistribution, PreparedInstance, PreparedPack};
pub use math::{Ray, RGB128, AABB};
pub use prepare::{prepare, InstanceAuthoring, PackAuthoring, PackId, SceneGraph, SphereAuthoring, TriangleAuthoring};
pub use render::{Device, Int2, PixelAccumulator, RenderBuffer, RenderProfile, TileWorker};
pub use scene::{Ambient, Scene};
pub use token::{EntityToken, EntityType, TokenHierarchy};
