//! World-space hit state populated at a ray-surface intersection (spec.md
//! §3 `Touch`/`Interaction`).

use super::bsdf_set::BsdfSet;
use super::swatch::MaterialIndex;
use crate::geometry::UV;
use glam::Vec3;

/// The local geometric and material state at a ray-surface hit. `bsdf` is
/// populated in place by the material's `scatter` call, living in the same
/// per-sample arena as its components.
pub struct Touch<'a> {
    pub point: Vec3,
    pub normal: Vec3,
    pub outgoing: Vec3,
    pub uv: UV,
    pub material: MaterialIndex,
    pub bsdf: BsdfSet<'a>,
}

impl<'a> Touch<'a> {
    pub fn new(point: Vec3, normal: Vec3, outgoing: Vec3, uv: UV, material: MaterialIndex) -> Self {
        Self {
            point,
            normal,
            outgoing,
            uv,
            material,
            bsdf: BsdfSet::empty(),
        }
    }
}
