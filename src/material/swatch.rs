//! Dense material storage produced during scene preparation (spec.md §3
//! "MaterialIndex", §4.7 "IEmissive").

use super::touch::Touch;
use crate::arena::Allocator;
use crate::math::RGB128;
use glam::Vec3;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A dense, `Copy` handle into a [`PreparedSwatch`]. Indices are assigned
/// during preparation and are stable for the lifetime of the prepared pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialIndex(u32);

impl MaterialIndex {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// A surface material: populates `touch.bsdf` in place from the arena so the
/// components can be combined and evaluated without further allocation.
pub trait Material: Send + Sync {
    fn scatter<'a>(&self, touch: &mut Touch<'a>, arena: &'a Allocator);

    /// `Some` only for materials that emit light; `None` otherwise (spec.md
    /// §4.7's positive-radiance predicate is enforced by the implementation,
    /// not by the caller).
    fn as_emissive(&self) -> Option<&dyn Emissive> {
        None
    }
}

/// A light-emitting surface. `average_radiance` drives the positive-radiance
/// predicate used while building the pack's emissive sampling distribution
/// (spec.md §4.7, `SPEC_FULL.md` §2 "PowerDistribution").
pub trait Emissive: Send + Sync {
    fn emit(&self, origin: Vec3, outgoing: Vec3) -> RGB128;
    fn average_radiance(&self) -> f32;
}

/// Deduplicating builder for a pack's material table, keyed on `Arc` pointer
/// identity so the same shared material reused across many surfaces gets a
/// single [`MaterialIndex`].
#[derive(Default)]
pub struct SwatchExtractor {
    materials: Vec<Arc<dyn Material>>,
    lookup: FxHashMap<usize, MaterialIndex>,
}

impl SwatchExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: Arc<dyn Material>) -> MaterialIndex {
        let key = Arc::as_ptr(&material) as *const () as usize;
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = MaterialIndex::new(self.materials.len() as u32);
        self.materials.push(material);
        self.lookup.insert(key, index);
        index
    }

    pub fn finish(self) -> PreparedSwatch {
        PreparedSwatch::new(self.materials)
    }
}

/// The immutable, dense `MaterialIndex -> Material` table for a prepared
/// pack, with its emissive subset precomputed.
pub struct PreparedSwatch {
    materials: Vec<Arc<dyn Material>>,
    emissive_indices: Vec<MaterialIndex>,
}

impl PreparedSwatch {
    pub fn new(materials: Vec<Arc<dyn Material>>) -> Self {
        let emissive_indices = materials
            .iter()
            .enumerate()
            .filter(|(_, m)| m.as_emissive().is_some())
            .map(|(i, _)| MaterialIndex::new(i as u32))
            .collect();
        Self {
            materials,
            emissive_indices,
        }
    }

    pub fn get(&self, index: MaterialIndex) -> &dyn Material {
        self.materials[index.index() as usize].as_ref()
    }

    pub fn emissive_indices(&self) -> &[MaterialIndex] {
        &self.emissive_indices
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::lambertian::Lambertian;

    struct Dummy;
    impl Material for Dummy {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
    }

    #[test]
    fn extractor_dedupes_shared_materials_by_identity() {
        let mut extractor = SwatchExtractor::new();
        let shared: Arc<dyn Material> = Arc::new(Dummy);
        let a = extractor.insert(shared.clone());
        let b = extractor.insert(shared);
        let c = extractor.insert(Arc::new(Dummy));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn finish_builds_a_dense_lookup() {
        let mut extractor = SwatchExtractor::new();
        let index = extractor.insert(Arc::new(Dummy));
        let swatch = extractor.finish();
        assert_eq!(swatch.len(), 1);
        let _ = swatch.get(index);
        let _lambertian: Arc<dyn Material> = Arc::new(LambertianMaterial(Lambertian::new(RGB128::WHITE)));
    }

    struct LambertianMaterial(Lambertian);
    impl Material for LambertianMaterial {
        fn scatter<'a>(&self, touch: &mut Touch<'a>, arena: &'a Allocator) {
            let mut builder = super::super::bsdf_set::BsdfSetBuilder::new(arena);
            builder.push(self.0);
            touch.bsdf = builder.finish();
        }
    }
}
