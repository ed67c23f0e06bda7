//! Mutable scene-authoring graph and the preparation pipeline that turns it
//! into an immutable [`PreparedPack`] tree (spec.md §4.1).
//!
//! Authoring is a forest of [`PackAuthoring`] nodes, each owning its own
//! material palette and referencing child packs through [`InstanceAuthoring`]
//! placements; the same [`PackId`] may be instanced from several parents, so
//! preparation builds each pack at most once and shares the result via `Arc`.

use crate::aggregator::AcceleratorProfile;
use crate::error::{PreparationError, Result};
use crate::geometry::{PreparedSphere, PreparedTriangle, UV};
use crate::instance::{PreparedInstance, PreparedPack};
use crate::material::{Material, SwatchExtractor};
use glam::{Mat4, Vec3};
use std::sync::Arc;

/// Authoring-side triangle: vertex positions, three shading normals, three
/// UVs, and a material index into the owning pack's palette.
pub struct TriangleAuthoring {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub normals: [Vec3; 3],
    pub uvs: [UV; 3],
    pub material_index: u32,
}

/// Authoring-side sphere.
pub struct SphereAuthoring {
    pub center: Vec3,
    pub radius: f32,
    pub material_index: u32,
}

/// A nested pack reference, placed by `transform` (local-space-into-parent,
/// i.e. what the prepared `PreparedInstance` calls `inverseTransform`).
pub struct InstanceAuthoring {
    pub pack: PackId,
    pub transform: Mat4,
}

/// Index of a [`PackAuthoring`] within a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackId(usize);

/// One authoring-time pack: its own material palette plus triangle, sphere,
/// and instance sources. Materials are deduplicated per pack by
/// [`SwatchExtractor`] during preparation, matching the same `Arc` identity
/// rule the extractor itself uses.
#[derive(Default)]
pub struct PackAuthoring {
    pub materials: Vec<Arc<dyn Material>>,
    pub triangles: Vec<TriangleAuthoring>,
    pub spheres: Vec<SphereAuthoring>,
    pub instances: Vec<InstanceAuthoring>,
}

impl PackAuthoring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `material` in this pack's palette and returns the index to
    /// use in [`TriangleAuthoring::material_index`] / [`SphereAuthoring`].
    pub fn push_material(&mut self, material: Arc<dyn Material>) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }
}

/// Forest of authoring packs. `push_pack` appends a node and returns a
/// stable [`PackId`]; instances reference earlier or later packs freely
/// (the graph may contain forward references and, deliberately, cycles —
/// [`prepare`] is what rejects those).
#[derive(Default)]
pub struct SceneGraph {
    packs: Vec<PackAuthoring>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pack(&mut self, pack: PackAuthoring) -> PackId {
        self.packs.push(pack);
        PackId(self.packs.len() - 1)
    }

    pub fn pack(&self, id: PackId) -> &PackAuthoring {
        &self.packs[id.0]
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// DFS-coloring cycle detection over the instance reference graph (spec.md
/// §9 "Object graph with cycles"): a pack reachable from itself through its
/// own instance chain fails preparation before any geometry is touched.
fn detect_cycles(graph: &SceneGraph) -> Result<()> {
    let mut color = vec![Color::White; graph.len()];
    for start in 0..graph.len() {
        if color[start] == Color::White {
            visit(graph, start, &mut color)?;
        }
    }
    Ok(())
}

fn visit(graph: &SceneGraph, id: usize, color: &mut [Color]) -> Result<()> {
    color[id] = Color::Gray;
    for inst in &graph.pack(PackId(id)).instances {
        let child = inst.pack.0;
        match color[child] {
            Color::Gray => return Err(PreparationError::InstanceCycle(child).into()),
            Color::White => visit(graph, child, color)?,
            Color::Black => {}
        }
    }
    color[id] = Color::Black;
    Ok(())
}

/// Extracts the placement's uniform scale and rejects non-uniform scale
/// (spec.md §4.1 "uniform scale extracted as the magnitude of the first
/// transform row"; `Mat4::to_scale_rotation_translation`'s polar
/// decomposition gives the equivalent per-axis magnitudes directly).
fn uniform_scale(transform: Mat4) -> Result<f32> {
    let (scale, _rotation, _translation) = transform.to_scale_rotation_translation();
    let average = (scale.x + scale.y + scale.z) / 3.0;
    let tolerance = 1e-4 * average.abs().max(1.0);
    if (scale.x - average).abs() > tolerance || (scale.y - average).abs() > tolerance || (scale.z - average).abs() > tolerance {
        return Err(PreparationError::NonUniformScale(scale.to_array()).into());
    }
    Ok(average)
}

/// Transforms `graph`'s authoring tree rooted at `root` into an immutable
/// [`PreparedPack`], sharing identical sub-packs by `Arc` and picking an
/// aggregator per pack via `profile` (spec.md §4.1).
pub fn prepare(graph: &SceneGraph, root: PackId, profile: &AcceleratorProfile) -> Result<Arc<PreparedPack>> {
    detect_cycles(graph)?;
    let mut cache: Vec<Option<Arc<PreparedPack>>> = vec![None; graph.len()];
    prepare_pack(graph, root, profile, &mut cache)
}

fn prepare_pack(graph: &SceneGraph, id: PackId, profile: &AcceleratorProfile, cache: &mut Vec<Option<Arc<PreparedPack>>>) -> Result<Arc<PreparedPack>> {
    if let Some(existing) = &cache[id.0] {
        return Ok(existing.clone());
    }

    let authoring = graph.pack(id);

    let mut extractor = SwatchExtractor::new();
    let material_map: Vec<_> = authoring.materials.iter().cloned().map(|m| extractor.insert(m)).collect();
    let swatch = extractor.finish();

    let mut triangles = Vec::with_capacity(authoring.triangles.len());
    for (i, t) in authoring.triangles.iter().enumerate() {
        let material = *material_map
            .get(t.material_index as usize)
            .ok_or(PreparationError::MaterialIndexOutOfRange { index: t.material_index, len: material_map.len() })?;
        let triangle = PreparedTriangle::new(t.v0, t.v1, t.v2, t.normals, t.uvs, material);
        if triangle.area() <= 0.0 && swatch.get(material).as_emissive().is_some() {
            return Err(PreparationError::ZeroAreaEmissiveTriangle(i).into());
        }
        triangles.push(triangle);
    }

    let mut spheres = Vec::with_capacity(authoring.spheres.len());
    for s in &authoring.spheres {
        let material = *material_map
            .get(s.material_index as usize)
            .ok_or(PreparationError::MaterialIndexOutOfRange { index: s.material_index, len: material_map.len() })?;
        spheres.push(PreparedSphere::new(s.center, s.radius, material));
    }

    let mut instances = Vec::with_capacity(authoring.instances.len());
    for inst in &authoring.instances {
        let child_pack = prepare_pack(graph, inst.pack, profile, cache)?;
        let scale = uniform_scale(inst.transform)?;
        let inverse_transform = inst.transform;
        let forward_transform = inst.transform.inverse();
        instances.push(Arc::new(PreparedInstance::new(child_pack, forward_transform, inverse_transform, scale)));
    }

    let prepared = Arc::new(PreparedPack::build(triangles, spheres, instances, swatch, profile));
    cache[id.0] = Some(prepared.clone());
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Allocator;
    use crate::aggregator::AcceleratorProfile;
    use crate::material::touch::Touch;
    use crate::material::{Emissive, MaterialIndex};
    use crate::math::RGB128;
    use glam::{Quat, Vec3};

    struct Dummy;
    impl Material for Dummy {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
    }

    struct Emitter(RGB128);
    impl Material for Emitter {
        fn scatter<'a>(&self, _touch: &mut Touch<'a>, _arena: &'a Allocator) {}
        fn as_emissive(&self) -> Option<&dyn Emissive> {
            Some(self)
        }
    }
    impl Emissive for Emitter {
        fn emit(&self, _origin: Vec3, _outgoing: Vec3) -> RGB128 {
            self.0
        }
        fn average_radiance(&self) -> f32 {
            self.0.average()
        }
    }

    fn flat_triangle(material_index: u32) -> TriangleAuthoring {
        TriangleAuthoring {
            v0: Vec3::ZERO,
            v1: Vec3::new(1.0, 0.0, 0.0),
            v2: Vec3::new(0.0, 1.0, 0.0),
            normals: [Vec3::Z; 3],
            uvs: [UV::default(); 3],
            material_index,
        }
    }

    #[test]
    fn prepares_a_single_triangle_pack() {
        let mut graph = SceneGraph::new();
        let mut pack = PackAuthoring::new();
        let material = pack.push_material(Arc::new(Dummy));
        pack.triangles.push(flat_triangle(material));
        let root = graph.push_pack(pack);

        let prepared = prepare(&graph, root, &AcceleratorProfile::default()).expect("preparation should succeed");
        assert_eq!(prepared.counts().triangles, 1);
        assert!(prepared.power_distribution().is_none());
    }

    #[test]
    fn rejects_material_index_out_of_range() {
        let mut graph = SceneGraph::new();
        let mut pack = PackAuthoring::new();
        pack.push_material(Arc::new(Dummy));
        pack.triangles.push(flat_triangle(5));
        let root = graph.push_pack(pack);

        let err = prepare(&graph, root, &AcceleratorProfile::default()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn rejects_zero_area_emissive_triangle() {
        let mut graph = SceneGraph::new();
        let mut pack = PackAuthoring::new();
        let material = pack.push_material(Arc::new(Emitter(RGB128::splat(1.0))));
        pack.triangles.push(TriangleAuthoring {
            v0: Vec3::ZERO,
            v1: Vec3::ZERO,
            v2: Vec3::ZERO,
            normals: [Vec3::Z; 3],
            uvs: [UV::default(); 3],
            material_index: material,
        });
        let root = graph.push_pack(pack);

        let err = prepare(&graph, root, &AcceleratorProfile::default()).unwrap_err();
        assert!(err.to_string().contains("zero area"));
    }

    #[test]
    fn rejects_non_uniform_instance_scale() {
        let mut graph = SceneGraph::new();
        let child = graph.push_pack(PackAuthoring::new());
        let mut root_pack = PackAuthoring::new();
        root_pack.instances.push(InstanceAuthoring {
            pack: child,
            transform: Mat4::from_scale_rotation_translation(Vec3::new(1.0, 2.0, 1.0), Quat::IDENTITY, Vec3::ZERO),
        });
        let root = graph.push_pack(root_pack);

        let err = prepare(&graph, root, &AcceleratorProfile::default()).unwrap_err();
        assert!(err.to_string().contains("non-uniform"));
    }

    #[test]
    fn rejects_self_referencing_instance_cycle() {
        let mut graph = SceneGraph::new();
        let root = graph.push_pack(PackAuthoring::new());
        let mut pack = PackAuthoring::new();
        pack.instances.push(InstanceAuthoring { pack: root, transform: Mat4::IDENTITY });
        graph.packs[root.0] = pack;

        let err = prepare(&graph, root, &AcceleratorProfile::default()).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn shares_identical_sub_pack_by_arc_identity() {
        let mut graph = SceneGraph::new();
        let mut leaf = PackAuthoring::new();
        let material = leaf.push_material(Arc::new(Dummy));
        leaf.triangles.push(flat_triangle(material));
        let leaf_id = graph.push_pack(leaf);

        let mut root_pack = PackAuthoring::new();
        root_pack.instances.push(InstanceAuthoring { pack: leaf_id, transform: Mat4::IDENTITY });
        root_pack.instances.push(InstanceAuthoring {
            pack: leaf_id,
            transform: Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)),
        });
        let root = graph.push_pack(root_pack);

        let prepared = prepare(&graph, root, &AcceleratorProfile::default()).expect("preparation should succeed");
        assert!(Arc::ptr_eq(prepared.instance(0).pack(), prepared.instance(1).pack()));
    }
}
