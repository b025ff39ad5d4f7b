//! Icosphere Generator
//!
//! Builds a sphere by recursively subdividing the 20 faces of an
//! icosahedron. Each subdivision splits a triangle into four through the
//! midpoints of its edges, pushed out to the sphere surface.
//!
//! Neighboring triangles share edges, and they walk a shared edge in opposite
//! directions. Midpoints are memoized in a [`PairCache`] keyed by the
//! unordered pair of endpoint indices, so each edge yields one vertex.
//! Degree `d` produces `10 * 4^(d-1) + 2` vertices and `20 * 4^(d-1)`
//! triangles.

use std::f32::consts::TAU;
use std::rc::Rc;

use glam::{Vec2, Vec3};

use super::data::{MeshConfiguration, MeshData, MeshError, Vertex};
use super::generator::{MeshGenerator, MeshGeneratorNode};
use crate::cache::PairCache;
use crate::config::IcosphereConfig;
use crate::context::GraphContext;
use crate::error::Result;
use crate::graph::{expect_kind, Node, NodeRef};

const GOLDEN: f32 = 1.618_034;

const ICOSAHEDRON: [[f32; 3]; 12] = [
    [-GOLDEN, 1.0, 0.0],
    [GOLDEN, 1.0, 0.0],
    [-GOLDEN, -1.0, 0.0],
    [GOLDEN, -1.0, 0.0],
    [-1.0, 0.0, -GOLDEN],
    [-1.0, 0.0, GOLDEN],
    [1.0, 0.0, -GOLDEN],
    [1.0, 0.0, GOLDEN],
    [0.0, GOLDEN, 1.0],
    [0.0, -GOLDEN, 1.0],
    [0.0, GOLDEN, -1.0],
    [0.0, -GOLDEN, -1.0],
];

const FACES: [[u16; 3]; 20] = [
    [1, 6, 3],
    [1, 3, 7],
    [1, 10, 6],
    [1, 7, 8],
    [1, 8, 10],
    [3, 6, 11],
    [3, 9, 7],
    [3, 11, 9],
    [0, 2, 4],
    [0, 5, 2],
    [0, 10, 8],
    [0, 4, 10],
    [0, 8, 5],
    [2, 11, 4],
    [2, 5, 9],
    [2, 9, 11],
    [10, 4, 6],
    [4, 11, 6],
    [8, 7, 5],
    [7, 9, 5],
];

/// Spherical texture coordinates for a unit direction.
fn sphere_uv(dir: Vec3) -> Vec2 {
    let v = dir.y.clamp(-1.0, 1.0).acos() / TAU;
    let u = dir.z.atan2(dir.x) / TAU;
    let u = if u < 0.0 { -u } else { 1.0 - u };
    Vec2::new(u, v)
}

/// Subdivided-icosahedron sphere.
#[derive(Debug, Clone)]
pub struct Icosphere {
    degree: u32,
    radius: f32,
    max_degree: u32,
    midpoints: PairCache<u16>,
}

impl Icosphere {
    pub fn new(degree: u32, radius: f32) -> Self {
        Self::from_config(&IcosphereConfig {
            degree,
            radius,
            ..IcosphereConfig::default()
        })
    }

    pub fn from_config(config: &IcosphereConfig) -> Self {
        Self {
            degree: config.degree,
            radius: config.radius,
            max_degree: config.max_degree,
            midpoints: PairCache::new(),
        }
    }

    pub fn degree(&self) -> u32 {
        self.degree
    }

    /// Degree actually used for generation. Anything below 1 means 1.
    pub fn effective_degree(&self) -> u32 {
        self.degree.max(1)
    }

    pub fn set_degree(&mut self, degree: u32) {
        self.degree = degree;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    pub fn max_degree(&self) -> u32 {
        self.max_degree
    }

    /// Midpoints currently memoized. Zero outside a generation pass.
    pub fn cached_midpoints(&self) -> usize {
        self.midpoints.len()
    }

    fn surface_vertex(&self, dir: Vec3) -> Vertex {
        Vertex {
            position: (dir * self.radius).extend(1.0),
            normal: dir,
            uv: sphere_uv(dir),
        }
    }

    fn build(&mut self, mesh: &mut MeshData) -> std::result::Result<(), MeshError> {
        let degree = self.effective_degree();
        if degree > self.max_degree {
            return Err(MeshError::DegreeOutOfRange {
                degree,
                max: self.max_degree,
            });
        }

        for corner in ICOSAHEDRON {
            let dir = Vec3::from_array(corner).normalize();
            mesh.push_vertex(self.surface_vertex(dir))?;
        }
        for [a, b, c] in FACES {
            self.tessellate(mesh, degree, a, b, c)?;
        }
        Ok(())
    }

    fn tessellate(
        &mut self,
        mesh: &mut MeshData,
        level: u32,
        a: u16,
        b: u16,
        c: u16,
    ) -> std::result::Result<(), MeshError> {
        if level <= 1 {
            mesh.push_triangle(a, b, c);
            return Ok(());
        }

        let ab = self.midpoint(mesh, a, b)?;
        let bc = self.midpoint(mesh, b, c)?;
        let ca = self.midpoint(mesh, c, a)?;

        //         a
        //        / \
        //      ab---ca
        //      / \ / \
        //     b---bc--c
        self.tessellate(mesh, level - 1, a, ab, ca)?;
        self.tessellate(mesh, level - 1, ab, b, bc)?;
        self.tessellate(mesh, level - 1, bc, c, ca)?;
        self.tessellate(mesh, level - 1, ab, bc, ca)
    }

    fn midpoint(&mut self, mesh: &mut MeshData, a: u16, b: u16) -> std::result::Result<u16, MeshError> {
        if let Some(index) = self.midpoints.get(a.into(), b.into()) {
            return Ok(index);
        }

        let endpoint = |index: u16| {
            mesh.vertex(index)
                .map(|vertex| vertex.position.truncate())
                .ok_or(MeshError::DanglingIndex {
                    index,
                    vertices: mesh.vertex_count(),
                })
        };
        let dir = (endpoint(a)? + endpoint(b)?).normalize();
        let index = mesh.push_vertex(self.surface_vertex(dir))?;
        self.midpoints.insert(a.into(), b.into(), index);
        Ok(index)
    }
}

impl Default for Icosphere {
    fn default() -> Self {
        Self::from_config(&IcosphereConfig::default())
    }
}

impl MeshGenerator for Icosphere {
    fn configuration(&self) -> MeshConfiguration {
        MeshConfiguration::default()
    }

    fn generate_mesh(&mut self, mesh: &mut MeshData) -> std::result::Result<(), MeshError> {
        self.midpoints.clear();
        let result = self.build(mesh);
        self.midpoints.clear();
        result
    }
}

/// Typed handle to an icosphere generator node.
#[derive(Debug, Clone)]
pub struct IcosphereGenerator {
    node: NodeRef,
}

type IcosphereNode = MeshGeneratorNode<Icosphere>;

impl IcosphereGenerator {
    pub const KIND: &'static str = "IcosphereGenerator";

    /// New generator using the context's icosphere defaults.
    pub fn create(context: &Rc<GraphContext>) -> Self {
        let config = context.config();
        let generator = MeshGeneratorNode::new(
            Icosphere::from_config(&config.icosphere),
            config.detailed_log,
        );
        Self {
            node: Node::new(Self::KIND, generator),
        }
    }

    pub fn from_node(node: NodeRef) -> Result<Self> {
        expect_kind(&node, Self::KIND)?;
        Ok(Self { node })
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn into_node(self) -> NodeRef {
        self.node
    }

    pub fn degree(&self) -> Result<u32> {
        self.node.with_generator(|g: &IcosphereNode| g.get().degree())
    }

    pub fn radius(&self) -> Result<f32> {
        self.node.with_generator(|g: &IcosphereNode| g.get().radius())
    }

    /// Change the subdivision degree. Consumers are invalidated if it differs.
    pub fn set_degree(&self, degree: u32) -> Result<()> {
        let changed = self.node.with_generator_mut(|g: &mut IcosphereNode| {
            let sphere = g.get_mut();
            let changed = sphere.degree() != degree;
            sphere.set_degree(degree);
            changed
        })?;
        if changed {
            self.node.invalidate();
        }
        Ok(())
    }

    /// Change the radius. Consumers are invalidated if it differs.
    pub fn set_radius(&self, radius: f32) -> Result<()> {
        let changed = self.node.with_generator_mut(|g: &mut IcosphereNode| {
            let sphere = g.get_mut();
            let changed = sphere.radius() != radius;
            sphere.set_radius(radius);
            changed
        })?;
        if changed {
            self.node.invalidate();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PairOrder;

    fn generate(degree: u32, radius: f32) -> MeshData {
        let mut sphere = Icosphere::new(degree, radius);
        let mut mesh = MeshData::new();
        sphere.generate_mesh(&mut mesh).unwrap();
        mesh
    }

    #[test]
    fn vertex_and_triangle_counts_per_degree() {
        for (degree, vertices, triangles) in [(1, 12, 20), (2, 42, 80), (3, 162, 320)] {
            let mesh = generate(degree, 1.0);
            assert_eq!(mesh.vertex_count(), vertices, "degree {degree}");
            assert_eq!(mesh.primitive_count(), triangles, "degree {degree}");
            assert!(mesh.validate().is_ok());
        }
    }

    #[test]
    fn degree_zero_behaves_as_one() {
        assert_eq!(generate(0, 1.0), generate(1, 1.0));
    }

    #[test]
    fn vertices_lie_on_the_sphere() {
        let mesh = generate(3, 2.5);
        for vertex in mesh.vertices() {
            assert!((vertex.position.truncate().length() - 2.5).abs() < 1e-4);
            assert_eq!(vertex.position.w, 1.0);
            assert!((vertex.normal.length() - 1.0).abs() < 1e-5);
            assert!((0.0..=1.0).contains(&vertex.uv.x));
            assert!((0.0..=0.5).contains(&vertex.uv.y));
        }
    }

    #[test]
    fn memo_is_empty_between_passes() {
        let mut sphere = Icosphere::new(3, 1.0);
        let mut first = MeshData::new();
        sphere.generate_mesh(&mut first).unwrap();
        assert_eq!(sphere.cached_midpoints(), 0);

        let mut second = MeshData::new();
        sphere.generate_mesh(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn degree_above_maximum_fails() {
        let mut sphere = Icosphere::new(9, 1.0);
        let mut mesh = MeshData::new();
        assert_eq!(
            sphere.generate_mesh(&mut mesh),
            Err(MeshError::DegreeOutOfRange { degree: 9, max: 7 })
        );
        assert_eq!(sphere.cached_midpoints(), 0);
    }

    #[test]
    fn shared_edges_need_order_independent_keys() {
        // Every one of the 30 icosahedron edges is walked once per direction.
        let mut unordered: PairCache<u16> = PairCache::new();
        let mut ordered: PairCache<u16> = PairCache::with_order(PairOrder::Ordered);
        for [a, b, c] in FACES {
            for (p, q) in [(a, b), (b, c), (c, a)] {
                unordered.get_or_insert_with(p.into(), q.into(), || 0);
                ordered.get_or_insert_with(p.into(), q.into(), || 0);
            }
        }
        assert_eq!(unordered.len(), 30);
        assert_eq!(ordered.len(), 60);
    }

    #[test]
    fn handle_changes_invalidate_the_node() {
        let context = Rc::new(GraphContext::headless());
        let sphere = IcosphereGenerator::create(&context);
        sphere.node().get_updated_data().unwrap();
        assert!(!sphere.node().is_dirty());

        sphere.set_degree(1).unwrap();
        assert!(!sphere.node().is_dirty());

        sphere.set_degree(2).unwrap();
        assert!(sphere.node().is_dirty());
        let (data, updated) = sphere.node().get_updated_data().unwrap();
        assert!(updated);
        assert_eq!(data.geometry().unwrap().vertex_count(), 42);

        sphere.set_radius(3.0).unwrap();
        assert_eq!(sphere.radius().unwrap(), 3.0);
        assert!(sphere.node().is_dirty());
    }

    #[test]
    fn from_node_checks_kind() {
        let other = Node::without_generator("Other");
        assert!(IcosphereGenerator::from_node(other).is_err());
    }
}
