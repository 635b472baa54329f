//! Bounding Volume Hierarchy over mesh triangles for closest-point queries.
//!
//! Uses a bucketed Surface Area Heuristic for construction.

use bytemuck::{Pod, Zeroable};
use sdfview_api::MeshData;

use crate::mesh::Aabb;

/// Leaf size used for the distance-field slice.
pub const DEFAULT_MAX_LEAF_TRIS: usize = 1;

const NUM_BUCKETS: usize = 12;

/// A BVH node: either a leaf holding triangle indices or an internal node with two children.
#[derive(Debug, Clone)]
pub enum BvhNode {
    Leaf { aabb: Aabb, triangles: Vec<u32> },
    Internal { aabb: Aabb, left: Box<BvhNode>, right: Box<BvhNode> },
}

impl BvhNode {
    pub fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Result of a closest-point query.
#[derive(Debug, Clone, Copy)]
pub struct ClosestHit {
    /// Closest point on the mesh surface.
    pub point: [f32; 3],
    /// Unsigned distance from the query point.
    pub distance: f32,
    /// Index of the triangle containing `point`.
    pub triangle: u32,
    /// Unit face normal of that triangle (winding order).
    pub normal: [f32; 3],
}

impl ClosestHit {
    /// Distance negated when the query point lies behind the closest face.
    pub fn signed_distance(&self, query: [f32; 3]) -> f32 {
        let to_query = sub(query, self.point);
        if dot(to_query, self.normal) < 0.0 {
            -self.distance
        } else {
            self.distance
        }
    }
}

/// Flattened BVH node for storage-buffer upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuBvhNode {
    pub aabb_min: [f32; 4],
    pub aabb_max: [f32; 4],
    /// For leaves: first triangle in the flattened triangle array. For internal: left child index.
    pub left_or_first: u32,
    /// For leaves: triangle count. For internal: right child index.
    pub right_or_count: u32,
    /// 1 for leaves, 0 for internal nodes.
    pub is_leaf: u32,
    pub _pad: u32,
}

/// Triangle corners for storage-buffer upload (w unused).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuTriangle {
    pub a: [f32; 4],
    pub b: [f32; 4],
    pub c: [f32; 4],
}

/// BVH over the triangles of one mesh. Owns a copy of the triangle corners.
#[derive(Debug, Clone)]
pub struct MeshBvh {
    root: Option<BvhNode>,
    triangles: Vec<[[f32; 3]; 3]>,
    node_count: usize,
    depth: usize,
}

impl MeshBvh {
    pub fn build(mesh: &MeshData, max_leaf_tris: usize) -> Self {
        let max_leaf_tris = max_leaf_tris.max(1);
        let triangles: Vec<[[f32; 3]; 3]> = (0..mesh.triangle_count()).map(|t| mesh.triangle(t)).collect();
        let mut tri_data: Vec<(u32, Aabb, [f32; 3])> = triangles
            .iter()
            .enumerate()
            .map(|(i, tri)| {
                let mut aabb = Aabb::empty();
                for &p in tri {
                    aabb.include_point(p);
                }
                (i as u32, aabb, aabb.center())
            })
            .collect();
        let mut node_count = 0;
        let root = if tri_data.is_empty() {
            None
        } else {
            Some(build_node(&mut tri_data, max_leaf_tris, &mut node_count))
        };
        let depth = root.as_ref().map(subtree_depth).unwrap_or(0);
        log::debug!("built BVH: {} triangles, {} nodes, depth {}", triangles.len(), node_count, depth);
        Self { root, triangles, node_count, depth }
    }

    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Edges on the longest root-to-leaf path; 0 for a single leaf.
    /// A stack-based traversal needs `max_depth() + 1` entries.
    pub fn max_depth(&self) -> usize {
        self.depth
    }

    pub fn bounds(&self) -> Aabb {
        self.root.as_ref().map(|r| *r.aabb()).unwrap_or_else(Aabb::empty)
    }

    /// Closest point on the mesh to `p`, or None for an empty mesh.
    pub fn closest_point(&self, p: [f32; 3]) -> Option<ClosestHit> {
        let root = self.root.as_ref()?;
        let mut best: Option<(f32, [f32; 3], u32)> = None;
        let mut best_d2 = f32::INFINITY;
        self.closest_in_node(root, p, &mut best, &mut best_d2);
        best.map(|(d2, point, triangle)| ClosestHit {
            point,
            distance: d2.sqrt(),
            triangle,
            normal: face_normal(&self.triangles[triangle as usize]),
        })
    }

    fn closest_in_node(
        &self,
        node: &BvhNode,
        p: [f32; 3],
        best: &mut Option<(f32, [f32; 3], u32)>,
        best_d2: &mut f32,
    ) {
        match node {
            BvhNode::Leaf { aabb, triangles } => {
                if aabb.distance_sq_to_point(p) > *best_d2 {
                    return;
                }
                for &t in triangles {
                    let q = closest_point_on_triangle(p, &self.triangles[t as usize]);
                    let d = sub(p, q);
                    let d2 = dot(d, d);
                    if d2 < *best_d2 {
                        *best_d2 = d2;
                        *best = Some((d2, q, t));
                    }
                }
            }
            BvhNode::Internal { aabb, left, right } => {
                if aabb.distance_sq_to_point(p) > *best_d2 {
                    return;
                }
                // Nearer child first so the farther one is more likely pruned
                let dl = left.aabb().distance_sq_to_point(p);
                let dr = right.aabb().distance_sq_to_point(p);
                if dl <= dr {
                    self.closest_in_node(left, p, best, best_d2);
                    self.closest_in_node(right, p, best, best_d2);
                } else {
                    self.closest_in_node(right, p, best, best_d2);
                    self.closest_in_node(left, p, best, best_d2);
                }
            }
        }
    }

    /// Flatten into depth-first node order with triangles stored in leaf order.
    /// Internal nodes always have their left child at `index + 1`.
    pub fn flatten(&self) -> (Vec<GpuBvhNode>, Vec<GpuTriangle>) {
        let mut nodes = Vec::with_capacity(self.node_count);
        let mut tris = Vec::with_capacity(self.triangles.len());
        if let Some(root) = &self.root {
            self.flatten_node(root, &mut nodes, &mut tris);
        }
        (nodes, tris)
    }

    fn flatten_node(&self, node: &BvhNode, nodes: &mut Vec<GpuBvhNode>, tris: &mut Vec<GpuTriangle>) -> usize {
        let idx = nodes.len();
        let aabb = node.aabb();
        let mut gpu = GpuBvhNode {
            aabb_min: [aabb.min[0], aabb.min[1], aabb.min[2], 0.0],
            aabb_max: [aabb.max[0], aabb.max[1], aabb.max[2], 0.0],
            left_or_first: 0,
            right_or_count: 0,
            is_leaf: 0,
            _pad: 0,
        };
        match node {
            BvhNode::Leaf { triangles, .. } => {
                gpu.left_or_first = tris.len() as u32;
                gpu.right_or_count = triangles.len() as u32;
                gpu.is_leaf = 1;
                for &t in triangles {
                    let [a, b, c] = self.triangles[t as usize];
                    tris.push(GpuTriangle {
                        a: [a[0], a[1], a[2], 0.0],
                        b: [b[0], b[1], b[2], 0.0],
                        c: [c[0], c[1], c[2], 0.0],
                    });
                }
                nodes.push(gpu);
            }
            BvhNode::Internal { left, right, .. } => {
                nodes.push(gpu);
                let left_idx = self.flatten_node(left, nodes, tris);
                let right_idx = self.flatten_node(right, nodes, tris);
                nodes[idx].left_or_first = left_idx as u32;
                nodes[idx].right_or_count = right_idx as u32;
            }
        }
        idx
    }
}

fn subtree_depth(node: &BvhNode) -> usize {
    match node {
        BvhNode::Leaf { .. } => 0,
        BvhNode::Internal { left, right, .. } => 1 + subtree_depth(left).max(subtree_depth(right)),
    }
}

fn build_node(tri_data: &mut [(u32, Aabb, [f32; 3])], max_leaf_tris: usize, node_count: &mut usize) -> BvhNode {
    *node_count += 1;
    let mut bounds = Aabb::empty();
    for (_, aabb, _) in tri_data.iter() {
        bounds.include_aabb(aabb);
    }

    if tri_data.len() <= max_leaf_tris {
        return BvhNode::Leaf {
            aabb: bounds,
            triangles: tri_data.iter().map(|(id, _, _)| *id).collect(),
        };
    }

    let mid = match find_best_split(tri_data) {
        Some((axis, pos)) => partition(tri_data, axis, pos),
        None => 0,
    };
    // Degenerate split (e.g. coincident centroids): halve the range
    let mid = if mid == 0 || mid == tri_data.len() { tri_data.len() / 2 } else { mid };

    let (left_data, right_data) = tri_data.split_at_mut(mid);
    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left_data, max_leaf_tris, node_count)),
        right: Box::new(build_node(right_data, max_leaf_tris, node_count)),
    }
}

/// Best (axis, position) by SAH over centroid buckets, or None if all centroids coincide.
fn find_best_split(tri_data: &[(u32, Aabb, [f32; 3])]) -> Option<(usize, f32)> {
    let mut centroid_bounds = Aabb::empty();
    for (_, _, c) in tri_data {
        centroid_bounds.include_point(*c);
    }
    let extent = centroid_bounds.extent();

    let mut best_cost = f32::INFINITY;
    let mut best = None;
    for axis in 0..3 {
        let axis_extent = extent[axis];
        if axis_extent < 1e-12 {
            continue;
        }
        let axis_min = centroid_bounds.min[axis];

        let mut counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb::empty(); NUM_BUCKETS];
        for (_, aabb, c) in tri_data {
            let b = (((c[axis] - axis_min) / axis_extent) * NUM_BUCKETS as f32) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            counts[b] += 1;
            bucket_bounds[b].include_aabb(aabb);
        }

        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb::empty();
            for i in 0..split {
                left_count += counts[i];
                left_bounds.include_aabb(&bucket_bounds[i]);
            }
            let mut right_count = 0;
            let mut right_bounds = Aabb::empty();
            for i in split..NUM_BUCKETS {
                right_count += counts[i];
                right_bounds.include_aabb(&bucket_bounds[i]);
            }
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let cost = 0.125
                + left_bounds.surface_area() * left_count as f32
                + right_bounds.surface_area() * right_count as f32;
            if cost < best_cost {
                best_cost = cost;
                best = Some((axis, axis_min + (split as f32 / NUM_BUCKETS as f32) * axis_extent));
            }
        }
    }
    best
}

fn partition(tri_data: &mut [(u32, Aabb, [f32; 3])], axis: usize, pos: f32) -> usize {
    let mut left = 0;
    let mut right = tri_data.len();
    while left < right {
        if tri_data[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            tri_data.swap(left, right);
        }
    }
    left
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add_scaled(a: [f32; 3], b: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] + b[0] * s, a[1] + b[1] * s, a[2] + b[2] * s]
}

fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn face_normal(tri: &[[f32; 3]; 3]) -> [f32; 3] {
    let n = cross(sub(tri[1], tri[0]), sub(tri[2], tri[0]));
    let len = dot(n, n).sqrt();
    if len > 1e-20 {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 1.0]
    }
}

/// Closest point on triangle `tri` to `p` (Voronoi-region walk).
pub fn closest_point_on_triangle(p: [f32; 3], tri: &[[f32; 3]; 3]) -> [f32; 3] {
    let [a, b, c] = *tri;
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ap = sub(p, a);
    let d1 = dot(ab, ap);
    let d2 = dot(ac, ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = sub(p, b);
    let d3 = dot(ab, bp);
    let d4 = dot(ac, bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return add_scaled(a, ab, v);
    }

    let cp = sub(p, c);
    let d5 = dot(ab, cp);
    let d6 = dot(ac, cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return add_scaled(a, ac, w);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return add_scaled(b, sub(c, b), w);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    add_scaled(add_scaled(a, ab, v), ac, w)
}
