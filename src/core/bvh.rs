// Copyright @yucwang 2026

use crate::math::aabb::BBox;
use crate::math::constants::Float;
use crate::math::timebox::TimeBox;

const SAH_BUCKETS: usize = 12;

pub const ROOT_NODE: u32 = 0;
pub const NO_NODE: u32 = u32::MAX;

/// A node as seen by traversal code.
#[derive(Debug, Copy, Clone)]
pub enum NodeRef {
    Inner { children: [u32; 2], split_axis: usize },
    Leaf { item: u32 },
}

struct BvhNode {
    bounds: TimeBox<BBox>,
    parent: u32,
    kind: NodeKind,
}

enum NodeKind {
    Inner { children: [u32; 2], split_axis: usize },
    Leaf { item: u32 },
}

/// A binary BVH over a set of items (assembly instances), one item per
/// leaf. Node bounds keep their motion samples so the slab test can
/// interpolate at the ray's time.
///
/// The tree stores parent links; together with a per-ray bit stack
/// recording which child was entered at each inner node, traversal can be
/// suspended after any number of emitted leaves and resumed later.
pub struct Bvh {
    nodes: Vec<BvhNode>,
}

impl Default for Bvh {
    fn default() -> Self {
        Bvh::build(&[])
    }
}

struct BuildItem {
    index: u32,
    /// The item's bounds collapsed over time; build decisions use this.
    union_bounds: BBox,
    centroid: [Float; 3],
}

impl Bvh {
    /// Builds over per-item motion-sampled bounds. Item i in `bounds`
    /// becomes leaf item i.
    pub fn build(bounds: &[TimeBox<BBox>]) -> Self {
        let mut items: Vec<BuildItem> = bounds
            .iter()
            .enumerate()
            .map(|(i, tb)| {
                let mut union_bounds = BBox::default();
                for sample in tb.samples() {
                    union_bounds.expand_by_bbox(sample);
                }
                let center = union_bounds.center();
                BuildItem {
                    index: i as u32,
                    union_bounds,
                    centroid: [center[0], center[1], center[2]],
                }
            })
            .collect();

        let mut bvh = Self { nodes: Vec::new() };
        if !items.is_empty() {
            let count = items.len();
            bvh.build_range(bounds, &mut items, 0, count);
            bvh.link_parents();
        }
        bvh
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: u32) -> NodeRef {
        match self.nodes[index as usize].kind {
            NodeKind::Inner { children, split_axis } => NodeRef::Inner { children, split_axis },
            NodeKind::Leaf { item } => NodeRef::Leaf { item },
        }
    }

    pub fn node_bounds(&self, index: u32) -> &TimeBox<BBox> {
        &self.nodes[index as usize].bounds
    }

    pub fn parent(&self, index: u32) -> u32 {
        self.nodes[index as usize].parent
    }

    /// The other child of this node's parent.
    pub fn sibling(&self, index: u32) -> u32 {
        let parent = self.parent(index);
        debug_assert!(parent != NO_NODE);
        match self.nodes[parent as usize].kind {
            NodeKind::Inner { children, .. } => {
                if children[0] == index {
                    children[1]
                } else {
                    children[0]
                }
            }
            NodeKind::Leaf { .. } => unreachable!("leaf nodes have no children"),
        }
    }

    /// The whole tree's motion-sampled bounds.
    pub fn bounds(&self) -> Option<&TimeBox<BBox>> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(&self.nodes[ROOT_NODE as usize].bounds)
        }
    }

    fn build_range(&mut self, bounds: &[TimeBox<BBox>],
                   items: &mut [BuildItem], start: usize, end: usize) -> u32 {
        let count = end - start;
        debug_assert!(count >= 1);

        if count == 1 {
            let item = items[start].index;
            let node_index = self.nodes.len() as u32;
            self.nodes.push(BvhNode {
                bounds: bounds[item as usize].clone(),
                parent: NO_NODE,
                kind: NodeKind::Leaf { item },
            });
            return node_index;
        }

        let mut centroid_bounds = BBox::default();
        for item in &items[start..end] {
            centroid_bounds.expand_by_point(&item.union_bounds.center());
        }
        let split_axis = centroid_bounds.max_extent();

        let mid = match self.sah_split(items, start, end, split_axis, &centroid_bounds) {
            Some(mid) => mid,
            None => median_split(items, start, end, split_axis),
        };

        // Placeholder so this node sits before its subtrees, then stitch.
        let node_index = self.nodes.len() as u32;
        self.nodes.push(BvhNode {
            bounds: TimeBox::from_single(BBox::default()),
            parent: NO_NODE,
            kind: NodeKind::Leaf { item: 0 },
        });

        let left = self.build_range(bounds, items, start, mid);
        let right = self.build_range(bounds, items, mid, end);

        let merged = merge_motion_bounds(
            &self.nodes[left as usize].bounds,
            &self.nodes[right as usize].bounds,
        );
        let node = &mut self.nodes[node_index as usize];
        node.bounds = merged;
        node.kind = NodeKind::Inner { children: [left, right], split_axis };

        node_index
    }

    /// Bucketed surface-area-heuristic split. Returns None when the
    /// centroids are too degenerate to partition.
    fn sah_split(&self, items: &mut [BuildItem], start: usize, end: usize,
                 axis: usize, centroid_bounds: &BBox) -> Option<usize> {
        let axis_min = centroid_bounds.min[axis];
        let axis_max = centroid_bounds.max[axis];
        if (axis_max - axis_min).abs() < 1e-6 {
            return None;
        }

        let bucket_of = |c: Float| -> usize {
            let b = ((c - axis_min) / (axis_max - axis_min) * SAH_BUCKETS as Float) as usize;
            b.min(SAH_BUCKETS - 1)
        };

        let mut buckets = [(0usize, BBox::default()); SAH_BUCKETS];
        let mut total_bounds = BBox::default();
        for item in &items[start..end] {
            let b = bucket_of(item.centroid[axis]);
            buckets[b].0 += 1;
            buckets[b].1.expand_by_bbox(&item.union_bounds);
            total_bounds.expand_by_bbox(&item.union_bounds);
        }

        let area = total_bounds.surface_area().max(1e-6);
        let mut best_split = 0;
        let mut best_cost = Float::MAX;
        for split in 0..SAH_BUCKETS - 1 {
            let mut b0 = BBox::default();
            let mut b1 = BBox::default();
            let mut count0 = 0usize;
            let mut count1 = 0usize;
            for b in 0..=split {
                count0 += buckets[b].0;
                b0.expand_by_bbox(&buckets[b].1);
            }
            for b in (split + 1)..SAH_BUCKETS {
                count1 += buckets[b].0;
                b1.expand_by_bbox(&buckets[b].1);
            }
            if count0 == 0 || count1 == 0 {
                continue;
            }
            let cost = 1.0
                + (count0 as Float * b0.surface_area() + count1 as Float * b1.surface_area())
                    / area;
            if cost < best_cost {
                best_cost = cost;
                best_split = split;
            }
        }
        if best_cost == Float::MAX {
            return None;
        }

        let mut mid = start;
        for i in start..end {
            if bucket_of(items[i].centroid[axis]) <= best_split {
                items.swap(i, mid);
                mid += 1;
            }
        }
        if mid == start || mid == end {
            return None;
        }
        Some(mid)
    }

    fn link_parents(&mut self) {
        for index in 0..self.nodes.len() {
            if let NodeKind::Inner { children, .. } = self.nodes[index].kind {
                self.nodes[children[0] as usize].parent = index as u32;
                self.nodes[children[1] as usize].parent = index as u32;
            }
        }
    }
}

fn median_split(items: &mut [BuildItem], start: usize, end: usize, axis: usize) -> usize {
    items[start..end].sort_unstable_by(|a, b| {
        a.centroid[axis]
            .partial_cmp(&b.centroid[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    start + (end - start) / 2
}

/// Unions two motion-sampled bounds, resampling the coarser one onto the
/// finer one's sample count.
fn merge_motion_bounds(a: &TimeBox<BBox>, b: &TimeBox<BBox>) -> TimeBox<BBox> {
    let count = a.len().max(b.len());
    if count <= 1 {
        let mut merged = *a.get(0);
        merged.expand_by_bbox(b.get(0));
        return TimeBox::from_single(merged);
    }

    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let t = i as Float / (count - 1) as Float;
        let mut merged = a.at_time(t);
        merged.expand_by_bbox(&b.at_time(t));
        samples.push(merged);
    }
    TimeBox::from_samples(samples)
}

/* Tests for BVH construction */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::constants::Vector3f;

    fn static_box(x: Float) -> TimeBox<BBox> {
        TimeBox::from_single(BBox::new(
            Vector3f::new(x, 0.0, 0.0),
            Vector3f::new(x + 1.0, 1.0, 1.0),
        ))
    }

    #[test]
    fn test_empty_build() {
        let bvh = Bvh::build(&[]);
        assert!(bvh.is_empty());
        assert!(bvh.bounds().is_none());
    }

    #[test]
    fn test_single_item_is_root_leaf() {
        let bvh = Bvh::build(&[static_box(0.0)]);
        assert!(!bvh.is_empty());
        match bvh.node(ROOT_NODE) {
            NodeRef::Leaf { item } => assert_eq!(item, 0),
            NodeRef::Inner { .. } => panic!("single item should build a leaf root"),
        }
        assert_eq!(bvh.parent(ROOT_NODE), NO_NODE);
    }

    #[test]
    fn test_every_item_has_a_leaf() {
        let boxes: Vec<_> = (0..16).map(|i| static_box(i as Float * 3.0)).collect();
        let bvh = Bvh::build(&boxes);

        let mut seen = vec![false; boxes.len()];
        let mut stack = vec![ROOT_NODE];
        while let Some(node) = stack.pop() {
            match bvh.node(node) {
                NodeRef::Inner { children, .. } => {
                    assert_eq!(bvh.parent(children[0]), node);
                    assert_eq!(bvh.parent(children[1]), node);
                    assert_eq!(bvh.sibling(children[0]), children[1]);
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
                NodeRef::Leaf { item } => {
                    assert!(!seen[item as usize]);
                    seen[item as usize] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_node_bounds_contain_children() {
        let boxes: Vec<_> = (0..9).map(|i| static_box(i as Float * 2.0)).collect();
        let bvh = Bvh::build(&boxes);

        let mut stack = vec![ROOT_NODE];
        while let Some(node) = stack.pop() {
            if let NodeRef::Inner { children, .. } = bvh.node(node) {
                let parent_bounds = bvh.node_bounds(node).at_time(0.0);
                for child in children {
                    let child_bounds = bvh.node_bounds(child).at_time(0.0);
                    assert!(parent_bounds.min[0] <= child_bounds.min[0] + 1e-5);
                    assert!(parent_bounds.max[0] >= child_bounds.max[0] - 1e-5);
                    stack.push(child);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_centroids_still_split() {
        // All items in the same spot: SAH degenerates, the median split
        // must still terminate with one item per leaf.
        let boxes: Vec<_> = (0..5).map(|_| static_box(0.0)).collect();
        let bvh = Bvh::build(&boxes);

        let mut leaves = 0;
        let mut stack = vec![ROOT_NODE];
        while let Some(node) = stack.pop() {
            match bvh.node(node) {
                NodeRef::Inner { children, .. } => {
                    stack.push(children[0]);
                    stack.push(children[1]);
                }
                NodeRef::Leaf { .. } => leaves += 1,
            }
        }
        assert_eq!(leaves, 5);
    }

    #[test]
    fn test_motion_bounds_merge_resamples() {
        let moving = TimeBox::from_samples(vec![
            BBox::new(Vector3f::new(0.0, 0.0, 0.0), Vector3f::new(1.0, 1.0, 1.0)),
            BBox::new(Vector3f::new(4.0, 0.0, 0.0), Vector3f::new(5.0, 1.0, 1.0)),
        ]);
        let still = static_box(10.0);
        let merged = merge_motion_bounds(&moving, &still);

        assert_eq!(merged.len(), 2);
        let mid = merged.at_time(0.5);
        assert!(mid.min[0] <= 2.0 + 1e-5);
        assert!(mid.max[0] >= 11.0 - 1e-5);
    }
}
