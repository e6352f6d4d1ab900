// Copyright @yucwang 2026

use super::bvh::{Bvh, NodeRef, ROOT_NODE};
use super::light::{Light, LightArray};
use super::primitive::Primitive;
use crate::math::aabb::BBox;
use crate::math::bitstack::BitStack;
use crate::math::constants::Float;
use crate::math::ray::{Ray, WorldRay};
use crate::math::timebox::{lerp_slice, TimeBox};
use crate::math::transform::Transform;

use std::collections::HashMap;
use std::sync::Arc;

/// Deepest assembly nesting traversal will walk into.
pub const MAX_TRAV_DEPTH: usize = 8;

#[derive(Debug)]
pub enum AssemblyError {
    UnknownName(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstanceType {
    Object,
    Assembly,
}

/// A placement of an object or sub-assembly. Instances reference by index
/// and own no geometry; their transforms live in the assembly's flat
/// transform array, `transform_count` samples starting at
/// `transform_index` (zero samples means untransformed).
///
/// An instance's transforms carry parent space into the instanced thing's
/// local space.
#[derive(Debug, Copy, Clone)]
pub struct Instance {
    pub kind: InstanceType,
    pub data_index: usize,
    pub transform_index: usize,
    pub transform_count: usize,
}

/// A self-contained set of geometry, lights, and the instances that place
/// them. Objects inside an assembly have no transform hierarchy between
/// them; every instance stands alone.
#[derive(Default)]
pub struct Assembly {
    pub instances: Vec<Instance>,
    pub xforms: Vec<Transform>,

    pub objects: Vec<Box<dyn Primitive>>,
    object_map: HashMap<String, usize>,

    pub assemblies: Vec<Assembly>,
    assembly_map: HashMap<String, usize>,

    lights: Vec<Arc<dyn Light>>,

    pub object_accel: Bvh,
    pub light_accel: LightArray,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object under a name. The object only renders once it
    /// is instanced with `create_object_instance`.
    pub fn add_object(&mut self, name: &str, object: Box<dyn Primitive>) {
        self.objects.push(object);
        self.object_map.insert(name.to_string(), self.objects.len() - 1);
    }

    /// Registers a sub-assembly under a name; render it by instancing it
    /// with `create_assembly_instance`.
    pub fn add_assembly(&mut self, name: &str, assembly: Assembly) {
        self.assemblies.push(assembly);
        self.assembly_map.insert(name.to_string(), self.assemblies.len() - 1);
    }

    pub fn add_light(&mut self, light: Arc<dyn Light>) {
        self.lights.push(light);
    }

    pub fn create_object_instance(&mut self, name: &str,
                                  transforms: &[Transform]) -> Result<(), AssemblyError> {
        let data_index = *self
            .object_map
            .get(name)
            .ok_or_else(|| AssemblyError::UnknownName(name.to_string()))?;
        self.push_instance(InstanceType::Object, data_index, transforms);
        Ok(())
    }

    pub fn create_assembly_instance(&mut self, name: &str,
                                    transforms: &[Transform]) -> Result<(), AssemblyError> {
        let data_index = *self
            .assembly_map
            .get(name)
            .ok_or_else(|| AssemblyError::UnknownName(name.to_string()))?;
        self.push_instance(InstanceType::Assembly, data_index, transforms);
        Ok(())
    }

    fn push_instance(&mut self, kind: InstanceType, data_index: usize,
                     transforms: &[Transform]) {
        self.instances.push(Instance {
            kind,
            data_index,
            transform_index: self.xforms.len(),
            transform_count: transforms.len(),
        });
        self.xforms.extend_from_slice(transforms);
    }

    /// Prepares the assembly for rendering: finalizes sub-assemblies,
    /// then builds the acceleration structures over the instances.
    pub fn finalize(&mut self) {
        self.object_map.clear();
        self.assembly_map.clear();

        for assembly in &mut self.assemblies {
            assembly.finalize();
        }

        let instance_bounds: Vec<TimeBox<BBox>> = (0..self.instances.len())
            .map(|index| self.instance_bounds(index))
            .collect();
        self.object_accel = Bvh::build(&instance_bounds);
        self.light_accel = LightArray::build(self.lights.clone());
    }

    /// Bits needed to number this assembly's instances.
    pub fn element_id_bits(&self) -> u32 {
        let count = self.instances.len();
        if count <= 1 {
            0
        } else {
            64 - ((count - 1) as u64).leading_zeros()
        }
    }

    /// An instance's bounds lifted into this assembly's space.
    ///
    /// When the source bounds and the instance transforms disagree on
    /// sample count, the finer sequence keeps its sampling and the coarser
    /// one is interpolated onto it; transforms are applied after that
    /// resampling.
    pub fn instance_bounds(&self, index: usize) -> TimeBox<BBox> {
        let instance = &self.instances[index];

        let mut samples: Vec<BBox> = match instance.kind {
            InstanceType::Object => self.objects[instance.data_index]
                .bounds()
                .samples()
                .to_vec(),
            InstanceType::Assembly => {
                match self.assemblies[instance.data_index].object_accel.bounds() {
                    Some(bounds) => bounds.samples().to_vec(),
                    None => vec![BBox::default()],
                }
            }
        };

        let count = instance.transform_count;
        if count > 0 {
            let xforms = &self.xforms
                [instance.transform_index..instance.transform_index + count];

            if samples.len() == count {
                for (bbox, xform) in samples.iter_mut().zip(xforms) {
                    *bbox = bbox.inverse_transformed(xform);
                }
            } else if samples.len() > count {
                let scale = (samples.len() - 1) as Float;
                for (i, bbox) in samples.iter_mut().enumerate() {
                    let xform = lerp_slice(xforms, i as Float / scale);
                    *bbox = bbox.inverse_transformed(&xform);
                }
            } else {
                let scale = (count - 1) as Float;
                let resampled: Vec<BBox> = xforms
                    .iter()
                    .enumerate()
                    .map(|(i, xform)| {
                        lerp_slice(&samples, i as Float / scale).inverse_transformed(xform)
                    })
                    .collect();
                samples = resampled;
            }
        }

        TimeBox::from_samples(samples)
    }

    /// Walks an encoded element id back to its primitive, composing the
    /// instance transforms along the path at the given time. Returns None
    /// when the transform chain places the primitive in this assembly's
    /// own space.
    pub fn resolve(&self, id: u64, time: Float) -> Option<(&dyn Primitive, Option<Transform>)> {
        let mut assembly = self;
        let mut remaining = id;
        let mut acc: Option<Transform> = None;

        loop {
            let bits = assembly.element_id_bits();
            let mask = if bits == 0 { 0 } else { (1u64 << bits) - 1 };
            let index = (remaining & mask) as usize;
            let instance = assembly.instances.get(index)?;

            if instance.transform_count > 0 {
                let xforms = &assembly.xforms[instance.transform_index
                    ..instance.transform_index + instance.transform_count];
                let xform = lerp_slice(xforms, time);
                acc = Some(match acc {
                    None => xform,
                    Some(prev) => prev.then(&xform),
                });
            }

            match instance.kind {
                InstanceType::Object => {
                    return Some((assembly.objects[instance.data_index].as_ref(), acc));
                }
                InstanceType::Assembly => {
                    remaining >>= bits;
                    assembly = &assembly.assemblies[instance.data_index];
                }
            }
        }
    }

    /// Continues this ray's hierarchy traversal, writing up to `out.len()`
    /// candidate element ids.
    ///
    /// Descent decisions live on the ray's bit stack and the cursor in
    /// `state`, so the call can stop after filling `out` and pick up where
    /// it left off next time. A return of zero means the hierarchy is
    /// exhausted and the ray is inactive. `t_max` caps the slab tests at
    /// the caller's current closest hit.
    pub fn get_potential_intersections(&self, wray: &WorldRay, ray: &mut Ray,
                                       t_max: Float, out: &mut [u64],
                                       state: &mut TraversalState) -> usize {
        match state.phase {
            TravPhase::Done => return 0,
            TravPhase::Fresh => {
                if self.object_accel.is_empty() {
                    state.phase = TravPhase::Done;
                    return 0;
                }
                state.levels[0] = LevelState { node: ROOT_NODE, instance: 0 };
                state.depth = 1;
                state.phase = TravPhase::Active;
                ray.trav_stack.clear();
            }
            TravPhase::Active => {}
        }

        // Rebuild the per-level scratch the saved cursor implies: the
        // assembly chain and the ray lowered into each level's space.
        let mut asms: [Option<&Assembly>; MAX_TRAV_DEPTH] = [None; MAX_TRAV_DEPTH];
        let mut wrays = [*wray; MAX_TRAV_DEPTH];
        let mut lrays = [*ray; MAX_TRAV_DEPTH];
        asms[0] = Some(self);
        for level in 1..state.depth as usize {
            let parent = asms[level - 1].unwrap();
            let instance = &parent.instances[state.levels[level].instance as usize];
            let child = &parent.assemblies[instance.data_index];
            asms[level] = Some(child);
            enter_level(parent, instance, level, ray, &mut wrays, &mut lrays);
        }

        let max_out = out.len();
        let mut count = 0;

        loop {
            let level = state.depth as usize - 1;
            let assembly = asms[level].unwrap();
            let bvh = &assembly.object_accel;
            let node = state.levels[level].node;
            let lray = &lrays[level];

            let bounds = bvh.node_bounds(node).at_time(lray.time);
            if bounds.intersect_ray(lray, t_max).is_none() {
                if !ascend(state, &mut ray.trav_stack, &asms) {
                    state.phase = TravPhase::Done;
                    break;
                }
                continue;
            }

            match bvh.node(node) {
                NodeRef::Inner { children, split_axis } => {
                    // Near child first, judged by the ray's sign on the
                    // split axis.
                    let near = children[lray.d_sign[split_axis]];
                    ray.trav_stack.push(false);
                    state.levels[level].node = near;
                }
                NodeRef::Leaf { item } => {
                    let instance = &assembly.instances[item as usize];
                    match instance.kind {
                        InstanceType::Object => {
                            out[count] = encode_id(state, &asms, item);
                            count += 1;
                            if !ascend(state, &mut ray.trav_stack, &asms) {
                                state.phase = TravPhase::Done;
                                break;
                            }
                            if count == max_out {
                                break;
                            }
                        }
                        InstanceType::Assembly => {
                            let child = &assembly.assemblies[instance.data_index];
                            let can_open = (state.depth as usize) < MAX_TRAV_DEPTH
                                && !child.object_accel.is_empty();
                            if can_open {
                                let new_level = state.depth as usize;
                                asms[new_level] = Some(child);
                                state.levels[new_level] =
                                    LevelState { node: ROOT_NODE, instance: item };
                                enter_level(assembly, instance, new_level, ray,
                                            &mut wrays, &mut lrays);
                                state.depth += 1;
                            } else if !ascend(state, &mut ray.trav_stack, &asms) {
                                state.phase = TravPhase::Done;
                                break;
                            }
                        }
                    }
                }
            }
        }

        count
    }
}

/// Lowers the parent level's ray into an instanced child assembly's space.
fn enter_level(parent: &Assembly, instance: &Instance, level: usize, proto: &Ray,
               wrays: &mut [WorldRay; MAX_TRAV_DEPTH], lrays: &mut [Ray; MAX_TRAV_DEPTH]) {
    if instance.transform_count > 0 {
        let xforms = &parent.xforms
            [instance.transform_index..instance.transform_index + instance.transform_count];
        let xform = lerp_slice(xforms, proto.time);
        wrays[level] = wrays[level - 1].transformed(&xform);
        lrays[level] = wrays[level].to_local_ray(proto);
    } else {
        wrays[level] = wrays[level - 1];
        lrays[level] = lrays[level - 1];
    }
}

/// Climbs toward the next unvisited far sibling, popping the descent bits
/// recorded on the way down. Returns false once the whole hierarchy is
/// exhausted.
fn ascend(state: &mut TraversalState, stack: &mut BitStack,
          asms: &[Option<&Assembly>; MAX_TRAV_DEPTH]) -> bool {
    loop {
        let level = state.depth as usize - 1;
        let bvh = &asms[level].unwrap().object_accel;
        let node = state.levels[level].node;

        if node == ROOT_NODE {
            if level == 0 {
                return false;
            }
            // This sub-assembly is finished; keep climbing in the parent
            // from the instance leaf that opened it.
            state.depth -= 1;
            continue;
        }

        let was_far_child = stack.pop();
        if !was_far_child {
            stack.push(true);
            state.levels[level].node = bvh.sibling(node);
            return true;
        }
        state.levels[level].node = bvh.parent(node);
    }
}

/// Builds the hierarchical element id for the current leaf: each level
/// contributes its instance index, the root in the lowest bits.
fn encode_id(state: &TraversalState, asms: &[Option<&Assembly>; MAX_TRAV_DEPTH],
             leaf_item: u32) -> u64 {
    let depth = state.depth as usize;
    let mut id: u64 = 0;
    let mut shift = 0u32;
    for level in 0..depth {
        let index = if level == depth - 1 {
            leaf_item
        } else {
            state.levels[level + 1].instance
        };
        id |= (index as u64) << shift;
        shift += asms[level].unwrap().element_id_bits();
    }
    id
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum TravPhase {
    Fresh,
    Active,
    Done,
}

#[derive(Debug, Copy, Clone, Default)]
struct LevelState {
    node: u32,
    instance: u32,
}

/// Saved traversal cursor for one ray: which node to visit next at each
/// open assembly level. The matching descent history lives in the ray's
/// bit stack.
#[derive(Debug, Copy, Clone)]
pub struct TraversalState {
    levels: [LevelState; MAX_TRAV_DEPTH],
    depth: u8,
    phase: TravPhase,
}

impl Default for TraversalState {
    fn default() -> Self {
        Self {
            levels: [LevelState::default(); MAX_TRAV_DEPTH],
            depth: 0,
            phase: TravPhase::Fresh,
        }
    }
}

impl TraversalState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_done(&self) -> bool {
        self.phase == TravPhase::Done
    }
}

/* Tests for assemblies and resumable traversal */
