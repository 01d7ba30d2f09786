//! Per-type instance storage, the hand-off point to an instanced renderer.

use glam::DVec3;

use crate::transform::InstanceTransform;

/// All placed instances of one foliage type.
#[derive(Clone, Debug)]
pub struct InstanceBuffer {
    type_name: String,
    asset: String,
    instances: Vec<InstanceTransform>,
    batches: u64,
}

impl InstanceBuffer {
    pub fn new(type_name: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            asset: asset.into(),
            instances: Vec::new(),
            batches: 0,
        }
    }

    /// Appends a whole batch at once. Empty batches are ignored.
    ///
    /// Returns the number of instances added.
    pub fn add_instances(&mut self, batch: Vec<InstanceTransform>) -> usize {
        if batch.is_empty() {
            return 0;
        }
        let added = batch.len();
        self.instances.extend(batch);
        self.batches += 1;
        added
    }

    /// Removes every instance whose translation lies within `radius` of `center`.
    ///
    /// Returns the number removed.
    pub fn remove_within(&mut self, center: DVec3, radius: f64) -> usize {
        let before = self.instances.len();
        self.instances
            .retain(|instance| instance.translation.distance(center) > radius);
        before - self.instances.len()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    pub fn instances(&self) -> &[InstanceTransform] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Number of non-empty batches appended so far.
    pub fn batch_count(&self) -> u64 {
        self.batches
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }
}

#[cfg(test)]
mod tests {
    use glam::DQuat;

    use super::*;

    fn at(x: f64) -> InstanceTransform {
        InstanceTransform {
            translation: DVec3::new(x, 0.0, 0.0),
            rotation: DQuat::IDENTITY,
            scale: 1.0,
        }
    }

    #[test]
    fn test_batches_append_in_bulk() {
        let mut buffer = InstanceBuffer::new("Tree", "meshes/tree");
        assert_eq!(buffer.add_instances(vec![at(0.0), at(1.0), at(2.0)]), 3);
        assert_eq!(buffer.add_instances(Vec::new()), 0);
        assert_eq!(buffer.add_instances(vec![at(3.0)]), 1);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.batch_count(), 2);
        assert_eq!(buffer.instances()[3], at(3.0));
    }

    #[test]
    fn test_remove_within_radius() {
        let mut buffer = InstanceBuffer::new("Bush", "meshes/bush");
        buffer.add_instances((0..10).map(|i| at(i as f64 * 10.0)).collect());
        assert_eq!(buffer.remove_within(DVec3::new(20.0, 0.0, 0.0), 10.0), 3);
        let remaining: Vec<f64> = buffer.instances().iter().map(|t| t.translation.x).collect();
        assert_eq!(remaining, vec![0.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.type_name(), "Bush");
        assert_eq!(buffer.asset(), "meshes/bush");
    }
}
