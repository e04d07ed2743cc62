//! Ray-query capability the synthesizer needs from a scene

use contracts::SensorId;

use crate::na::{Point3, Unit, Vector3};

/// Which geometry a query may hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    /// Layer bits; an object is eligible when `object.layers & mask != 0`
    pub mask: u32,
    /// Geometry tagged with this owner is invisible to the query
    pub exclude_owner: Option<SensorId>,
    /// Trigger-only volumes are skipped unless set
    pub include_triggers: bool,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            mask: u32::MAX,
            exclude_owner: None,
            include_triggers: false,
        }
    }
}

impl QueryFilter {
    pub fn new(mask: u32) -> Self {
        Self {
            mask,
            ..Default::default()
        }
    }

    pub fn excluding(mut self, owner: SensorId) -> Self {
        self.exclude_owner = Some(owner);
        self
    }

    /// Apply the filter to one object's tags
    pub fn admits(&self, layers: u32, trigger: bool, owner: Option<&SensorId>) -> bool {
        if layers & self.mask == 0 {
            return false;
        }
        if trigger && !self.include_triggers {
            return false;
        }
        match (owner, &self.exclude_owner) {
            (Some(owner), Some(excluded)) => owner != excluded,
            _ => true,
        }
    }
}

/// Closest intersection along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin (meters)
    pub distance: f32,
}

/// Scene ray intersection
///
/// Implementations must be callable from several threads at once when a
/// sensor casts its rays in parallel.
pub trait RayCastEnvironment: Send + Sync {
    /// Nearest hit within `max_distance`, or `None`.
    fn cast_ray(
        &self,
        origin: &Point3<f32>,
        direction: &Unit<Vector3<f32>>,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<RayHit>;
}

/// Environment with no geometry: every ray misses
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl RayCastEnvironment for EmptyEnvironment {
    fn cast_ray(
        &self,
        _origin: &Point3<f32>,
        _direction: &Unit<Vector3<f32>>,
        _max_distance: f32,
        _filter: &QueryFilter,
    ) -> Option<RayHit> {
        None
    }
}
