//! Primitive-shape scene backed by parry3d

use std::f32::consts::FRAC_PI_2;

use contracts::{ContractError, ObstacleConfig, SceneConfig, SensorId, ShapeConfig, Transform};
use parry3d::query::{Ray, RayCast};
use parry3d::shape::SharedShape;

use crate::environment::{QueryFilter, RayCastEnvironment, RayHit};
use crate::na::{Isometry3, Point3, Translation3, Unit, UnitQuaternion, Vector3};

/// Convert a config transform (meters, degrees) into a pose
pub fn pose_from_transform(transform: &Transform) -> Isometry3<f32> {
    let loc = transform.location;
    let rot = transform.rotation;
    let rotation = UnitQuaternion::from_euler_angles(
        rot.roll.to_radians() as f32,
        rot.pitch.to_radians() as f32,
        rot.yaw.to_radians() as f32,
    );
    Isometry3::from_parts(
        Translation3::new(loc.x as f32, loc.y as f32, loc.z as f32),
        rotation,
    )
}

/// One collidable object
#[derive(Clone)]
pub struct SceneObject {
    pub id: String,
    pub shape: SharedShape,
    pub pose: Isometry3<f32>,
    pub layers: u32,
    pub trigger: bool,
    pub owner: Option<SensorId>,
}

impl SceneObject {
    pub fn new(id: impl Into<String>, shape: SharedShape, pose: Isometry3<f32>) -> Self {
        Self {
            id: id.into(),
            shape,
            pose,
            layers: 1,
            trigger: false,
            owner: None,
        }
    }

    pub fn with_layers(mut self, layers: u32) -> Self {
        self.layers = layers;
        self
    }

    pub fn as_trigger(mut self) -> Self {
        self.trigger = true;
        self
    }

    pub fn owned_by(mut self, owner: SensorId) -> Self {
        self.owner = Some(owner);
        self
    }

    fn from_config(index: usize, config: &ObstacleConfig) -> Result<Self, ContractError> {
        let field = || format!("scene.obstacles[{index}].shape");
        let mut pose = pose_from_transform(&config.transform);

        let shape = match config.shape {
            ShapeConfig::Box { half_extents: [x, y, z] } => {
                if !(x > 0.0 && y > 0.0 && z > 0.0) {
                    return Err(ContractError::config_validation(
                        field(),
                        "box half extents must be positive",
                    ));
                }
                SharedShape::cuboid(x, y, z)
            }
            ShapeConfig::Ball { radius } => {
                if !(radius > 0.0) {
                    return Err(ContractError::config_validation(
                        field(),
                        "ball radius must be positive",
                    ));
                }
                SharedShape::ball(radius)
            }
            ShapeConfig::Cylinder {
                half_height,
                radius,
            } => {
                if !(half_height > 0.0 && radius > 0.0) {
                    return Err(ContractError::config_validation(
                        field(),
                        "cylinder dimensions must be positive",
                    ));
                }
                // parry cylinders run along Y
                pose *= UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
                SharedShape::cylinder(half_height, radius)
            }
            ShapeConfig::Plane { normal: [x, y, z] } => {
                let normal = Unit::try_new(Vector3::new(x, y, z), 1e-6).ok_or_else(|| {
                    ContractError::config_validation(field(), "plane normal must be non-zero")
                })?;
                SharedShape::halfspace(normal)
            }
        };

        Ok(Self {
            id: config.id.clone(),
            shape,
            pose,
            layers: config.layers,
            trigger: config.trigger,
            owner: config.owner.as_deref().map(SensorId::from),
        })
    }
}

impl std::fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObject")
            .field("id", &self.id)
            .field("shape", &self.shape.shape_type())
            .field("pose", &self.pose)
            .field("layers", &self.layers)
            .field("trigger", &self.trigger)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Flat list of primitives, queried by brute force
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SceneConfig) -> Result<Self, ContractError> {
        let objects = config
            .obstacles
            .iter()
            .enumerate()
            .map(|(index, obstacle)| SceneObject::from_config(index, obstacle))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { objects })
    }

    pub fn push(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn with_object(mut self, object: SceneObject) -> Self {
        self.push(object);
        self
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl RayCastEnvironment for Scene {
    fn cast_ray(
        &self,
        origin: &Point3<f32>,
        direction: &Unit<Vector3<f32>>,
        max_distance: f32,
        filter: &QueryFilter,
    ) -> Option<RayHit> {
        let ray = Ray::new(*origin, direction.into_inner());
        self.objects
            .iter()
            .filter(|object| filter.admits(object.layers, object.trigger, object.owner.as_ref()))
            .filter_map(|object| object.shape.cast_ray(&object.pose, &ray, max_distance, true))
            .min_by(f32::total_cmp)
            .map(|distance| RayHit { distance })
    }
}
