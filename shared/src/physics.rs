//! Fixed-step 2D physics: AABB bodies against the static tile geometry.
//!
//! The simulation treats this as a black-box stepper with one contract:
//! given the same bodies and the same fixed step duration, `step`
//! produces bit-identical results. Everything here iterates bodies in
//! ascending id order so no outcome depends on map iteration accidents.

use crate::entity::EntityId;
use crate::map::TileMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Sub};

/// A vector in 2D space, in meters. Positive x is right, positive y is
/// down (tile row order).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    /// The unit vector in this direction, or zero for the zero vector.
    pub fn normalized(&self) -> Vec2 {
        let length = self.length();
        if length == 0.0 {
            Vec2::ZERO
        } else {
            self.scale(1.0 / length)
        }
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        (other - *self).length()
    }

    pub fn approx_eq(&self, other: Vec2, tolerance: f32) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

/// An axis-aligned box described by its corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max).scale(0.5)
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        !(self.max.x <= other.min.x
            || self.min.x >= other.max.x
            || self.max.y <= other.min.y
            || self.min.y >= other.max.y)
    }
}

/// A dynamic square body owned by one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub id: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Half the side length of the collision box.
    pub half: f32,
}

impl Body {
    pub fn aabb(&self) -> Aabb {
        Aabb::new(
            Vec2::new(self.position.x - self.half, self.position.y - self.half),
            Vec2::new(self.position.x + self.half, self.position.y + self.half),
        )
    }
}

/// Ray/box intersection via the slab method. Returns the entry distance
/// (clamped to 0 when the origin starts inside), or None on a miss or a
/// box entirely behind the origin. `dir` must be a unit vector.
fn ray_aabb(origin: Vec2, dir: Vec2, aabb: &Aabb) -> Option<f32> {
    let mut t_enter = 0.0f32;
    let mut t_exit = f32::INFINITY;

    for (o, d, min, max) in [
        (origin.x, dir.x, aabb.min.x, aabb.max.x),
        (origin.y, dir.y, aabb.min.y, aabb.max.y),
    ] {
        if d.abs() < 1e-8 {
            if o < min || o > max {
                return None;
            }
        } else {
            let ta = (min - o) / d;
            let tb = (max - o) / d;
            t_enter = t_enter.max(ta.min(tb));
            t_exit = t_exit.min(ta.max(tb));
        }
    }

    if t_enter <= t_exit {
        Some(t_enter)
    } else {
        None
    }
}

/// All dynamic bodies plus the immutable tile geometry of one map.
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    bodies: BTreeMap<EntityId, Body>,
    statics: Vec<Aabb>,
    bounds: Aabb,
}

impl PhysicsWorld {
    /// Builds the static geometry: one collider per wall tile plus the
    /// outer map bounds.
    pub fn from_map(map: &TileMap) -> Self {
        Self {
            bodies: BTreeMap::new(),
            statics: map.wall_tiles().collect(),
            bounds: map.bounds(),
        }
    }

    pub fn insert_body(&mut self, id: EntityId, position: Vec2, half: f32) {
        self.bodies.insert(
            id,
            Body {
                id,
                position,
                velocity: Vec2::ZERO,
                half,
            },
        );
    }

    pub fn remove_body(&mut self, id: EntityId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.bodies.contains_key(&id)
    }

    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    pub fn body_mut(&mut self, id: EntityId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Body ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.bodies.keys().copied()
    }

    /// Bodies in ascending id order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.values()
    }

    /// Moves a body without integrating, used when restoring snapshots.
    pub fn teleport(&mut self, id: EntityId, position: Vec2, velocity: Vec2) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.position = position;
                body.velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// Advances every body by exactly one fixed step: integrate, resolve
    /// against wall tiles along the axis of least penetration, clamp to
    /// the map bounds. Bodies do not collide with each other.
    pub fn step(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            body.position = body.position + body.velocity.scale(dt);

            for collider in &self.statics {
                let aabb = body.aabb();
                if !aabb.intersects(collider) {
                    continue;
                }

                let overlap_x =
                    aabb.max.x.min(collider.max.x) - aabb.min.x.max(collider.min.x);
                let overlap_y =
                    aabb.max.y.min(collider.max.y) - aabb.min.y.max(collider.min.y);

                if overlap_x < overlap_y {
                    if body.position.x < collider.center().x {
                        body.position.x = collider.min.x - body.half;
                    } else {
                        body.position.x = collider.max.x + body.half;
                    }
                    body.velocity.x = 0.0;
                } else {
                    if body.position.y < collider.center().y {
                        body.position.y = collider.min.y - body.half;
                    } else {
                        body.position.y = collider.max.y + body.half;
                    }
                    body.velocity.y = 0.0;
                }
            }

            let clamped_x = body
                .position
                .x
                .clamp(self.bounds.min.x + body.half, self.bounds.max.x - body.half);
            if clamped_x != body.position.x {
                body.position.x = clamped_x;
                body.velocity.x = 0.0;
            }
            let clamped_y = body
                .position
                .y
                .clamp(self.bounds.min.y + body.half, self.bounds.max.y - body.half);
            if clamped_y != body.position.y {
                body.position.y = clamped_y;
                body.velocity.y = 0.0;
            }
        }
    }

    /// Casts a ray from `origin` along `dir` out to the map boundary and
    /// returns the first body accepted by `filter` that it hits. Bodies
    /// are scanned in ascending id order with a strict nearest-distance
    /// comparison, so exact distance ties resolve to the lowest id.
    pub fn raycast_first<F>(&self, origin: Vec2, dir: Vec2, filter: F) -> Option<EntityId>
    where
        F: Fn(EntityId) -> bool,
    {
        let dir = dir.normalized();
        if dir == Vec2::ZERO {
            return None;
        }

        // Distance to the boundary: the exit of the bounds box.
        let t_max = {
            let mut t_exit = f32::INFINITY;
            for (o, d, min, max) in [
                (origin.x, dir.x, self.bounds.min.x, self.bounds.max.x),
                (origin.y, dir.y, self.bounds.min.y, self.bounds.max.y),
            ] {
                if d.abs() >= 1e-8 {
                    let ta = (min - o) / d;
                    let tb = (max - o) / d;
                    t_exit = t_exit.min(ta.max(tb));
                }
            }
            t_exit
        };

        let mut nearest: Option<(f32, EntityId)> = None;
        for body in self.bodies.values() {
            if !filter(body.id) {
                continue;
            }
            if let Some(t) = ray_aabb(origin, dir, &body.aabb()) {
                if t <= t_max && nearest.map_or(true, |(best, _)| t < best) {
                    nearest = Some((t, body.id));
                }
            }
        }
        nearest.map(|(_, id)| id)
    }
}
