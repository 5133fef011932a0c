//! The trivial integrator contract: every entity owning a position and a
//! velocity advances by `position += velocity` once per tick. Order across
//! entities is irrelevant.

use crate::components::{Position, Velocity};
use crate::registry::Registry;

pub fn step(registry: &mut Registry) {
    registry.join2_mut(|_, position: &mut Position, velocity: &mut Velocity| {
        position.0 += velocity.0;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn test_step_adds_velocity_once() {
        let mut registry = Registry::new();
        let e = registry.spawn();
        registry.attach(e, Position(vec2(100.0, 100.0)));
        registry.attach(e, Velocity(vec2(3.0, -1.0)));
        let still = registry.spawn();
        registry.attach(still, Position(vec2(5.0, 5.0)));

        step(&mut registry);

        assert_eq!(registry.get::<Position>(e), Some(&Position(vec2(103.0, 99.0))));
        // No velocity, no motion.
        assert_eq!(registry.get::<Position>(still), Some(&Position(vec2(5.0, 5.0))));
    }
}
