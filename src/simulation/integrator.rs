use crate::{
    concurrency::{into_par_iter, par_iter_mut2, par_iter_mut3},
    error::SimulationError,
    floating_type_mod::FT,
    particles::ParticleVec,
};

use rayon::iter::ParallelIterator;

/// Advances velocities and positions with the forces of the last contact pass.
///
/// ```text
/// a_new     = force / mass
/// velocity += (a_old + a_new) * dt / 2
/// position += velocity * dt + a_old * dt^2 / 2
/// a_old     = a_new
/// ```
pub fn integrate(particles: &mut ParticleVec, dt: FT) {
    let ParticleVec {
        position,
        velocity,
        acceleration,
        force,
        mass,
        ..
    } = particles;
    let force = &*force;
    let mass = &*mass;

    par_iter_mut3(position, velocity, acceleration, |i, p_position, p_velocity, p_acceleration| {
        let a_new = force[i].load() / mass[i];
        *p_velocity += (*p_acceleration + a_new) * (dt * 0.5);
        *p_position += *p_velocity * dt + *p_acceleration * (0.5 * dt * dt);
        *p_acceleration = a_new;
    });
}

/// Reflects particles at the walls of the unit square. Each axis is handled on
/// its own, so a particle in a corner is clamped on both.
pub fn enforce_boundary(particles: &mut ParticleVec, bounce_coef: FT) {
    let ParticleVec {
        position,
        velocity,
        radius,
        ..
    } = particles;
    let radius = &*radius;

    par_iter_mut2(position, velocity, |i, p_position, p_velocity| {
        let r = radius[i];
        for d in 0..2 {
            if p_position[d] - r < 0. {
                p_position[d] = r;
                p_velocity[d] *= -bounce_coef;
            } else if p_position[d] + r > 1. {
                p_position[d] = 1. - r;
                p_velocity[d] *= -bounce_coef;
            }
        }
    });
}

/// Fails with the lowest particle index that has a non-finite position or velocity.
pub fn check_finite(particles: &ParticleVec, step: usize) -> Result<(), SimulationError> {
    let position = &particles.position;
    let velocity = &particles.velocity;

    let failed = into_par_iter(0..particles.len()).find_first(|&i| {
        !(position[i].iter().all(|x| x.is_finite()) && velocity[i].iter().all(|x| x.is_finite()))
    });

    match failed {
        None => Ok(()),
        Some(i) => Err(SimulationError::NumericalInstability {
            step,
            particle: i,
            position: position[i],
            velocity: velocity[i],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_finite, enforce_boundary, integrate};
    use crate::{
        error::SimulationError,
        floating_type_mod::FT,
        particles::{ParticleClass, ParticleVec},
        simulation::assert_ft_approx_eq,
        vec2f, V2,
    };

    fn single_particle(position: V2, velocity: V2, radius: FT) -> ParticleVec {
        let mut particles = ParticleVec::default(0);
        particles.push(position, radius, 100., ParticleClass::Small);
        particles.velocity[0] = velocity;
        particles
    }

    #[test]
    fn constant_force_matches_free_fall() {
        let mut particles = single_particle(vec2f(0.5, 0.9), vec2f(0., 0.), 0.001);
        let m = particles.mass[0];
        let g = -9.81;
        particles.force[0].set(vec2f(0., g * m));
        // acceleration from a previous step with the same force
        particles.acceleration[0] = vec2f(0., g);

        let dt = 1e-3;
        let steps = 100;
        for _ in 0..steps {
            integrate(&mut particles, dt);
        }

        let t = dt * steps as FT;
        assert_ft_approx_eq(particles.velocity[0].y, g * t, 1e-4, || "velocity".to_string());
        // the position update uses the already updated velocity, which adds g * dt * t
        assert_ft_approx_eq(
            particles.position[0].y,
            0.9 + 0.5 * g * t * t + g * dt * t,
            1e-4,
            || "position".to_string(),
        );
        assert_eq!(particles.position[0].x, 0.5);
        assert_eq!(particles.acceleration[0], vec2f(0., g));
    }

    #[test]
    fn first_step_uses_old_acceleration_for_the_position() {
        let mut particles = single_particle(vec2f(0.5, 0.5), vec2f(1., 0.), 0.001);
        let m = particles.mass[0];
        particles.force[0].set(vec2f(2. * m, 0.));

        let dt = 0.1;
        integrate(&mut particles, dt);

        // v = 1 + (0 + 2) * dt / 2 = 1.1, x = 0.5 + 1.1 * dt
        assert_ft_approx_eq(particles.velocity[0].x, 1.1, 1e-6, || "velocity".to_string());
        assert_ft_approx_eq(particles.position[0].x, 0.61, 1e-6, || "position".to_string());
        assert_ft_approx_eq(particles.acceleration[0].x, 2., 1e-6, || "acceleration".to_string());
    }

    #[test]
    fn boundary_clamps_and_bounces_each_axis() {
        let mut particles = ParticleVec::default(0);
        particles.push(vec2f(-0.01, 1.02), 0.05, 1., ParticleClass::Small);
        particles.push(vec2f(0.5, 0.02), 0.05, 1., ParticleClass::Small);
        particles.push(vec2f(0.5, 0.5), 0.05, 1., ParticleClass::Small);
        particles.velocity[0] = vec2f(-1., 2.);
        particles.velocity[1] = vec2f(0.3, -1.);
        particles.velocity[2] = vec2f(0.3, -1.);

        enforce_boundary(&mut particles, 0.3);

        // corner: both axes clamped
        assert_eq!(particles.position[0].x, 0.05);
        assert_ft_approx_eq(particles.position[0].y, 0.95, 1e-6, || "corner y".to_string());
        assert_ft_approx_eq(particles.velocity[0].x, 0.3, 1e-6, || "corner vx".to_string());
        assert_ft_approx_eq(particles.velocity[0].y, -0.6, 1e-6, || "corner vy".to_string());

        // floor only
        assert_eq!(particles.position[1], vec2f(0.5, 0.05));
        assert_eq!(particles.velocity[1].x, 0.3);
        assert_ft_approx_eq(particles.velocity[1].y, 0.3, 1e-6, || "floor vy".to_string());

        // untouched
        assert_eq!(particles.position[2], vec2f(0.5, 0.5));
        assert_eq!(particles.velocity[2], vec2f(0.3, -1.));
    }

    #[test]
    fn non_finite_state_is_reported() {
        let mut particles = ParticleVec::default(0);
        particles.push(vec2f(0.2, 0.2), 0.01, 1., ParticleClass::Small);
        particles.push(vec2f(0.4, 0.4), 0.01, 1., ParticleClass::Small);
        particles.push(vec2f(0.6, 0.6), 0.01, 1., ParticleClass::Small);
        assert_eq!(check_finite(&particles, 3), Ok(()));

        particles.velocity[2] = vec2f(FT::INFINITY, 0.);
        particles.position[1] = vec2f(0.4, FT::NAN);
        match check_finite(&particles, 3) {
            Err(SimulationError::NumericalInstability { step, particle, .. }) => {
                assert_eq!(step, 3);
                assert_eq!(particle, 1);
            }
            other => panic!("expected numerical instability, got {:?}", other),
        }
    }
}
