use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigurationError,
    floating_type_mod::FT,
    particles::{ParticleClass, ParticleVec},
    simulation_parameters::SimulationParams,
    vec2f,
};

const JITTER_FRACTION: FT = 0.2;

/// Initial layout of a granular column with a few large bodies dropped on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub num_small: usize,
    pub num_large: usize,

    pub small_radius_min: FT,
    pub small_radius_max: FT,
    pub large_radius: FT,

    /// distance between neighbouring small grains at spawn time
    pub spawn_spacing: FT,
    /// horizontal margin left free on both sides of the small grains
    pub spawn_padding: FT,
    /// height of the lowest row of small grains
    pub spawn_height: FT,
    pub large_spawn_height: FT,

    #[serde(default)]
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            num_small: 128 * 64,
            num_large: 4,
            small_radius_min: 0.002,
            small_radius_max: 0.003,
            large_radius: 0.099,
            spawn_spacing: 1. / 128.,
            spawn_padding: 0.1,
            spawn_height: 0.15,
            large_spawn_height: 0.9,
            seed: 0,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self, params: &SimulationParams) -> Result<(), ConfigurationError> {
        let invalid = |name: &'static str, reason: String| Err(ConfigurationError::InvalidParameter { name, reason });

        if !(self.small_radius_min > 0.) {
            return invalid("small_radius_min", format!("{} is not positive", self.small_radius_min));
        }
        if !(self.small_radius_max >= self.small_radius_min) {
            return invalid(
                "small_radius_max",
                format!("{} is below small_radius_min {}", self.small_radius_max, self.small_radius_min),
            );
        }
        let cell_size = params.cell_size();
        if 2. * self.small_radius_max >= cell_size {
            return invalid(
                "small_radius_max",
                format!(
                    "diameter {} does not fit into a grid cell of size {}",
                    2. * self.small_radius_max,
                    cell_size
                ),
            );
        }
        if self.num_large > 0 && !(self.large_radius >= self.small_radius_max) {
            return invalid(
                "large_radius",
                format!("{} is below small_radius_max {}", self.large_radius, self.small_radius_max),
            );
        }
        if self.num_large > 0 && 2. * self.large_radius * self.num_large as FT > 1. {
            return invalid(
                "num_large",
                format!("{} large bodies of radius {} do not fit side by side", self.num_large, self.large_radius),
            );
        }
        // the horizontal jitter can eat up to JITTER_FRACTION of the gap
        if !((1. - JITTER_FRACTION) * self.spawn_spacing > 2. * self.small_radius_max) {
            return invalid(
                "spawn_spacing",
                format!("{} lets neighbouring grains overlap", self.spawn_spacing),
            );
        }
        if !(self.spawn_padding >= 0. && self.spawn_padding < 0.5) {
            return invalid("spawn_padding", format!("{} is outside [0, 0.5)", self.spawn_padding));
        }
        if !(self.spawn_height >= self.small_radius_max) {
            return invalid(
                "spawn_height",
                format!("{} puts the lowest row below the floor", self.spawn_height),
            );
        }

        if self.num_small > 0 {
            let top = self.spawn_height
                + (self.num_rows() - 1) as FT * self.spawn_spacing
                + self.small_radius_max;
            if top > 1. {
                return invalid(
                    "num_small",
                    format!("{} grains in {} rows reach up to y={}", self.num_small, self.num_rows(), top),
                );
            }
            if self.num_large > 0 && !(top < self.large_spawn_height - self.large_radius) {
                return invalid(
                    "large_spawn_height",
                    format!(
                        "large bodies at {} overlap the small grains reaching up to y={}",
                        self.large_spawn_height, top
                    ),
                );
            }
        }
        if self.num_large > 0
            && !(self.large_spawn_height - self.large_radius >= 0. && self.large_spawn_height + self.large_radius <= 1.)
        {
            return invalid(
                "large_spawn_height",
                format!("{} puts the large bodies outside the domain", self.large_spawn_height),
            );
        }
        Ok(())
    }

    fn grains_per_row(&self) -> usize {
        let region_width = 1. - 2. * self.spawn_padding;
        ((region_width / self.spawn_spacing).floor() as usize).max(1)
    }

    fn num_rows(&self) -> usize {
        (self.num_small + self.grains_per_row() - 1) / self.grains_per_row()
    }
}

/// Places the small grains row by row inside the padded region, then the large
/// bodies side by side with equal gaps. Small grains get the lower indices.
pub fn init_granular_scene(scene: &SceneConfig, params: &SimulationParams) -> Result<ParticleVec, ConfigurationError> {
    scene.validate(params)?;

    let mut rng = StdRng::seed_from_u64(scene.seed);
    let mut particles = ParticleVec::default(0);

    let spacing = scene.spawn_spacing;
    let per_row = scene.grains_per_row();

    for i in 0..scene.num_small {
        let row = i / per_row;
        let column = i % per_row;
        let jitter = spacing * rng.gen::<FT>() * JITTER_FRACTION;
        let position = vec2f(
            scene.spawn_padding + column as FT * spacing + jitter,
            scene.spawn_height + row as FT * spacing,
        );
        let radius = rng.gen_range(scene.small_radius_min..=scene.small_radius_max);
        particles.push(position, radius, params.density, ParticleClass::Small);
    }

    let r = scene.large_radius;
    let gap = (1. - scene.num_large as FT * 2. * r) / (scene.num_large as FT + 1.);
    for k in 0..scene.num_large {
        let x = gap + r + k as FT * (gap + 2. * r);
        particles.push(vec2f(x, scene.large_spawn_height), r, params.density, ParticleClass::Large);
    }

    Ok(particles)
}

#[cfg(test)]
mod tests {
    use super::{init_granular_scene, SceneConfig};
    use crate::{
        error::ConfigurationError, floating_type_mod::FT, particles::ParticleClass, simulation::assert_ft_approx_eq,
        simulation_parameters::SimulationParams,
    };

    #[test]
    fn default_scene_layout() {
        let params = SimulationParams::default();
        let scene = SceneConfig::default();
        let particles = init_granular_scene(&scene, &params).unwrap();

        assert_eq!(particles.len(), 8192 + 4);
        assert_eq!(particles.count_class(ParticleClass::Small), 8192);
        assert_eq!(particles.count_class(ParticleClass::Large), 4);

        for i in 0..8192 {
            let p = particles.position[i];
            let r = particles.radius[i];
            assert_eq!(particles.class[i], ParticleClass::Small);
            assert!(r >= 0.002 && r <= 0.003);
            assert!(p.x >= 0.1 && p.x + r < 0.9 + scene.spawn_spacing);
            assert!(p.y >= 0.15 && p.y + r < 1.);
        }

        // four bodies with five equal gaps
        let gap = (1. - 8. * 0.099) / 5.;
        for k in 0..4 {
            let i = 8192 + k;
            assert_eq!(particles.class[i], ParticleClass::Large);
            assert_ft_approx_eq(particles.position[i].x, gap + 0.099 + k as FT * (gap + 0.198), 1e-5, || {
                format!("large body {}", k)
            });
            assert_eq!(particles.position[i].y, 0.9);
            assert!(particles.position[i].y + particles.radius[i] < 1.);
        }
    }

    #[test]
    fn spawned_grains_do_not_overlap() {
        let params = SimulationParams::default();
        let scene = SceneConfig {
            num_small: 500,
            num_large: 2,
            ..SceneConfig::default()
        };
        let particles = init_granular_scene(&scene, &params).unwrap();

        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                let d = (particles.position[i] - particles.position[j]).norm();
                assert!(d >= particles.radius[i] + particles.radius[j], "{} and {} overlap", i, j);
            }
        }
    }

    #[test]
    fn same_seed_gives_the_same_scene() {
        let params = SimulationParams::default();
        let scene = SceneConfig {
            num_small: 100,
            seed: 7,
            ..SceneConfig::default()
        };
        let a = init_granular_scene(&scene, &params).unwrap();
        let b = init_granular_scene(&scene, &params).unwrap();
        assert_eq!(a.position, b.position);
        assert_eq!(a.radius, b.radius);
    }

    #[test]
    fn rejects_grains_larger_than_a_cell() {
        let params = SimulationParams {
            grid_n: 200,
            ..SimulationParams::default()
        };
        let result = init_granular_scene(&SceneConfig::default(), &params);
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidParameter {
                name: "small_radius_max",
                ..
            })
        ));
    }

    fn rejected_parameter(scene: &SceneConfig) -> Option<&'static str> {
        match scene.validate(&SimulationParams::default()) {
            Err(ConfigurationError::InvalidParameter { name, .. }) => Some(name),
            Err(e) => panic!("unexpected error {}", e),
            Ok(()) => None,
        }
    }

    #[test]
    fn spacing_has_to_leave_room_for_the_jitter() {
        let scene = |spawn_spacing: FT| SceneConfig {
            num_small: 2000,
            num_large: 0,
            spawn_spacing,
            seed: 3,
            ..SceneConfig::default()
        };

        // wider than a grain but too tight once a neighbour is jittered towards it
        assert_eq!(rejected_parameter(&scene(0.0065)), Some("spawn_spacing"));
        assert_eq!(rejected_parameter(&scene(0.0074)), Some("spawn_spacing"));

        // 0.8 * 0.0076 is just above the largest diameter
        let scene = scene(0.0076);
        assert_eq!(rejected_parameter(&scene), None);
        let particles = init_granular_scene(&scene, &SimulationParams::default()).unwrap();
        for i in 0..particles.len() {
            for j in (i + 1)..particles.len() {
                let d = (particles.position[i] - particles.position[j]).norm();
                assert!(d >= particles.radius[i] + particles.radius[j], "{} and {} overlap", i, j);
            }
        }
    }

    #[test]
    fn grain_rows_have_to_fit_into_the_domain() {
        let too_many = SceneConfig {
            num_small: 20000,
            ..SceneConfig::default()
        };
        assert_eq!(rejected_parameter(&too_many), Some("num_small"));
        assert_eq!(
            rejected_parameter(&SceneConfig {
                num_large: 0,
                ..too_many
            }),
            Some("num_small")
        );

        // 90 rows end at y=0.848, above the bottom of the large bodies (0.801)
        let tall = SceneConfig {
            num_small: 102 * 90,
            ..SceneConfig::default()
        };
        assert_eq!(rejected_parameter(&tall), Some("large_spawn_height"));
        assert_eq!(rejected_parameter(&SceneConfig { num_large: 0, ..tall }), None);

        let sunk = SceneConfig {
            spawn_height: 0.001,
            ..SceneConfig::default()
        };
        assert_eq!(rejected_parameter(&sunk), Some("spawn_height"));

        let default_scene = init_granular_scene(&SceneConfig::default(), &SimulationParams::default()).unwrap();
        let top = (0..8192)
            .map(|i| default_scene.position[i].y + default_scene.radius[i])
            .fold(0., FT::max);
        assert!(top < 0.9 - 0.099);
    }

    #[test]
    fn scene_from_yaml() {
        let scene: SceneConfig = serde_yaml::from_str(
            "num_small: 10\nnum_large: 1\nsmall_radius_min: 0.002\nsmall_radius_max: 0.003\nlarge_radius: 0.05\n\
             spawn_spacing: 0.0078125\nspawn_padding: 0.1\nspawn_height: 0.15\nlarge_spawn_height: 0.8\n",
        )
        .unwrap();
        assert_eq!(scene.num_small, 10);
        assert_eq!(scene.seed, 0);

        let particles = init_granular_scene(&scene, &SimulationParams::default()).unwrap();
        assert_eq!(particles.len(), 11);
        assert_ft_approx_eq(particles.position[10].x, 0.5, 1e-6, || "centered large body".to_string());
    }
}
