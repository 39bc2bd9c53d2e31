use nalgebra::zero;
use serde::{Deserialize, Serialize};

use crate::{
    concurrency::AtomicV2,
    floating_type_mod::{FT, PI},
    V2,
};

/// Size class of a particle. Selects the broad-phase search window.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum ParticleClass {
    Small,
    Large,
}

pub fn mass_from_radius(radius: FT, density: FT) -> FT {
    density * PI * radius * radius
}

macro_rules! decl_particle_vec {
    (pub struct $struct_name:ident { $(pub $field_name:ident: Vec<$field_type:ty> | $default_value:expr),*$(,)?  }) => {
        pub struct $struct_name {
            $(
                pub $field_name : Vec<$field_type>,
            )*
        }

        impl $struct_name {
            pub fn default(len: usize) -> Self {
                Self {
                    $(
                        $field_name: (0..len).map(|_| $default_value).collect::<Vec<$field_type>>(),
                    )*
                }
            }

            pub fn extend(&mut self, num_elements: usize) {
                $(
                    self.$field_name.extend((0..num_elements).map::<$field_type, _>(|_| $default_value));
                )*
            }
        }
    }
}

decl_particle_vec! {
    pub struct ParticleVec {
        pub position: Vec<V2> | zero(),
        pub velocity: Vec<V2> | zero(),

        // acceleration of the previous substep
        pub acceleration: Vec<V2> | zero(),

        // written concurrently by the contact pass
        pub force: Vec<AtomicV2> | AtomicV2::default(),

        pub mass: Vec<FT> | 0.,
        pub radius: Vec<FT> | 0.,
        pub class: Vec<ParticleClass> | ParticleClass::Small,
    }
}

impl ParticleVec {
    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Appends a particle at rest and returns its index.
    pub fn push(&mut self, position: V2, radius: FT, density: FT, class: ParticleClass) -> usize {
        let idx = self.len();
        self.extend(1);
        self.position[idx] = position;
        self.radius[idx] = radius;
        self.mass[idx] = mass_from_radius(radius, density);
        self.class[idx] = class;
        idx
    }

    pub fn count_class(&self, class: ParticleClass) -> usize {
        self.class.iter().filter(|&&c| c == class).count()
    }

    /// Largest radius of all particles of the given class.
    pub fn max_radius(&self, class: ParticleClass) -> Option<FT> {
        self.radius
            .iter()
            .zip(self.class.iter())
            .filter(|(_, &c)| c == class)
            .map(|(&r, _)| r)
            .fold(None, |acc, r| Some(acc.map_or(r, |a: FT| a.max(r))))
    }

    pub fn kinetic_energy(&self) -> FT {
        self.velocity
            .iter()
            .zip(self.mass.iter())
            .map(|(v, m)| 0.5 * m * v.norm_squared())
            .sum()
    }
}
