//! Linear spring-dashpot contact law for circular particles.

use crate::{
    floating_type_mod::{FT, PI},
    V2,
};

/// Geometry of an overlapping pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit vector pointing from particle i to particle j.
    pub normal: V2,
    /// Penetration depth, always positive.
    pub delta: FT,
}

impl Contact {
    /// Returns `None` if the two circles do not overlap.
    #[inline(always)]
    pub fn detect(position_i: V2, radius_i: FT, position_j: V2, radius_j: FT) -> Option<Contact> {
        let rel_pos = position_j - position_i;
        let dist = rel_pos.norm();
        let delta = radius_i + radius_j - dist;
        if delta <= 0. {
            return None;
        }

        // coincident centers have no direction, separate them along +y
        let normal = if dist > 0. { rel_pos / dist } else { V2::y() };
        Some(Contact { normal, delta })
    }
}

/// Damping ratio for which a single linear spring-dashpot contact rebounds with
/// the given coefficient of restitution.
pub fn damping_ratio(restitution_coef: FT) -> FT {
    let x = PI / restitution_coef.ln();
    1. / (1. + x * x).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactModel {
    pub stiffness: FT,
    damping_ratio: FT,
}

impl ContactModel {
    pub fn new(stiffness: FT, restitution_coef: FT) -> Self {
        ContactModel {
            stiffness,
            damping_ratio: damping_ratio(restitution_coef),
        }
    }

    /// `C = 2 * zeta * sqrt(k * M)` for the reduced mass `M`.
    pub fn damping_coefficient(&self, mass_i: FT, mass_j: FT) -> FT {
        let reduced_mass = (mass_i * mass_j) / (mass_i + mass_j);
        2. * self.damping_ratio * (self.stiffness * reduced_mass).sqrt()
    }

    /// Spring part of the force on particle i. Points away from particle j.
    pub fn repulsion(&self, contact: &Contact) -> V2 {
        -contact.normal * (contact.delta * self.stiffness)
    }

    /// Total contact force on particle i. Particle j receives the negation.
    pub fn force_on_i(&self, contact: &Contact, velocity_i: V2, velocity_j: V2, mass_i: FT, mass_j: FT) -> V2 {
        let rel_normal_velocity = (velocity_j - velocity_i).dot(&contact.normal);
        let damping = contact.normal * (self.damping_coefficient(mass_i, mass_j) * rel_normal_velocity);
        damping + self.repulsion(contact)
    }
}
