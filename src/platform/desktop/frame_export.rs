use std::{
    fs::create_dir_all,
    io,
    path::{Path, PathBuf},
};

use granular_dem::{particles::ParticleClass, DemSimulation};
use log::debug;
use svg::{
    node::element::{Circle, Rectangle},
    Document,
};

const SVG_SCALE: f64 = 1000.;

/// Writes one SVG per frame into `folder`, named `<basename>-00000.svg`, ...
pub(crate) struct SvgFrameExporter {
    folder: PathBuf,
    basename: String,
    snapshot_index: usize,
}

impl SvgFrameExporter {
    pub(crate) fn new(folder: impl Into<PathBuf>, basename: impl Into<String>) -> io::Result<SvgFrameExporter> {
        let folder = folder.into();
        create_dir_all(&folder)?;

        Ok(SvgFrameExporter {
            folder,
            basename: basename.into(),
            snapshot_index: 0,
        })
    }

    pub(crate) fn add_snapshot(&mut self, simulation: &DemSimulation) -> io::Result<PathBuf> {
        let path = self
            .folder
            .join(format!("{}-{:05}.svg", self.basename, self.snapshot_index));
        save_frame(&path, simulation)?;
        debug!("wrote {}", path.display());

        self.snapshot_index += 1;
        Ok(path)
    }
}

/// Draws the unit square with every particle as a circle. The y axis points up.
pub(crate) fn frame_document(simulation: &DemSimulation) -> Document {
    let mut document = Document::new()
        .set("viewBox", (0., 0., SVG_SCALE, SVG_SCALE))
        .add(
            Rectangle::new()
                .set("width", SVG_SCALE)
                .set("height", SVG_SCALE)
                .set("fill", "white")
                .set("stroke", "black"),
        );

    let positions = simulation.positions();
    let radii = simulation.radii();
    let classes = simulation.classes();

    for i in 0..positions.len() {
        let x = positions[i].x as f64;
        let y = positions[i].y as f64;
        let r = radii[i] as f64;

        let fill = match classes[i] {
            ParticleClass::Small => "#068587",
            ParticleClass::Large => "#ed553b",
        };

        document = document.add(
            Circle::new()
                .set("fill", fill)
                .set("cx", x * SVG_SCALE)
                .set("cy", (1. - y) * SVG_SCALE)
                .set("r", r * SVG_SCALE),
        );
    }

    document
}

pub(crate) fn save_frame(path: &Path, simulation: &DemSimulation) -> io::Result<()> {
    svg::save(path, &frame_document(simulation))
}

#[cfg(test)]
mod tests {
    use super::{frame_document, SvgFrameExporter};
    use granular_dem::{
        particles::{ParticleClass, ParticleVec},
        simulation_parameters::SimulationParams,
        vec2f, DemSimulation,
    };

    fn two_particle_simulation() -> DemSimulation {
        let params = SimulationParams::default();
        let mut particles = ParticleVec::default(0);
        particles.push(vec2f(0.25, 0.5), 0.003, params.density, ParticleClass::Small);
        particles.push(vec2f(0.75, 0.2), 0.099, params.density, ParticleClass::Large);
        DemSimulation::new(params, particles, false).unwrap()
    }

    #[test]
    fn draws_one_circle_per_particle() {
        let document = frame_document(&two_particle_simulation()).to_string();
        assert_eq!(document.matches("<circle").count(), 2);
        assert!(document.contains("#ed553b"));
        assert!(document.contains("#068587"));
    }

    #[test]
    fn numbers_exported_frames() {
        let folder = std::env::temp_dir().join(format!("granular-dem-frames-{}", std::process::id()));
        let mut exporter = SvgFrameExporter::new(&folder, "frame").unwrap();
        let simulation = two_particle_simulation();

        let first = exporter.add_snapshot(&simulation).unwrap();
        let second = exporter.add_snapshot(&simulation).unwrap();
        assert!(first.ends_with("frame-00000.svg"));
        assert!(second.ends_with("frame-00001.svg"));
        assert!(second.exists());

        std::fs::remove_dir_all(&folder).unwrap();
    }
}
