use std::{collections::HashMap, error::Error, fs, path::Path, time::Duration};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use granular_dem::{
    scene::{init_granular_scene, SceneConfig},
    simulation_parameters::SimulationParams,
    write_statistics, DemSimulation,
};
use log::{error, info, LevelFilter};

use super::frame_export::SvgFrameExporter;

const CARGO_PKG_AUTHORS: &'static str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &'static str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &'static str = env!("CARGO_PKG_DESCRIPTION");

const DEFAULT_FRAMES: usize = 200;

type DriverResult<T> = Result<T, Box<dyn Error>>;

pub fn start() {
    let matches = App::new("Granular DEM Simulation")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the simulation paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scene setup")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("FRAMES")
                        .long("frames")
                        .short("n")
                        .required(false)
                        .takes_value(true)
                        .help("Number of frames to simulate (default 200)"),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("OUTPUT_DIR")
                        .long("output-dir")
                        .short("o")
                        .required(false)
                        .takes_value(true)
                        .help("Write every frame as SVG into this directory"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps (keeps one sample per substep in memory)")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("STATISTICS_PATH")
                        .long("statistics-path")
                        .short("w")
                        .required(false)
                        .takes_value(true)
                        .help("Where to write statistics to"),
                ),
        )
        .subcommand(
            SubCommand::with_name("default-config")
                .about("Write the default simulation and scene configs")
                .arg(
                    Arg::with_name("OUTPUT_DIR")
                        .help("Directory for `simulation.yaml` and `scene.yaml`")
                        .default_value(".")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .get_matches();

    init_logger(matches.occurrences_of("v"));

    let result = if let Some(run_matches) = matches.subcommand_matches("run") {
        run(run_matches)
    } else if let Some(subcmd_matches) = matches.subcommand_matches("default-config") {
        write_default_config(subcmd_matches)
    } else {
        unreachable!()
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logger(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Parses the simulation parameters and replaces single keys with the values of
/// the overwrite mapping. Keys that the parameter file does not have are rejected.
pub(crate) fn load_simulation_params(
    params_yaml: &str,
    overwrite_yaml: Option<&str>,
) -> DriverResult<SimulationParams> {
    let mut simulation_params_serde: serde_yaml::Value = serde_yaml::from_str(params_yaml)?;

    if let Some(overwrite_yaml) = overwrite_yaml {
        let overwrite_config: HashMap<String, serde_yaml::Value> = serde_yaml::from_str(overwrite_yaml)?;
        let mapping = simulation_params_serde
            .as_mapping_mut()
            .ok_or("simulation parameters are not a mapping")?;
        for (k, v) in overwrite_config.into_iter() {
            match mapping.get_mut(&serde_yaml::Value::String(k.clone())) {
                Some(value) => *value = v,
                None => return Err(format!("not able to find attribute {}", k).into()),
            }
        }
    }

    let simulation_params: SimulationParams = serde_yaml::from_value(simulation_params_serde)?;
    simulation_params.validate()?;
    Ok(simulation_params)
}

fn run(run_matches: &ArgMatches) -> DriverResult<()> {
    let parameter_file = run_matches
        .value_of("SIMULATION_CONFIG")
        .ok_or("missing simulation config")?;
    let params_yaml = fs::read_to_string(parameter_file)?;
    let overwrite_yaml = match run_matches.value_of("OVERWRITE_CONFIG_FILE") {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    let simulation_params = load_simulation_params(&params_yaml, overwrite_yaml.as_deref())?;
    info!("{:?}", simulation_params);

    let scene_file_path = run_matches.value_of("SCENE_CONFIG").ok_or("missing scene config")?;
    let scene_yaml = fs::read_to_string(scene_file_path)?;
    let scene_config: SceneConfig = serde_yaml::from_str(&scene_yaml)?;
    info!("{:?}", scene_config);

    let frames = match run_matches.value_of("FRAMES") {
        Some(x) => x.parse::<usize>()?,
        None => DEFAULT_FRAMES,
    };
    let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");
    let statistics_path_opt = run_matches.value_of("STATISTICS_PATH");

    let mut frame_exporter = match run_matches.value_of("OUTPUT_DIR") {
        Some(dir) => Some(SvgFrameExporter::new(dir, "frame")?),
        None => None,
    };

    let particles = init_granular_scene(&scene_config, &simulation_params)?;
    let mut simulation = DemSimulation::new(simulation_params, particles, counters_enabled)?;

    if let Some(frame_exporter) = &mut frame_exporter {
        frame_exporter.add_snapshot(&simulation)?;
    }

    let mut total_duration: Duration = Duration::from_nanos(0);

    for frame_number in 0..frames {
        let a = std::time::Instant::now();
        simulation.frame()?;
        let b = std::time::Instant::now();

        total_duration += b - a;

        info!(
            "{:05}: {} particles {}msec ({}msec AVG)",
            frame_number,
            simulation.positions().len(),
            (b - a).as_secs_f32() * 1000.,
            (total_duration / (frame_number as u32 + 1)).as_secs_f32() * 1000.
        );

        if let Some(frame_exporter) = &mut frame_exporter {
            frame_exporter.add_snapshot(&simulation)?;
        }
    }

    if counters_enabled {
        let s = write_statistics(&simulation);
        print!("{}", s);
        if let Some(statistics_path) = statistics_path_opt {
            fs::write(statistics_path, s)?;
        }
    }

    Ok(())
}

fn write_default_config(subcmd_matches: &ArgMatches) -> DriverResult<()> {
    let output_dir = Path::new(subcmd_matches.value_of("OUTPUT_DIR").ok_or("missing output directory")?);
    fs::create_dir_all(output_dir)?;

    let simulation_path = output_dir.join("simulation.yaml");
    fs::write(&simulation_path, serde_yaml::to_string(&SimulationParams::default())?)?;
    info!("Writing to file `{}`...", simulation_path.display());

    let scene_path = output_dir.join("scene.yaml");
    fs::write(&scene_path, serde_yaml::to_string(&SceneConfig::default())?)?;
    info!("Writing to file `{}`...", scene_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::load_simulation_params;
    use granular_dem::simulation_parameters::SimulationParams;

    fn default_params_yaml() -> String {
        serde_yaml::to_string(&SimulationParams::default()).unwrap()
    }

    #[test]
    fn overwrite_file_replaces_single_keys() {
        let params = load_simulation_params(&default_params_yaml(), Some("stiffness: 1000.0\nsubsteps: 10\n")).unwrap();
        assert_eq!(params.stiffness, 1000.);
        assert_eq!(params.substeps, 10);
        assert_eq!(params.grid_n, SimulationParams::default().grid_n);
    }

    #[test]
    fn overwrite_with_unknown_key_fails() {
        let result = load_simulation_params(&default_params_yaml(), Some("viscosity: 0.1\n"));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected_after_merging() {
        let result = load_simulation_params(&default_params_yaml(), Some("restitution_coef: 1.5\n"));
        let message = result.err().unwrap().to_string();
        assert!(message.contains("restitution"), "{}", message);
    }
}
