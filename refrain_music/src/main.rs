// Refrain generator CLI entry point.
//
// Reads corpora from MIDI, generates with one of the library's pipelines, and
// writes the result back to MIDI. The `map` subcommand builds a map file from
// one MIDI corpus per section, ready to be edited and fed to `compose`.
//
// Usage:
//   cargo run -p refrain_music -- [--seed N] [--config FILE] [--tempo BPM] <COMMAND>
//
// Commands:
//   walk     plain Markov walk (optionally grown into chords)
//   compose  sectioned composition from a map file or JSON plan
//   sparse   walk thinned along a pause ramp
//   group    walk over runs, pause phrases, or fixed chunks
//   map      write a map file from per-section MIDI corpora
//
// Set RUST_LOG (e.g. `RUST_LOG=refrain_music=debug`) for engine logging.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use refrain_music::config::GeneratorConfig;
use refrain_music::generate::{
    Grouping, generate, generate_chorded, generate_grouped, generate_sparse,
};
use refrain_music::mapfile::{build_plan_from_corpora, read_map_file, write_map_file};
use refrain_music::midi::{assign_durations, read_midi, write_midi};
use refrain_music::shaping::{Ramp, Shaping};
use refrain_music::{SectionPlan, StructureComposer, Unit};
use refrain_prng::RefrainRng;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "generate", about = "Sectional Markov note generator")]
struct Cli {
    /// Seed for reproducible output (overrides the config file).
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// JSON generator configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output tempo in BPM (overrides the config file).
    #[arg(long, global = true)]
    tempo: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plain Markov walk over a MIDI corpus.
    Walk {
        input: PathBuf,
        #[arg(short, long, default_value = "output.mid")]
        output: PathBuf,
        #[arg(short = 'n', long, default_value_t = 64)]
        length: usize,
        /// Grow units into chords of up to 1 + N notes.
        #[arg(long, value_name = "N")]
        chords: Option<usize>,
    },
    /// Compose a sectioned piece from a map file (.txt) or JSON plan (.json).
    Compose {
        plan: PathBuf,
        /// Corpus to walk. Defaults to the plan's home section.
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long, default_value = "output.mid")]
        output: PathBuf,
        /// Grow units into chords of up to 1 + N notes.
        #[arg(long, value_name = "N", conflicts_with = "sparse")]
        chords: Option<usize>,
        /// Thin the piece into pauses along a ramp.
        #[arg(long, value_enum)]
        sparse: Option<RampArg>,
    },
    /// Walk thinned into pauses along a ramp.
    Sparse {
        input: PathBuf,
        #[arg(short, long, default_value = "output.mid")]
        output: PathBuf,
        #[arg(short = 'n', long, default_value_t = 64)]
        length: usize,
        #[arg(long, value_enum, default_value_t = RampArg::Emerging)]
        ramp: RampArg,
    },
    /// Walk over groups of the corpus instead of single units.
    Group {
        input: PathBuf,
        #[arg(short, long, default_value = "output.mid")]
        output: PathBuf,
        /// Number of groups to walk.
        #[arg(short = 'n', long, default_value_t = 16)]
        length: usize,
        #[arg(long, value_enum, default_value_t = GroupingArg::Pitch)]
        by: GroupingArg,
        /// Group size for `--by chunks`.
        #[arg(long, default_value_t = 4)]
        chunk_size: usize,
    },
    /// Write a map file; corpora are lettered A, B, ... in order.
    Map {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        structure: String,
        #[arg(short, long, default_value = "map.txt")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RampArg {
    Emerging,
    Fading,
}

impl From<RampArg> for Ramp {
    fn from(arg: RampArg) -> Self {
        match arg {
            RampArg::Emerging => Ramp::Emerging,
            RampArg::Fading => Ramp::Fading,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupingArg {
    Pitch,
    Pauses,
    Chunks,
}

fn main() -> Result<()> {
    setup_tracing()?;
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(tempo) = cli.tempo {
        config.tempo_bpm = tempo;
    }
    config.validate().context("invalid generator configuration")?;

    println!("=== Refrain Generator ===");
    let mut rng = match config.seed {
        Some(seed) => {
            println!("Seed: {seed}");
            RefrainRng::new(seed)
        }
        None => {
            let (rng, seed) = RefrainRng::from_entropy();
            println!("Seed: {seed} (rerun with --seed {seed} to reproduce)");
            rng
        }
    };

    match cli.command {
        Command::Walk {
            input,
            output,
            length,
            chords,
        } => {
            let corpus = load_corpus(&input)?;
            let units = match chords {
                Some(increase) => generate_chorded(
                    &corpus,
                    length,
                    increase,
                    &config.walk_options(),
                    &mut rng,
                )?,
                None => generate(&corpus, length, &config.walk_options(), &mut rng)?,
            };
            save(&output, &units, &config, &mut rng)?;
        }
        Command::Compose {
            plan,
            input,
            output,
            chords,
            sparse,
        } => {
            let plan = load_plan(&plan)?;
            let corpus = match &input {
                Some(path) => load_corpus(path)?,
                None => plan.map().home().to_vec(),
            };
            let shaping = match (chords, sparse) {
                (Some(chord_increase), _) => Shaping::Chords { chord_increase },
                (None, Some(ramp)) => Shaping::Sparse {
                    ramp: ramp.into(),
                    pause: config.pause(),
                },
                (None, None) => Shaping::Plain,
            };
            println!(
                "Structure: {} ({} units)",
                plan.structure_string(),
                plan.total_length()
            );
            let composer = StructureComposer::new(&plan, shaping, config.compose_options())?;
            let units = composer.compose(&corpus, &mut rng)?;
            save(&output, &units, &config, &mut rng)?;
        }
        Command::Sparse {
            input,
            output,
            length,
            ramp,
        } => {
            let corpus = load_corpus(&input)?;
            let units = generate_sparse(
                &corpus,
                length,
                ramp.into(),
                &config.pause(),
                &config.walk_options(),
                &mut rng,
            )?;
            save(&output, &units, &config, &mut rng)?;
        }
        Command::Group {
            input,
            output,
            length,
            by,
            chunk_size,
        } => {
            let corpus = load_corpus(&input)?;
            let grouping = match by {
                GroupingArg::Pitch => Grouping::Pitch,
                GroupingArg::Pauses => Grouping::Pauses,
                GroupingArg::Chunks => Grouping::Chunks(chunk_size),
            };
            let units = generate_grouped(
                &corpus,
                length,
                grouping,
                &config.pause(),
                &config.walk_options(),
                &mut rng,
            )?;
            save(&output, &units, &config, &mut rng)?;
        }
        Command::Map {
            inputs,
            structure,
            output,
        } => {
            let corpora = inputs
                .iter()
                .map(|path| load_corpus(path))
                .collect::<Result<Vec<_>>>()?;
            let plan = build_plan_from_corpora(&corpora, &structure)?;
            let names: Vec<String> = inputs
                .iter()
                .map(|p| format!("{:?}", p.display().to_string()))
                .collect();
            let header = format!("From midi files: [{}]", names.join(", "));
            write_map_file(&output, &plan, &header)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Wrote map file {}", output.display());
        }
    }
    Ok(())
}

fn setup_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err: Box<dyn std::error::Error + Send + Sync>| {
            anyhow!("failed to initialise tracing: {err}")
        })?;
    Ok(())
}

fn load_corpus(path: &Path) -> Result<Vec<Unit>> {
    let corpus = read_midi(path).with_context(|| format!("reading {}", path.display()))?;
    info!(path = %path.display(), units = corpus.len(), "loaded corpus");
    println!("Corpus {}: {} units", path.display(), corpus.len());
    Ok(corpus)
}

fn load_plan(path: &Path) -> Result<SectionPlan> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let plan = if is_json {
        let data =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?
    } else {
        read_map_file(path).with_context(|| format!("reading {}", path.display()))?
    };
    Ok(plan)
}

fn save(
    path: &Path,
    units: &[Unit],
    config: &GeneratorConfig,
    rng: &mut RefrainRng,
) -> Result<()> {
    let timing = config.timing();
    let events = assign_durations(units, timing.ticks_per_unit, &config.rhythms, rng)?;
    write_midi(path, &events, timing.tempo_bpm)
        .with_context(|| format!("writing {}", path.display()))?;
    println!(
        "Wrote {} units ({} timed events) to {}",
        units.len(),
        events.len(),
        path.display()
    );
    Ok(())
}
