// End-to-end pipeline: MIDI corpora -> map file -> composition -> MIDI.
//
// Exercises the public API the way the `generate` binary chains it, with
// every file living in a temp directory.

use refrain_music::config::GeneratorConfig;
use refrain_music::mapfile::{build_plan_from_corpora, read_map_file, write_map_file};
use refrain_music::midi::{assign_durations, read_midi, write_midi};
use refrain_music::shaping::{Ramp, Shaping};
use refrain_music::unit::{Unit, notes};
use refrain_music::{ComposeError, LookupError, SectionPlan, StructureComposer};
use refrain_prng::RefrainRng;

fn write_corpus(path: &std::path::Path, units: &[Unit]) {
    let events: Vec<(Unit, u32)> = units.iter().map(|u| (u.clone(), 240)).collect();
    write_midi(path, &events, 120).unwrap();
}

fn theme() -> Vec<Unit> {
    let mut units = notes(&[60, 62, 64, 65, 67, 65, 64, 62, 60, 67, 64, 60]);
    units.push(Unit::from_notes(&[60, 64, 67]).unwrap());
    units
}

fn variation() -> Vec<Unit> {
    let mut units = notes(&[72, 74, 76, 77, 79, 77, 76, 74, 72, 79, 76, 72]);
    units.push(Unit::from_notes(&[72, 76, 79]).unwrap());
    units
}

#[test]
fn test_midi_to_map_to_composition() {
    let dir = tempfile::tempdir().unwrap();
    let theme_path = dir.path().join("theme.mid");
    let variation_path = dir.path().join("variation.mid");
    write_corpus(&theme_path, &theme());
    write_corpus(&variation_path, &variation());

    let corpora = vec![
        read_midi(&theme_path).unwrap(),
        read_midi(&variation_path).unwrap(),
    ];
    assert_eq!(corpora[0], theme());

    let plan = build_plan_from_corpora(&corpora, "ABA").unwrap();
    let map_path = dir.path().join("map.txt");
    write_map_file(&map_path, &plan, "From midi files: [\"theme.mid\", \"variation.mid\"]")
        .unwrap();
    let plan = read_map_file(&map_path).unwrap();
    assert_eq!(plan.total_length(), 16 * 3 + 8 * 2);

    let config = GeneratorConfig::default();
    let composer = StructureComposer::new(&plan, Shaping::Plain, config.compose_options()).unwrap();
    let mut rng = RefrainRng::new(11);
    let units = composer.compose(&corpora[0], &mut rng).unwrap();
    assert_eq!(units.len(), plan.total_length());

    // Sections draw only from their own letter's list.
    let home = plan.map().home();
    let b = plan.map().section('B').unwrap();
    assert!(units[..16].iter().all(|u| home.contains(u)));
    assert!(units[24..40].iter().all(|u| b.contains(u)));
    assert!(units[48..].iter().all(|u| home.contains(u)));

    let out_path = dir.path().join("out.mid");
    let timing = config.timing();
    let events = assign_durations(&units, timing.ticks_per_unit, &config.rhythms, &mut rng).unwrap();
    write_midi(&out_path, &events, timing.tempo_bpm).unwrap();
    assert_eq!(read_midi(&out_path).unwrap(), units);
}

#[test]
fn test_same_seed_same_piece() {
    let plan = build_plan_from_corpora(&[theme(), variation()], "ABAB").unwrap();
    let composer = StructureComposer::new(
        &plan,
        Shaping::Sparse {
            ramp: Ramp::Fading,
            pause: Unit::note(5),
        },
        GeneratorConfig::default().compose_options(),
    )
    .unwrap();

    let first = composer.compose(&theme(), &mut RefrainRng::new(3)).unwrap();
    let second = composer.compose(&theme(), &mut RefrainRng::new(3)).unwrap();
    assert_eq!(first, second);
    // Fading: the first slot is never a pause.
    assert_ne!(first[0], Unit::note(5));
}

#[test]
fn test_json_plan_matches_map_file() {
    let plan = build_plan_from_corpora(&[theme(), variation()], "AB").unwrap();
    let json = serde_json::to_string(&plan).unwrap();
    let back: SectionPlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, plan);
}

#[test]
fn test_foreign_corpus_is_a_lookup_error() {
    let plan = build_plan_from_corpora(&[theme(), variation()], "AB").unwrap();
    let composer =
        StructureComposer::new(&plan, Shaping::Plain, GeneratorConfig::default().compose_options())
            .unwrap();
    let err = composer
        .compose(&variation(), &mut RefrainRng::new(0))
        .unwrap_err();
    assert!(matches!(
        err,
        ComposeError::Lookup(LookupError::UnitNotInHome(_))
    ));
}
