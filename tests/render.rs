use std::fs;
use std::path::Path;

use deep_zoom::util::Field;
use deep_zoom::{Approximation, ConfigError, EngineSettings, FractalFamily, FractalRenderer, FractalType, RenderError, ResultReader, StopReason, Subset};

fn settings(root: &Path, run_name: &str) -> EngineSettings {
    EngineSettings {
        run_name: run_name.to_owned(),
        output_directory: root.to_path_buf(),
        image_width: 24,
        image_height: 16,
        real: "-0.75".to_owned(),
        imag: "0.1".to_owned(),
        width: "0.05".to_owned(),
        maximum_iteration: 500,
        chunk_size: 8,
        ..EngineSettings::default()
    }
}

// the reference at 0.3 escapes at iteration 12 while part of the view is inside
fn glitching_settings(root: &Path, run_name: &str) -> EngineSettings {
    EngineSettings {
        run_name: run_name.to_owned(),
        output_directory: root.to_path_buf(),
        image_width: 9,
        image_height: 9,
        real: "0.3".to_owned(),
        imag: "0.0".to_owned(),
        width: "0.2".to_owned(),
        maximum_iteration: 200,
        escape_radius: 2.0,
        chunk_size: 4,
        ..EngineSettings::default()
    }
}

fn render(settings: EngineSettings) -> deep_zoom::RenderSummary {
    FractalRenderer::new(settings).unwrap().render().unwrap()
}

#[test]
fn centre_pixel_of_an_interior_view() {
    let directory = tempfile::tempdir().unwrap();

    let settings = EngineSettings {
        run_name: "interior".to_owned(),
        output_directory: directory.path().to_path_buf(),
        image_width: 5,
        image_height: 5,
        real: "-1".to_owned(),
        imag: "0".to_owned(),
        width: "0.01".to_owned(),
        maximum_iteration: 100,
        escape_radius: 2.0,
        ..EngineSettings::default()
    };

    render(settings);

    let reader = ResultReader::open(directory.path(), "interior").unwrap();
    let centre = 2 * 5 + 2;

    assert_eq!(reader.image_codes("stop_reason").unwrap()[centre], Some(StopReason::Interior.code()));
    assert_eq!(reader.image_integers("stop_iter").unwrap()[centre], Some(3));
    assert_eq!(reader.image_integers("reference").unwrap()[centre], Some(0));
}

#[test]
fn repeated_runs_are_identical() {
    let directory = tempfile::tempdir().unwrap();

    let first = render(settings(directory.path(), "first"));
    let second = render(settings(directory.path(), "second"));

    assert_eq!(first.glitched_per_round, second.glitched_per_round);
    assert_eq!(first.references, second.references);

    for name in &["zn.bin", "stop_iter.bin", "stop_reason.bin", "reference.bin", "mask.bin", "index.bin"] {
        let a = fs::read(first.run_directory.join(name)).unwrap();
        let b = fs::read(second.run_directory.join(name)).unwrap();

        assert_eq!(a, b, "{} differs", name);
    }
}

#[test]
fn chunking_and_threads_do_not_change_results() {
    let directory = tempfile::tempdir().unwrap();

    let mut small = settings(directory.path(), "small");
    small.chunk_size = 5;
    small.threads = Some(1);

    let mut large = settings(directory.path(), "large");
    large.chunk_size = 7;
    large.threads = Some(3);

    render(small);
    render(large);

    let small = ResultReader::open(directory.path(), "small").unwrap();
    let large = ResultReader::open(directory.path(), "large").unwrap();

    assert_ne!(small.chunk_count(), large.chunk_count());
    assert_eq!(small.image_codes("stop_reason").unwrap(), large.image_codes("stop_reason").unwrap());
    assert_eq!(small.image_integers("stop_iter").unwrap(), large.image_integers("stop_iter").unwrap());
    assert_eq!(small.image_integers("reference").unwrap(), large.image_integers("reference").unwrap());
    assert_eq!(small.image_complex("zn").unwrap(), large.image_complex("zn").unwrap());
}

#[test]
fn glitch_correction_converges() {
    let directory = tempfile::tempdir().unwrap();

    let mut settings = glitching_settings(directory.path(), "glitch");
    settings.glitch.maximum_references = 81;
    settings.glitch.maximum_rounds = 81;

    let summary = render(settings);

    assert!(summary.glitched_per_round[0] > 0);
    assert!(summary.reference_exhausted > 0);
    assert_eq!(summary.remaining_glitched(), 0);
    assert!(summary.references >= 2);

    for pair in summary.glitched_per_round.windows(2) {
        assert!(pair[1] < pair[0]);
    }

    let reader = ResultReader::open(directory.path(), "glitch").unwrap();
    let codes = reader.image_codes("stop_reason").unwrap();

    assert!(codes.iter().all(|code| *code != Some(StopReason::Glitched.code())));
    assert_eq!(reader.manifest().references, summary.references);
}

#[test]
fn glitches_stay_marked_without_rounds() {
    let directory = tempfile::tempdir().unwrap();

    let mut settings = glitching_settings(directory.path(), "marked");
    settings.glitch.maximum_rounds = 0;

    let summary = render(settings);

    assert_eq!(summary.references, 1);
    assert_eq!(summary.glitched_per_round.len(), 1);
    assert!(summary.remaining_glitched() > 0);

    let reader = ResultReader::open(directory.path(), "marked").unwrap();
    let glitched = reader.image_codes("stop_reason").unwrap()
        .iter()
        .filter(|code| **code == Some(StopReason::Glitched.code()))
        .count();

    assert_eq!(glitched, summary.remaining_glitched());
}

#[test]
fn escaped_pixels_are_outside_the_radius() {
    let directory = tempfile::tempdir().unwrap();

    render(glitching_settings(directory.path(), "escape"));

    let reader = ResultReader::open(directory.path(), "escape").unwrap();
    let codes = reader.image_codes("stop_reason").unwrap();
    let values = reader.image_complex("zn").unwrap();

    let mut escaped = 0;

    for (code, value) in codes.iter().zip(values.iter()) {
        if *code == Some(StopReason::Escaped.code()) {
            assert!(value.unwrap().norm().to_float() > 2.0);
            escaped += 1;
        }
    }

    assert!(escaped > 0);
}

#[test]
fn subset_stores_only_selected_pixels() {
    let directory = tempfile::tempdir().unwrap();

    let renderer = FractalRenderer::new(glitching_settings(directory.path(), "subset"))
        .unwrap()
        .with_subset(Subset::predicate(|i, _| i < 3));

    let summary = renderer.render().unwrap();
    assert_eq!(summary.stored_pixels, 27);

    let reader = ResultReader::open(directory.path(), "subset").unwrap();
    let codes = reader.image_codes("stop_reason").unwrap();

    for j in 0..9 {
        for i in 0..9 {
            assert_eq!(codes[j * 9 + i].is_some(), i < 3);
        }
    }

    // recompute the escaped pixels of the finished run into a second one
    let escaped = reader.subset_from_codes("stop_reason", &[StopReason::Escaped.code()]).unwrap();
    let count = codes.iter().filter(|code| **code == Some(StopReason::Escaped.code())).count();

    let summary = FractalRenderer::new(glitching_settings(directory.path(), "again"))
        .unwrap()
        .with_subset(escaped)
        .render()
        .unwrap();

    assert_eq!(summary.stored_pixels, count);
}

#[test]
fn optional_fields_are_stored() {
    let directory = tempfile::tempdir().unwrap();

    let mut settings = settings(directory.path(), "fields");
    settings.fields = vec!["dzndc".to_owned(), "dzndz".to_owned()];
    settings.approximation = Approximation::None;

    render(settings);

    let reader = ResultReader::open(directory.path(), "fields").unwrap();

    assert!(reader.catalogue().contains(Field::Dzndc));
    assert!(reader.catalogue().contains(Field::Dzndz));
    assert_eq!(reader.manifest().settings["image_width"], 24);

    let derivatives = reader.image_complex("dzndc").unwrap();
    assert!(derivatives.iter().all(|value| value.is_some()));
}

#[test]
fn precision_is_raised_for_deep_views() {
    let directory = tempfile::tempdir().unwrap();

    let mut settings = settings(directory.path(), "deep");
    settings.precision = 10;
    settings.width = "1e-20".to_owned();

    let renderer = FractalRenderer::new(settings.clone()).unwrap();
    assert!(renderer.settings().precision_digits >= 23);

    settings.auto_precision = false;

    match FractalRenderer::new(settings) {
        Err(RenderError::Config(ConfigError::InsufficientPrecision { available, required })) => {
            assert_eq!(available, 10);
            assert!(required > available);
        }
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}

#[test]
fn invalid_settings_are_rejected_before_rendering() {
    let directory = tempfile::tempdir().unwrap();

    let mut settings = settings(directory.path(), "invalid");
    settings.image_height = 0;

    assert!(matches!(FractalRenderer::new(settings), Err(RenderError::Config(ConfigError::EmptyImage { .. }))));
    assert!(!directory.path().join("invalid").exists());
}

#[test]
fn other_maps_render_their_own_orbits() {
    let directory = tempfile::tempdir().unwrap();

    // family, power, centre and the escape iteration of the centre
    let cases = [
        (FractalFamily::Mandelbrot, 4, "1", "0", 3),
        (FractalFamily::BurningShip, 2, "0.5", "0.5", 4),
    ];

    for (index, (family, power, real, imag, escape)) in cases.iter().enumerate() {
        let run_name = format!("map{}", index);

        let settings = EngineSettings {
            run_name: run_name.clone(),
            output_directory: directory.path().to_path_buf(),
            image_width: 5,
            image_height: 5,
            real: real.to_string(),
            imag: imag.to_string(),
            width: "0.001".to_owned(),
            maximum_iteration: 100,
            escape_radius: 2.0,
            fractal_type: *family,
            power: *power,
            ..EngineSettings::default()
        };

        let renderer = FractalRenderer::new(settings).unwrap();

        if *family == FractalFamily::BurningShip {
            assert_eq!(renderer.settings().fractal_type, FractalType::BurningShip);
            assert_eq!(renderer.settings().approximation, Approximation::None);
        } else {
            assert_eq!(renderer.settings().fractal_type, FractalType::Multibrot(4));
        }

        renderer.render().unwrap();

        let reader = ResultReader::open(directory.path(), &run_name).unwrap();
        let centre_pixel = 2 * 5 + 2;

        assert_eq!(reader.image_codes("stop_reason").unwrap()[centre_pixel], Some(StopReason::Escaped.code()));
        assert_eq!(reader.image_integers("stop_iter").unwrap()[centre_pixel], Some(*escape));
    }
}

#[test]
fn small_escape_radius_is_rejected() {
    let directory = tempfile::tempdir().unwrap();

    let mut settings = settings(directory.path(), "radius");
    settings.escape_radius = 1.9;

    assert!(matches!(FractalRenderer::new(settings), Err(RenderError::Config(ConfigError::EscapeRadius { .. }))));
}
