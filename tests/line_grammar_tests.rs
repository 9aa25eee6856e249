//! Line Grammar Tests
//!
//! Checks the text grammar across components: lines rendered by every
//! emulation mode parse back into the expected channel layout, and parsed
//! samples land in the series buffers with the right X coordinates.

use rand::rngs::StdRng;
use rand::SeedableRng;

use linescope::acquisition::{classify_line, parse_line, parse_line_detailed, EmulationMode, LineEvent};
use linescope::series::SeriesBufferManager;
use linescope::types::Point;

/// (mode, samples per line, whether samples carry an explicit X)
const LAYOUTS: [(EmulationMode, usize, bool); 8] = [
    (EmulationMode::SquareWave, 1, false),
    (EmulationMode::SineWave, 1, false),
    (EmulationMode::NoisyRamp, 1, false),
    (EmulationMode::PeriodicPulse, 1, false),
    (EmulationMode::XySeries, 1, true),
    (EmulationMode::MultiSeries, 2, false),
    (EmulationMode::MultiSeriesSharedX, 2, true),
    (EmulationMode::MultiSeriesIndependentX, 2, true),
];

#[test]
fn emulated_lines_parse_into_expected_layout() {
    let mut rng = StdRng::seed_from_u64(3);
    for (mode, count, explicit_x) in LAYOUTS {
        for step in 0..20 {
            let t = f64::from(step) * 0.05;
            let line = mode.render(t, &mut rng).expect("mode emits a line");
            let parsed = parse_line_detailed(&line);

            assert!(parsed.diagnostics.is_empty(), "{mode}: {line}");
            assert_eq!(parsed.samples.len(), count, "{mode}: {line}");
            for sample in &parsed.samples {
                assert_eq!(sample.has_x(), explicit_x, "{mode}: {line}");
                if explicit_x {
                    assert_eq!(sample.x, Some(t), "{mode}: {line}");
                }
            }
        }
    }
}

#[test]
fn no_data_mode_emits_nothing() {
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(EmulationMode::NoData.render(1.0, &mut rng), None);
}

#[test]
fn parsed_lines_fill_buffers_with_counter_or_explicit_x() {
    let mut buffers = SeriesBufferManager::new(64);
    for line in ["1.5, -2", "(10, 3) (11, 4)", "hello", "7"] {
        let samples = parse_line(line);
        if !samples.is_empty() {
            buffers.ingest(&samples);
        }
    }

    assert_eq!(buffers.channel_count(), 2);
    assert_eq!(
        buffers.channel(0).unwrap().snapshot(),
        vec![Point::new(0.0, 1.5), Point::new(10.0, 3.0), Point::new(2.0, 7.0)]
    );
    assert_eq!(
        buffers.channel(1).unwrap().snapshot(),
        vec![Point::new(0.0, -2.0), Point::new(11.0, 4.0)]
    );
    assert_eq!(buffers.sample_counter(), 3);
}

#[test]
fn classify_separates_text_from_data() {
    assert!(matches!(classify_line("0.25 0.5"), LineEvent::Data(ref s) if s.len() == 2));
    assert_eq!(
        classify_line("  device ready\r\n"),
        LineEvent::Text("device ready".into())
    );
}

#[test]
fn mixed_groups_and_bare_values() {
    let samples = parse_line("(0.5, 1, 2) 9 (1.5,3)");
    let pairs: Vec<(Option<f64>, f64)> = samples.iter().map(|s| (s.x, s.y)).collect();
    assert_eq!(
        pairs,
        vec![(Some(0.5), 1.0), (Some(0.5), 2.0), (None, 9.0), (Some(1.5), 3.0)]
    );
}
