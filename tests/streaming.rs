mod common;

use common::*;
use voxstretch::{process_all, SamplePipe, Setting, StreamProcessor};

#[test]
fn fixed_sequence_tempo_scenario() {
    let mut proc = configured(44100, 1);
    assert!(proc.set_setting(Setting::SequenceMs.id(), 40).unwrap());
    assert!(proc.set_setting(Setting::SeekWindowMs.id(), 15).unwrap());
    assert!(proc.set_setting(Setting::OverlapMs.id(), 8).unwrap());
    proc.set_tempo(1.2).unwrap();

    let batch = proc.get_setting(Setting::NominalOutputSequence.id()) as i64;
    assert_eq!(proc.get_setting(Setting::NominalInputSequence.id()), 1694);
    assert_eq!(batch, 1412);

    let input = vec![0.0f32; 44100];
    proc.put_samples(&input).unwrap();

    // before flush: about 44100 / 1.2 frames, within two sequences of latency
    let ready = proc.num_samples() as i64;
    assert!(
        (ready - 36750).abs() <= 2 * batch,
        "got {} frames before flush, expected about 36750",
        ready
    );
    let mut out = vec![1.0f32; 44100];
    assert_eq!(proc.receive_samples(&mut out, usize::MAX), ready as usize);
    assert!(out[..ready as usize].iter().all(|&s| s == 0.0));
    assert_eq!(proc.num_samples(), 0);

    proc.flush().unwrap();
    let tail = proc.num_samples();
    assert!((ready + tail as i64 - 36750).abs() <= 2 * batch);
    assert_eq!(proc.receive_samples(&mut out, usize::MAX), tail);
    assert_eq!(proc.num_samples(), 0);
    assert!(proc.is_empty());
}

#[test]
fn chunk_size_does_not_change_output() {
    let input = interleave(&[gen_noise(30_000, 21), gen_sine(300.0, 44100, 30_000, |_| 0.4)]);
    for &(rate, tempo) in &[(1.0, 1.3), (0.8, 1.0), (1.25, 0.9)] {
        let mut small = configured(44100, 2);
        small.set_rate(rate).unwrap();
        small.set_tempo(tempo).unwrap();
        let a = run_streaming(&mut small, &input, 256).unwrap();

        let mut large = configured(44100, 2);
        large.set_rate(rate).unwrap();
        large.set_tempo(tempo).unwrap();
        let b = run_streaming(&mut large, &input, 4096).unwrap();

        assert_eq!(a.len(), b.len(), "rate {} tempo {}", rate, tempo);
        for (i, (x, y)) in a.iter().zip(&b).enumerate() {
            assert!((x - y).abs() < 1e-5, "rate {} tempo {} sample {}", rate, tempo, i);
        }
    }
}

#[test]
fn flush_on_empty_processor_produces_nothing() {
    let mut proc = configured(44100, 2);
    proc.flush().unwrap();
    assert_eq!(proc.num_samples(), 0);
    assert!(proc.is_empty());
}

#[test]
fn flush_emits_expected_tail() {
    let mut proc = configured(44100, 1);
    proc.set_tempo(0.8).unwrap();
    proc.put_samples(&gen_noise(20_000, 3)).unwrap();

    let ready = proc.num_samples();
    let unprocessed = proc.num_unprocessed_samples();
    assert!(unprocessed > 0);
    proc.flush().unwrap();

    let expected = ready + (unprocessed as f64 / 0.8).round() as usize;
    assert_eq!(proc.num_samples(), expected);
    assert_eq!(proc.num_unprocessed_samples(), 0);
}

#[test]
fn flush_keeps_ready_output_at_any_pitch() {
    for &semitones in &[8.0, -8.0, 0.0] {
        let mut proc = configured(44100, 2);
        proc.set_pitch_semitones(semitones).unwrap();
        let input = interleave(&[gen_noise(44_100, 5), gen_noise(44_100, 6)]);
        proc.put_samples(&input).unwrap();

        let ready = proc.num_samples();
        let unprocessed = proc.num_unprocessed_samples();
        assert!(ready > 30_000, "{} semitones: {} ready", semitones, ready);
        proc.flush().unwrap();

        // pitch alone leaves tempo * rate at 1
        assert_eq!(
            proc.num_samples(),
            ready + unprocessed,
            "{} semitones",
            semitones
        );
    }
}

#[test]
fn flush_keeps_ready_output_i16_rate_above_one() {
    let mut proc = StreamProcessor::<i16>::new();
    proc.set_sample_rate(44100).unwrap();
    proc.set_channels(1).unwrap();
    proc.set_rate(1.25).unwrap();
    let input: Vec<i16> = gen_noise(30_000, 14).iter().map(|&v| (v * 20_000.0) as i16).collect();
    proc.put_samples(&input).unwrap();

    let ready = proc.num_samples();
    let unprocessed = proc.num_unprocessed_samples();
    assert!(ready > 15_000);
    proc.flush().unwrap();
    let tail = (unprocessed as f64 / 1.25 + 0.5) as usize;
    assert_eq!(proc.num_samples(), ready + tail);

    let output = process_all(&mut proc, &[]).unwrap();
    assert_eq!(output.len(), ready + tail);
}

#[test]
fn receive_respects_max_frames() {
    let mut proc = configured(22050, 2);
    proc.set_tempo(1.5).unwrap();
    let input = interleave(&[gen_noise(20_000, 1), gen_noise(20_000, 2)]);
    proc.put_samples(&input).unwrap();

    let available = proc.num_samples();
    assert!(available > 1000);
    let mut out = vec![0.0f32; 200];
    assert_eq!(proc.receive_samples(&mut out, 50), 50);
    assert_eq!(proc.num_samples(), available - 50);
    // the slice bounds the copy as well
    assert_eq!(proc.receive_samples(&mut out, 1000), 100);
    assert_eq!(proc.discard_samples(10), 10);
    assert_eq!(proc.num_samples(), available - 160);
}

#[test]
fn process_all_matches_manual_streaming() {
    let input = gen_sine(220.0, 44100, 25_000, |i| 0.2 + 0.3 * (i as f32 / 25_000.0));
    let mut a = configured(44100, 1);
    a.set_pitch_semitones(-3.0).unwrap();
    let manual = run_streaming(&mut a, &input, 25_000).unwrap();

    let mut b = configured(44100, 1);
    b.set_pitch_semitones(-3.0).unwrap();
    let whole = process_all(&mut b, &input).unwrap();
    assert_eq!(manual, whole);
}

#[test]
fn clear_then_reuse_matches_fresh_processor() {
    let input = gen_noise(15_000, 9);

    let mut reused = configured(44100, 1);
    reused.set_tempo(1.1).unwrap();
    reused.put_samples(&gen_noise(7_000, 77)).unwrap();
    reused.clear();
    assert!(reused.is_empty());
    let a = run_streaming(&mut reused, &input, 1000).unwrap();

    let mut fresh = configured(44100, 1);
    fresh.set_tempo(1.1).unwrap();
    let b = run_streaming(&mut fresh, &input, 1000).unwrap();
    assert_eq!(a, b);
}

#[test]
fn tempo_change_mid_stream_keeps_flowing() {
    let mut proc = configured(44100, 1);
    let input = gen_noise(44_100, 4);
    let mut output = Vec::new();
    let mut scratch = vec![0.0f32; 4096];
    for (i, chunk) in input.chunks(4410).enumerate() {
        proc.set_tempo_change(i as f64 * 10.0 - 30.0).unwrap();
        proc.put_samples(chunk).unwrap();
        drain_into(&mut proc, &mut scratch, &mut output);
    }
    proc.flush().unwrap();
    drain_into(&mut proc, &mut scratch, &mut output);

    // tempos 0.7 .. 1.6 over ten equal slices
    let expected: f64 = (0..10).map(|i| 4410.0 / (0.7 + 0.1 * i as f64)).sum();
    let got = output.len() as f64;
    assert!(
        (got - expected).abs() < expected * 0.12,
        "got {} frames, expected about {}",
        got,
        expected
    );
    assert!(output.iter().all(|s| s.is_finite()));
}

#[test]
fn unconfigured_processor_rejects_samples() {
    let mut proc: StreamProcessor = StreamProcessor::new();
    assert!(proc.put_samples(&[0.0; 16]).is_err());
    proc.set_channels(1).unwrap();
    assert!(proc.put_samples(&[0.0; 16]).is_err());
    proc.set_sample_rate(8000).unwrap();
    assert!(proc.put_samples(&[0.0; 16]).is_ok());
}
