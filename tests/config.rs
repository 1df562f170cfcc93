use voxstretch::{
    InterpolationAlgorithm, SamplePipe, Setting, StreamProcessor, StretchConfig, StretchError,
};

#[test]
fn processor_from_json_config() {
    let json = r#"{
        "sample_rate": 48000,
        "channels": 2,
        "interpolation": "shannon",
        "sequence_ms": 50,
        "quick_seek": true
    }"#;
    let config: StretchConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.interpolation, InterpolationAlgorithm::Shannon);
    assert_eq!(config.overlap_ms, 8);
    assert!(config.aa_filter);

    let proc = StreamProcessor::<f32>::with_config(config).unwrap();
    assert_eq!(proc.channels(), 2);
    assert_eq!(proc.get_setting(Setting::SequenceMs.id()), 50);
    assert_eq!(proc.get_setting(Setting::SeekWindowMs.id()), 0);
    assert_eq!(proc.get_setting(Setting::OverlapMs.id()), 8);
    assert_eq!(proc.get_setting(Setting::UseQuickSeek.id()), 1);
    assert_eq!(proc.get_setting(Setting::UseAaFilter.id()), 1);
    assert_eq!(proc.get_setting(Setting::AaFilterLength.id()), 64);
    // 50 ms at 48 kHz less an 8 ms overlap
    assert_eq!(proc.get_setting(Setting::NominalOutputSequence.id()), 2400 - 384);
}

#[test]
fn json_round_trip() {
    let config = StretchConfig::new()
        .with_sample_rate(22050)
        .with_channels(1)
        .with_interpolation(InterpolationAlgorithm::LinearFixed)
        .with_seek_window_ms(12)
        .with_aa_filter(false)
        .with_aa_filter_length(128);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"linear_fixed\""));
    let back: StretchConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn empty_json_is_default() {
    let config: StretchConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, StretchConfig::default());

    // no sample rate or channel count yet
    let mut proc = StreamProcessor::<f32>::with_config(config).unwrap();
    assert!(matches!(
        proc.put_samples(&[0.0; 4]),
        Err(StretchError::Configuration(_))
    ));
}

#[test]
fn invalid_values_are_rejected() {
    let config: StretchConfig = serde_json::from_str(r#"{"aa_filter_length": 20}"#).unwrap();
    assert_eq!(
        StreamProcessor::<f32>::with_config(config).unwrap_err(),
        StretchError::InvalidFilterLength(20)
    );

    let config = StretchConfig::new().with_channels(0);
    assert!(matches!(
        config.validate(),
        Err(StretchError::InvalidParameter(_))
    ));

    assert!(serde_json::from_str::<StretchConfig>(r#"{"interpolation": "quadratic"}"#).is_err());
}

#[test]
fn zero_lengths_select_automatic_mode() {
    let config = StretchConfig::new()
        .with_sample_rate(44100)
        .with_sequence_ms(0)
        .with_seek_window_ms(0);
    assert_eq!(config.sequence_ms, None);
    assert_eq!(config.seek_window_ms, None);

    let mut proc = StreamProcessor::<i16>::with_config(config).unwrap();
    proc.set_tempo(2.0).unwrap();
    assert_eq!(proc.get_setting(Setting::SequenceMs.id()), 0);
    // automatic 40 ms sequence and 8 ms overlap at tempo 2
    assert_eq!(proc.get_setting(Setting::NominalOutputSequence.id()), 1764 - 352);
    assert_eq!(
        proc.get_setting(Setting::NominalInputSequence.id()),
        2 * (1764 - 352)
    );
}
