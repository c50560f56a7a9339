mod helpers;

use tdmon::config::{normalize_ratios, ConfigFile, FilterPrefs, SortMode, DEFAULT_PANE_RATIOS};
use helpers::test_config;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn config_paths_live_under_base_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);

    assert_eq!(config.log_path(), tmp.path().join(".tdmon/tdmon.log"));
    assert_eq!(config.config_path(), tmp.path().join(".tdmon/config.toml"));
    assert_eq!(config.data_dir, tmp.path().join(".todos"));
}

#[test]
fn missing_file_gives_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);

    assert_eq!(config.load_file(), ConfigFile::default());
}

#[test]
fn saved_view_state_loads_back() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let file = ConfigFile {
        pane_heights: [0.2, 0.5, 0.3],
        filter: FilterPrefs {
            search_query: "labels ~ ui sort:-created".to_string(),
            sort_mode: SortMode::Created,
            type_filter: Some("bug".to_string()),
            include_closed: true,
        },
        sync_command: Some("git pull".to_string()),
    };

    config.save_file(&file).unwrap();
    let loaded = config.load_file();

    assert_eq!(loaded.filter, file.filter);
    assert_eq!(loaded.sync_command.as_deref(), Some("git pull"));
    for i in 0..3 {
        assert!(approx(loaded.pane_heights[i], file.pane_heights[i]));
    }
}

#[test]
fn partial_file_fills_in_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    std::fs::create_dir_all(&config.base_dir).unwrap();
    std::fs::write(config.config_path(), "[filter]\ninclude_closed = true\n").unwrap();

    let loaded = config.load_file();
    assert!(loaded.filter.include_closed);
    assert_eq!(loaded.filter.sort_mode, SortMode::Priority);
    assert_eq!(loaded.pane_heights, DEFAULT_PANE_RATIOS);
}

#[test]
fn undersized_pane_resets_split() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    std::fs::create_dir_all(&config.base_dir).unwrap();
    std::fs::write(config.config_path(), "pane_heights = [0.05, 0.5, 0.45]\n").unwrap();

    assert_eq!(config.load_file().pane_heights, DEFAULT_PANE_RATIOS);
}

#[test]
fn unparseable_file_falls_back_to_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    std::fs::create_dir_all(&config.base_dir).unwrap();
    std::fs::write(config.config_path(), "pane_heights = \"tall\"\n").unwrap();

    assert_eq!(config.load_file(), ConfigFile::default());
}

#[test]
fn ratios_are_scaled_to_one() {
    let r = normalize_ratios([1.0, 2.0, 1.0]);
    assert!(approx(r[0], 0.25));
    assert!(approx(r[1], 0.5));
    assert!(approx(r[2], 0.25));

    assert_eq!(normalize_ratios([f64::NAN, 0.5, 0.5]), DEFAULT_PANE_RATIOS);
}

#[test]
fn sort_mode_cycles_through_all_tokens() {
    let mut mode = SortMode::Priority;
    let mut tokens = Vec::new();
    for _ in 0..4 {
        tokens.push(mode.sort_token());
        mode = mode.next();
    }
    assert_eq!(mode, SortMode::Priority);
    assert_eq!(tokens, vec![None, Some("-created"), Some("-updated"), Some("id")]);
}
