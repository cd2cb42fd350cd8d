use segment_canvas::settings::{EngineSettings, ImageSize};
use tempfile::tempdir;

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let settings = EngineSettings::load(path.to_str().unwrap()).unwrap();
    assert_eq!(settings, EngineSettings::default());
}

#[test]
fn save_then_load_keeps_rooms() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let path = path.to_str().unwrap();
    let settings = EngineSettings {
        images: vec![
            ImageSize {
                width: 640,
                height: 480,
            },
            ImageSize {
                width: 32,
                height: 32,
            },
        ],
        track_short_log: false,
        ..EngineSettings::default()
    };
    settings.save(path).unwrap();

    let loaded = EngineSettings::load(path).unwrap();
    assert_eq!(loaded, settings);
    let rooms: Vec<_> = loaded.rooms().collect();
    assert_eq!(rooms[1].0, "1");
    assert_eq!(rooms[1].1.width, 32);
}

#[test]
fn invalid_json_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ images: nope").unwrap();
    assert!(EngineSettings::load(path.to_str().unwrap()).is_err());
}

#[test]
fn loading_sanitizes_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"images":[{"width":0,"height":0},{"width":5,"height":5}],"room_channel_capacity":0}"#,
    )
    .unwrap();
    let settings = EngineSettings::load(path.to_str().unwrap()).unwrap();
    assert_eq!(settings.room_channel_capacity, 1);
    let rooms: Vec<_> = settings.rooms().collect();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].0, "1");
    assert_eq!(rooms[0].1.width, 5);
}
