//! Packed archive example.
//!
//! This example shows:
//! - Writing an archive with `ArchiveWriter`
//! - Mounting it through `EngineBuilder`
//! - Registering a custom loader
//! - Loading asynchronously and pumping until resident
//! - Processing events

use std::fs::File;

use kiln::assets::ArchiveWriter;
use kiln::prelude::*;

/// Key/value pairs, one `key=value` per line.
#[derive(Debug, Default)]
struct Settings {
    pairs: Vec<(String, String)>,
}

struct SettingsLoader;

impl ResourceLoader for SettingsLoader {
    type Resource = Settings;
    type Decoded = Vec<(String, String)>;

    fn extensions(&self) -> &[&str] {
        &["ini"]
    }

    fn create_dummy(&self) -> Settings {
        Settings::default()
    }

    fn decode(&self, stream: &mut dyn ByteStream) -> AssetResult<Self::Decoded> {
        let bytes = stream.read_to_end()?;
        let text = String::from_utf8(bytes)
            .map_err(|e| AssetError::decode(stream.path(), e.to_string()))?;
        Ok(text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect())
    }

    fn on_decoded(
        &self,
        settings: &mut Settings,
        pairs: Self::Decoded,
        _ctx: &FinalizeContext<'_>,
    ) -> AssetResult<()> {
        settings.pairs = pairs;
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let archive_path = dir.path().join("data.pak");

    let mut writer = ArchiveWriter::new();
    writer.add("config/video.ini", b"width = 1280\nheight = 720\n".to_vec())?;
    writer.add("docs/readme.txt", b"Packed with kiln".to_vec())?;
    writer.write_to(&mut File::create(&archive_path)?)?;

    let mut engine = Engine::builder()
        .mount_archive(&archive_path)
        .add_loader(SettingsLoader)
        .install_logging(true)
        .build();

    let video = engine
        .load::<Settings>("config/video.ini", LoadMode::Async)
        .ok_or("no loader for config/video.ini")?;
    let readme = engine
        .load::<String>("docs/readme.txt", LoadMode::Immediate)
        .ok_or("no loader for docs/readme.txt")?;

    while !engine.registry().is_resident(video) {
        engine.update();
        for event in engine.events() {
            println!("{:?}", event);
        }
        std::thread::yield_now();
    }

    engine.registry().with_resource(video, |settings| {
        for (key, value) in &settings.pairs {
            println!("{key} = {value}");
        }
    });
    engine
        .registry()
        .with_resource(readme, |text| println!("readme: {text}"));

    Ok(())
}
