use std::fs;
use tempfile::TempDir;

use super::*;

fn write_script(dir: &Path, relative: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("can create parent dirs");
    }
    fs::write(&path, content).expect("can write script");
    path
}

#[test]
fn extracts_description_usage_and_category() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let path = write_script(
        temp_dir.path(),
        "audio/fix_audio.sh",
        "#!/bin/bash\n\
         # Restarts the PipeWire audio stack and resets the default sink.\n\
         # Usage: fix_audio.sh [--dry-run]\n\
         #\n\
         # Body comments are not part of the description.\n\
         systemctl --user restart pipewire\n\
         pactl set-default-sink 0\n",
    );

    let metadata = HeaderCommentExtractor
        .extract(&path)
        .expect("extraction succeeds");

    assert_eq!(metadata.name, "fix_audio");
    assert_eq!(metadata.category, "audio");
    assert_eq!(
        metadata.description,
        "Restarts the PipeWire audio stack and resets the default sink."
    );
    assert_eq!(metadata.usage, "fix_audio.sh [--dry-run]");
    assert_eq!(
        metadata.dependencies,
        vec!["pactl".to_string(), "systemctl".to_string()]
    );
    assert!(metadata.tags.contains(&"audio".to_string()));
    assert!(metadata.tags.contains(&"fix".to_string()));
}

#[test]
fn slash_comments_are_recognized() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let path = write_script(
        temp_dir.path(),
        "system/configure_time.ts",
        "// Configures NTP time synchronization.\n\
         // Usage: configure_time.ts --timezone <tz>\n\
         import { run } from \"./lib/common.ts\";\n\
         await run([\"timedatectl\", \"set-ntp\", \"true\"]);\n",
    );

    let metadata = HeaderCommentExtractor
        .extract(&path)
        .expect("extraction succeeds");

    assert_eq!(metadata.description, "Configures NTP time synchronization.");
    assert_eq!(metadata.usage, "configure_time.ts --timezone <tz>");
    assert_eq!(metadata.category, "system");
}

#[test]
fn script_without_comments_yields_empty_description() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let path = write_script(
        temp_dir.path(),
        "video/capture.sh",
        "#!/bin/sh\nffmpeg -i /dev/video0 out.mkv\n",
    );

    let metadata = HeaderCommentExtractor
        .extract(&path)
        .expect("extraction succeeds");

    assert_eq!(metadata.description, "");
    assert_eq!(metadata.usage, "");
    assert_eq!(metadata.dependencies, vec!["ffmpeg".to_string()]);
}

#[test]
fn missing_file_is_an_error() {
    let temp_dir = TempDir::new().expect("can create temp dir");
    let missing = temp_dir.path().join("nope.sh");
    assert!(HeaderCommentExtractor.extract(&missing).is_err());
}
