use assert_cmd::prelude::*;
use once_cell::sync::Lazy;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

static SCENE: Lazy<String> = Lazy::new(|| {
    r##"<Lunchbox background="#101010">
  <mesh name="cube" position="0 0.5 0">
    <boxGeometry args="1 1 1" />
    <meshStandardMaterial color="#ff0000" roughness="0.4" />
  </mesh>
  <mesh name="floor" rotation-x="-1.57">
    <planeGeometry args="10 10" />
    <meshBasicMaterial color="#333333" />
  </mesh>
  <pointLight position="3 5 3" intensity="2" />
</Lunchbox>
"##
    .to_string()
});

fn write_template(contents: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp template");
    tmp.write_all(contents.as_bytes()).expect("write template");
    tmp
}

#[test]
fn cli_headless_renders_frames_and_prints_summary() {
    let template = write_template(&SCENE);
    let mut cmd = Command::cargo_bin("lunchbox-viewer").expect("binary exists");
    cmd.arg(template.path())
        .arg("--headless")
        .arg("--frames")
        .arg("3");
    cmd.assert()
        .success()
        .stdout(contains("Mounted scene with 9 nodes"))
        .stdout(contains(" - scene (object)"))
        .stdout(contains("   - perspectiveCamera (object)"))
        .stdout(contains("   - mesh \"cube\" (object)"))
        .stdout(contains("     - boxGeometry (geometry)"))
        .stdout(contains("     - meshStandardMaterial (material)"))
        .stdout(contains("Rendered 3 frame(s), frame id 2"))
        .stdout(contains("Draw list: 2 item(s)"));
}

#[test]
fn cli_wraps_bare_templates_in_a_scene() {
    let template = write_template(
        r#"<group name="solo"><mesh><sphereGeometry args="0.5" /></mesh></group>"#,
    );
    let mut cmd = Command::cargo_bin("lunchbox-viewer").expect("binary exists");
    cmd.arg(template.path()).arg("--headless");
    cmd.assert()
        .success()
        .stdout(contains("   - group \"solo\" (object)"))
        .stdout(contains("Rendered 1 frame(s), frame id 0"))
        .stdout(contains("Draw list: 1 item(s)"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let template = write_template(&SCENE);
    let mut cmd = Command::cargo_bin("lunchbox-viewer").expect("binary exists");
    cmd.arg(template.path()).arg("--fast");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fast"))
        .stderr(contains("Usage: lunchbox-viewer"));
}

#[test]
fn cli_reports_missing_template() {
    let mut cmd = Command::cargo_bin("lunchbox-viewer").expect("binary exists");
    cmd.arg("/nonexistent/scene.xml").arg("--headless");
    cmd.assert()
        .failure()
        .stderr(contains("failed to read template"));
}

#[test]
fn cli_reports_malformed_xml() {
    let template = write_template("<Lunchbox><mesh></Lunchbox>");
    let mut cmd = Command::cargo_bin("lunchbox-viewer").expect("binary exists");
    cmd.arg(template.path()).arg("--headless");
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse template"));
}
