use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

const KIB: usize = 1024;

fn fwcombine(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fwcombine").unwrap();
    cmd.current_dir(dir).env_remove("PIOENV").env_remove("RUST_LOG");
    cmd
}

#[test]
fn assemble() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("bootloader.bin"), [0u8; 100])?;
    fs::write(dir.path().join("application.bin"), [0u8; 50])?;

    fwcombine(dir.path())
        .args(["assemble", "bootloader.bin", "application.bin"])
        .args(["--layout", "v2", "--output", "out/firmware.bin"])
        .assert()
        .success();

    let image = fs::read(dir.path().join("out/firmware.bin"))?;
    assert_eq!(image.len(), 64 * KIB);
    assert!(image[100..20 * KIB].iter().all(|&b| b == 0xFF));
    assert_eq!(&image[64 * KIB - 4..], &[0xC8, 0xF5, 0x20, 0x69]);

    Ok(())
}

#[test]
fn assemble_twice_is_identical() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("bootloader.bin"), b"bootloader")?;
    fs::write(dir.path().join("application.bin"), b"application")?;

    let mut images = Vec::new();
    for _ in 0..2 {
        fwcombine(dir.path())
            .args(["assemble", "bootloader.bin", "application.bin", "-o", "out/fw.bin"])
            .assert()
            .success();
        images.push(fs::read(dir.path().join("out/fw.bin"))?);
    }

    assert_eq!(images[0], images[1]);

    Ok(())
}

#[test]
fn assemble_overflow_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("bootloader.bin"), vec![0u8; 16 * KIB + 1])?;
    fs::write(dir.path().join("application.bin"), [0u8; 50])?;
    fs::create_dir_all(dir.path().join("out"))?;
    fs::write(dir.path().join("out/firmware.bin"), b"stale image")?;

    fwcombine(dir.path())
        .args(["assemble", "bootloader.bin", "application.bin"])
        .args(["--layout", "v1", "--output", "out/firmware.bin"])
        .assert()
        .failure();

    assert!(!dir.path().join("out/firmware.bin").exists());

    Ok(())
}

#[test]
fn assemble_output_file_keeps_project_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("platformio.ini"), "[env]\n")?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::write(dir.path().join("src/main.c"), "int main(void) { return 0; }\n")?;
    fs::write(dir.path().join("bootloader.bin"), [0u8; 100])?;
    fs::write(dir.path().join("application.bin"), [0u8; 50])?;

    fwcombine(dir.path())
        .args(["assemble", "bootloader.bin", "application.bin", "-o", "combined.bin"])
        .assert()
        .success();

    let mut entries = fs::read_dir(dir.path())?
        .map(|entry| Ok(entry?.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, std::io::Error>>()?;
    entries.sort();
    assert_eq!(
        entries,
        [
            "application.bin",
            "bootloader.bin",
            "combined.bin",
            "platformio.ini",
            "src"
        ]
    );
    assert!(dir.path().join("src/main.c").is_file());
    assert_eq!(fs::read(dir.path().join("combined.bin"))?.len(), 64 * KIB);

    Ok(())
}

#[test]
fn output_dir_containing_project_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("fwcombine.toml"), "[output]\ndir = \".\"\n")?;
    fs::write(dir.path().join("platformio.ini"), "[env]\n")?;
    fs::write(dir.path().join("bootloader.bin"), [0u8; 100])?;
    fs::write(dir.path().join("application.bin"), [0u8; 50])?;

    fwcombine(dir.path())
        .args(["assemble", "bootloader.bin", "application.bin"])
        .assert()
        .failure();

    assert!(dir.path().join("fwcombine.toml").is_file());
    assert!(dir.path().join("platformio.ini").is_file());
    assert!(dir.path().join("bootloader.bin").is_file());

    Ok(())
}

#[test]
fn build_skips_other_targets() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    fwcombine(dir.path())
        .args(["build", "--env", "application_stm32f0"])
        .assert()
        .success();

    assert!(!dir.path().join(".pio").exists());

    Ok(())
}

#[cfg(unix)]
#[test]
fn build_runs_both_steps() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("fwcombine.toml"),
        r#"
target = "combined"
layout = "v1"

[build]
tool = ["sh", "-c", "mkdir -p build/$0 && printf '%s' $0 > build/$0/firmware.bin"]
args = ["{env}"]
bootloader = "boot"
application = "app"
build_dir = "build"

[output]
dir = "build/combined"
file = "combined.bin"
"#,
    )?;

    fwcombine(dir.path())
        .args(["build", "--env", "combined"])
        .assert()
        .success();

    let image = fs::read(dir.path().join("build/combined/combined.bin"))?;
    assert_eq!(image.len(), 64 * KIB);
    assert_eq!(&image[..4], b"boot");
    assert_eq!(&image[16 * KIB..16 * KIB + 3], b"app");
    assert!(image[16 * KIB + 3..].iter().all(|&b| b == 0xFF));

    Ok(())
}

#[cfg(unix)]
#[test]
fn build_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("fwcombine.toml"),
        "[build]\ntool = [\"false\"]\n",
    )?;

    fwcombine(dir.path())
        .args(["build", "--env", "combined_stm32f0"])
        .assert()
        .failure();

    assert!(!dir
        .path()
        .join(".pio/build/combined_stm32f0/firmware.bin")
        .exists());

    Ok(())
}

#[test]
fn layouts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let output = fwcombine(dir.path()).arg("layouts").output()?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("v1"));
    assert!(stdout.contains("v2"));
    assert!(stdout.contains("0x08005000"));

    Ok(())
}
