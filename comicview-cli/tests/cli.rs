use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{ImageFormat, RgbaImage};
use tempfile::{tempdir, TempDir};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbaImage::new(width, height)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

/// Three portrait pages and one landscape page.
fn write_comic(dir: &Path) -> PathBuf {
    let path = dir.join("book.cbz");
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, (width, height)) in [
        ("01.png", (2, 3)),
        ("02.png", (2, 3)),
        ("03.png", (6, 2)),
        ("04.png", (2, 3)),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(&png(width, height)).unwrap();
    }
    zip.start_file("ComicInfo.xml", options).unwrap();
    zip.write_all(b"<ComicInfo/>").unwrap();
    zip.finish().unwrap();
    path
}

struct Fixture {
    dir: TempDir,
    comic: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let comic = write_comic(dir.path());
        Self { dir, comic }
    }

    fn run(&self, args: &[&str]) -> String {
        let output = self.command(args).output().unwrap();
        assert!(
            output.status.success(),
            "comicview {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("comicview").unwrap();
        cmd.env("RUST_LOG", "warn")
            .arg("--config")
            .arg(self.dir.path().join("config.toml"))
            .arg("--state-dir")
            .arg(self.dir.path().join("state"))
            .args(args);
        cmd
    }

    fn comic(&self) -> &str {
        self.comic.to_str().unwrap()
    }
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("comicview")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let help = String::from_utf8(output.stdout).unwrap();
    for name in ["info", "spreads", "pages", "bookmark", "hide", "span", "mode"] {
        assert!(help.contains(name), "missing {name} in {help}");
    }
}

#[test]
fn missing_archive_fails() {
    let fixture = Fixture::new();
    let missing = fixture.dir.path().join("missing.cbz");
    let output = fixture
        .command(&["info", missing.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to open"));
}

#[test]
fn spreads_follow_page_shapes() {
    let fixture = Fixture::new();
    assert_eq!(
        fixture.run(&["spreads", fixture.comic()]),
        "0\t[0,1]\n1\t[2]\n2\t[3]\n"
    );
    assert_eq!(
        fixture.run(&["spreads", fixture.comic(), "--mode", "strip"]),
        "0\t[0,1,2,3]\n"
    );
    // previewing a mode does not save it
    assert!(fixture.run(&["info", fixture.comic()]).contains("mode:      paired"));
}

#[test]
fn edits_survive_between_runs() {
    let fixture = Fixture::new();
    fixture.run(&["hide", fixture.comic(), "1"]);
    fixture.run(&["span", fixture.comic(), "2"]);
    assert_eq!(
        fixture.run(&["spreads", fixture.comic()]),
        "0\t[0,2]\n1\t[3]\n"
    );

    fixture.run(&["bookmark", "add", fixture.comic(), "3"]);
    fixture.run(&["bookmark", "add", fixture.comic(), "0"]);
    let listed = fixture.run(&["bookmark", "list", fixture.comic()]);
    let pages: Vec<&str> = listed
        .lines()
        .map(|line| line.split('\t').next().unwrap())
        .collect();
    assert_eq!(pages, ["0", "3"]);

    fixture.run(&["mode", fixture.comic(), "single"]);
    fixture.run(&["info", fixture.comic(), "--page", "2"]);
    let info = fixture.run(&["info", fixture.comic()]);
    assert!(info.contains("mode:      single"), "{info}");
    assert!(info.contains("page:      2"), "{info}");
    assert!(info.contains("bookmarks: 2"), "{info}");
}

#[test]
fn pages_report_dimensions_and_flags() {
    let fixture = Fixture::new();
    fixture.run(&["hide", fixture.comic(), "0"]);
    let pages = fixture.run(&["pages", fixture.comic()]);
    let lines: Vec<&str> = pages.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "0\t01.png\t2x3\tsingle\thidden");
    assert_eq!(lines[2], "2\t03.png\t6x2\tdouble");
}
