//! Integration tests for the elfin-dump binary.
//!
//! Each test writes a synthetic ELF image to a temporary directory and runs
//! the built binary against it as a subprocess.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use elfin::section::{SHT_DYNSYM, SHT_SYMTAB};
use elfin::segment::{PT_INTERP, PT_LOAD};
use elfin::symbol::{STB_GLOBAL, STB_LOCAL, STT_FUNC, STT_OBJECT};
use elfin::testutil::{ElfBuilder, Segment, Sym};
use elfin::{Class, Encoding};
use tempfile::TempDir;

fn elfin_dump() -> Command {
    Command::new(env!("CARGO_BIN_EXE_elfin-dump"))
}

/// A dynamically linked 64-bit little-endian executable with both symbol tables.
fn write_fixture(dir: &Path) -> PathBuf {
    let mut builder = ElfBuilder::new(Class::Elf64, Encoding::Lsb);
    builder.add_segment(Segment::new(PT_INTERP, b"/lib/ld-linux.so.2\0".to_vec()));
    builder.add_segment(Segment::new(PT_LOAD, vec![0; 16]).flags(0x5).vaddr(0x40_0000));
    let dynstr = builder.add_string_table(".dynstr", &["puts", "stdout"]);
    builder.add_symbol_table(
        ".dynsym",
        SHT_DYNSYM,
        dynstr.index,
        &[
            Sym::null(),
            Sym::new(dynstr.offsets[0], 0x1000, 0x20).info(STB_GLOBAL, STT_FUNC),
            Sym::new(dynstr.offsets[1], 0x4000, 8).info(STB_GLOBAL, STT_OBJECT),
        ],
    );
    let strtab = builder.add_string_table(".strtab", &["_ZN4core3fmt5write17h0123456789abcdefE", "local"]);
    builder.add_symbol_table(
        ".symtab",
        SHT_SYMTAB,
        strtab.index,
        &[
            Sym::null(),
            Sym::new(strtab.offsets[0], 0x2000, 0x100).info(STB_GLOBAL, STT_FUNC),
            Sym::new(strtab.offsets[1], 0x3000, 0x10).info(STB_LOCAL, STT_FUNC),
        ],
    );
    let path = dir.join("fixture.elf");
    std::fs::write(&path, builder.build()).expect("failed to write fixture");
    path
}

fn run(dir: &TempDir, args: &[&str]) -> Output {
    elfin_dump()
        .args(args)
        .current_dir(dir.path())
        .output()
        .expect("failed to execute elfin-dump")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "elfin-dump failed (exit={:?}):\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr),
    );
    String::from_utf8(output.stdout.clone()).expect("stdout is UTF-8")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn symbols_default_selection() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    let output = run(&dir, &["symbols", elf.to_str().unwrap()]);
    assert_eq!(stdout(&output), "puts .dynsym\n");
}

#[test]
fn symbols_to_file_with_demangling() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    let out = dir.path().join("symbols.txt");
    let output = run(
        &dir,
        &[
            "symbols",
            elf.to_str().unwrap(),
            "--table",
            "symtab",
            "--demangle",
            "-o",
            out.to_str().unwrap(),
        ],
    );
    assert_eq!(stdout(&output), "");
    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "core::fmt::write .symtab\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("wrote 1 symbols"));
}

#[test]
fn quiet_suppresses_progress() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    let out = dir.path().join("symbols.txt");
    let output = run(&dir, &["-q", "symbols", elf.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(output.stderr.is_empty());
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    std::fs::write(
        dir.path().join("elfin.toml"),
        "[symbols]\ntables = [\"dynsym\"]\nkind = \"any\"\n\n[output]\nformat = \"json\"\n",
    )
    .unwrap();
    let output = run(&dir, &["symbols", elf.to_str().unwrap()]);
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["puts", "stdout"]);

    // A flag still wins over the file.
    let output = run(&dir, &["symbols", elf.to_str().unwrap(), "--format", "text", "--type", "func"]);
    assert_eq!(stdout(&output), "puts .dynsym\n");
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    let output = run(&dir, &["-c", "nope.toml", "symbols", elf.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.toml"));
}

#[test]
fn headers_summary() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    let text = stdout(&run(&dir, &["headers", elf.to_str().unwrap()]));
    assert!(text.contains("Class:       ELF64"));
    assert!(text.contains("Machine:     x86-64"));
    assert!(text.contains("Interpreter: /lib/ld-linux.so.2"));
    assert!(text.contains(".dynsym"));
    assert!(text.contains("R-X"));

    let json = stdout(&run(&dir, &["headers", elf.to_str().unwrap(), "--format", "json"]));
    let json: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(json["encoding"], "little-endian");
    assert_eq!(json["segments"][0]["type"], "INTERP");
    assert_eq!(json["sections"].as_array().unwrap().len(), 6);
}

#[test]
fn lookup_queries() {
    let dir = tempfile::tempdir().unwrap();
    let elf = write_fixture(dir.path());
    let text = stdout(&run(&dir, &["lookup", elf.to_str().unwrap(), "--address", "0x2010", "--demangle"]));
    assert!(text.trim_end().ends_with("core::fmt::write"));

    let json = stdout(&run(
        &dir,
        &["lookup", elf.to_str().unwrap(), "--name", "stdout", "--format", "json"],
    ));
    let json: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(json["value"], 0x4000);
    assert_eq!(json["type"], "OBJECT");

    let output = run(&dir, &["lookup", elf.to_str().unwrap(), "--name", "absent"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no symbol named `absent`"));
}

#[test]
fn rejects_non_elf_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.txt");
    std::fs::write(&path, b"not an ELF file").unwrap();
    let output = run(&dir, &["headers", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a readable ELF file"));
    assert!(stderr.contains("malformed"), "stderr: {stderr}");
}
