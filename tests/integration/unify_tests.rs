use clap::Parser;
use libc_unify::cli::Cli;
use libc_unify::materialize::{common_rel_path, MaterializeSummary, COMMON_DIR, NORMALIZED_TIME};
use libc_unify::scanner::{is_executable, Hasher};
use libc_unify::{run_with_output, unify, UnifyOptions};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
}

#[cfg(unix)]
fn set_mode(root: &Path, rel: &str, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(root.join(rel), fs::Permissions::from_mode(mode)).unwrap();
}

/// Every non-directory path under `root`, relative and sorted.
fn list_tree(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let entry = entry.unwrap();
            let ft = entry.file_type().unwrap();
            if ft.is_dir() {
                stack.push(entry.path());
            } else {
                out.push(entry.path().strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    out.sort();
    out
}

/// Snapshot of a tree: contents or link target, plus the resolved mode and
/// timestamps, by path.
///
/// All metadata is read before any content so reading a common file cannot
/// bump the atime seen through a link visited later.
#[cfg(unix)]
fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    use std::os::unix::fs::MetadataExt;

    let paths = list_tree(root);
    let stamps: Vec<String> = paths
        .iter()
        .map(|rel| {
            let resolved = fs::metadata(root.join(rel)).unwrap();
            format!(
                "mode={:o} mtime={} atime={}",
                resolved.mode() & 0o7777,
                resolved.mtime(),
                resolved.atime()
            )
        })
        .collect();

    paths
        .into_iter()
        .zip(stamps)
        .map(|(rel, stamp)| {
            let path = root.join(&rel);
            let entry = if path.is_symlink() {
                format!("-> {}", fs::read_link(&path).unwrap().display())
            } else {
                format!("{:?}", fs::read(&path).unwrap())
            };
            (rel, format!("{} {}", entry, stamp))
        })
        .collect()
}

fn options() -> UnifyOptions {
    UnifyOptions::default().with_io_threads(2)
}

#[cfg(unix)]
#[test]
fn test_shared_file_across_two_arches() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let script = b"GROUP ( libc.so.6 )\n";
    write_file(src.path(), "armv7/usr/lib/libc.so", script);
    write_file(src.path(), "aarch64/usr/lib/libc.so", script);
    set_mode(src.path(), "armv7/usr/lib/libc.so", 0o644);
    set_mode(src.path(), "aarch64/usr/lib/libc.so", 0o644);

    let report = unify(src.path(), dest.path(), &options()).unwrap();
    assert_eq!(
        report.materialize,
        MaterializeSummary {
            copied: 0,
            symlinked: 2,
            common: 1
        }
    );

    let fingerprint = Hasher::new()
        .fingerprint(&src.path().join("armv7/usr/lib/libc.so"))
        .unwrap();
    let common = dest
        .path()
        .join(COMMON_DIR)
        .join(fingerprint.shard())
        .join(fingerprint.to_hex());
    assert_eq!(fs::read(&common).unwrap(), b"GROUP ( libc.so.6 )\n");

    for arch in ["armv7", "aarch64"] {
        let link = dest.path().join(arch).join("usr/lib/libc.so");
        let target = fs::read_link(&link).unwrap();
        assert_eq!(
            target,
            Path::new("../../../common")
                .join(fingerprint.shard())
                .join(fingerprint.to_hex())
        );
        assert_eq!(fs::read(&link).unwrap(), b"GROUP ( libc.so.6 )\n");
    }
}

#[cfg(unix)]
#[test]
fn test_unique_file_is_copied_and_normalized() {
    use std::os::unix::fs::MetadataExt;

    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "x86_64/usr/lib/crt1.o", b"\x7fELF only here");
    set_mode(src.path(), "x86_64/usr/lib/crt1.o", 0o600);

    let report = unify(src.path(), dest.path(), &options()).unwrap();
    assert_eq!(
        report.materialize,
        MaterializeSummary {
            copied: 1,
            symlinked: 0,
            common: 0
        }
    );

    let copy = dest.path().join("x86_64/usr/lib/crt1.o");
    let meta = fs::symlink_metadata(&copy).unwrap();
    assert!(meta.file_type().is_file());
    assert_eq!(meta.mode() & 0o7777, 0o644);
    assert_eq!(meta.mtime(), 1_609_502_400);
    assert_eq!(fs::read(&copy).unwrap(), b"\x7fELF only here");
    assert!(!dest.path().join(COMMON_DIR).exists());
}

#[cfg(unix)]
#[test]
fn test_shared_executable_is_normalized() {
    use std::os::unix::fs::MetadataExt;

    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    for arch in ["armv7", "aarch64"] {
        let rel = format!("{}/usr/bin/ldd", arch);
        write_file(src.path(), &rel, b"#!/bin/bash\nexec ld.so --list \"$@\"\n");
        set_mode(src.path(), &rel, 0o4711);
    }

    let report = unify(src.path(), dest.path(), &options()).unwrap();
    assert_eq!(
        report.materialize,
        MaterializeSummary {
            copied: 0,
            symlinked: 2,
            common: 1
        }
    );

    let fingerprint = Hasher::new()
        .fingerprint(&src.path().join("armv7/usr/bin/ldd"))
        .unwrap();
    let common = dest.path().join(common_rel_path(&fingerprint));
    let mut resolved = vec![common];
    resolved.extend(
        ["armv7", "aarch64"]
            .iter()
            .map(|arch| dest.path().join(arch).join("usr/bin/ldd")),
    );

    for path in resolved {
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.mode() & 0o7777, 0o755, "mode of {}", path.display());
        assert_eq!(meta.mtime(), NORMALIZED_TIME, "mtime of {}", path.display());
        assert_eq!(meta.atime(), NORMALIZED_TIME, "atime of {}", path.display());
    }
}

#[cfg(unix)]
#[test]
fn test_exec_bit_splits_identical_content() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "armv7/usr/bin/ldd", b"#!/bin/sh\n");
    write_file(src.path(), "aarch64/usr/bin/ldd", b"#!/bin/sh\n");
    set_mode(src.path(), "armv7/usr/bin/ldd", 0o755);
    set_mode(src.path(), "aarch64/usr/bin/ldd", 0o644);

    let report = unify(src.path(), dest.path(), &options()).unwrap();
    assert_eq!(report.materialize.copied, 2);
    assert_eq!(report.materialize.symlinked, 0);
    assert_eq!(report.scan.unique_fingerprints, 2);
}

#[cfg(unix)]
#[test]
fn test_headers_only_ignores_other_files() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "armv7/usr/include/stdio.h", b"/* stdio */\n");
    write_file(src.path(), "aarch64/usr/include/stdio.h", b"/* stdio */\n");
    write_file(src.path(), "armv7/usr/lib/libc.a", b"archive");
    write_file(src.path(), "riscv64/usr/lib/libc.a", b"no headers here");

    let headers_only = options().with_headers_only(true);
    let report = unify(src.path(), dest.path(), &headers_only).unwrap();

    assert_eq!(
        report.materialize,
        MaterializeSummary {
            copied: 0,
            symlinked: 2,
            common: 1
        }
    );
    assert_eq!(report.scan.inputs, 3);
    assert_eq!(report.scan.scanned_inputs, 2);

    let tree = list_tree(dest.path());
    assert!(tree.contains(&PathBuf::from("armv7/usr/include/stdio.h")));
    assert!(tree.contains(&PathBuf::from("aarch64/usr/include/stdio.h")));
    assert!(!tree.iter().any(|p| p.ends_with("libc.a")));
}

#[cfg(unix)]
#[test]
fn test_every_source_file_appears_in_destination() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let files = [
        ("armv7/usr/include/stdio.h", &b"common header"[..]),
        ("aarch64/usr/include/stdio.h", b"common header"),
        ("x86_64/usr/include/stdio.h", b"common header"),
        ("armv7/usr/include/bits/wordsize.h", b"#define __WORDSIZE 32"),
        ("aarch64/usr/include/bits/wordsize.h", b"#define __WORDSIZE 64"),
        ("x86_64/usr/include/bits/wordsize.h", b"#define __WORDSIZE 64"),
        ("x86_64/usr/lib/.hidden", b""),
        ("aarch64/usr/lib/empty", b""),
    ];
    for (rel, content) in files {
        write_file(src.path(), rel, content);
    }

    let report = unify(src.path(), dest.path(), &options()).unwrap();
    let summary = report.materialize;
    assert_eq!(summary.copied + summary.symlinked, files.len());

    // The two empty files share a fingerprint too
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.common, 3);

    for (rel, content) in files {
        let path = dest.path().join(rel);
        assert_eq!(fs::read(&path).unwrap(), content, "content of {}", rel);
        assert_eq!(
            is_executable(&fs::metadata(&path).unwrap()),
            is_executable(&fs::metadata(src.path().join(rel)).unwrap()),
            "exec bit of {}",
            rel
        );
    }
}

#[cfg(unix)]
#[test]
fn test_common_files_are_content_addressed() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "a/x.h", b"one");
    write_file(src.path(), "b/x.h", b"one");
    write_file(src.path(), "a/y.h", b"two");
    write_file(src.path(), "b/z.h", b"two");

    unify(src.path(), dest.path(), &options()).unwrap();

    let hasher = Hasher::new();
    let commons: Vec<_> = list_tree(dest.path())
        .into_iter()
        .filter(|p| p.starts_with(COMMON_DIR))
        .collect();
    assert_eq!(commons.len(), 2);

    for rel in commons {
        let path = dest.path().join(&rel);
        let fingerprint = hasher.fingerprint(&path).unwrap();
        assert_eq!(
            rel,
            Path::new(COMMON_DIR)
                .join(fingerprint.shard())
                .join(fingerprint.to_hex())
        );
    }
}

#[cfg(unix)]
#[test]
fn test_output_is_deterministic() {
    let src = tempdir().unwrap();
    for (i, arch) in ["armv7", "aarch64", "i686", "x86_64"].iter().enumerate() {
        let header = format!("{}/usr/include/stdio.h", arch);
        write_file(src.path(), &header, b"shared");
        write_file(
            src.path(),
            &format!("{}/usr/include/bits/arch.h", arch),
            format!("arch {}", i % 2).as_bytes(),
        );
        let lib = format!("{}/usr/lib/libc.so.6", arch);
        write_file(src.path(), &lib, arch.as_bytes());
        write_file(src.path(), &format!("{}/usr/bin/ldd", arch), b"#!/bin/sh\n");
        set_mode(src.path(), &format!("{}/usr/bin/ldd", arch), 0o750);
    }

    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = unify(src.path(), first.path(), &options().with_io_threads(1));
    // Far enough apart that an unnormalized timestamp would differ
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let b = unify(src.path(), second.path(), &options().with_io_threads(8));

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(snapshot(first.path()), snapshot(second.path()));
}

#[cfg(unix)]
#[test]
fn test_destination_is_relocatable() {
    let src = tempdir().unwrap();
    let work = tempdir().unwrap();
    write_file(src.path(), "armv7/usr/include/deep/nested/dir/a.h", b"same");
    write_file(src.path(), "aarch64/usr/include/a.h", b"same");

    let original = work.path().join("unified");
    unify(src.path(), &original, &options()).unwrap();

    let moved = work.path().join("somewhere/else");
    fs::create_dir_all(moved.parent().unwrap()).unwrap();
    fs::rename(&original, &moved).unwrap();

    assert_eq!(
        fs::read(moved.join("armv7/usr/include/deep/nested/dir/a.h")).unwrap(),
        b"same"
    );
    let header = fs::read(moved.join("aarch64/usr/include/a.h")).unwrap();
    assert_eq!(header, b"same");
}

#[cfg(unix)]
#[test]
fn test_rerun_into_same_destination() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "a/usr/include/x.h", b"shared");
    write_file(src.path(), "b/usr/include/x.h", b"shared");
    write_file(src.path(), "a/usr/include/only.h", b"unique");

    let first = unify(src.path(), dest.path(), &options()).unwrap();
    let before = snapshot(dest.path());
    let second = unify(src.path(), dest.path(), &options()).unwrap();

    assert_eq!(first, second);
    assert_eq!(before, snapshot(dest.path()));
}

#[test]
fn test_empty_source_writes_nothing() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let out = dest.path().join("out");

    let report = unify(src.path(), &out, &options()).unwrap();
    assert_eq!(report.materialize, MaterializeSummary::default());
    assert!(out.is_dir());
    assert!(list_tree(&out).is_empty());
}

#[cfg(unix)]
#[test]
fn test_run_prints_text_summary() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "a/usr/include/x.h", b"shared");
    write_file(src.path(), "b/usr/include/x.h", b"shared");
    write_file(src.path(), "a/usr/lib/libc.a", b"unique");

    let cli = Cli::try_parse_from([
        Path::new("libc-unify"),
        Path::new("--no-progress"),
        Path::new("-q"),
        src.path(),
        dest.path(),
    ])
    .unwrap();

    let mut out = Vec::new();
    run_with_output(cli, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "copied 1 files; symlinked 2 files to 1 common files\n"
    );
}

#[cfg(unix)]
#[test]
fn test_run_prints_json_summary() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    write_file(src.path(), "a/usr/include/x.h", b"shared");
    write_file(src.path(), "b/usr/include/x.h", b"shared");

    let cli = Cli::try_parse_from([
        Path::new("libc-unify"),
        Path::new("--no-progress"),
        Path::new("-q"),
        Path::new("--format"),
        Path::new("json"),
        Path::new("--headers-only"),
        src.path(),
        dest.path(),
    ])
    .unwrap();

    let mut out = Vec::new();
    run_with_output(cli, &mut out).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["copied"], 0);
    assert_eq!(value["symlinked"], 2);
    assert_eq!(value["common"], 1);
}
