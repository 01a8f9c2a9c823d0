use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::error::{ProvisionError, ProvisionResult};
use crate::core::platform::TargetArch;

use super::binary::{guess_from_name, inspect_header, HeaderKind, HEADER_PREFIX_LEN};

const SIGNING_PREFIX: &str = "META-INF/";

/// Longest first so `x86_64` is removed before `x86` or `64` can split it.
const ARCH_TOKENS: [&str; 10] = [
    "aarch64", "x86_64", "arm64", "amd64", "i386", "i686", "x64", "x86", "64", "32",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Base file names written to the destination, sorted.
    pub extracted: Vec<String>,
    pub skipped_arch: usize,
    pub deduplicated: usize,
}

#[derive(Debug)]
struct Survivor {
    index: usize,
    path: String,
    file_name: String,
    unix_mode: Option<u32>,
}

/// Extract the native payload of `archive` for `target` into `dest`, flattened.
/// Runs on the blocking pool.
pub async fn extract_natives(
    archive: &Path,
    dest: &Path,
    target: TargetArch,
) -> ProvisionResult<ExtractionReport> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract_natives_blocking(&archive, &dest, target)).await?
}

pub fn extract_natives_blocking(
    archive_path: &Path,
    dest: &Path,
    target: TargetArch,
) -> ProvisionResult<ExtractionReport> {
    let corrupt = |reason: String| ProvisionError::Extraction {
        archive: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| ProvisionError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    let mut report = ExtractionReport::default();
    let mut by_logical_name: HashMap<String, Survivor> = HashMap::new();

    for index in 0..archive.len() {
        let mut member = archive
            .by_index(index)
            .map_err(|e| corrupt(e.to_string()))?;
        let path = member.name().to_string();
        if member.is_dir() || is_excluded(&path) {
            continue;
        }

        let Some(file_name) = member
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        else {
            warn!("Skipping unsafe entry {:?} in {:?}", path, archive_path);
            continue;
        };

        let mut prefix = Vec::with_capacity(HEADER_PREFIX_LEN);
        (&mut member)
            .take(HEADER_PREFIX_LEN as u64)
            .read_to_end(&mut prefix)
            .map_err(|e| corrupt(format!("{path}: {e}")))?;

        let header = inspect_header(&prefix);
        if header == HeaderKind::JavaClass || file_name.ends_with(".class") {
            return Err(corrupt(format!(
                "{path} is a compiled class, not a native library"
            )));
        }

        let arch = match (header, guess_from_name(&file_name)) {
            (HeaderKind::Foreign, _) => {
                debug!("{}: built for a foreign machine, skipping", path);
                report.skipped_arch += 1;
                continue;
            }
            (HeaderKind::Native(actual), Some(named)) if actual != named => {
                warn!(
                    "{}: header says {}, name suggests {}; trusting header",
                    path, actual, named
                );
                Some(actual)
            }
            (HeaderKind::Native(actual), _) => Some(actual),
            (HeaderKind::Unrecognized, Some(named)) => {
                debug!("{}: unrecognized header, guessing {} from name", path, named);
                Some(named)
            }
            _ => None,
        };

        if arch.is_some_and(|a| a != target) {
            report.skipped_arch += 1;
            continue;
        }

        let survivor = Survivor {
            index,
            unix_mode: member.unix_mode(),
            file_name,
            path,
        };
        let key = logical_name(&survivor.file_name);
        match by_logical_name.get(&key) {
            Some(existing) if existing.path.len() >= survivor.path.len() => {
                debug!("Dropping {} in favour of {}", survivor.path, existing.path);
                report.deduplicated += 1;
            }
            Some(existing) => {
                debug!("Dropping {} in favour of {}", existing.path, survivor.path);
                report.deduplicated += 1;
                by_logical_name.insert(key, survivor);
            }
            None => {
                by_logical_name.insert(key, survivor);
            }
        }
    }

    std::fs::create_dir_all(dest).map_err(|e| ProvisionError::io(dest, e))?;

    let mut survivors: Vec<Survivor> = by_logical_name.into_values().collect();
    survivors.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    for survivor in survivors {
        let mut member = archive
            .by_index(survivor.index)
            .map_err(|e| corrupt(e.to_string()))?;
        let out_path = dest.join(&survivor.file_name);
        // A previous run may have left it read-only.
        if out_path.exists() {
            std::fs::remove_file(&out_path).map_err(|e| ProvisionError::io(&out_path, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| ProvisionError::io(&out_path, e))?;
        std::io::copy(&mut member, &mut out).map_err(|e| ProvisionError::io(&out_path, e))?;
        apply_mode(&out_path, survivor.unix_mode)?;
        report.extracted.push(survivor.file_name);
    }

    info!(
        "Extracted {} natives from {:?} ({} other-arch, {} duplicates)",
        report.extracted.len(),
        archive_path.file_name().unwrap_or_default(),
        report.skipped_arch,
        report.deduplicated
    );
    Ok(report)
}

fn is_excluded(path: &str) -> bool {
    if path.starts_with(SIGNING_PREFIX) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    lower.contains("license")
        || lower.contains("licence")
        || lower.ends_with(".sha1")
        || lower.ends_with(".git")
}

/// File name with architecture tokens and separators removed, extension kept.
fn logical_name(file_name: &str) -> String {
    let lower = file_name.to_ascii_lowercase();
    let (stem, ext) = match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext)),
        _ => (lower.clone(), None),
    };
    let stripped = ARCH_TOKENS
        .iter()
        .fold(stem, |acc, token| acc.replace(token, ""));
    let core: String = stripped
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '.'))
        .collect();
    match ext {
        Some(ext) => format!("{core}.{ext}"),
        None => core,
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> ProvisionResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let Some(mode) = mode else {
        return Ok(());
    };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
        .map_err(|e| ProvisionError::io(path, e))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> ProvisionResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::natives::binary::fixtures::{class_file, elf, pe};
    use std::io::Write;
    use std::path::PathBuf;
    use zip::write::SimpleFileOptions;

    fn build_jar(dir: &Path, entries: &[(&str, Vec<u8>)]) -> PathBuf {
        let path = dir.join("natives.jar");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, bytes) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap();
                continue;
            }
            let options = SimpleFileOptions::default().unix_permissions(0o755);
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn with_payload(mut header: Vec<u8>, tag: &str) -> Vec<u8> {
        header.extend_from_slice(tag.as_bytes());
        header
    }

    #[test]
    fn header_filters_by_architecture() {
        let dir = tempfile::tempdir().unwrap();
        let x86 = with_payload(elf(1, 0x03), "x86");
        let x64 = with_payload(elf(2, 0x3E), "x64");
        let jar = build_jar(
            dir.path(),
            &[("lib-x86.so", x86), ("lib-x86_64.so", x64.clone())],
        );
        let out = dir.path().join("out");

        let report = extract_natives_blocking(&jar, &out, TargetArch::Bits64).unwrap();

        assert_eq!(report.extracted, vec!["lib-x86_64.so".to_string()]);
        assert_eq!(report.skipped_arch, 1);
        assert_eq!(std::fs::read(out.join("lib-x86_64.so")).unwrap(), x64);
        assert!(!out.join("lib-x86.so").exists());
    }

    #[test]
    fn header_wins_over_name_and_duplicates_collapse() {
        let dir = tempfile::tempdir().unwrap();
        // Both are really 64-bit; the x86 name is wrong.
        let jar = build_jar(
            dir.path(),
            &[
                ("lib-x86.so", with_payload(elf(2, 0x3E), "a")),
                ("lib-x86_64.so", with_payload(elf(2, 0x3E), "b")),
            ],
        );
        let out = dir.path().join("out");

        let report = extract_natives_blocking(&jar, &out, TargetArch::Bits64).unwrap();

        assert_eq!(report.extracted, vec!["lib-x86_64.so".to_string()]);
        assert_eq!(report.deduplicated, 1);
    }

    #[test]
    fn excludes_metadata_directories_and_licenses() {
        let dir = tempfile::tempdir().unwrap();
        let dll = with_payload(pe(0x8664), "lwjgl");
        let jar = build_jar(
            dir.path(),
            &[
                ("META-INF/", Vec::new()),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0".to_vec()),
                ("windows/", Vec::new()),
                ("windows/x64/lwjgl.dll", dll.clone()),
                ("windows/x64/lwjgl.dll.sha1", b"abc".to_vec()),
                ("LICENSE.txt", b"license text".to_vec()),
            ],
        );
        let out = dir.path().join("out");

        let report = extract_natives_blocking(&jar, &out, TargetArch::Bits64).unwrap();

        assert_eq!(report.extracted, vec!["lwjgl.dll".to_string()]);
        assert_eq!(std::fs::read(out.join("lwjgl.dll")).unwrap(), dll);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn name_heuristic_applies_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let jar = build_jar(
            dir.path(),
            &[
                ("jinput-raw.dll", b"no header".to_vec()),
                ("jinput-raw_64.dll", b"no header either".to_vec()),
            ],
        );
        let out = dir.path().join("out");

        let report = extract_natives_blocking(&jar, &out, TargetArch::Bits32).unwrap();

        // The unmarked one is arch-neutral and kept; the 64 one is filtered.
        assert_eq!(report.extracted, vec!["jinput-raw.dll".to_string()]);
        assert_eq!(report.skipped_arch, 1);
    }

    #[test]
    fn more_specific_path_wins_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        let jar = build_jar(
            dir.path(),
            &[
                ("liblwjgl.so", with_payload(elf(2, 0x3E), "root")),
                ("linux/x64/liblwjgl.so", with_payload(elf(2, 0x3E), "nested")),
            ],
        );
        let out = dir.path().join("out");

        let report = extract_natives_blocking(&jar, &out, TargetArch::Bits64).unwrap();

        assert_eq!(report.extracted, vec!["liblwjgl.so".to_string()]);
        let written = std::fs::read(out.join("liblwjgl.so")).unwrap();
        assert!(written.ends_with(b"nested"));
    }

    #[test]
    fn class_file_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = build_jar(dir.path(), &[("Main.bin", class_file())]);

        let err = extract_natives_blocking(&jar, &dir.path().join("out"), TargetArch::Bits64)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Extraction { .. }));
    }

    #[test]
    fn corrupt_archive_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"not a zip").unwrap();

        let err = extract_natives_blocking(&jar, &dir.path().join("out"), TargetArch::Bits64)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Extraction { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn preserves_unix_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let jar = build_jar(dir.path(), &[("libglfw.so", elf(2, 0x3E))]);
        let out = dir.path().join("out");

        extract_natives_blocking(&jar, &out, TargetArch::Bits64).unwrap();

        let mode = std::fs::metadata(out.join("libglfw.so"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_member_can_be_extracted_again() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("natives.jar");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file(
                "libglfw.so",
                SimpleFileOptions::default().unix_permissions(0o555),
            )
            .unwrap();
        writer.write_all(&elf(2, 0x3E)).unwrap();
        writer.finish().unwrap();
        let out = dir.path().join("out");

        let first = extract_natives_blocking(&path, &out, TargetArch::Bits64).unwrap();
        let second = extract_natives_blocking(&path, &out, TargetArch::Bits64).unwrap();

        assert_eq!(first.extracted, second.extracted);
        let mode = std::fs::metadata(out.join("libglfw.so"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o555);
    }

    #[test]
    fn arm32_binary_is_skipped_for_x86_target() {
        let dir = tempfile::tempdir().unwrap();
        let jar = build_jar(dir.path(), &[("liblwjgl.so", elf(1, 0x28))]);
        let out = dir.path().join("out");

        let report = extract_natives_blocking(&jar, &out, TargetArch::Bits32).unwrap();

        assert!(report.extracted.is_empty());
        assert_eq!(report.skipped_arch, 1);
        assert!(!out.join("liblwjgl.so").exists());
    }

    #[tokio::test]
    async fn async_entry_point_runs_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let jar = build_jar(dir.path(), &[("libglfw.so", elf(2, 0x3E))]);
        let report = extract_natives(&jar, &dir.path().join("out"), TargetArch::Bits64)
            .await
            .unwrap();
        assert_eq!(report.extracted, vec!["libglfw.so".to_string()]);
    }

    #[test]
    fn logical_names() {
        assert_eq!(logical_name("lib-x86.so"), "lib.so");
        assert_eq!(logical_name("lib-x86_64.so"), "lib.so");
        assert_eq!(logical_name("lwjgl64.dll"), "lwjgl.dll");
        assert_eq!(logical_name("OpenAL32.dll"), "openal.dll");
    }
}
