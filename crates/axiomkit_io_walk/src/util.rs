use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::entry::EnumEntry;
use crate::spec::{EnumPatternMode, SpecSearch, WalkError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypePatternSeq {
    fn is_matching(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SpecPatterns {
    pub(crate) patterns_include_files: Option<TypePatternSeq>,
    pub(crate) patterns_exclude_files: Option<TypePatternSeq>,
    pub(crate) patterns_include_dirs: Option<TypePatternSeq>,
    pub(crate) patterns_exclude_dirs: Option<TypePatternSeq>,
}

impl SpecPatterns {
    pub(crate) fn from_search(spec_search: &SpecSearch) -> Result<Self, WalkError> {
        let rule_pattern = spec_search.rule_pattern;
        Ok(Self {
            patterns_include_files: _compile(
                spec_search.patterns_include_files.as_deref(),
                rule_pattern,
            )?,
            patterns_exclude_files: _compile(
                spec_search.patterns_exclude_files.as_deref(),
                rule_pattern,
            )?,
            patterns_include_dirs: _compile(
                spec_search.patterns_include_dirs.as_deref(),
                rule_pattern,
            )?,
            patterns_exclude_dirs: _compile(
                spec_search.patterns_exclude_dirs.as_deref(),
                rule_pattern,
            )?,
        })
    }

    /// Whether a child survives the include/exclude rules for its kind.
    pub(crate) fn is_selected(&self, entry: &EnumEntry) -> bool {
        let c_name = entry.name();
        let (patterns_include, patterns_exclude) = match entry {
            EnumEntry::File(_) => (&self.patterns_include_files, &self.patterns_exclude_files),
            EnumEntry::Directory(_) => (&self.patterns_include_dirs, &self.patterns_exclude_dirs),
        };
        !should_exclude_by_patterns(
            &c_name,
            patterns_include.as_ref(),
            patterns_exclude.as_ref(),
        )
    }
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumPatternMode,
) -> Result<Option<TypePatternSeq>, WalkError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumPatternMode::Literal => Ok(Some(TypePatternSeq::Literal(patterns.to_vec()))),
        EnumPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        WalkError::InvalidPattern(format!("Invalid search pattern: {e}"))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypePatternSeq::Glob(l_glob)))
        }
        EnumPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    WalkError::InvalidPattern(format!("Invalid search pattern: {e}"))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypePatternSeq::Regex(l_regex)))
        }
    }
}

pub(crate) fn should_exclude_by_patterns(
    value: &str,
    patterns_include: Option<&TypePatternSeq>,
    patterns_exclude: Option<&TypePatternSeq>,
) -> bool {
    let b_if_included = patterns_include.is_none_or(|p| p.is_matching(value));
    let b_if_excluded = patterns_exclude.is_some_and(|p| p.is_matching(value));
    !b_if_included || b_if_excluded
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

/// `src` contains `dst` or vice versa.
pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

/// Derive the destination path of `path_src` below `path_dir_dst`.
///
/// - `if_keep_tree = true`: keep the path relative to `path_dir_src`.
/// - `if_keep_tree = false`: place the basename directly in `path_dir_dst`.
pub(crate) fn derive_destination_path(
    path_src: &Path,
    path_dir_src: &Path,
    path_dir_dst: &Path,
    if_keep_tree: bool,
) -> PathBuf {
    let path_item_name = path_src.file_name().map(Path::new).unwrap_or(Path::new(""));
    if if_keep_tree {
        return path_dir_dst.join(path_src.strip_prefix(path_dir_src).unwrap_or(path_item_name));
    }
    path_dir_dst.join(path_item_name)
}

/// Children of `path_dir`, sorted by name.
///
/// Only real directories are tagged as directories; symlinks are never
/// descended.
pub(crate) fn read_children(path_dir: &Path) -> Result<Vec<EnumEntry>, WalkError> {
    let iter_entries =
        fs::read_dir(path_dir).map_err(|e| WalkError::io("read directory", path_dir, e))?;
    let mut l_children = Vec::new();
    for entry_res in iter_entries {
        let entry = entry_res.map_err(|e| WalkError::io("read directory entry", path_dir, e))?;
        let path_entry = entry.path();
        let cfg_file_type = entry
            .file_type()
            .map_err(|e| WalkError::io("inspect", &path_entry, e))?;
        if cfg_file_type.is_dir() {
            l_children.push(EnumEntry::Directory(path_entry));
        } else {
            l_children.push(EnumEntry::File(path_entry));
        }
    }
    l_children.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(l_children)
}

pub(crate) fn is_directory_empty(path_dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(path_dir)?.next().is_none())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FilesystemPrimitives

pub(crate) fn clear_read_only(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mut permissions = meta.permissions();
    if !permissions.readonly() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
    }
    fs::set_permissions(path, permissions)
}

/// Clear the read-only attribute of `path` and everything below it.
pub(crate) fn clear_read_only_recursive(path: &Path) -> io::Result<()> {
    clear_read_only(path)?;
    let meta = fs::symlink_metadata(path)?;
    if !meta.is_dir() {
        return Ok(());
    }
    for entry_res in fs::read_dir(path)? {
        clear_read_only_recursive(&entry_res?.path())?;
    }
    Ok(())
}

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    #[cfg(target_os = "linux")]
    {
        apply_metadata_linux(path_file_src, path_file_dst)?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn apply_metadata_linux(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    copy_xattrs_linux(path_file_src, path_file_dst);
    // Permissions last: a read-only source must not block the steps above.
    fs::set_permissions(path_file_dst, stat_src.permissions())?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        let _ = xattr::set(path_file_dst, &name, &raw_value);
    }
}

/// Move `path_src` onto `path_dst`, keeping the displaced file at
/// `path_backup` when given.
///
/// Times and permissions of the replaced file are carried over to the new
/// content unless that fails and `if_ignore_metadata_errors` is set.
pub(crate) fn replace_file(
    path_src: &Path,
    path_dst: &Path,
    path_backup: Option<&Path>,
    if_ignore_metadata_errors: bool,
) -> io::Result<()> {
    let stat_dst = fs::metadata(path_dst)?;
    if let Some(path_backup) = path_backup {
        if path_backup.exists() {
            fs::remove_file(path_backup)?;
        }
        fs::rename(path_dst, path_backup)?;
    }
    fs::rename(path_src, path_dst)?;

    let res_meta = (|| {
        use filetime::{FileTime, set_file_times};
        set_file_times(
            path_dst,
            FileTime::from_last_access_time(&stat_dst),
            FileTime::from_last_modification_time(&stat_dst),
        )?;
        fs::set_permissions(path_dst, stat_dst.permissions())
    })();
    match res_meta {
        Err(_) if if_ignore_metadata_errors => Ok(()),
        other => other,
    }
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_select_by_kind() {
        let spec_search = SpecSearch {
            patterns_include_files: Some(vec!["*.txt".to_string()]),
            patterns_exclude_dirs: Some(vec!["skip*".to_string()]),
            ..SpecSearch::default()
        };
        let spec_pats = SpecPatterns::from_search(&spec_search).expect("compile");
        assert!(spec_pats.is_selected(&EnumEntry::file("/r/a.txt")));
        assert!(!spec_pats.is_selected(&EnumEntry::file("/r/a.md")));
        assert!(spec_pats.is_selected(&EnumEntry::directory("/r/keep")));
        assert!(!spec_pats.is_selected(&EnumEntry::directory("/r/skip_me")));
    }

    #[test]
    fn patterns_regex_and_literal() {
        let spec_search = SpecSearch {
            patterns_include_files: Some(vec![r"^report_\d+\.csv$".to_string()]),
            rule_pattern: EnumPatternMode::Regex,
            ..SpecSearch::default()
        };
        let spec_pats = SpecPatterns::from_search(&spec_search).expect("compile");
        assert!(spec_pats.is_selected(&EnumEntry::file("/r/report_01.csv")));
        assert!(!spec_pats.is_selected(&EnumEntry::file("/r/note.txt")));

        let spec_search = SpecSearch {
            patterns_exclude_files: Some(vec!["tmp".to_string()]),
            rule_pattern: EnumPatternMode::Literal,
            ..SpecSearch::default()
        };
        let spec_pats = SpecPatterns::from_search(&spec_search).expect("compile");
        assert!(!spec_pats.is_selected(&EnumEntry::file("/r/a.tmp.txt")));
        assert!(spec_pats.is_selected(&EnumEntry::file("/r/a.txt")));
    }

    #[test]
    fn invalid_patterns_rejected() {
        let spec_search = SpecSearch {
            patterns_include_files: Some(vec!["[".to_string()]),
            ..SpecSearch::default()
        };
        assert!(matches!(
            SpecPatterns::from_search(&spec_search),
            Err(WalkError::InvalidPattern(_))
        ));

        let spec_search = SpecSearch {
            patterns_include_files: Some(vec!["(".to_string()]),
            rule_pattern: EnumPatternMode::Regex,
            ..SpecSearch::default()
        };
        assert!(matches!(
            SpecPatterns::from_search(&spec_search),
            Err(WalkError::InvalidPattern(_))
        ));
    }

    #[test]
    fn derive_destination_keep_tree_and_flatten() {
        let path_src = Path::new("/source/dir/sub/file.txt");
        let path_dir_src = Path::new("/source/dir");
        let path_dir_dst = Path::new("/destination/dir");
        assert_eq!(
            derive_destination_path(path_src, path_dir_src, path_dir_dst, true),
            Path::new("/destination/dir/sub/file.txt")
        );
        assert_eq!(
            derive_destination_path(path_src, path_dir_src, path_dir_dst, false),
            Path::new("/destination/dir/file.txt")
        );
    }

    #[test]
    fn overlap_detected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("src");
        assert!(is_overlap(&src, &src.join("nested")));
        assert!(!is_overlap(&src, &tmp.path().join("dst")));
    }

    #[test]
    fn worker_limit_clamped() {
        assert_eq!(calculate_worker_limit(Some(0)), 1);
        assert!(calculate_worker_limit(None) >= 1);
        assert!(calculate_worker_limit(None) <= 8);
    }

    #[cfg(unix)]
    #[test]
    fn clear_read_only_recursive_unlocks_tree() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("ro");
        std::fs::create_dir_all(&dir).expect("mkdir");
        let file = dir.join("a.txt");
        std::fs::write(&file, "a").expect("write");
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o444)).expect("chmod");

        clear_read_only_recursive(&dir).expect("clear");
        let meta = std::fs::metadata(&file).expect("meta");
        assert!(!meta.permissions().readonly());
    }

    #[test]
    fn replace_file_keeps_backup() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let src = tmp.path().join("new.txt");
        let dst = tmp.path().join("cur.txt");
        let bak = tmp.path().join("cur.bak");
        std::fs::write(&src, "new").expect("write");
        std::fs::write(&dst, "old").expect("write");

        replace_file(&src, &dst, Some(&bak), false).expect("replace");
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dst).expect("read"), "new");
        assert_eq!(std::fs::read_to_string(&bak).expect("read"), "old");
    }
}
