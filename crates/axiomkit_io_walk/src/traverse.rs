//! Depth-first traversal engine with directory enter/leave markers.
//!
//! One engine serves every flavor: [`traverse`] exposes the ancestor chain to
//! all callbacks, [`traverse_entries`] binds search patterns, and
//! [`traverse_directories`] / [`traverse_files`] narrow the output by kind.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::entry::{EnumEntry, ParentalDirectories};
use crate::spec::{FlagTraversalMarker, FlagTraversalOptions, SpecSearch, WalkError};
use crate::util::{SpecPatterns, read_children};

/// Descend without limit.
pub const N_DEPTH_ALL_LEVELS: usize = usize::MAX;
/// Only the start directory's own children.
pub const N_DEPTH_TOP_LEVEL: usize = 1;

pub type FnSelectChildren<'a> = Box<
    dyn Fn(&EnumEntry, ParentalDirectories<'_>) -> Result<Vec<EnumEntry>, WalkError>
        + Send
        + Sync
        + 'a,
>;
pub type FnHasChildren<'a> = Box<dyn Fn(&EnumEntry) -> Result<bool, WalkError> + Send + Sync + 'a>;
pub type FnFilterEntry<'a> =
    Box<dyn Fn(&EnumEntry, ParentalDirectories<'_>) -> bool + Send + Sync + 'a>;
pub type FnCompareEntries<'a> =
    Box<dyn Fn(&EnumEntry, &EnumEntry, ParentalDirectories<'_>) -> Ordering + Send + Sync + 'a>;
pub type FnSelectOccurrence<'a, R> =
    Box<dyn Fn(&EnumEntry, FlagTraversalMarker, ParentalDirectories<'_>) -> R + Send + Sync + 'a>;

/// Callbacks driving one traversal.
///
/// Every callback receives the ancestor chain of the entry it looks at (for
/// the child selector: the ancestors of the directory being expanded).
pub struct SpecTraversal<'a, R> {
    /// Children of a directory; the engine is agnostic to what counts as one.
    pub fn_select_children: FnSelectChildren<'a>,
    /// Whether a directory has children at all. Files are never asked.
    pub fn_has_children: FnHasChildren<'a>,
    /// Per-child filter applied before recursion.
    pub fn_filter: Option<FnFilterEntry<'a>>,
    /// Ordering of the filtered children.
    pub fn_compare: Option<FnCompareEntries<'a>>,
    /// Projection of one occurrence, invoked when it is produced.
    pub fn_select_result: FnSelectOccurrence<'a, R>,
}

impl<'a, R> SpecTraversal<'a, R> {
    /// All filesystem children, sorted by name, live has-children probe.
    pub fn new<F>(fn_select_result: F) -> Self
    where
        F: Fn(&EnumEntry, FlagTraversalMarker, ParentalDirectories<'_>) -> R + Send + Sync + 'a,
    {
        Self {
            fn_select_children: Box::new(select_all_children),
            fn_has_children: Box::new(has_children_live),
            fn_filter: None,
            fn_compare: None,
            fn_select_result: Box::new(fn_select_result),
        }
    }
}

/// Default child selector: every directory entry, sorted by path.
pub fn select_all_children(
    entry: &EnumEntry,
    _: ParentalDirectories<'_>,
) -> Result<Vec<EnumEntry>, WalkError> {
    read_children(entry.path())
}

/// Default has-children probe.
pub fn has_children_live(entry: &EnumEntry) -> Result<bool, WalkError> {
    entry
        .has_children()
        .map_err(|e| WalkError::io("probe directory", entry.path(), e))
}

struct TraversalFrame {
    iter_children: std::vec::IntoIter<EnumEntry>,
    n_depth_left: usize,
    if_bracketed: bool,
    if_entered: bool,
}

/// Lazy traversal sequence returned by [`traverse`].
///
/// Each frame on the stack is one directory being expanded, paired with the
/// same index in the ancestor stack. A bracketed frame is "pending" until the
/// first occurrence is produced below it; producing that occurrence first
/// flushes the pending Enter occurrences, outermost first. A frame closing
/// while still pending is an effectively empty directory.
///
/// The sequence is single-pass. After an error it yields nothing more.
pub struct Traversal<'a, R> {
    spec: SpecTraversal<'a, R>,
    options: FlagTraversalOptions,
    l_frames: Vec<TraversalFrame>,
    l_ancestors: Vec<EnumEntry>,
    queue_out: VecDeque<R>,
    if_finished: bool,
}

/// Walk the tree below `path_root`.
///
/// - `n_depth_max = 0` yields nothing; `1` lists the root's children and
///   reports subdirectories without descending into them.
/// - `options` is normalized once (see [`FlagTraversalOptions::normalize`]).
///
/// Returns [`WalkError::DirectoryNotFound`] before anything is produced when
/// the root is not an existing directory.
pub fn traverse<'a, P, R>(
    path_root: P,
    n_depth_max: usize,
    options: FlagTraversalOptions,
    spec: SpecTraversal<'a, R>,
) -> Result<Traversal<'a, R>, WalkError>
where
    P: AsRef<Path>,
{
    let path_root = path_root.as_ref();
    if !path_root.is_dir() {
        return Err(WalkError::DirectoryNotFound(path_root.to_path_buf()));
    }
    let options = options.normalize();
    debug!(
        root = %path_root.display(),
        depth = n_depth_max,
        options = ?options,
        "traversal started"
    );

    let mut traversal = Traversal {
        spec,
        options,
        l_frames: Vec::new(),
        l_ancestors: Vec::new(),
        queue_out: VecDeque::new(),
        if_finished: false,
    };
    if n_depth_max == 0 {
        traversal.if_finished = true;
        return Ok(traversal);
    }

    let mut entry_root = EnumEntry::directory(path_root);
    if options.contains(FlagTraversalOptions::REFRESH) {
        entry_root.refresh();
    }
    let b_if_bracketed = !options.contains(FlagTraversalOptions::EXCLUDE_START_DIRECTORY);
    if (traversal.spec.fn_has_children)(&entry_root)? {
        traversal.push_frame(entry_root, n_depth_max, b_if_bracketed)?;
    } else {
        if b_if_bracketed && !options.contains(FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY) {
            traversal.emit_bracket(&entry_root, 0);
        }
        traversal.if_finished = true;
    }
    Ok(traversal)
}

impl<R> Traversal<'_, R> {
    fn emit(&mut self, entry: &EnumEntry, marker: FlagTraversalMarker, n_ctx: usize) {
        let b_if_show_enter = self
            .options
            .contains(FlagTraversalOptions::SHOW_DIRECTORY_ENTER);
        for (n_level, frame) in self.l_frames.iter_mut().enumerate() {
            if !frame.if_bracketed || frame.if_entered {
                continue;
            }
            frame.if_entered = true;
            if b_if_show_enter {
                let r = (self.spec.fn_select_result)(
                    &self.l_ancestors[n_level],
                    FlagTraversalMarker::ENTER_DIRECTORY,
                    ParentalDirectories::new(&self.l_ancestors[..n_level]),
                );
                self.queue_out.push_back(r);
            }
        }
        let r = (self.spec.fn_select_result)(
            entry,
            marker,
            ParentalDirectories::new(&self.l_ancestors[..n_ctx]),
        );
        self.queue_out.push_back(r);
    }

    fn emit_when(
        &mut self,
        flag: FlagTraversalOptions,
        entry: &EnumEntry,
        marker: FlagTraversalMarker,
        n_ctx: usize,
    ) {
        if self.options.contains(flag) {
            self.emit(entry, marker, n_ctx);
        }
    }

    /// Enter then Leave of a directory that is not expanded.
    fn emit_bracket(&mut self, entry: &EnumEntry, n_ctx: usize) {
        self.emit_when(
            FlagTraversalOptions::SHOW_DIRECTORY_ENTER,
            entry,
            FlagTraversalMarker::ENTER_DIRECTORY,
            n_ctx,
        );
        self.emit_when(
            FlagTraversalOptions::SHOW_DIRECTORY_LEAVE,
            entry,
            FlagTraversalMarker::LEAVE_DIRECTORY,
            n_ctx,
        );
    }

    fn collect_children(&self) -> Result<Vec<EnumEntry>, WalkError> {
        let n_len = self.l_ancestors.len();
        let entry_dir = &self.l_ancestors[n_len - 1];
        let mut l_children = (self.spec.fn_select_children)(
            entry_dir,
            ParentalDirectories::new(&self.l_ancestors[..n_len - 1]),
        )?;

        let ctx = ParentalDirectories::new(&self.l_ancestors);
        if let Some(fn_filter) = &self.spec.fn_filter {
            l_children.retain(|child| fn_filter(child, ctx));
        }
        if let Some(fn_compare) = &self.spec.fn_compare {
            l_children.sort_by(|a, b| fn_compare(a, b, ctx));
        }
        Ok(l_children)
    }

    fn push_frame(
        &mut self,
        entry_dir: EnumEntry,
        n_depth_left: usize,
        if_bracketed: bool,
    ) -> Result<(), WalkError> {
        trace!(dir = %entry_dir.path().display(), depth_left = n_depth_left, "descending");
        self.l_ancestors.push(entry_dir);
        match self.collect_children() {
            Ok(l_children) => {
                self.l_frames.push(TraversalFrame {
                    iter_children: l_children.into_iter(),
                    n_depth_left,
                    if_bracketed,
                    if_entered: false,
                });
                Ok(())
            }
            Err(e) => {
                self.l_ancestors.pop();
                Err(e)
            }
        }
    }

    fn close_frame(&mut self) {
        let (Some(frame), Some(entry_dir)) = (self.l_frames.pop(), self.l_ancestors.pop()) else {
            return;
        };
        if !frame.if_bracketed {
            return;
        }
        let n_ctx = self.l_ancestors.len();
        if frame.if_entered {
            self.emit_when(
                FlagTraversalOptions::SHOW_DIRECTORY_LEAVE,
                &entry_dir,
                FlagTraversalMarker::LEAVE_DIRECTORY,
                n_ctx,
            );
        } else if !self
            .options
            .contains(FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY)
        {
            self.emit_bracket(&entry_dir, n_ctx);
        }
    }

    fn visit_child(&mut self, mut child: EnumEntry, n_depth_left: usize) -> Result<(), WalkError> {
        let n_ctx = self.l_ancestors.len();
        if self.options.contains(FlagTraversalOptions::REFRESH) {
            child.refresh();
        }

        let b_has_children = child.is_directory() && (self.spec.fn_has_children)(&child)?;
        if !b_has_children {
            match child {
                EnumEntry::File(_) => self.emit_when(
                    FlagTraversalOptions::SHOW_FILE_OCCURRENCE,
                    &child,
                    FlagTraversalMarker::NONE,
                    n_ctx,
                ),
                EnumEntry::Directory(_) => {
                    if !self
                        .options
                        .contains(FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY)
                    {
                        self.emit_bracket(&child, n_ctx);
                    }
                }
            }
            return Ok(());
        }

        if n_depth_left <= 1 {
            self.emit_bracket(&child, n_ctx);
            return Ok(());
        }
        self.push_frame(child, n_depth_left - 1, true)
    }
}

impl<R> Iterator for Traversal<'_, R> {
    type Item = Result<R, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.queue_out.pop_front() {
                return Some(Ok(r));
            }
            if self.if_finished {
                return None;
            }
            let Some(frame) = self.l_frames.last_mut() else {
                self.if_finished = true;
                continue;
            };
            let n_depth_left = frame.n_depth_left;
            match frame.iter_children.next() {
                Some(child) => {
                    if let Err(e) = self.visit_child(child, n_depth_left) {
                        self.if_finished = true;
                        self.l_frames.clear();
                        self.l_ancestors.clear();
                        return Some(Err(e));
                    }
                }
                None => self.close_frame(),
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Flavors

/// Plain traversal over all entries, filtered by search patterns.
pub fn traverse_entries<P>(
    path_root: P,
    n_depth_max: usize,
    options: FlagTraversalOptions,
    spec_search: &SpecSearch,
) -> Result<Traversal<'static, (EnumEntry, FlagTraversalMarker)>, WalkError>
where
    P: AsRef<Path>,
{
    let spec_pats = SpecPatterns::from_search(spec_search)?;
    let spec = SpecTraversal {
        fn_select_children: Box::new(move |entry: &EnumEntry, _: ParentalDirectories<'_>| {
            let mut l_children = read_children(entry.path())?;
            l_children.retain(|child| spec_pats.is_selected(child));
            Ok(l_children)
        }),
        ..SpecTraversal::new(|entry: &EnumEntry, marker, _: ParentalDirectories<'_>| {
            (entry.clone(), marker)
        })
    };
    traverse(path_root, n_depth_max, options, spec)
}

/// Traversal narrowed to one kind of entry, yielding paths.
pub struct TraversalPaths {
    inner: Traversal<'static, (EnumEntry, FlagTraversalMarker)>,
    if_directories: bool,
}

impl Iterator for TraversalPaths {
    type Item = Result<(PathBuf, FlagTraversalMarker), WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok((entry, marker)) => {
                    if entry.is_directory() == self.if_directories {
                        return Some(Ok((entry.into_path(), marker)));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Directory occurrences only. Files are never enumerated.
pub fn traverse_directories<P>(
    path_root: P,
    n_depth_max: usize,
    options: FlagTraversalOptions,
    spec_search: &SpecSearch,
) -> Result<TraversalPaths, WalkError>
where
    P: AsRef<Path>,
{
    let spec_pats = SpecPatterns::from_search(spec_search)?;
    let spec = SpecTraversal {
        fn_select_children: Box::new(move |entry: &EnumEntry, _: ParentalDirectories<'_>| {
            let mut l_children = read_children(entry.path())?;
            l_children.retain(|child| child.is_directory() && spec_pats.is_selected(child));
            Ok(l_children)
        }),
        ..SpecTraversal::new(|entry: &EnumEntry, marker, _: ParentalDirectories<'_>| {
            (entry.clone(), marker)
        })
    };
    Ok(TraversalPaths {
        inner: traverse(path_root, n_depth_max, options, spec)?,
        if_directories: true,
    })
}

/// File occurrences only; directories are still descended.
pub fn traverse_files<P>(
    path_root: P,
    n_depth_max: usize,
    options: FlagTraversalOptions,
    spec_search: &SpecSearch,
) -> Result<TraversalPaths, WalkError>
where
    P: AsRef<Path>,
{
    Ok(TraversalPaths {
        inner: traverse_entries(path_root, n_depth_max, options, spec_search)?,
        if_directories: false,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use super::*;

    const ENTER: FlagTraversalMarker = FlagTraversalMarker::ENTER_DIRECTORY;
    const LEAVE: FlagTraversalMarker = FlagTraversalMarker::LEAVE_DIRECTORY;
    const FILE: FlagTraversalMarker = FlagTraversalMarker::NONE;

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, txt).expect("write text");
    }

    fn rel(path_root: &Path, path: &Path) -> String {
        let c_rel = path
            .strip_prefix(path_root)
            .expect("below root")
            .to_string_lossy()
            .replace('\\', "/");
        if c_rel.is_empty() { ".".to_string() } else { c_rel }
    }

    fn collect_rel(
        path_root: &Path,
        n_depth_max: usize,
        options: FlagTraversalOptions,
    ) -> Vec<(String, FlagTraversalMarker)> {
        traverse_entries(path_root, n_depth_max, options, &SpecSearch::default())
            .expect("traverse")
            .map(|res| {
                let (entry, marker) = res.expect("occurrence");
                (rel(path_root, entry.path()), marker)
            })
            .collect()
    }

    fn occ(c_path: &str, marker: FlagTraversalMarker) -> (String, FlagTraversalMarker) {
        (c_path.to_string(), marker)
    }

    fn show_all() -> FlagTraversalOptions {
        FlagTraversalOptions::SHOW_ALL
    }

    #[test]
    fn excludes_empty_directory_and_start() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a.txt"), "a");
        fs::create_dir_all(root.join("empty")).expect("mkdir");

        let options = show_all()
            | FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY
            | FlagTraversalOptions::EXCLUDE_START_DIRECTORY;
        assert_eq!(
            collect_rel(&root, N_DEPTH_ALL_LEVELS, options),
            vec![occ("a.txt", FILE)]
        );

        let options = show_all() | FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY;
        assert_eq!(
            collect_rel(&root, N_DEPTH_ALL_LEVELS, options),
            vec![occ(".", ENTER), occ("a.txt", FILE), occ(".", LEAVE)]
        );
    }

    #[test]
    fn depth_one_reports_subdirectory_without_descending() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("sub/deep.txt"), "d");

        let options =
            FlagTraversalOptions::SHOW_DIRECTORY_ENTER | FlagTraversalOptions::SHOW_DIRECTORY_LEAVE;
        assert_eq!(
            collect_rel(&root, 1, options),
            vec![
                occ(".", ENTER),
                occ("sub", ENTER),
                occ("sub", LEAVE),
                occ(".", LEAVE)
            ]
        );

        let options = options | FlagTraversalOptions::SHOW_FILE_OCCURRENCE;
        assert_eq!(
            collect_rel(&root, 2, options),
            vec![
                occ(".", ENTER),
                occ("sub", ENTER),
                occ("sub/deep.txt", FILE),
                occ("sub", LEAVE),
                occ(".", LEAVE)
            ]
        );
    }

    #[test]
    fn depth_zero_yields_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_text(&tmp.path().join("a.txt"), "a");
        assert!(collect_rel(tmp.path(), 0, show_all()).is_empty());
    }

    #[test]
    fn missing_root_fails_before_iteration() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = traverse_entries(
            tmp.path().join("missing"),
            N_DEPTH_ALL_LEVELS,
            show_all(),
            &SpecSearch::default(),
        )
        .err()
        .expect("must fail");
        assert!(matches!(err, WalkError::DirectoryNotFound(_)));
    }

    #[test]
    fn depth_bound_holds_for_every_limit() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a/b/c/d/e.txt"), "e");
        write_text(&root.join("a/x.txt"), "x");

        for n_depth in 0..6 {
            for (c_path, _) in collect_rel(&root, n_depth, show_all()) {
                let n_level = if c_path == "." {
                    0
                } else {
                    c_path.split('/').count()
                };
                assert!(n_level <= n_depth, "{c_path} deeper than {n_depth}");
            }
        }
    }

    #[test]
    fn brackets_nest_properly() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a/1.txt"), "1");
        write_text(&root.join("a/b/2.txt"), "2");
        write_text(&root.join("c/3.txt"), "3");
        fs::create_dir_all(root.join("d")).expect("mkdir");

        let l_occ = collect_rel(&root, N_DEPTH_ALL_LEVELS, show_all());
        let mut l_stack: Vec<String> = Vec::new();
        let mut n_dirs = 0;
        for (c_path, marker) in &l_occ {
            assert_ne!(*marker, ENTER | LEAVE);
            if *marker == ENTER {
                n_dirs += 1;
                l_stack.push(c_path.clone());
            } else if *marker == LEAVE {
                assert_eq!(l_stack.pop().as_deref(), Some(c_path.as_str()));
            } else if let Some(c_parent) = l_stack.last() {
                assert!(c_parent == "." || c_path.starts_with(&format!("{c_parent}/")));
            }
        }
        assert!(l_stack.is_empty());
        assert_eq!(n_dirs, 5);
    }

    #[test]
    fn postorder_reports_leave_after_children() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a/1.txt"), "1");

        assert_eq!(
            collect_rel(
                &root,
                N_DEPTH_ALL_LEVELS,
                FlagTraversalOptions::POSTORDER_TRAVERSAL
            ),
            vec![occ("a/1.txt", FILE), occ("a", LEAVE), occ(".", LEAVE)]
        );
        assert_eq!(
            collect_rel(&root, N_DEPTH_ALL_LEVELS, FlagTraversalOptions::empty()),
            vec![occ(".", ENTER), occ("a", ENTER), occ("a/1.txt", FILE)]
        );
    }

    #[test]
    fn empty_exclusion_applies_after_filtering() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("keep/a.txt"), "a");
        write_text(&root.join("drop/b.md"), "b");
        fs::create_dir_all(root.join("drop/inner")).expect("mkdir");

        let spec_search = SpecSearch {
            patterns_include_files: Some(vec!["*.txt".to_string()]),
            ..SpecSearch::default()
        };
        let options = show_all() | FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY;
        let l_occ: Vec<_> = traverse_entries(&root, N_DEPTH_ALL_LEVELS, options, &spec_search)
            .expect("traverse")
            .map(|res| {
                let (entry, marker) = res.expect("occurrence");
                (rel(&root, entry.path()), marker)
            })
            .collect();
        assert_eq!(
            l_occ,
            vec![
                occ(".", ENTER),
                occ("keep", ENTER),
                occ("keep/a.txt", FILE),
                occ("keep", LEAVE),
                occ(".", LEAVE)
            ]
        );

        let l_occ: Vec<_> = traverse_entries(&root, N_DEPTH_ALL_LEVELS, show_all(), &spec_search)
            .expect("traverse")
            .map(|res| rel(&root, res.expect("occurrence").0.path()))
            .collect();
        assert!(l_occ.contains(&"drop/inner".to_string()));
        assert!(!l_occ.contains(&"drop/b.md".to_string()));
    }

    #[test]
    fn empty_root_with_exclusion_yields_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let options = show_all() | FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY;
        assert!(collect_rel(tmp.path(), N_DEPTH_ALL_LEVELS, options).is_empty());
        assert_eq!(
            collect_rel(tmp.path(), N_DEPTH_ALL_LEVELS, show_all()),
            vec![occ(".", ENTER), occ(".", LEAVE)]
        );
    }

    #[test]
    fn filter_and_compare_shape_each_level() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a.txt"), "a");
        write_text(&root.join("b.txt"), "b");
        write_text(&root.join("c.log"), "c");

        let spec = SpecTraversal {
            fn_filter: Some(Box::new(|entry: &EnumEntry, _: ParentalDirectories<'_>| {
                entry.name().ends_with(".txt")
            })),
            fn_compare: Some(Box::new(
                |a: &EnumEntry, b: &EnumEntry, _: ParentalDirectories<'_>| b.name().cmp(&a.name()),
            )),
            ..SpecTraversal::new(|entry: &EnumEntry, _, _: ParentalDirectories<'_>| entry.name())
        };
        let l_names: Vec<String> = traverse(
            &root,
            N_DEPTH_ALL_LEVELS,
            FlagTraversalOptions::SHOW_FILE_OCCURRENCE,
            spec,
        )
        .expect("traverse")
        .collect::<Result<_, _>>()
        .expect("names");
        assert_eq!(l_names, vec!["b.txt".to_string(), "a.txt".to_string()]);
    }

    #[test]
    fn callbacks_see_ancestor_chain() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a/b/c.txt"), "c");

        let l_seen_filter = Arc::new(Mutex::new(Vec::new()));
        let l_seen_filter_cb = Arc::clone(&l_seen_filter);
        let spec = SpecTraversal {
            fn_filter: Some(Box::new(
                move |entry: &EnumEntry, ctx: ParentalDirectories<'_>| {
                    l_seen_filter_cb
                        .lock()
                        .expect("lock")
                        .push((entry.name(), ctx.len()));
                    true
                },
            )),
            ..SpecTraversal::new(
                |entry: &EnumEntry, marker, ctx: ParentalDirectories<'_>| {
                    let l_names: Vec<String> = ctx.iter().map(EnumEntry::name).collect();
                    (entry.name(), marker, l_names)
                },
            )
        };
        let l_occ: Vec<_> = traverse(
            &root,
            N_DEPTH_ALL_LEVELS,
            FlagTraversalOptions::SHOW_ALL,
            spec,
        )
        .expect("traverse")
        .collect::<Result<_, _>>()
        .expect("occurrences");

        let (_, _, l_chain_file) = l_occ
            .iter()
            .find(|(c_name, _, _)| c_name == "c.txt")
            .expect("file occurrence");
        assert_eq!(l_chain_file, &vec!["root", "a", "b"]);

        let (_, _, l_chain_enter_b) = l_occ
            .iter()
            .find(|(c_name, marker, _)| c_name == "b" && *marker == ENTER)
            .expect("enter b");
        assert_eq!(l_chain_enter_b, &vec!["root", "a"]);

        let (_, _, l_chain_root) = l_occ.first().expect("root occurrence");
        assert!(l_chain_root.is_empty());

        let l_seen_filter = l_seen_filter.lock().expect("lock");
        assert!(l_seen_filter.contains(&("c.txt".to_string(), 3)));
        assert!(l_seen_filter.contains(&("a".to_string(), 1)));
    }

    #[test]
    fn mid_traversal_error_ends_sequence() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a/1.txt"), "1");
        write_text(&root.join("b/2.txt"), "2");
        write_text(&root.join("c/3.txt"), "3");

        let spec = SpecTraversal {
            fn_select_children: Box::new(|entry: &EnumEntry, ctx: ParentalDirectories<'_>| {
                if entry.name() == "b" {
                    return Err(WalkError::io(
                        "read directory",
                        entry.path(),
                        std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                    ));
                }
                select_all_children(entry, ctx)
            }),
            ..SpecTraversal::new(|entry: &EnumEntry, _, _: ParentalDirectories<'_>| entry.name())
        };
        let l_res: Vec<_> =
            traverse(&root, N_DEPTH_ALL_LEVELS, FlagTraversalOptions::SHOW_ALL, spec)
                .expect("traverse")
                .collect();
        let n_err = l_res.iter().position(Result::is_err).expect("an error");
        assert_eq!(n_err, l_res.len() - 1);
        let l_names: Vec<_> = l_res[..n_err]
            .iter()
            .map(|r| r.as_ref().expect("ok").clone())
            .collect();
        assert_eq!(l_names, vec!["root", "a", "1.txt", "a"]);
    }

    #[test]
    fn narrowed_flavors_filter_by_kind() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("a/1.txt"), "1");
        write_text(&root.join("2.txt"), "2");

        let l_dirs: Vec<_> = traverse_directories(
            &root,
            N_DEPTH_ALL_LEVELS,
            FlagTraversalOptions::PREORDER_TRAVERSAL | FlagTraversalOptions::EXCLUDE_START_DIRECTORY,
            &SpecSearch::default(),
        )
        .expect("traverse")
        .map(|res| res.expect("dir"))
        .collect();
        assert_eq!(l_dirs, vec![(root.join("a"), ENTER)]);

        let mut l_files: Vec<_> = traverse_files(
            &root,
            N_DEPTH_ALL_LEVELS,
            FlagTraversalOptions::empty(),
            &SpecSearch::default(),
        )
        .expect("traverse")
        .map(|res| res.expect("file").0)
        .collect();
        l_files.sort();
        assert_eq!(l_files, vec![root.join("2.txt"), root.join("a/1.txt")]);
    }

    #[test]
    fn rewalk_sees_new_entries() {
        let tmp = tempfile::tempdir().expect("tempdir");
        write_text(&tmp.path().join("a.txt"), "a");
        assert_eq!(
            collect_rel(tmp.path(), N_DEPTH_ALL_LEVELS, FlagTraversalOptions::SHOW_FILE_OCCURRENCE)
                .len(),
            1
        );
        write_text(&tmp.path().join("b.txt"), "b");
        assert_eq!(
            collect_rel(tmp.path(), N_DEPTH_ALL_LEVELS, FlagTraversalOptions::SHOW_FILE_OCCURRENCE)
                .len(),
            2
        );
    }

    fn walk_mistagged(
        path_root: &Path,
        options: FlagTraversalOptions,
    ) -> Vec<(String, FlagTraversalMarker)> {
        let path_base = path_root.to_path_buf();
        let spec = SpecTraversal {
            fn_select_children: Box::new(|entry: &EnumEntry, _: ParentalDirectories<'_>| {
                let l_children = read_children(entry.path())?;
                Ok(l_children
                    .into_iter()
                    .map(|child| EnumEntry::file(child.into_path()))
                    .collect())
            }),
            ..SpecTraversal::new(move |entry: &EnumEntry, marker, _: ParentalDirectories<'_>| {
                (rel(&path_base, entry.path()), marker)
            })
        };
        traverse(path_root, N_DEPTH_ALL_LEVELS, options, spec)
            .expect("traverse")
            .collect::<Result<_, _>>()
            .expect("occurrences")
    }

    #[test]
    fn refresh_retags_and_descends_directories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("root");
        write_text(&root.join("sub/a.txt"), "a");

        let options = show_all() | FlagTraversalOptions::EXCLUDE_START_DIRECTORY;
        assert_eq!(walk_mistagged(&root, options), vec![occ("sub", FILE)]);
        assert_eq!(
            walk_mistagged(&root, options | FlagTraversalOptions::REFRESH),
            vec![occ("sub", ENTER), occ("sub/a.txt", FILE), occ("sub", LEAVE)]
        );
    }
}
