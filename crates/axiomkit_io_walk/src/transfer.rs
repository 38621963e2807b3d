//! Copy, move, replace and delete built on the manipulation pipeline.
//!
//! Entry-level operations (`*_entries`) run a fixed handler over any marked
//! entry sequence. Tree-level operations (`copy_tree`, `move_tree`,
//! `delete_tree`, `cleanup_tree`, `replicate_tree`) pair a traversal with the
//! bounded-concurrency pipeline and summarize the run in a
//! [`ReportManipulation`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use crate::entry::{EnumEntry, TypeMarkedEntry};
use crate::manipulate::{FnHandleError, Manipulation, SpecManipulation, manipulate, manipulate_parallel};
use crate::report::{ReportManipulation, ReportManipulationBuilder};
use crate::spec::{
    FlagManipulationMarker, FlagManipulationOptions, FlagTraversalMarker, FlagTraversalOptions,
    ManipulationParams, SpecDeleteOptions, SpecReplaceOptions, SpecTransferOptions,
    SpecTreeOptions, WalkError,
};
use crate::traverse::{Traversal, traverse_entries};
use crate::util::{
    clear_read_only, clear_read_only_recursive, copy_file_with_metadata, derive_destination_path,
    is_overlap, replace_file,
};

/// Default per-entry result of the derived operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEntryOutcome<I> {
    /// Source entry.
    pub entry: EnumEntry,
    /// Directory marker the entry arrived with.
    pub marker_trav: FlagTraversalMarker,
    /// Accumulated outcome bits.
    pub marker: FlagManipulationMarker,
    /// Handler output; `None` when skipped or failed.
    pub interim: Option<I>,
}

pub fn select_outcome<I>(
    entry: EnumEntry,
    marker_trav: FlagTraversalMarker,
    marker: FlagManipulationMarker,
    interim: Option<I>,
) -> SpecEntryOutcome<I> {
    SpecEntryOutcome {
        entry,
        marker_trav,
        marker,
        interim,
    }
}

pub type SpecOperation<'a, P, I> =
    SpecManipulation<'a, TypeMarkedEntry, P, I, SpecEntryOutcome<I>>;
pub type ManipulationOperation<'a, It, P, I> =
    Manipulation<'a, It, TypeMarkedEntry, P, I, SpecEntryOutcome<I>>;
/// Replace output: new destination and, when kept, the backup.
pub type TypeReplaced = (EnumEntry, Option<EnumEntry>);

////////////////////////////////////////////////////////////////////////////////
// #region Handlers

/// Check an existing destination file; returns whether one exists.
fn prepare_destination(
    path_dst: &Path,
    if_overwrite: bool,
    if_clear_read_only: bool,
) -> Result<bool, WalkError> {
    let meta = match fs::symlink_metadata(path_dst) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(WalkError::io("inspect", path_dst, e)),
    };
    if meta.is_dir() {
        return Err(WalkError::io(
            "write",
            path_dst,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination is a directory"),
        ));
    }
    if !if_overwrite {
        return Err(WalkError::io(
            "write",
            path_dst,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination exists"),
        ));
    }
    if meta.file_type().is_symlink() {
        // Never write through a link.
        fs::remove_file(path_dst).map_err(|e| WalkError::io("delete", path_dst, e))?;
        return Ok(false);
    }
    if if_clear_read_only {
        clear_read_only(path_dst).map_err(|e| WalkError::io("clear read-only", path_dst, e))?;
    }
    Ok(true)
}

/// Copy one file to `params.path_dst`, keeping times, permissions and
/// (Linux) extended attributes.
///
/// Directories are a no-op here: their destination is created through the
/// ensuring list on directory enter.
pub fn copy_entry(
    entry: &EnumEntry,
    params: &SpecTransferOptions,
    if_clear_read_only: bool,
) -> Result<EnumEntry, WalkError> {
    let entry_dst = entry.with_path(&params.path_dst);
    if params.if_no_processing || entry.is_directory() {
        return Ok(entry_dst);
    }
    prepare_destination(&params.path_dst, params.if_overwrite, if_clear_read_only)?;
    copy_file_with_metadata(entry.path(), &params.path_dst)
        .map_err(|e| WalkError::io("copy", entry.path(), e))?;
    trace!(src = %entry.path().display(), dst = %params.path_dst.display(), "file copied");
    Ok(entry_dst)
}

/// Move one file to `params.path_dst`, falling back to copy + delete across
/// filesystems.
pub fn move_entry(
    entry: &EnumEntry,
    params: &SpecTransferOptions,
    if_clear_read_only: bool,
) -> Result<EnumEntry, WalkError> {
    let entry_dst = entry.with_path(&params.path_dst);
    if params.if_no_processing || entry.is_directory() {
        return Ok(entry_dst);
    }
    let path_src = entry.path();
    let path_dst = &params.path_dst;
    if prepare_destination(path_dst, params.if_overwrite, if_clear_read_only)? {
        fs::remove_file(path_dst).map_err(|e| WalkError::io("delete", path_dst, e))?;
    }
    match fs::rename(path_src, path_dst) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_file_with_metadata(path_src, path_dst)
                .map_err(|e| WalkError::io("copy", path_src, e))?;
            fs::remove_file(path_src).map_err(|e| WalkError::io("delete", path_src, e))?;
        }
        Err(e) => return Err(WalkError::io("move", path_src, e)),
    }
    trace!(src = %path_src.display(), dst = %path_dst.display(), "file moved");
    Ok(entry_dst)
}

/// Put the entry's file in place of `params.path_dst`.
///
/// A directory cannot be replaced; that fails with
/// [`WalkError::Unsupported`] unless dry run.
pub fn replace_entry(
    entry: &EnumEntry,
    params: &SpecReplaceOptions,
) -> Result<TypeReplaced, WalkError> {
    let entry_dst = entry.with_path(&params.path_dst);
    let entry_backup = params.path_backup.as_ref().map(|p| entry.with_path(p));
    if params.if_no_processing {
        return Ok((entry_dst, entry_backup));
    }
    if entry.is_directory() {
        return Err(WalkError::Unsupported(format!(
            "replace directory {}",
            entry.path().display()
        )));
    }
    replace_file(
        entry.path(),
        &params.path_dst,
        params.path_backup.as_deref(),
        params.if_ignore_metadata_errors,
    )
    .map_err(|e| WalkError::io("replace", &params.path_dst, e))?;
    trace!(src = %entry.path().display(), dst = %params.path_dst.display(), "file replaced");
    Ok((entry_dst, entry_backup))
}

/// Delete one entry.
///
/// Directories are deleted on leave (or when they arrive without a marker),
/// never on enter.
pub fn delete_entry(
    entry: &EnumEntry,
    marker_trav: FlagTraversalMarker,
    params: &SpecDeleteOptions,
    if_clear_read_only: bool,
) -> Result<EnumEntry, WalkError> {
    if params.if_no_processing {
        return Ok(entry.clone());
    }
    let path = entry.path();
    match entry {
        EnumEntry::File(_) => {
            if if_clear_read_only {
                clear_read_only(path).map_err(|e| WalkError::io("clear read-only", path, e))?;
            }
            fs::remove_file(path).map_err(|e| WalkError::io("delete", path, e))?;
        }
        EnumEntry::Directory(_) => {
            if marker_trav.contains(FlagTraversalMarker::ENTER_DIRECTORY) {
                return Ok(entry.clone());
            }
            if params.if_recursive {
                if if_clear_read_only {
                    clear_read_only_recursive(path)
                        .map_err(|e| WalkError::io("clear read-only", path, e))?;
                }
                fs::remove_dir_all(path).map_err(|e| WalkError::io("delete directory", path, e))?;
            } else {
                if if_clear_read_only {
                    clear_read_only(path)
                        .map_err(|e| WalkError::io("clear read-only", path, e))?;
                }
                fs::remove_dir(path).map_err(|e| WalkError::io("delete directory", path, e))?;
            }
        }
    }
    trace!(path = %path.display(), "entry deleted");
    Ok(entry.clone())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region EntryOperations

pub fn spec_copy<'a, FP>(
    options: FlagManipulationOptions,
    fn_select_params: FP,
) -> SpecOperation<'a, SpecTransferOptions, EnumEntry>
where
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecTransferOptions + Send + Sync + 'a,
{
    let b_if_clear_read_only = options.contains(FlagManipulationOptions::CLEAR_READ_ONLY);
    SpecManipulation::new(
        fn_select_params,
        move |entry: &EnumEntry, _, params: &SpecTransferOptions| {
            copy_entry(entry, params, b_if_clear_read_only)
        },
        select_outcome::<EnumEntry>,
    )
}

pub fn spec_move<'a, FP>(
    options: FlagManipulationOptions,
    fn_select_params: FP,
) -> SpecOperation<'a, SpecTransferOptions, EnumEntry>
where
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecTransferOptions + Send + Sync + 'a,
{
    let b_if_clear_read_only = options.contains(FlagManipulationOptions::CLEAR_READ_ONLY);
    SpecManipulation::new(
        fn_select_params,
        move |entry: &EnumEntry, _, params: &SpecTransferOptions| {
            move_entry(entry, params, b_if_clear_read_only)
        },
        select_outcome::<EnumEntry>,
    )
}

pub fn spec_replace<'a, FP>(fn_select_params: FP) -> SpecOperation<'a, SpecReplaceOptions, TypeReplaced>
where
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecReplaceOptions + Send + Sync + 'a,
{
    SpecManipulation::new(
        fn_select_params,
        |entry: &EnumEntry, _, params: &SpecReplaceOptions| replace_entry(entry, params),
        select_outcome::<TypeReplaced>,
    )
}

pub fn spec_delete<'a, FP>(
    options: FlagManipulationOptions,
    fn_select_params: FP,
) -> SpecOperation<'a, SpecDeleteOptions, EnumEntry>
where
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecDeleteOptions + Send + Sync + 'a,
{
    let b_if_clear_read_only = options.contains(FlagManipulationOptions::CLEAR_READ_ONLY);
    SpecManipulation::new(
        fn_select_params,
        move |entry: &EnumEntry, marker_trav, params: &SpecDeleteOptions| {
            delete_entry(entry, marker_trav, params, b_if_clear_read_only)
        },
        select_outcome::<EnumEntry>,
    )
}

fn with_optional_error_handler<'a, P, I>(
    spec: SpecOperation<'a, P, I>,
    fn_handle_error: Option<FnHandleError<'a, P>>,
) -> SpecOperation<'a, P, I> {
    SpecManipulation {
        fn_handle_error,
        ..spec
    }
}

/// Copy every item with the parameters chosen per entry.
pub fn copy_entries<'a, Items, FP>(
    items: Items,
    options: FlagManipulationOptions,
    fn_select_params: FP,
    fn_handle_error: Option<FnHandleError<'a, SpecTransferOptions>>,
) -> ManipulationOperation<'a, Items::IntoIter, SpecTransferOptions, EnumEntry>
where
    Items: IntoIterator<Item = Result<TypeMarkedEntry, WalkError>>,
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecTransferOptions + Send + Sync + 'a,
{
    let spec = with_optional_error_handler(spec_copy(options, fn_select_params), fn_handle_error);
    manipulate(items, options, spec)
}

/// Move every item with the parameters chosen per entry.
pub fn move_entries<'a, Items, FP>(
    items: Items,
    options: FlagManipulationOptions,
    fn_select_params: FP,
    fn_handle_error: Option<FnHandleError<'a, SpecTransferOptions>>,
) -> ManipulationOperation<'a, Items::IntoIter, SpecTransferOptions, EnumEntry>
where
    Items: IntoIterator<Item = Result<TypeMarkedEntry, WalkError>>,
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecTransferOptions + Send + Sync + 'a,
{
    let spec = with_optional_error_handler(spec_move(options, fn_select_params), fn_handle_error);
    manipulate(items, options, spec)
}

/// Replace a destination file per item; the interim output carries the new
/// destination and the optional backup.
pub fn replace_entries<'a, Items, FP>(
    items: Items,
    options: FlagManipulationOptions,
    fn_select_params: FP,
    fn_handle_error: Option<FnHandleError<'a, SpecReplaceOptions>>,
) -> ManipulationOperation<'a, Items::IntoIter, SpecReplaceOptions, TypeReplaced>
where
    Items: IntoIterator<Item = Result<TypeMarkedEntry, WalkError>>,
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecReplaceOptions + Send + Sync + 'a,
{
    let spec = with_optional_error_handler(spec_replace(fn_select_params), fn_handle_error);
    manipulate(items, options, spec)
}

/// Delete every item with the parameters chosen per entry.
pub fn delete_entries<'a, Items, FP>(
    items: Items,
    options: FlagManipulationOptions,
    fn_select_params: FP,
    fn_handle_error: Option<FnHandleError<'a, SpecDeleteOptions>>,
) -> ManipulationOperation<'a, Items::IntoIter, SpecDeleteOptions, EnumEntry>
where
    Items: IntoIterator<Item = Result<TypeMarkedEntry, WalkError>>,
    FP: Fn(&EnumEntry, FlagTraversalMarker) -> SpecDeleteOptions + Send + Sync + 'a,
{
    let spec = with_optional_error_handler(spec_delete(options, fn_select_params), fn_handle_error);
    manipulate(items, options, spec)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TreeOperations

type TypeEntryErrors = Mutex<Vec<(PathBuf, String)>>;

/// Error handler recording every recoverable failure and suppressing it.
fn record_error<P>(
    l_errors: &TypeEntryErrors,
) -> impl Fn(&EnumEntry, FlagManipulationMarker, &P, &WalkError) -> bool + Send + Sync {
    move |entry: &EnumEntry, _: FlagManipulationMarker, _: &P, err: &WalkError| {
        let mut l_errors = l_errors.lock().unwrap_or_else(PoisonError::into_inner);
        l_errors.push((entry.path().to_path_buf(), err.to_string()));
        true
    }
}

fn drive_tree<P, I>(
    traversal: Traversal<'static, TypeMarkedEntry>,
    options: FlagManipulationOptions,
    spec: SpecOperation<'_, P, I>,
    spec_tree: &SpecTreeOptions,
) -> Result<ReportManipulationBuilder, WalkError>
where
    P: ManipulationParams + Send,
    I: Send,
{
    let mut builder = ReportManipulationBuilder::default();
    let mut iter_outcomes = manipulate_parallel(
        traversal,
        options,
        spec,
        spec_tree.num_workers_max,
        spec_tree.token_cancel.clone(),
    );
    for warning in iter_outcomes.take_warnings() {
        builder.add_warning(warning);
    }
    for res_outcome in iter_outcomes {
        builder.add_marker(res_outcome?.marker);
    }
    Ok(builder)
}

fn finish_report(
    mut builder: ReportManipulationBuilder,
    l_errors: TypeEntryErrors,
) -> ReportManipulation {
    let l_errors = l_errors.into_inner().unwrap_or_else(PoisonError::into_inner);
    for (path, exception) in l_errors {
        builder.add_error(path, exception);
    }
    let report = builder.build();
    debug!(report = %report, "tree operation finished");
    report
}

fn validate_tree_pair(path_dir_src: &Path, path_dir_dst: &Path) -> Result<(), WalkError> {
    if !path_dir_src.is_dir() {
        return Err(WalkError::DirectoryNotFound(path_dir_src.to_path_buf()));
    }
    if is_overlap(path_dir_src, path_dir_dst) {
        return Err(WalkError::InvalidArgument(format!(
            "Source and destination overlap: {} <-> {}",
            path_dir_src.display(),
            path_dir_dst.display()
        )));
    }
    if path_dir_dst.exists() && !path_dir_dst.is_dir() {
        return Err(WalkError::InvalidArgument(format!(
            "Destination is not a directory: {}",
            path_dir_dst.display()
        )));
    }
    Ok(())
}

/// Per-entry transfer parameters below `path_dir_dst`.
///
/// Directories ensure their own destination (only the root when flattening).
fn transfer_params(
    path_dir_src: PathBuf,
    path_dir_dst: PathBuf,
    if_keep_tree: bool,
    if_overwrite: bool,
    if_dry_run: bool,
) -> impl Fn(&EnumEntry, FlagTraversalMarker) -> SpecTransferOptions + Send + Sync {
    move |entry: &EnumEntry, _: FlagTraversalMarker| {
        let path_src = entry.path();
        let b_if_root = path_src == path_dir_src;
        let path_dst = if b_if_root {
            path_dir_dst.clone()
        } else {
            derive_destination_path(path_src, &path_dir_src, &path_dir_dst, if_keep_tree)
        };
        let l_dirs_ensuring = match entry {
            EnumEntry::Directory(_) if if_keep_tree || b_if_root => Some(vec![path_dst.clone()]),
            _ => None,
        };
        SpecTransferOptions {
            path_dst,
            if_overwrite,
            if_no_processing: if_dry_run,
            l_dirs_ensuring,
        }
    }
}

fn traversal_options(base: FlagTraversalOptions, spec_tree: &SpecTreeOptions) -> FlagTraversalOptions {
    if spec_tree.if_exclude_empty_dirs {
        base | FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY
    } else {
        base
    }
}

/// Copy the selected part of `dir_source` into `dir_destination`.
///
/// Directories are created on enter; files are copied on the worker pool.
/// Per-entry failures are collected into the report; setup failures and
/// traversal errors are returned.
pub fn copy_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_tree: &SpecTreeOptions,
) -> Result<ReportManipulation, WalkError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();
    validate_tree_pair(&path_dir_src, &path_dir_dst)?;
    debug!(src = %path_dir_src.display(), dst = %path_dir_dst.display(), "copy tree");

    let options_trav = traversal_options(
        FlagTraversalOptions::SHOW_FILE_OCCURRENCE | FlagTraversalOptions::SHOW_DIRECTORY_ENTER,
        spec_tree,
    );
    let traversal = traverse_entries(
        &path_dir_src,
        spec_tree.n_depth_max,
        options_trav,
        &spec_tree.spec_search,
    )?;
    let options = spec_tree.options_manipulation | FlagManipulationOptions::ENSURE_DIRECTORY;

    let l_errors = TypeEntryErrors::default();
    let fn_select_params = transfer_params(
        path_dir_src,
        path_dir_dst,
        spec_tree.if_keep_tree,
        spec_tree.if_overwrite,
        spec_tree.if_dry_run,
    );
    let spec = spec_copy(options, fn_select_params)
        .with_error_handler(record_error::<SpecTransferOptions>(&l_errors));
    let builder = drive_tree(traversal, options, spec, spec_tree)?;
    Ok(finish_report(builder, l_errors))
}

/// Move the selected part of `dir_source` into `dir_destination`.
///
/// Source directories left empty are deleted on leave, the source root
/// included.
pub fn move_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_tree: &SpecTreeOptions,
) -> Result<ReportManipulation, WalkError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();
    validate_tree_pair(&path_dir_src, &path_dir_dst)?;
    debug!(src = %path_dir_src.display(), dst = %path_dir_dst.display(), "move tree");

    let options_trav = traversal_options(FlagTraversalOptions::SHOW_ALL, spec_tree);
    let traversal = traverse_entries(
        &path_dir_src,
        spec_tree.n_depth_max,
        options_trav,
        &spec_tree.spec_search,
    )?;
    let options = spec_tree.options_manipulation
        | FlagManipulationOptions::ENSURE_DIRECTORY
        | FlagManipulationOptions::CLEANUP_DIRECTORY;

    let l_errors = TypeEntryErrors::default();
    let fn_select_params = transfer_params(
        path_dir_src,
        path_dir_dst,
        spec_tree.if_keep_tree,
        spec_tree.if_overwrite,
        spec_tree.if_dry_run,
    );
    let spec = spec_move(options, fn_select_params)
        .with_error_handler(record_error::<SpecTransferOptions>(&l_errors));
    let builder = drive_tree(traversal, options, spec, spec_tree)?;
    Ok(finish_report(builder, l_errors))
}

/// Delete the selected files below `dir_target` and every directory that
/// ends up empty, the target itself included.
///
/// `spec_tree.if_keep_tree`, `if_overwrite` and `if_exclude_empty_dirs` do
/// not apply.
pub fn delete_tree<P>(dir_target: P, spec_tree: &SpecTreeOptions) -> Result<ReportManipulation, WalkError>
where
    P: AsRef<Path>,
{
    let path_dir = dir_target.as_ref();
    debug!(dir = %path_dir.display(), "delete tree");
    let traversal = traverse_entries(
        path_dir,
        spec_tree.n_depth_max,
        FlagTraversalOptions::SHOW_FILE_OCCURRENCE | FlagTraversalOptions::SHOW_DIRECTORY_LEAVE,
        &spec_tree.spec_search,
    )?;
    let options = spec_tree.options_manipulation | FlagManipulationOptions::CLEANUP_DIRECTORY;
    let b_if_clear_read_only = options.contains(FlagManipulationOptions::CLEAR_READ_ONLY);
    let params = SpecDeleteOptions {
        if_recursive: false,
        if_no_processing: spec_tree.if_dry_run,
    };

    let l_errors = TypeEntryErrors::default();
    let spec = SpecManipulation::new(
        move |_: &EnumEntry, _| params,
        move |entry: &EnumEntry, marker_trav, params: &SpecDeleteOptions| {
            // Directories go through the cleanup phase once emptied.
            if entry.is_directory() {
                return Ok(entry.clone());
            }
            delete_entry(entry, marker_trav, params, b_if_clear_read_only)
        },
        select_outcome::<EnumEntry>,
    )
    .with_error_handler(record_error::<SpecDeleteOptions>(&l_errors));
    let builder = drive_tree(traversal, options, spec, spec_tree)?;
    Ok(finish_report(builder, l_errors))
}

/// Delete every empty directory below `dir_target`, innermost first.
///
/// Directories emptied by this run are deleted too. The target itself is
/// kept.
pub fn cleanup_tree<P>(dir_target: P, spec_tree: &SpecTreeOptions) -> Result<ReportManipulation, WalkError>
where
    P: AsRef<Path>,
{
    let path_dir = dir_target.as_ref();
    debug!(dir = %path_dir.display(), "cleanup tree");
    let traversal = traverse_entries(
        path_dir,
        spec_tree.n_depth_max,
        FlagTraversalOptions::SHOW_DIRECTORY_LEAVE | FlagTraversalOptions::EXCLUDE_START_DIRECTORY,
        &spec_tree.spec_search,
    )?;
    let options = spec_tree.options_manipulation | FlagManipulationOptions::CLEANUP_DIRECTORY;
    let params = SpecDeleteOptions {
        if_recursive: false,
        if_no_processing: spec_tree.if_dry_run,
    };

    let l_errors = TypeEntryErrors::default();
    let spec = SpecManipulation::new(
        move |_: &EnumEntry, _| params,
        |entry: &EnumEntry, _, _: &SpecDeleteOptions| Ok(entry.clone()),
        select_outcome::<EnumEntry>,
    )
    .with_error_handler(record_error::<SpecDeleteOptions>(&l_errors));
    let builder = drive_tree(traversal, options, spec, spec_tree)?;
    Ok(finish_report(builder, l_errors))
}

/// Recreate the directory layout of `dir_source` below `dir_destination`
/// without copying any file.
pub fn replicate_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_tree: &SpecTreeOptions,
) -> Result<ReportManipulation, WalkError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();
    validate_tree_pair(&path_dir_src, &path_dir_dst)?;
    debug!(src = %path_dir_src.display(), dst = %path_dir_dst.display(), "replicate tree");

    let options_trav = traversal_options(FlagTraversalOptions::SHOW_DIRECTORY_ENTER, spec_tree);
    let traversal = traverse_entries(
        &path_dir_src,
        spec_tree.n_depth_max,
        options_trav,
        &spec_tree.spec_search,
    )?;
    let options = spec_tree.options_manipulation | FlagManipulationOptions::ENSURE_DIRECTORY;

    let l_errors = TypeEntryErrors::default();
    let fn_select_params = transfer_params(
        path_dir_src,
        path_dir_dst,
        true,
        false,
        spec_tree.if_dry_run,
    );
    let spec = SpecManipulation::new(
        fn_select_params,
        |entry: &EnumEntry, _, params: &SpecTransferOptions| Ok(entry.with_path(&params.path_dst)),
        select_outcome::<EnumEntry>,
    )
    .with_error_handler(record_error::<SpecTransferOptions>(&l_errors));
    let builder = drive_tree(traversal, options, spec, spec_tree)?;
    Ok(finish_report(builder, l_errors))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
