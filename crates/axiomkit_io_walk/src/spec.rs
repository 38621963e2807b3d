//! Flag sets, per-entry parameter models and the top-level error type.

use std::io;
use std::path::{Path, PathBuf};

use bitflags::bitflags;
use thiserror::Error;

use crate::manipulate::CancelToken;

////////////////////////////////////////////////////////////////////////////////
// #region FlagsInit

bitflags! {
    /// Traversal behavior switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FlagTraversalOptions: u32 {
        /// Omit the start directory's own Enter/Leave occurrences.
        const EXCLUDE_START_DIRECTORY = 1 << 0;
        /// Suppress directories without any reported descendant.
        const EXCLUDE_EMPTY_DIRECTORY = 1 << 1;
        /// Report plain file occurrences.
        const SHOW_FILE_OCCURRENCE = 1 << 2;
        /// Report a directory before its descendants.
        const SHOW_DIRECTORY_ENTER = 1 << 3;
        /// Report a directory after its descendants.
        const SHOW_DIRECTORY_LEAVE = 1 << 4;
        /// Shorthand for [`Self::SHOW_DIRECTORY_ENTER`].
        const PREORDER_TRAVERSAL = 1 << 5;
        /// Shorthand for [`Self::SHOW_DIRECTORY_LEAVE`].
        const POSTORDER_TRAVERSAL = 1 << 6;
        /// Re-stat entries before probing them for children.
        const REFRESH = 1 << 7;

        /// Every occurrence kind.
        const SHOW_ALL = Self::SHOW_FILE_OCCURRENCE.bits()
            | Self::SHOW_DIRECTORY_ENTER.bits()
            | Self::SHOW_DIRECTORY_LEAVE.bits();
    }
}

impl FlagTraversalOptions {
    /// Resolve ordering shorthands and the default occurrence set.
    ///
    /// `PREORDER_TRAVERSAL` implies `SHOW_DIRECTORY_ENTER` and
    /// `POSTORDER_TRAVERSAL` implies `SHOW_DIRECTORY_LEAVE`. Without any
    /// explicit `SHOW_*` flag, files are reported and directories default to
    /// pre-order.
    pub fn normalize(self) -> Self {
        let b_if_show_explicit = self.intersects(Self::SHOW_ALL);
        let mut flags = self;
        if flags.contains(Self::PREORDER_TRAVERSAL) {
            flags |= Self::SHOW_DIRECTORY_ENTER;
        }
        if flags.contains(Self::POSTORDER_TRAVERSAL) {
            flags |= Self::SHOW_DIRECTORY_LEAVE;
        }
        if !b_if_show_explicit {
            flags |= Self::SHOW_FILE_OCCURRENCE;
            if !flags.intersects(Self::SHOW_DIRECTORY_ENTER | Self::SHOW_DIRECTORY_LEAVE) {
                flags |= Self::SHOW_DIRECTORY_ENTER;
            }
        }
        flags
    }
}

bitflags! {
    /// Kind of one traversal occurrence.
    ///
    /// File occurrences carry no bit. A directory reported in both orders
    /// yields two occurrences, one per bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FlagTraversalMarker: u8 {
        const ENTER_DIRECTORY = 1 << 0;
        const LEAVE_DIRECTORY = 1 << 1;
    }
}

impl FlagTraversalMarker {
    /// Plain (file) occurrence.
    pub const NONE: Self = Self::empty();
}

bitflags! {
    /// Manipulation pipeline switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FlagManipulationOptions: u32 {
        /// Report missing entries with an empty marker instead of handling them.
        const SKIP_NOT_EXISTS = 1 << 0;
        /// Re-stat every entry before processing.
        const REFRESH = 1 << 1;
        /// Create the parameters' ensuring directories on directory enter.
        const ENSURE_DIRECTORY = 1 << 2;
        /// Delete a source directory left empty, on directory leave.
        const CLEANUP_DIRECTORY = 1 << 3;
        /// Strip the read-only attribute before destructive operations.
        const CLEAR_READ_ONLY = 1 << 4;
    }
}

bitflags! {
    /// Accumulated outcome of one entry's processing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FlagManipulationMarker: u8 {
        const ELEMENT_PROCESSED = 1 << 0;
        const ELEMENT_ERROR = 1 << 1;
        const DIRECTORY_CREATED = 1 << 2;
        const DIRECTORY_DELETED = 1 << 3;
    }
}

impl FlagManipulationMarker {
    /// Nothing happened (skipped, or dry run).
    pub const NONE: Self = Self::empty();
}

/// Pattern matching mode for search patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ParamsAndCapabilities

/// Capabilities the manipulation pipeline probes on per-entry parameters.
///
/// Both probes default to "absent", so a parameter type only overrides what
/// it actually carries.
pub trait ManipulationParams {
    /// Directories to create when the owning entry's directory is entered.
    fn ensuring_directories(&self) -> Option<&[PathBuf]> {
        None
    }

    /// Compute results without touching the filesystem.
    fn if_no_processing(&self) -> bool {
        false
    }
}

impl ManipulationParams for () {}

/// Parameters for copy and move handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTransferOptions {
    /// Destination path of the entry.
    pub path_dst: PathBuf,
    /// Replace an existing destination file.
    pub if_overwrite: bool,
    /// Dry run.
    pub if_no_processing: bool,
    /// Directories created on directory enter.
    pub l_dirs_ensuring: Option<Vec<PathBuf>>,
}

impl SpecTransferOptions {
    pub fn new<P: Into<PathBuf>>(path_dst: P) -> Self {
        Self {
            path_dst: path_dst.into(),
            if_overwrite: false,
            if_no_processing: false,
            l_dirs_ensuring: None,
        }
    }
}

impl ManipulationParams for SpecTransferOptions {
    fn ensuring_directories(&self) -> Option<&[PathBuf]> {
        self.l_dirs_ensuring.as_deref()
    }

    fn if_no_processing(&self) -> bool {
        self.if_no_processing
    }
}

/// Parameters for the replace handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecReplaceOptions {
    /// File being replaced.
    pub path_dst: PathBuf,
    /// Where the replaced file is kept, if anywhere.
    pub path_backup: Option<PathBuf>,
    /// Do not fail when metadata of the replaced file cannot be carried over.
    pub if_ignore_metadata_errors: bool,
    /// Dry run.
    pub if_no_processing: bool,
    /// Directories created on directory enter.
    pub l_dirs_ensuring: Option<Vec<PathBuf>>,
}

impl SpecReplaceOptions {
    pub fn new<P: Into<PathBuf>>(path_dst: P, path_backup: Option<PathBuf>) -> Self {
        Self {
            path_dst: path_dst.into(),
            path_backup,
            if_ignore_metadata_errors: false,
            if_no_processing: false,
            l_dirs_ensuring: None,
        }
    }
}

impl ManipulationParams for SpecReplaceOptions {
    fn ensuring_directories(&self) -> Option<&[PathBuf]> {
        self.l_dirs_ensuring.as_deref()
    }

    fn if_no_processing(&self) -> bool {
        self.if_no_processing
    }
}

/// Parameters for the delete handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpecDeleteOptions {
    /// Delete directories with their whole content.
    pub if_recursive: bool,
    /// Dry run.
    pub if_no_processing: bool,
}

impl ManipulationParams for SpecDeleteOptions {
    fn if_no_processing(&self) -> bool {
        self.if_no_processing
    }
}

/// Include/exclude search patterns applied to child names during traversal.
#[derive(Debug, Clone, Default)]
pub struct SpecSearch {
    /// Include patterns applied to file basename.
    pub patterns_include_files: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Include patterns applied to directory basename.
    pub patterns_include_dirs: Option<Vec<String>>,
    /// Exclude patterns applied to directory basename.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumPatternMode,
}

/// Options shared by the tree-level operations (`copy_tree`, `move_tree`, ...).
#[derive(Debug, Clone)]
pub struct SpecTreeOptions {
    /// Include/exclude patterns for files and directories.
    pub spec_search: SpecSearch,
    /// Traversal depth; `1` handles only the source's own children.
    pub n_depth_max: usize,
    /// Keep relative layout below the destination (`false` flattens files).
    pub if_keep_tree: bool,
    /// Replace existing destination files.
    pub if_overwrite: bool,
    /// Skip directories without any selected descendant.
    pub if_exclude_empty_dirs: bool,
    /// Compute outcomes without touching the filesystem.
    pub if_dry_run: bool,
    /// Upper bound for file workers; `None` picks a default.
    pub num_workers_max: Option<usize>,
    /// Extra pipeline switches (e.g. `CLEAR_READ_ONLY`, `SKIP_NOT_EXISTS`).
    pub options_manipulation: FlagManipulationOptions,
    /// Stops the run between items.
    pub token_cancel: CancelToken,
}

impl Default for SpecTreeOptions {
    fn default() -> Self {
        Self {
            spec_search: SpecSearch::default(),
            n_depth_max: usize::MAX,
            if_keep_tree: true,
            if_overwrite: false,
            if_exclude_empty_dirs: false,
            if_dry_run: false,
            num_workers_max: None,
            options_manipulation: FlagManipulationOptions::empty(),
            token_cancel: CancelToken::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors raised by traversal and manipulation.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Traversal root is missing or not a directory.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    /// Filesystem primitive failed.
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        /// Short verb phrase of the failed primitive.
        action: &'static str,
        /// Path the primitive was applied to.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Caller-supplied handler reported a failure.
    #[error("Handler failed for {}: {message}", .path.display())]
    Handler {
        /// Entry the handler was applied to.
        path: PathBuf,
        /// User-facing error text.
        message: String,
    },
    /// Precondition violation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Operation has no filesystem primitive.
    #[error("Operation not supported: {0}")]
    Unsupported(String),
    /// Search pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    /// Cancellation was requested.
    #[error("Operation cancelled")]
    Cancelled,
}

impl WalkError {
    pub fn io<P: AsRef<Path>>(action: &'static str, path: P, source: io::Error) -> Self {
        Self::Io {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn handler<P: AsRef<Path>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Handler {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Whether the error may be routed to a per-entry error handler.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Handler { .. })
    }

    /// Underlying IO error kind, if any.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
