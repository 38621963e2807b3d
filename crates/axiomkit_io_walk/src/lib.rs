//! `axiomkit_io_walk` v1:
//! Rust-side filesystem traversal and manipulation engine.
//!
//! Modules:
//! - `traverse`   : depth-first walk with directory enter/leave markers
//! - `manipulate` : per-entry pipeline (sequential, parallel, channel)
//! - `transfer`   : copy/move/replace/delete over entries and trees
//! - `entry`      : file/directory handles and ancestor chain
//! - `spec`       : flags/options/errors
//! - `report`     : run-time report model
//! - `util`       : shared helper functions

pub mod entry;
pub mod manipulate;
pub mod report;
pub mod spec;
pub mod transfer;
pub mod traverse;
mod util;

pub use entry::{EnumEntry, ParentalDirectories, TypeMarkedEntry};
pub use manipulate::{
    CancelToken, Manipulation, ManipulationParallel, SpecManipulation, manipulate,
    manipulate_channel, manipulate_parallel,
};
pub use report::{ReportManipulation, ReportManipulationBuilder, SpecEntryError};
pub use spec::{
    EnumPatternMode, FlagManipulationMarker, FlagManipulationOptions, FlagTraversalMarker,
    FlagTraversalOptions, ManipulationParams, SpecDeleteOptions, SpecReplaceOptions, SpecSearch,
    SpecTransferOptions, SpecTreeOptions, WalkError,
};
pub use transfer::{
    SpecEntryOutcome, cleanup_tree, copy_entries, copy_tree, delete_entries, delete_tree,
    move_entries, move_tree, replace_entries, replicate_tree,
};
pub use traverse::{
    N_DEPTH_ALL_LEVELS, N_DEPTH_TOP_LEVEL, SpecTraversal, Traversal, TraversalPaths, traverse,
    traverse_directories, traverse_entries, traverse_files,
};
