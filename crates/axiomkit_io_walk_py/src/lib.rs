use std::collections::BTreeMap;

use axiomkit_io_walk::{
    EnumEntry, EnumPatternMode, FlagManipulationOptions, FlagTraversalMarker,
    FlagTraversalOptions, ReportManipulation, SpecEntryError, SpecSearch, SpecTreeOptions,
    WalkError, cleanup_tree, copy_tree, delete_tree, move_tree, replicate_tree, traverse_entries,
};
use pyo3::exceptions::{
    PyFileNotFoundError, PyNotImplementedError, PyOSError, PyRuntimeError, PyValueError,
};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.fs.walk.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SpecEntryError")]
#[derive(Debug, Clone)]
struct PySpecEntryError {
    #[pyo3(get)]
    path: String,
    #[pyo3(get)]
    exception: String,
}

impl From<SpecEntryError> for PySpecEntryError {
    fn from(spec_error: SpecEntryError) -> Self {
        Self {
            path: spec_error.path.to_string_lossy().to_string(),
            exception: spec_error.exception,
        }
    }
}

#[pyclass(name = "ReportManipulation")]
#[derive(Debug, Clone)]
struct PyReportManipulation {
    #[pyo3(get)]
    cnt_entries: u64,
    #[pyo3(get)]
    cnt_processed: u64,
    #[pyo3(get)]
    cnt_failed: u64,
    #[pyo3(get)]
    cnt_dirs_created: u64,
    #[pyo3(get)]
    cnt_dirs_deleted: u64,
    #[pyo3(get)]
    cnt_skipped: u64,
    #[pyo3(get)]
    errors: Vec<PySpecEntryError>,
    #[pyo3(get)]
    warnings: Vec<String>,
    c_summary: String,
    dict_counts: BTreeMap<String, u64>,
}

impl From<ReportManipulation> for PyReportManipulation {
    fn from(report: ReportManipulation) -> Self {
        let c_summary = report.to_string();
        let dict_counts = report.to_dict();
        Self {
            cnt_entries: report.cnt_entries,
            cnt_processed: report.cnt_processed,
            cnt_failed: report.cnt_failed,
            cnt_dirs_created: report.cnt_dirs_created,
            cnt_dirs_deleted: report.cnt_dirs_deleted,
            cnt_skipped: report.cnt_skipped,
            errors: report
                .errors
                .into_iter()
                .map(PySpecEntryError::from)
                .collect(),
            warnings: report.warnings,
            c_summary,
            dict_counts,
        }
    }
}

#[pymethods]
impl PyReportManipulation {
    #[getter]
    fn error_count(&self) -> usize {
        self.errors.len()
    }

    #[getter]
    fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = self.dict_counts.clone();
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts
    }

    #[pyo3(signature = (prefix = "[WALK]"))]
    fn format(&self, prefix: &str) -> String {
        match self.c_summary.strip_prefix("[WALK]") {
            Some(c_rest) => format!("{prefix}{c_rest}"),
            None => self.c_summary.clone(),
        }
    }

    fn __str__(&self) -> String {
        self.c_summary.clone()
    }
}

fn parse_rule_pattern(value: &str) -> PyResult<EnumPatternMode> {
    match value {
        "glob" => Ok(EnumPatternMode::Glob),
        "regex" => Ok(EnumPatternMode::Regex),
        "literal" => Ok(EnumPatternMode::Literal),
        _ => Err(PyValueError::new_err(format!(
            "Invalid pattern strategy: `{value}`. Expected one of: ['glob', 'regex', 'literal']"
        ))),
    }
}

fn parse_options_traversal(l_values: &[String]) -> PyResult<FlagTraversalOptions> {
    let mut flags = FlagTraversalOptions::empty();
    for value in l_values {
        flags |= match value.as_str() {
            "exclude_start_directory" => FlagTraversalOptions::EXCLUDE_START_DIRECTORY,
            "exclude_empty_directory" => FlagTraversalOptions::EXCLUDE_EMPTY_DIRECTORY,
            "show_file" => FlagTraversalOptions::SHOW_FILE_OCCURRENCE,
            "show_enter" => FlagTraversalOptions::SHOW_DIRECTORY_ENTER,
            "show_leave" => FlagTraversalOptions::SHOW_DIRECTORY_LEAVE,
            "show_all" => FlagTraversalOptions::SHOW_ALL,
            "preorder" => FlagTraversalOptions::PREORDER_TRAVERSAL,
            "postorder" => FlagTraversalOptions::POSTORDER_TRAVERSAL,
            "refresh" => FlagTraversalOptions::REFRESH,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Invalid traversal option: `{value}`. Expected any of: ['exclude_start_directory', 'exclude_empty_directory', 'show_file', 'show_enter', 'show_leave', 'show_all', 'preorder', 'postorder', 'refresh']"
                )));
            }
        };
    }
    Ok(flags)
}

fn parse_options_manipulation(l_values: &[String]) -> PyResult<FlagManipulationOptions> {
    let mut flags = FlagManipulationOptions::empty();
    for value in l_values {
        flags |= match value.as_str() {
            "skip_not_exists" => FlagManipulationOptions::SKIP_NOT_EXISTS,
            "refresh" => FlagManipulationOptions::REFRESH,
            "clear_read_only" => FlagManipulationOptions::CLEAR_READ_ONLY,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Invalid manipulation option: `{value}`. Expected any of: ['skip_not_exists', 'refresh', 'clear_read_only']"
                )));
            }
        };
    }
    Ok(flags)
}

fn map_walk_error(exception: WalkError) -> PyErr {
    match exception {
        WalkError::DirectoryNotFound(path) => {
            PyFileNotFoundError::new_err(format!("Directory not found: {}", path.display()))
        }
        WalkError::Io { .. } => PyOSError::new_err(exception.to_string()),
        WalkError::InvalidArgument(message) | WalkError::InvalidPattern(message) => {
            PyValueError::new_err(message)
        }
        WalkError::Unsupported(message) => PyNotImplementedError::new_err(message),
        WalkError::Handler { .. } | WalkError::Cancelled => {
            PyRuntimeError::new_err(exception.to_string())
        }
    }
}

fn marker_name(marker: FlagTraversalMarker) -> &'static str {
    if marker.contains(FlagTraversalMarker::ENTER_DIRECTORY) {
        "enter"
    } else if marker.contains(FlagTraversalMarker::LEAVE_DIRECTORY) {
        "leave"
    } else {
        "none"
    }
}

#[allow(clippy::too_many_arguments)]
fn build_spec_tree(
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
    options: Option<Vec<String>>,
    num_workers_max: Option<usize>,
    if_keep_tree: bool,
    if_overwrite: bool,
    if_exclude_empty_dirs: bool,
    if_dry_run: bool,
) -> PyResult<SpecTreeOptions> {
    if depth_limit == Some(0) {
        return Err(PyValueError::new_err(
            "Arg `depth_limit` must be >= 1 or None.".to_string(),
        ));
    }
    Ok(SpecTreeOptions {
        spec_search: SpecSearch {
            patterns_include_files,
            patterns_exclude_files,
            patterns_include_dirs,
            patterns_exclude_dirs,
            rule_pattern: parse_rule_pattern(rule_pattern)?,
        },
        n_depth_max: depth_limit.unwrap_or(usize::MAX),
        if_keep_tree,
        if_overwrite,
        if_exclude_empty_dirs,
        if_dry_run,
        num_workers_max,
        options_manipulation: parse_options_manipulation(options.as_deref().unwrap_or(&[]))?,
        ..SpecTreeOptions::default()
    })
}

#[pyfunction(name = "traverse_entries")]
#[pyo3(signature = (
    dir_root,
    options = None,
    patterns_include_files = None,
    patterns_exclude_files = None,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    depth_limit = None
))]
#[allow(clippy::too_many_arguments)]
fn traverse_entries_py(
    py: Python<'_>,
    dir_root: String,
    options: Option<Vec<String>>,
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
) -> PyResult<Vec<(String, String, String)>> {
    let options_trav = parse_options_traversal(options.as_deref().unwrap_or(&[]))?;
    let spec_search = SpecSearch {
        patterns_include_files,
        patterns_exclude_files,
        patterns_include_dirs,
        patterns_exclude_dirs,
        rule_pattern: parse_rule_pattern(rule_pattern)?,
    };
    let n_depth_max = depth_limit.unwrap_or(usize::MAX);

    let res_rows = py.allow_threads(|| {
        traverse_entries(dir_root, n_depth_max, options_trav, &spec_search)?
            .map(|res| {
                res.map(|(entry, marker)| {
                    let c_kind = match entry {
                        EnumEntry::File(_) => "file",
                        EnumEntry::Directory(_) => "directory",
                    };
                    (
                        entry.path().to_string_lossy().to_string(),
                        c_kind.to_string(),
                        marker_name(marker).to_string(),
                    )
                })
            })
            .collect::<Result<Vec<_>, WalkError>>()
    });
    res_rows.map_err(map_walk_error)
}

#[pyfunction(name = "copy_tree")]
#[pyo3(signature = (
    dir_source,
    dir_destination,
    patterns_include_files = None,
    patterns_exclude_files = None,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    depth_limit = None,
    options = None,
    num_workers_max = None,
    if_keep_tree = true,
    if_overwrite = false,
    if_exclude_empty_dirs = false,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn copy_tree_py(
    py: Python<'_>,
    dir_source: String,
    dir_destination: String,
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
    options: Option<Vec<String>>,
    num_workers_max: Option<usize>,
    if_keep_tree: bool,
    if_overwrite: bool,
    if_exclude_empty_dirs: bool,
    if_dry_run: bool,
) -> PyResult<PyReportManipulation> {
    let spec_tree = build_spec_tree(
        patterns_include_files,
        patterns_exclude_files,
        patterns_include_dirs,
        patterns_exclude_dirs,
        rule_pattern,
        depth_limit,
        options,
        num_workers_max,
        if_keep_tree,
        if_overwrite,
        if_exclude_empty_dirs,
        if_dry_run,
    )?;
    let report = py.allow_threads(|| copy_tree(dir_source, dir_destination, &spec_tree));
    Ok(PyReportManipulation::from(report.map_err(map_walk_error)?))
}

#[pyfunction(name = "move_tree")]
#[pyo3(signature = (
    dir_source,
    dir_destination,
    patterns_include_files = None,
    patterns_exclude_files = None,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    depth_limit = None,
    options = None,
    num_workers_max = None,
    if_keep_tree = true,
    if_overwrite = false,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn move_tree_py(
    py: Python<'_>,
    dir_source: String,
    dir_destination: String,
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
    options: Option<Vec<String>>,
    num_workers_max: Option<usize>,
    if_keep_tree: bool,
    if_overwrite: bool,
    if_dry_run: bool,
) -> PyResult<PyReportManipulation> {
    let spec_tree = build_spec_tree(
        patterns_include_files,
        patterns_exclude_files,
        patterns_include_dirs,
        patterns_exclude_dirs,
        rule_pattern,
        depth_limit,
        options,
        num_workers_max,
        if_keep_tree,
        if_overwrite,
        false,
        if_dry_run,
    )?;
    let report = py.allow_threads(|| move_tree(dir_source, dir_destination, &spec_tree));
    Ok(PyReportManipulation::from(report.map_err(map_walk_error)?))
}

#[pyfunction(name = "replicate_tree")]
#[pyo3(signature = (
    dir_source,
    dir_destination,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    depth_limit = None,
    if_dry_run = false
))]
fn replicate_tree_py(
    py: Python<'_>,
    dir_source: String,
    dir_destination: String,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
    if_dry_run: bool,
) -> PyResult<PyReportManipulation> {
    let spec_tree = build_spec_tree(
        None,
        None,
        patterns_include_dirs,
        patterns_exclude_dirs,
        rule_pattern,
        depth_limit,
        None,
        None,
        true,
        false,
        false,
        if_dry_run,
    )?;
    let report = py.allow_threads(|| replicate_tree(dir_source, dir_destination, &spec_tree));
    Ok(PyReportManipulation::from(report.map_err(map_walk_error)?))
}

#[pyfunction(name = "delete_tree")]
#[pyo3(signature = (
    dir_target,
    patterns_include_files = None,
    patterns_exclude_files = None,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    depth_limit = None,
    options = None,
    num_workers_max = None,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn delete_tree_py(
    py: Python<'_>,
    dir_target: String,
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
    options: Option<Vec<String>>,
    num_workers_max: Option<usize>,
    if_dry_run: bool,
) -> PyResult<PyReportManipulation> {
    let spec_tree = build_spec_tree(
        patterns_include_files,
        patterns_exclude_files,
        patterns_include_dirs,
        patterns_exclude_dirs,
        rule_pattern,
        depth_limit,
        options,
        num_workers_max,
        true,
        false,
        false,
        if_dry_run,
    )?;
    let report = py.allow_threads(|| delete_tree(dir_target, &spec_tree));
    Ok(PyReportManipulation::from(report.map_err(map_walk_error)?))
}

#[pyfunction(name = "cleanup_tree")]
#[pyo3(signature = (
    dir_target,
    patterns_include_dirs = None,
    patterns_exclude_dirs = None,
    rule_pattern = "glob",
    depth_limit = None,
    options = None,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn cleanup_tree_py(
    py: Python<'_>,
    dir_target: String,
    patterns_include_dirs: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    rule_pattern: &str,
    depth_limit: Option<usize>,
    options: Option<Vec<String>>,
    if_dry_run: bool,
) -> PyResult<PyReportManipulation> {
    let spec_tree = build_spec_tree(
        None,
        None,
        patterns_include_dirs,
        patterns_exclude_dirs,
        rule_pattern,
        depth_limit,
        options,
        None,
        true,
        false,
        false,
        if_dry_run,
    )?;
    let report = py.allow_threads(|| cleanup_tree(dir_target, &spec_tree));
    Ok(PyReportManipulation::from(report.map_err(map_walk_error)?))
}

#[pymodule]
fn _axiomkit_io_walk_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecEntryError>()?;
    module.add_class::<PyReportManipulation>()?;
    module.add_function(wrap_pyfunction!(traverse_entries_py, module)?)?;
    module.add_function(wrap_pyfunction!(copy_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(move_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(replicate_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(delete_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(cleanup_tree_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
