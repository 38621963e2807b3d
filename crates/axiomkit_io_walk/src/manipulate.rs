//! Per-entry manipulation pipeline with directory ensure/cleanup phases.
//!
//! Every item goes through three phases, each OR-ing bits into its
//! [`FlagManipulationMarker`]:
//! 1. ensure directories (directory enter, `ENSURE_DIRECTORY`),
//! 2. the caller's handler,
//! 3. cleanup of a directory left empty (directory leave, `CLEANUP_DIRECTORY`).
//!
//! [`manipulate`] runs them lazily on the consumer's thread.
//! [`manipulate_parallel`] fans the handler of plain items out on a rayon pool,
//! at most one item per worker at a time, while keeping directory items and
//! output order sequential.
//! [`manipulate_channel`] drives the sequential form on a background thread.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::Receiver;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::entry::EnumEntry;
use crate::spec::{
    FlagManipulationMarker, FlagManipulationOptions, FlagTraversalMarker, ManipulationParams,
    WalkError,
};
use crate::util::{calculate_worker_limit, clear_read_only, is_directory_empty};

pub type FnSelectMarkedEntry<'a, T> =
    Box<dyn Fn(T) -> (EnumEntry, FlagTraversalMarker) + Send + Sync + 'a>;
pub type FnSelectParams<'a, P> =
    Box<dyn Fn(&EnumEntry, FlagTraversalMarker) -> P + Send + Sync + 'a>;
pub type FnHandleEntry<'a, P, I> =
    Box<dyn Fn(&EnumEntry, FlagTraversalMarker, &P) -> Result<I, WalkError> + Send + Sync + 'a>;
pub type FnSelectOutcome<'a, I, R> = Box<
    dyn Fn(EnumEntry, FlagTraversalMarker, FlagManipulationMarker, Option<I>) -> R
        + Send
        + Sync
        + 'a,
>;
pub type FnHandleError<'a, P> = Box<
    dyn Fn(&EnumEntry, FlagManipulationMarker, &P, &WalkError) -> bool + Send + Sync + 'a,
>;

/// Callbacks driving one manipulation run over items of type `T`.
///
/// `P` is the per-entry parameter type, `I` the handler's interim output and
/// `R` the caller's result type.
pub struct SpecManipulation<'a, T, P, I, R> {
    /// Split an input item into its entry and traversal marker.
    pub fn_select_marked_entry: FnSelectMarkedEntry<'a, T>,
    /// Per-entry parameters; probed through [`ManipulationParams`].
    pub fn_select_params: FnSelectParams<'a, P>,
    /// The per-entry operation.
    pub fn_handle: FnHandleEntry<'a, P, I>,
    /// Projection of one processed item.
    pub fn_select_result: FnSelectOutcome<'a, I, R>,
    /// Receives recoverable phase errors; `true` suppresses the error.
    pub fn_handle_error: Option<FnHandleError<'a, P>>,
}

impl<'a, P, I, R> SpecManipulation<'a, (EnumEntry, FlagTraversalMarker), P, I, R> {
    /// Spec over `(entry, marker)` items, as produced by traversal.
    pub fn new<FP, FH, FR>(fn_select_params: FP, fn_handle: FH, fn_select_result: FR) -> Self
    where
        FP: Fn(&EnumEntry, FlagTraversalMarker) -> P + Send + Sync + 'a,
        FH: Fn(&EnumEntry, FlagTraversalMarker, &P) -> Result<I, WalkError> + Send + Sync + 'a,
        FR: Fn(EnumEntry, FlagTraversalMarker, FlagManipulationMarker, Option<I>) -> R
            + Send
            + Sync
            + 'a,
    {
        Self {
            fn_select_marked_entry: Box::new(|item: (EnumEntry, FlagTraversalMarker)| item),
            fn_select_params: Box::new(fn_select_params),
            fn_handle: Box::new(fn_handle),
            fn_select_result: Box::new(fn_select_result),
            fn_handle_error: None,
        }
    }
}

impl<'a, T, P, I, R> SpecManipulation<'a, T, P, I, R> {
    pub fn with_error_handler<F>(mut self, fn_handle_error: F) -> Self
    where
        F: Fn(&EnumEntry, FlagManipulationMarker, &P, &WalkError) -> bool + Send + Sync + 'a,
    {
        self.fn_handle_error = Some(Box::new(fn_handle_error));
        self
    }
}

/// Cooperative cancellation flag shared between a consumer and a pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Phases

struct PendingItem<P> {
    entry: EnumEntry,
    marker_trav: FlagTraversalMarker,
    params: P,
    marker: FlagManipulationMarker,
}

enum StagedItem<P, R> {
    /// Settled before the handler (missing entry skipped).
    Done(R),
    Pending(PendingItem<P>),
}

enum HandledItem<P, I, R> {
    Done(R),
    Handled(PendingItem<P>, Result<I, WalkError>),
    /// Cancelled before its handler started.
    Cancelled,
}

fn ensure_directories<P: ManipulationParams>(
    marker_trav: FlagTraversalMarker,
    params: &P,
    options: FlagManipulationOptions,
) -> Result<bool, WalkError> {
    if !marker_trav.contains(FlagTraversalMarker::ENTER_DIRECTORY)
        || !options.contains(FlagManipulationOptions::ENSURE_DIRECTORY)
        || params.if_no_processing()
    {
        return Ok(false);
    }
    let Some(l_dirs) = params.ensuring_directories() else {
        return Ok(false);
    };

    let mut b_if_created = false;
    for path_dir in l_dirs {
        if path_dir.is_dir() {
            continue;
        }
        fs::create_dir_all(path_dir).map_err(|e| WalkError::io("create directory", path_dir, e))?;
        debug!(dir = %path_dir.display(), "directory created");
        b_if_created = true;
    }
    Ok(b_if_created)
}

fn cleanup_directory<P: ManipulationParams>(
    entry: &EnumEntry,
    marker_trav: FlagTraversalMarker,
    params: &P,
    options: FlagManipulationOptions,
) -> Result<bool, WalkError> {
    if !marker_trav.contains(FlagTraversalMarker::LEAVE_DIRECTORY)
        || !options.contains(FlagManipulationOptions::CLEANUP_DIRECTORY)
        || params.if_no_processing()
        || !entry.is_directory()
    {
        return Ok(false);
    }

    let path_dir = entry.path();
    match is_directory_empty(path_dir) {
        Ok(true) => {}
        Ok(false) => return Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(WalkError::io("read directory", path_dir, e)),
    }
    if options.contains(FlagManipulationOptions::CLEAR_READ_ONLY) {
        clear_read_only(path_dir).map_err(|e| WalkError::io("clear read-only", path_dir, e))?;
    }
    fs::remove_dir(path_dir).map_err(|e| WalkError::io("delete directory", path_dir, e))?;
    debug!(dir = %path_dir.display(), "directory deleted");
    Ok(true)
}

impl<T, P, I, R> SpecManipulation<'_, T, P, I, R>
where
    P: ManipulationParams,
{
    /// Route a phase error; `Ok` means it was suppressed.
    fn settle(
        &self,
        entry: &EnumEntry,
        marker: &mut FlagManipulationMarker,
        params: &P,
        err: WalkError,
    ) -> Result<(), WalkError> {
        if !err.is_recoverable() {
            return Err(err);
        }
        let Some(fn_handle_error) = &self.fn_handle_error else {
            return Err(err);
        };
        if !fn_handle_error(entry, *marker, params, &err) {
            return Err(err);
        }
        warn!(path = %entry.path().display(), error = %err, "entry failed, error handled");
        *marker |= FlagManipulationMarker::ELEMENT_ERROR;
        Ok(())
    }

    /// Existence gate, parameters and the ensure phase.
    fn stage_gate(
        &self,
        mut entry: EnumEntry,
        marker_trav: FlagTraversalMarker,
        options: FlagManipulationOptions,
    ) -> Result<StagedItem<P, R>, WalkError> {
        if options.contains(FlagManipulationOptions::REFRESH) {
            entry.refresh();
        }
        if options.contains(FlagManipulationOptions::SKIP_NOT_EXISTS) && !entry.exists() {
            let r = (self.fn_select_result)(entry, marker_trav, FlagManipulationMarker::NONE, None);
            return Ok(StagedItem::Done(r));
        }

        let params = (self.fn_select_params)(&entry, marker_trav);
        let mut marker = FlagManipulationMarker::NONE;
        match ensure_directories(marker_trav, &params, options) {
            Ok(true) => marker |= FlagManipulationMarker::DIRECTORY_CREATED,
            Ok(false) => {}
            Err(e) => self.settle(&entry, &mut marker, &params, e)?,
        }
        Ok(StagedItem::Pending(PendingItem {
            entry,
            marker_trav,
            params,
            marker,
        }))
    }

    fn stage_handle(&self, staged: StagedItem<P, R>) -> HandledItem<P, I, R> {
        match staged {
            StagedItem::Done(r) => HandledItem::Done(r),
            StagedItem::Pending(item) => {
                let res_handle = (self.fn_handle)(&item.entry, item.marker_trav, &item.params);
                HandledItem::Handled(item, res_handle)
            }
        }
    }

    /// Handler outcome, the cleanup phase and the result projection.
    fn stage_finish(
        &self,
        handled: HandledItem<P, I, R>,
        options: FlagManipulationOptions,
    ) -> Result<R, WalkError> {
        let (item, res_handle) = match handled {
            HandledItem::Done(r) => return Ok(r),
            HandledItem::Handled(item, res_handle) => (item, res_handle),
            HandledItem::Cancelled => return Err(WalkError::Cancelled),
        };
        let PendingItem {
            entry,
            marker_trav,
            params,
            mut marker,
        } = item;

        let mut interim = None;
        match res_handle {
            Ok(v) => {
                interim = Some(v);
                if !params.if_no_processing() {
                    marker |= FlagManipulationMarker::ELEMENT_PROCESSED;
                }
            }
            Err(e) => self.settle(&entry, &mut marker, &params, e)?,
        }
        match cleanup_directory(&entry, marker_trav, &params, options) {
            Ok(true) => marker |= FlagManipulationMarker::DIRECTORY_DELETED,
            Ok(false) => {}
            Err(e) => self.settle(&entry, &mut marker, &params, e)?,
        }
        Ok((self.fn_select_result)(entry, marker_trav, marker, interim))
    }

    fn process(
        &self,
        entry: EnumEntry,
        marker_trav: FlagTraversalMarker,
        options: FlagManipulationOptions,
    ) -> Result<R, WalkError> {
        let staged = self.stage_gate(entry, marker_trav, options)?;
        self.stage_finish(self.stage_handle(staged), options)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Sequential

/// Lazy sequential pipeline returned by [`manipulate`].
///
/// Each item completes all phases before the next one is pulled. The first
/// unsuppressed error is yielded and ends the sequence.
pub struct Manipulation<'a, It, T, P, I, R> {
    iter_items: It,
    options: FlagManipulationOptions,
    spec: SpecManipulation<'a, T, P, I, R>,
    if_finished: bool,
}

pub fn manipulate<'a, Items, T, P, I, R>(
    items: Items,
    options: FlagManipulationOptions,
    spec: SpecManipulation<'a, T, P, I, R>,
) -> Manipulation<'a, Items::IntoIter, T, P, I, R>
where
    Items: IntoIterator<Item = Result<T, WalkError>>,
    P: ManipulationParams,
{
    Manipulation {
        iter_items: items.into_iter(),
        options,
        spec,
        if_finished: false,
    }
}

impl<It, T, P, I, R> Iterator for Manipulation<'_, It, T, P, I, R>
where
    It: Iterator<Item = Result<T, WalkError>>,
    P: ManipulationParams,
{
    type Item = Result<R, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.if_finished {
            return None;
        }
        let res = match self.iter_items.next()? {
            Ok(item) => {
                let (entry, marker_trav) = (self.spec.fn_select_marked_entry)(item);
                self.spec.process(entry, marker_trav, self.options)
            }
            Err(e) => Err(e),
        };
        if res.is_err() {
            self.if_finished = true;
        }
        Some(res)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Parallel

/// Bounded-concurrency pipeline returned by [`manipulate_parallel`].
///
/// Consecutive plain items are gated in order, handled as one wave of at most
/// `n_workers` items on the pool and finished in input order. The next wave
/// starts only after every result of the previous one was settled, so an
/// unsuppressed error or a cancellation leaves at most the in-flight wave
/// handled. A directory-marker item closes the current wave and is then
/// processed on its own, so directory creation and deletion never overlap
/// with file work inside them.
pub struct ManipulationParallel<'a, It, T, P, I, R> {
    iter_items: std::iter::Fuse<It>,
    options: FlagManipulationOptions,
    spec: SpecManipulation<'a, T, P, I, R>,
    token: CancelToken,
    thread_pool: Option<ThreadPool>,
    n_batch_max: usize,
    l_warnings: Vec<String>,
    item_deferred: Option<(EnumEntry, FlagTraversalMarker)>,
    queue_out: VecDeque<R>,
    error_deferred: Option<WalkError>,
    if_finished: bool,
}

/// Build the bounded-concurrency pipeline.
///
/// `n_workers_max` follows [`calculate_worker_limit`]. A pool that cannot be
/// built degrades to serial handling with a warning (see
/// [`ManipulationParallel::take_warnings`]).
pub fn manipulate_parallel<'a, Items, T, P, I, R>(
    items: Items,
    options: FlagManipulationOptions,
    spec: SpecManipulation<'a, T, P, I, R>,
    n_workers_max: Option<usize>,
    token: CancelToken,
) -> ManipulationParallel<'a, Items::IntoIter, T, P, I, R>
where
    Items: IntoIterator<Item = Result<T, WalkError>>,
    P: ManipulationParams + Send,
    I: Send,
    R: Send,
{
    let mut n_workers = calculate_worker_limit(n_workers_max);
    let mut l_warnings = Vec::new();
    let thread_pool = if n_workers <= 1 {
        None
    } else {
        match ThreadPoolBuilder::new().num_threads(n_workers).build() {
            Ok(thread_pool) => Some(thread_pool),
            Err(e) => {
                warn!(
                    workers = n_workers,
                    error = %e,
                    "failed to initialize thread pool; fallback to serial handling"
                );
                l_warnings.push(format!(
                    "Failed to initialize thread pool (workers={n_workers}); fallback to serial handling."
                ));
                n_workers = 1;
                None
            }
        }
    };

    ManipulationParallel {
        iter_items: items.into_iter().fuse(),
        options,
        spec,
        token,
        thread_pool,
        n_batch_max: n_workers.max(1),
        l_warnings,
        item_deferred: None,
        queue_out: VecDeque::new(),
        error_deferred: None,
        if_finished: false,
    }
}

impl<It, T, P, I, R> ManipulationParallel<'_, It, T, P, I, R> {
    /// Drain non-fatal warnings raised so far (thread-pool fallback).
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.l_warnings)
    }
}

impl<It, T, P, I, R> ManipulationParallel<'_, It, T, P, I, R>
where
    It: Iterator<Item = Result<T, WalkError>>,
    P: ManipulationParams + Send,
    I: Send,
    R: Send,
{
    fn next_marked(&mut self) -> Option<Result<(EnumEntry, FlagTraversalMarker), WalkError>> {
        if let Some(item) = self.item_deferred.take() {
            return Some(Ok(item));
        }
        let res_item = self.iter_items.next()?;
        Some(res_item.map(|item| (self.spec.fn_select_marked_entry)(item)))
    }

    fn run_batch(&mut self, l_staged: Vec<StagedItem<P, R>>) -> Result<(), WalkError> {
        if l_staged.is_empty() {
            return Ok(());
        }
        let spec = &self.spec;
        let token = &self.token;
        let handle_unless_cancelled = |staged: StagedItem<P, R>| -> HandledItem<P, I, R> {
            if token.is_cancelled() {
                return HandledItem::Cancelled;
            }
            spec.stage_handle(staged)
        };
        let l_handled: Vec<HandledItem<P, I, R>> = match &self.thread_pool {
            Some(thread_pool) => thread_pool.install(|| {
                l_staged
                    .into_par_iter()
                    .map(handle_unless_cancelled)
                    .collect()
            }),
            None => l_staged.into_iter().map(handle_unless_cancelled).collect(),
        };
        for handled in l_handled {
            let r = self.spec.stage_finish(handled, self.options)?;
            self.queue_out.push_back(r);
        }
        Ok(())
    }

    fn fill_and_run(&mut self) -> Result<(), WalkError> {
        let mut l_staged = Vec::new();
        loop {
            if l_staged.len() >= self.n_batch_max
                || (!l_staged.is_empty() && self.token.is_cancelled())
            {
                break;
            }
            let Some(res_item) = self.next_marked() else {
                if l_staged.is_empty() {
                    self.if_finished = true;
                }
                break;
            };
            let (entry, marker_trav) = match res_item {
                Ok(v) => v,
                Err(e) => {
                    self.run_batch(l_staged)?;
                    return Err(e);
                }
            };

            if marker_trav.is_empty() {
                l_staged.push(self.spec.stage_gate(entry, marker_trav, self.options)?);
                continue;
            }
            if !l_staged.is_empty() {
                self.item_deferred = Some((entry, marker_trav));
                break;
            }
            let r = self.spec.process(entry, marker_trav, self.options)?;
            self.queue_out.push_back(r);
            return Ok(());
        }
        self.run_batch(l_staged)
    }
}

impl<It, T, P, I, R> Iterator for ManipulationParallel<'_, It, T, P, I, R>
where
    It: Iterator<Item = Result<T, WalkError>>,
    P: ManipulationParams + Send,
    I: Send,
    R: Send,
{
    type Item = Result<R, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.queue_out.pop_front() {
                return Some(Ok(r));
            }
            if let Some(e) = self.error_deferred.take() {
                self.if_finished = true;
                return Some(Err(e));
            }
            if self.if_finished {
                return None;
            }
            if self.token.is_cancelled() {
                debug!("manipulation cancelled");
                self.if_finished = true;
                return Some(Err(WalkError::Cancelled));
            }
            if let Err(e) = self.fill_and_run() {
                self.error_deferred = Some(e);
            }
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Channel

/// Run the sequential pipeline on a background thread.
///
/// Results arrive in submission order through a channel holding at most
/// `n_capacity` undelivered results. The worker stops after the first error
/// or when the receiver is dropped.
pub fn manipulate_channel<Items, T, P, I, R>(
    items: Items,
    options: FlagManipulationOptions,
    spec: SpecManipulation<'static, T, P, I, R>,
    n_capacity: usize,
) -> Result<Receiver<Result<R, WalkError>>, WalkError>
where
    Items: IntoIterator<Item = Result<T, WalkError>>,
    Items::IntoIter: Send + 'static,
    T: 'static,
    P: ManipulationParams + 'static,
    I: 'static,
    R: Send + 'static,
{
    let (tx_result, rx_result) = crossbeam_channel::bounded(n_capacity.max(1));
    let iter_results = manipulate(items, options, spec);
    thread::Builder::new()
        .name("walk-manipulate".to_string())
        .spawn(move || {
            for res in iter_results {
                let b_if_error = res.is_err();
                if tx_result.send(res).is_err() {
                    debug!("manipulation receiver dropped");
                    return;
                }
                if b_if_error {
                    return;
                }
            }
        })
        .map_err(|e| WalkError::io("spawn manipulation worker", PathBuf::new(), e))?;
    Ok(rx_result)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
