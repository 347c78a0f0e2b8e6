//! Debounced draft autosave.
//!
//! Every data change restarts two timers: a short indicator timer that turns
//! on the "saving" flag, and a longer commit timer that writes the latest
//! snapshot through the [`DraftStore`]. Rapid edits therefore collapse into a
//! single write issued one commit delay after the last edit, and the saving
//! flag only shows up once the user has paused typing.
//!
//! Timer tasks hold a weak reference to the coordinator and check a
//! generation counter before acting, so a timer that was replaced, cleared or
//! outlived its coordinator does nothing.
//!
//! Commit timers hand the write to the blocking pool and never hold the state
//! lock during I/O. Every store mutation is stamped with the generation that
//! issued it and applied through a journal, so an older snapshot can never
//! overwrite a newer one or resurrect a cleared draft.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use jiff::Timestamp;
use log::{debug, warn};
use tokio::{
    runtime::Handle,
    task::{self, JoinHandle},
    time::sleep,
};

use crate::{
    models::{AutoSaveState, SubmissionData},
    store::DraftStore,
};

/// Receives a notification for every mutation of the submission data.
pub trait ChangeObserver: Send + Sync {
    fn data_changed(&self, data: &SubmissionData);
}

/// Timer delays used by [`AutoSave`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveDelays {
    /// Quiet period before the saving indicator is shown
    pub indicator: Duration,
    /// Quiet period before the draft is written
    pub commit: Duration,
}

impl Default for AutosaveDelays {
    fn default() -> Self {
        Self {
            indicator: Duration::from_millis(500),
            commit: Duration::from_millis(2000),
        }
    }
}

/// Autosave coordinator. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct AutoSave {
    shared: Arc<Shared>,
}

struct Shared {
    store: DraftStore,
    delays: AutosaveDelays,
    runtime: Handle,
    inner: Mutex<Inner>,
    journal: Arc<Mutex<u64>>,
}

#[derive(Default)]
struct Inner {
    state: AutoSaveState,
    generation: u64,
    pending: Option<SubmissionData>,
    indicator_timer: Option<JoinHandle<()>>,
    commit_timer: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl Inner {
    fn cancel_timers(&mut self) {
        if let Some(timer) = self.indicator_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.commit_timer.take() {
            timer.abort();
        }
    }

    /// Cancels timers and invalidates any timer task already past its sleep.
    fn invalidate(&mut self) {
        self.cancel_timers();
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_indicator(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.shut_down || inner.generation != generation {
            return;
        }
        inner.indicator_timer = None;
        inner.state.is_saving = true;
    }

    /// Takes the pending snapshot for the commit timer of `generation`.
    fn begin_commit(&self, generation: u64) -> Option<StoreWrite> {
        let mut inner = self.lock();
        if inner.shut_down || inner.generation != generation {
            return None;
        }
        if let Some(timer) = inner.indicator_timer.take() {
            timer.abort();
        }
        inner.commit_timer = None;
        let data = inner.pending.take()?;
        Some(self.write_op(generation, Some(data)))
    }

    /// Records a finished write unless newer activity has taken over.
    fn finish_commit(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.shut_down || inner.generation != generation {
            return;
        }
        inner.state.is_saving = false;
        inner.state.last_saved = Some(Timestamp::now());
        debug!("Autosave committed draft '{}'", self.store.key());
    }

    fn write_op(&self, generation: u64, data: Option<SubmissionData>) -> StoreWrite {
        StoreWrite {
            store: self.store.clone(),
            journal: Arc::clone(&self.journal),
            generation,
            data,
        }
    }
}

/// One stamped store mutation: a save when `data` is set, a clear otherwise.
struct StoreWrite {
    store: DraftStore,
    journal: Arc<Mutex<u64>>,
    generation: u64,
    data: Option<SubmissionData>,
}

impl StoreWrite {
    /// Applies the mutation unless a newer one already reached the store.
    fn apply(self) -> bool {
        let mut applied = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        if *applied > self.generation {
            debug!(
                "Skipping stale write of generation {} for '{}'",
                self.generation,
                self.store.key()
            );
            return false;
        }
        match &self.data {
            Some(data) => self.store.save(data),
            None => self.store.clear(),
        }
        *applied = self.generation;
        true
    }

    async fn apply_blocking(self) -> bool {
        task::spawn_blocking(move || self.apply())
            .await
            .unwrap_or_else(|e| {
                warn!("Autosave write task failed: {e}");
                false
            })
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel_timers();
    }
}

impl AutoSave {
    /// Creates a coordinator whose timers run on `runtime`.
    pub fn new(store: DraftStore, delays: AutosaveDelays, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                delays,
                runtime,
                inner: Mutex::new(Inner::default()),
                journal: Arc::new(Mutex::new(0)),
            }),
        }
    }

    /// Schedules a debounced write of `data`, replacing any pending one.
    pub fn trigger_save(&self, data: SubmissionData) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        if inner.shut_down {
            return;
        }

        inner.invalidate();
        inner.pending = Some(data);
        let generation = inner.generation;

        let weak = Arc::downgrade(shared);
        inner.indicator_timer = Some(spawn_timer(
            &shared.runtime,
            shared.delays.indicator,
            weak.clone(),
            move |s| s.show_indicator(generation),
        ));
        inner.commit_timer = Some(spawn_commit(
            &shared.runtime,
            shared.delays.commit,
            weak,
            generation,
        ));
    }

    /// Writes the pending snapshot now, cancelling both timers.
    ///
    /// The write runs on the calling thread. Returns `false` when there was
    /// nothing to write.
    pub fn flush(&self) -> bool {
        let write = {
            let mut inner = self.shared.lock();
            inner.invalidate();
            let Some(data) = inner.pending.take() else {
                return false;
            };
            self.shared.write_op(inner.generation, Some(data))
        };
        let generation = write.generation;
        let written = write.apply();
        if written {
            self.shared.finish_commit(generation);
        }
        written
    }

    /// Reads the stored draft without touching the autosave state.
    pub fn load_draft(&self) -> Option<SubmissionData> {
        self.shared.store.load()
    }

    /// Cancels pending work, removes the stored draft and resets the state.
    ///
    /// A commit already in flight cannot restore the draft afterwards.
    pub fn clear_draft(&self) {
        let clear = {
            let mut inner = self.shared.lock();
            inner.invalidate();
            inner.pending = None;
            inner.state = AutoSaveState::default();
            self.shared.write_op(inner.generation, None)
        };
        clear.apply();
        debug!("Draft '{}' cleared", self.shared.store.key());
    }

    /// Cancels all timers and ignores further triggers.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        inner.invalidate();
        inner.pending = None;
        inner.shut_down = true;
    }

    pub fn state(&self) -> AutoSaveState {
        self.shared.lock().state
    }

    /// Whether a snapshot is waiting for its commit timer.
    pub fn has_pending(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    pub fn delays(&self) -> AutosaveDelays {
        self.shared.delays
    }
}

impl ChangeObserver for AutoSave {
    fn data_changed(&self, data: &SubmissionData) {
        self.trigger_save(data.clone());
    }
}

fn spawn_timer<F>(runtime: &Handle, delay: Duration, shared: Weak<Shared>, fire: F) -> JoinHandle<()>
where
    F: FnOnce(&Shared) + Send + 'static,
{
    runtime.spawn(async move {
        sleep(delay).await;
        if let Some(shared) = shared.upgrade() {
            fire(&shared);
        }
    })
}

/// Commit timer: the write itself runs on the blocking pool.
fn spawn_commit(
    runtime: &Handle,
    delay: Duration,
    shared: Weak<Shared>,
    generation: u64,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        sleep(delay).await;
        let Some(write) = shared.upgrade().and_then(|s| s.begin_commit(generation)) else {
            return;
        };
        if write.apply_blocking().await {
            if let Some(shared) = shared.upgrade() {
                shared.finish_commit(generation);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        testing::{BrokenBackend, CountingBackend, GatedBackend},
        DEFAULT_DRAFT_KEY,
    };

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn coordinator() -> (Arc<CountingBackend>, AutoSave) {
        let backend = Arc::new(CountingBackend::default());
        let store = DraftStore::new(backend.clone(), DEFAULT_DRAFT_KEY);
        let autosave = AutoSave::new(store, AutosaveDelays::default(), Handle::current());
        (backend, autosave)
    }

    fn titled(title: &str) -> SubmissionData {
        SubmissionData {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_triggers_collapse_into_one_write() {
        let (backend, autosave) = coordinator();

        for i in 0..10 {
            autosave.trigger_save(titled(&format!("edit {i}")));
            sleep(ms(100)).await;
        }
        assert_eq!(backend.writes(), 0);

        sleep(ms(2000)).await;
        assert_eq!(backend.writes(), 1);
        assert_eq!(autosave.load_draft(), Some(titled("edit 9")));
        assert!(!autosave.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saving_indicator_window() {
        let (_backend, autosave) = coordinator();

        autosave.trigger_save(titled("draft"));
        sleep(ms(400)).await;
        assert!(!autosave.state().is_saving);

        sleep(ms(200)).await;
        assert!(autosave.state().is_saving);
        assert!(autosave.state().last_saved.is_none());

        sleep(ms(1500)).await;
        let state = autosave.state();
        assert!(!state.is_saving);
        assert!(state.last_saved.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_typing_never_shows_indicator() {
        let (backend, autosave) = coordinator();

        for _ in 0..10 {
            autosave.trigger_save(titled("typing"));
            sleep(ms(300)).await;
            assert!(!autosave.state().is_saving);
        }
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_are_spaced_by_quiet_periods() {
        let (backend, autosave) = coordinator();

        autosave.trigger_save(titled("first"));
        sleep(ms(2100)).await;
        autosave.trigger_save(titled("second"));
        sleep(ms(2100)).await;

        assert_eq!(backend.writes(), 2);
        assert_eq!(autosave.load_draft(), Some(titled("second")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_write() {
        let (backend, autosave) = coordinator();

        autosave.trigger_save(titled("unsaved"));
        autosave.shutdown();
        sleep(ms(3000)).await;
        assert_eq!(backend.writes(), 0);

        autosave.trigger_save(titled("after teardown"));
        sleep(ms(3000)).await;
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_write() {
        let (backend, autosave) = coordinator();

        autosave.trigger_save(titled("unsaved"));
        drop(autosave);
        sleep(ms(3000)).await;
        assert_eq!(backend.writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_draft_beats_pending_write() {
        let (backend, autosave) = coordinator();

        autosave.trigger_save(titled("saved"));
        sleep(ms(2100)).await;
        autosave.trigger_save(titled("stale"));
        sleep(ms(600)).await;
        assert!(autosave.state().is_saving);

        autosave.clear_draft();
        assert_eq!(autosave.state(), AutoSaveState::default());

        sleep(ms(3000)).await;
        assert_eq!(backend.writes(), 1);
        assert_eq!(autosave.load_draft(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let (backend, autosave) = coordinator();

        assert!(!autosave.flush());

        autosave.trigger_save(titled("now"));
        assert!(autosave.flush());
        assert_eq!(backend.writes(), 1);
        assert!(autosave.state().last_saved.is_some());

        sleep(ms(3000)).await;
        assert_eq!(backend.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_is_absorbed() {
        let store = DraftStore::new(Arc::new(BrokenBackend), DEFAULT_DRAFT_KEY);
        let autosave = AutoSave::new(store, AutosaveDelays::default(), Handle::current());

        autosave.trigger_save(titled("lost"));
        sleep(ms(2100)).await;

        assert!(!autosave.state().is_saving);
        assert_eq!(autosave.load_draft(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_observer_snapshots_data() {
        let (_backend, autosave) = coordinator();
        let observer: &dyn ChangeObserver = &autosave;

        let mut data = titled("before");
        observer.data_changed(&data);
        data.title = "mutated after notify".to_string();

        sleep(ms(2100)).await;
        assert_eq!(autosave.load_draft(), Some(titled("before")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_delays() {
        let backend = Arc::new(CountingBackend::default());
        let store = DraftStore::new(backend.clone(), DEFAULT_DRAFT_KEY);
        let delays = AutosaveDelays {
            indicator: ms(10),
            commit: ms(50),
        };
        let autosave = AutoSave::new(store, delays, Handle::current());

        autosave.trigger_save(titled("quick"));
        sleep(ms(60)).await;
        assert_eq!(backend.writes(), 1);
        assert_eq!(autosave.delays(), delays);
    }

    fn gated_coordinator() -> (Arc<GatedBackend>, AutoSave) {
        let backend = Arc::new(GatedBackend::default());
        let store = DraftStore::new(backend.clone(), DEFAULT_DRAFT_KEY);
        let delays = AutosaveDelays {
            indicator: ms(5),
            commit: ms(20),
        };
        let autosave = AutoSave::new(store, delays, Handle::current());
        (backend, autosave)
    }

    async fn pass_gate(backend: &Arc<GatedBackend>) {
        let backend = Arc::clone(backend);
        task::spawn_blocking(move || {
            backend.gate.wait();
        })
        .await
        .expect("gate task panicked");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_state_is_available_while_write_in_flight() {
        let (backend, autosave) = gated_coordinator();

        autosave.trigger_save(titled("slow"));
        pass_gate(&backend).await;

        assert!(autosave.state().last_saved.is_none());
        assert!(!autosave.has_pending());
        autosave.trigger_save(titled("newer"));
        assert!(autosave.has_pending());

        pass_gate(&backend).await;

        for _ in 0..200 {
            if autosave.state().last_saved.is_some() {
                break;
            }
            sleep(ms(10)).await;
        }
        assert!(autosave.state().last_saved.is_some());
        assert_eq!(autosave.load_draft(), Some(titled("newer")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_during_write_removes_draft() {
        let (backend, autosave) = gated_coordinator();

        autosave.trigger_save(titled("stale"));
        pass_gate(&backend).await;

        let clearing = {
            let autosave = autosave.clone();
            task::spawn_blocking(move || autosave.clear_draft())
        };
        pass_gate(&backend).await;
        clearing.await.expect("clear task panicked");

        sleep(ms(50)).await;
        assert_eq!(autosave.load_draft(), None);
        assert_eq!(autosave.state(), AutoSaveState::default());
    }
}
