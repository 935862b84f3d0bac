//! Pipeline state, driven on the UI thread.
//!
//! Both halves of the pipeline follow the same discipline: every request
//! gets a monotonically increasing id at issue time, and a completion is
//! committed only if its id matches the most recently issued one. Whatever
//! finished last does not win; whatever was requested last does.
//!
//! These types are plain data so the ordering and lifecycle rules can be
//! tested without threads, sockets, or a GPU.

use crate::mesh::{Geometry, LoadError, MeshFormat};
use crate::net::{GenerationResult, SubmitError};

/// Lifecycle of the generation request: parameters selected, request in
/// flight, result (or failure) settled.
pub enum SubmitState {
    Idle,
    Submitting { id: u64 },
    Ready(GenerationResult),
    Failed(String),
}

impl SubmitState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }

    /// A submission was accepted by the engine; any previous result is
    /// superseded from this moment.
    pub fn begin(&mut self, id: u64) {
        *self = Self::Submitting { id };
    }

    /// Synchronous rejection (no image, bad parameter): never entered
    /// `Submitting`, never touched the network.
    pub fn reject(&mut self, error: &SubmitError) {
        *self = Self::Failed(error.to_string());
    }

    /// Apply a completion from the engine. Returns the result to act on if
    /// this completion belongs to the current request; a stale id leaves the
    /// state untouched.
    pub fn settle(
        &mut self,
        id: u64,
        result: Result<GenerationResult, SubmitError>,
    ) -> Option<GenerationResult> {
        match self {
            Self::Submitting { id: current } if *current == id => match result {
                Ok(result) => {
                    *self = Self::Ready(result.clone());
                    Some(result)
                }
                Err(error) => {
                    *self = Self::Failed(error.to_string());
                    None
                }
            },
            _ => None,
        }
    }
}

/// Observable phase of the fetch-and-decode half, distinct from "no request
/// yet" and from "failed".
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ViewPhase {
    Idle,
    Fetching { id: u64 },
    Decoding { id: u64 },
    Ready { id: u64 },
    Failed(String),
}

/// The single "currently displayed geometry" slot plus its phase. Only the
/// most recent request may ever write the slot.
pub struct ViewState {
    phase: ViewPhase,
    geometry: Option<Geometry>,
    format: Option<MeshFormat>,
    /// Set when a freshly committed geometry awaits GPU upload.
    dirty: bool,
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            phase: ViewPhase::Idle,
            geometry: None,
            format: None,
            dirty: false,
        }
    }

    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn format(&self) -> Option<MeshFormat> {
        self.format
    }

    /// A new target was requested: the previous geometry is cleared
    /// immediately, before any byte of the new mesh arrives, so stale
    /// geometry is never shown against a new request.
    pub fn begin_load(&mut self, id: u64, format: MeshFormat) {
        self.geometry = None;
        self.format = Some(format);
        self.dirty = false;
        self.phase = ViewPhase::Fetching { id };
    }

    /// Fetch completed, decode started. Ignored for superseded requests.
    pub fn note_decoding(&mut self, id: u64) {
        if self.phase == (ViewPhase::Fetching { id }) {
            self.phase = ViewPhase::Decoding { id };
        }
    }

    /// Apply a load completion. Returns true if it was committed; a stale id
    /// is dropped without touching the displayed state.
    pub fn settle(&mut self, id: u64, result: Result<Geometry, LoadError>) -> bool {
        let current = match self.phase {
            ViewPhase::Fetching { id } | ViewPhase::Decoding { id } => id,
            _ => return false,
        };
        if current != id {
            return false;
        }
        match result {
            Ok(geometry) => {
                self.geometry = Some(geometry);
                self.dirty = true;
                self.phase = ViewPhase::Ready { id };
            }
            Err(error) => {
                self.geometry = None;
                self.dirty = false;
                self.phase = ViewPhase::Failed(error.to_string());
            }
        }
        true
    }

    /// Replace whatever is shown with a failure message. Used when committed
    /// geometry cannot actually be displayed (e.g. it exceeds the renderer's
    /// buffer capacity).
    pub fn fail(&mut self, message: impl Into<String>) {
        self.geometry = None;
        self.format = None;
        self.dirty = false;
        self.phase = ViewPhase::Failed(message.into());
    }

    /// Drop back to the empty state (submission failed, nothing to show).
    pub fn reset(&mut self) {
        self.geometry = None;
        self.format = None;
        self.dirty = false;
        self.phase = ViewPhase::Idle;
    }

    /// Take the needs-upload flag; true at most once per committed geometry.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str) -> GenerationResult {
        GenerationResult {
            file_url: url.to_string(),
            file_type: MeshFormat::Stl,
        }
    }

    fn triangle() -> Geometry {
        Geometry {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            colors: None,
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn submit_passes_through_submitting_and_settles() {
        let mut state = SubmitState::Idle;
        state.begin(1);
        assert!(state.is_submitting());

        let committed = state.settle(1, Ok(result("http://x/a.stl")));
        assert!(committed.is_some());
        assert!(matches!(state, SubmitState::Ready(_)));
    }

    #[test]
    fn submit_failure_settles_as_failed_not_stuck() {
        let mut state = SubmitState::Idle;
        state.begin(1);
        let committed = state.settle(
            1,
            Err(SubmitError::Service {
                status: 500,
                message: "boom".into(),
            }),
        );
        assert!(committed.is_none());
        assert!(!state.is_submitting());
        assert!(matches!(state, SubmitState::Failed(_)));
    }

    #[test]
    fn stale_submission_result_is_discarded() {
        let mut state = SubmitState::Idle;
        state.begin(1);
        state.begin(2);

        // Request 1 completes after request 2 was issued: ignored.
        assert!(state.settle(1, Ok(result("http://x/old.stl"))).is_none());
        assert!(state.is_submitting());

        let committed = state.settle(2, Ok(result("http://x/new.stl")));
        assert_eq!(committed.unwrap().file_url, "http://x/new.stl");
    }

    #[test]
    fn new_load_clears_previous_geometry_immediately() {
        let mut view = ViewState::new();
        view.begin_load(1, MeshFormat::Stl);
        assert!(view.settle(1, Ok(triangle())));
        assert!(view.geometry().is_some());

        view.begin_load(2, MeshFormat::Ply);
        assert!(view.geometry().is_none());
        assert_eq!(*view.phase(), ViewPhase::Fetching { id: 2 });
    }

    #[test]
    fn geometry_stays_cleared_when_new_fetch_fails() {
        let mut view = ViewState::new();
        view.begin_load(1, MeshFormat::Stl);
        assert!(view.settle(1, Ok(triangle())));

        view.begin_load(2, MeshFormat::Stl);
        assert!(view.settle(2, Err(LoadError::Fetch("unreachable".into()))));
        assert!(view.geometry().is_none());
        assert!(matches!(view.phase(), ViewPhase::Failed(_)));
    }

    #[test]
    fn only_most_recent_load_is_ever_shown() {
        let mut view = ViewState::new();
        view.begin_load(1, MeshFormat::Stl);
        view.begin_load(2, MeshFormat::Stl);

        // Older load finishes after the newer one started.
        assert!(!view.settle(1, Ok(triangle())));
        assert!(view.geometry().is_none());

        assert!(view.settle(2, Ok(triangle())));
        assert_eq!(*view.phase(), ViewPhase::Ready { id: 2 });
        assert!(view.take_dirty());
        assert!(!view.take_dirty());
    }

    #[test]
    fn decoding_note_applies_only_to_current_request() {
        let mut view = ViewState::new();
        view.begin_load(1, MeshFormat::Ply);
        view.begin_load(2, MeshFormat::Ply);

        view.note_decoding(1);
        assert_eq!(*view.phase(), ViewPhase::Fetching { id: 2 });
        view.note_decoding(2);
        assert_eq!(*view.phase(), ViewPhase::Decoding { id: 2 });
    }

    #[test]
    fn undisplayable_model_becomes_a_visible_failure() {
        let mut view = ViewState::new();
        view.begin_load(1, MeshFormat::Stl);
        assert!(view.settle(1, Ok(triangle())));
        assert!(view.take_dirty());

        // The renderer refused the upload (model over buffer capacity).
        view.fail("model is too large to display");
        assert!(view.geometry().is_none());
        assert!(!view.take_dirty());
        assert!(matches!(view.phase(), ViewPhase::Failed(_)));
    }

    #[test]
    fn service_error_resets_view_with_no_geometry() {
        let mut view = ViewState::new();
        view.begin_load(1, MeshFormat::Stl);
        assert!(view.settle(1, Ok(triangle())));

        // HTTP 500 on the next submission: nothing to load, nothing shown.
        view.reset();
        assert!(view.geometry().is_none());
        assert_eq!(*view.phase(), ViewPhase::Idle);
    }
}
