//! Application state for the API server

use crate::Tubarr;

/// Shared state handed to every route handler
///
/// Cloning is cheap: [`Tubarr`] only holds shared handles.
#[derive(Clone)]
pub struct AppState {
    /// Application context
    pub tubarr: Tubarr,
}

impl AppState {
    /// Create a new AppState
    pub fn new(tubarr: Tubarr) -> Self {
        Self { tubarr }
    }
}
