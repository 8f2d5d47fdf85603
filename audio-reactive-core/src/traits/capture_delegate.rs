use crate::models::error::CaptureError;

/// Subscriber for level updates.
///
/// `on_level` is called from the `level-ticker` thread roughly 30 times a
/// second while capture runs. Implementations should marshal to their own
/// thread if they touch UI state.
pub trait LevelListener: Send + Sync {
    fn on_level(&self, level: f32);

    /// A capture or enumeration failure. The session keeps running in a
    /// degraded state.
    fn on_error(&self, _error: &CaptureError) {}
}
