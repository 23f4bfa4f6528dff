//! Access-token boundary.

/// Supplies the current access token on demand.
///
/// Implemented by the host application over its secure token storage. The
/// connection layer polls this repeatedly during a connect attempt, so
/// implementations must tolerate being called in a short loop and may return
/// `None` while storage is still warming up.
pub trait TokenSource: Send + Sync + 'static {
    fn access_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}
