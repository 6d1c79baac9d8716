//! Navigation hook invoked when the session cannot be recovered

/// Sends the user to another location, typically the sign-in entry point
pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Default navigator: records the redirect in the log and does nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, location: &str) {
        tracing::warn!(location, "session expired; sign-in required");
    }
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, location: &str) {
        self(location);
    }
}
