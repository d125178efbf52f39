use std::sync::Arc;

/// Hook for whatever sits behind the confirmation dialog.
///
/// A front end suspends background scrolling here. The gate calls `suspend`
/// when it opens and `restore` on every way out, including being dropped
/// while open.
pub trait BackgroundLock: Send + Sync {
    fn suspend(&self);

    fn restore(&self);
}

/// For front ends with nothing to lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackground;

impl BackgroundLock for NoopBackground {
    fn suspend(&self) {}

    fn restore(&self) {}
}

/// Keeps the background suspended for as long as it lives.
pub struct SuspendGuard {
    lock: Arc<dyn BackgroundLock>,
}

impl SuspendGuard {
    pub fn new(lock: Arc<dyn BackgroundLock>) -> Self {
        lock.suspend();
        Self { lock }
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.lock.restore();
    }
}
