use std::fmt;
use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::warn;

/// Drawable size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceDimensions {
    pub width: u32,
    pub height: u32,
}

impl SurfaceDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimised windows report a zero-sized surface.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for SurfaceDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to create OpenGL context: {0}")]
    Create(String),
    #[error("failed to make OpenGL context current: {0}")]
    MakeCurrent(String),
    #[error("failed to release OpenGL context: {0}")]
    Release(String),
    #[error("failed to present frame: {0}")]
    Present(String),
    #[error("OpenGL context was lost")]
    Lost,
}

/// Owner of a graphics context and the window surface it draws into.
///
/// Engine calls are only valid between [`make_current`](Self::make_current)
/// and [`release_current`](Self::release_current); use [`with_current`] so
/// the release happens on every exit path.
pub trait RenderSurface {
    fn dimensions(&self) -> SurfaceDimensions;
    fn is_current(&self) -> bool;
    fn make_current(&mut self) -> Result<(), ContextError>;
    fn release_current(&mut self) -> Result<(), ContextError>;
    /// Swaps the back buffer. Requires the context to be current.
    fn present(&mut self) -> Result<(), ContextError>;
    /// Records the new drawable size; the backing surface follows no later
    /// than the next time the context is made current.
    fn resize(&mut self, dimensions: SurfaceDimensions);
}

/// Borrow of a surface whose context is current; releases it when dropped.
pub struct CurrentGuard<'a, S: RenderSurface + ?Sized> {
    surface: &'a mut S,
}

impl<'a, S: RenderSurface + ?Sized> CurrentGuard<'a, S> {
    pub fn acquire(surface: &'a mut S) -> Result<Self, ContextError> {
        surface.make_current()?;
        Ok(Self { surface })
    }
}

impl<S: RenderSurface + ?Sized> Deref for CurrentGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.surface
    }
}

impl<S: RenderSurface + ?Sized> DerefMut for CurrentGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.surface
    }
}

impl<S: RenderSurface + ?Sized> Drop for CurrentGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.surface.release_current() {
            warn!(error = %err, "failed to release OpenGL context");
        }
    }
}

/// Runs `work` with the surface's context current, releasing it afterwards
/// even when `work` returns early or unwinds.
pub fn with_current<S, T, F>(surface: &mut S, work: F) -> Result<T, ContextError>
where
    S: RenderSurface + ?Sized,
    F: FnOnce(&mut S) -> T,
{
    let mut guard = CurrentGuard::acquire(surface)?;
    Ok(work(&mut *guard))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    /// Ordered log shared between fake surfaces and fake engines.
    pub(crate) type CallLog = Rc<RefCell<Vec<String>>>;

    /// In-memory surface that records every call and tracks currency.
    #[derive(Debug)]
    pub(crate) struct FakeSurface {
        pub dimensions: SurfaceDimensions,
        pub current: Rc<RefCell<bool>>,
        pub log: CallLog,
        pub fail_make_current: bool,
        pub fail_present: bool,
    }

    impl FakeSurface {
        pub(crate) fn new(width: u32, height: u32, log: CallLog) -> Self {
            Self {
                dimensions: SurfaceDimensions::new(width, height),
                current: Rc::new(RefCell::new(false)),
                log,
                fail_make_current: false,
                fail_present: false,
            }
        }
    }

    impl RenderSurface for FakeSurface {
        fn dimensions(&self) -> SurfaceDimensions {
            self.dimensions
        }

        fn is_current(&self) -> bool {
            *self.current.borrow()
        }

        fn make_current(&mut self) -> Result<(), ContextError> {
            if self.fail_make_current {
                return Err(ContextError::MakeCurrent("fake failure".into()));
            }
            *self.current.borrow_mut() = true;
            self.log.borrow_mut().push("surface.make_current".into());
            Ok(())
        }

        fn release_current(&mut self) -> Result<(), ContextError> {
            *self.current.borrow_mut() = false;
            self.log.borrow_mut().push("surface.release".into());
            Ok(())
        }

        fn present(&mut self) -> Result<(), ContextError> {
            assert!(self.is_current(), "present without a current context");
            if self.fail_present {
                return Err(ContextError::Present("fake failure".into()));
            }
            self.log.borrow_mut().push("surface.present".into());
            Ok(())
        }

        fn resize(&mut self, dimensions: SurfaceDimensions) {
            self.dimensions = dimensions;
            self.log
                .borrow_mut()
                .push(format!("surface.resize {dimensions}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{CallLog, FakeSurface};
    use super::*;

    #[test]
    fn with_current_releases_after_work() {
        let log = CallLog::default();
        let mut surface = FakeSurface::new(4, 4, log.clone());
        let value = with_current(&mut surface, |s| {
            assert!(s.is_current());
            7
        })
        .unwrap();
        assert_eq!(value, 7);
        assert!(!surface.is_current());
        assert_eq!(
            *log.borrow(),
            vec!["surface.make_current", "surface.release"]
        );
    }

    #[test]
    fn with_current_releases_when_work_fails() {
        let mut surface = FakeSurface::new(4, 4, CallLog::default());
        let result: Result<Result<(), String>, _> =
            with_current(&mut surface, |_| Err("boom".to_string()));
        assert!(result.unwrap().is_err());
        assert!(!surface.is_current());
    }

    #[test]
    fn with_current_releases_on_panic() {
        let mut surface = FakeSurface::new(4, 4, CallLog::default());
        let current = surface.current.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = with_current(&mut surface, |_| panic!("render blew up"));
        }));
        assert!(outcome.is_err());
        assert!(!*current.borrow());
    }

    #[test]
    fn failed_acquire_skips_work() {
        let mut surface = FakeSurface::new(4, 4, CallLog::default());
        surface.fail_make_current = true;
        let mut ran = false;
        let result = with_current(&mut surface, |_| ran = true);
        assert!(matches!(result, Err(ContextError::MakeCurrent(_))));
        assert!(!ran);
    }

    #[test]
    fn zero_sized_dimensions_are_empty() {
        assert!(SurfaceDimensions::new(0, 600).is_empty());
        assert!(SurfaceDimensions::new(800, 0).is_empty());
        assert!(!SurfaceDimensions::new(1, 1).is_empty());
        assert_eq!(SurfaceDimensions::new(800, 600).to_string(), "800x600");
    }
}
