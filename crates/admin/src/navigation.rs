//! Navigation intents handed up to the rendering shell.
//!
//! Components never route themselves. They emit an intent and the shell
//! decides how to get there.

use std::sync::Arc;

/// Where the shell should go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationIntent {
    /// The sign-in surface.
    GoToLogin,
    /// The product list.
    GoToDashboard,
}

impl NavigationIntent {
    /// Route path the browser shell maps this intent to.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::GoToLogin => "/login",
            Self::GoToDashboard => "/dashboard",
        }
    }
}

/// Receiver of navigation intents, implemented by the shell.
///
/// Called synchronously from whatever task observed the transition; an
/// implementation must not block.
pub trait Navigator: Send + Sync {
    /// Perform the navigation.
    fn navigate(&self, intent: NavigationIntent);
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn navigate(&self, intent: NavigationIntent) {
        (**self).navigate(intent);
    }
}
