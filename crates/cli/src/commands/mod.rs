//! Command implementations.
//!
//! Each run opens an [`AdminSession`]: sign in, mount the session guard,
//! load the product cache. Commands then act through the admin library.

pub mod products;

use std::sync::Arc;

use tracing::info;

use shelfdesk_admin::AdminConfig;
use shelfdesk_admin::auth::{LoginForm, MountedSession, SessionGuard};
use shelfdesk_admin::catalog::ProductStore;
use shelfdesk_admin::navigation::{NavigationIntent, Navigator};
use shelfdesk_admin::remote::{RestAuth, RestTableStore, http_client};

use crate::error::CliError;

/// Navigator for a headless shell: there is nothing to route, so intents are
/// only logged.
struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, intent: NavigationIntent) {
        info!(path = intent.path(), "Navigation requested");
    }
}

/// A signed-in admin with a loaded product cache.
pub struct AdminSession {
    guard: SessionGuard<RestAuth>,
    mounted: MountedSession,
    store: ProductStore<RestTableStore>,
}

impl AdminSession {
    /// Sign in with the configured credentials and load the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CliError` if credentials are missing or rejected, or if the
    /// catalog cannot be loaded.
    pub async fn open(config: &AdminConfig) -> Result<Self, CliError> {
        let email = config
            .admin_email
            .clone()
            .ok_or(CliError::MissingEnvVar("SHELFDESK_ADMIN_EMAIL"))?;
        let password = config
            .admin_password
            .clone()
            .ok_or(CliError::MissingEnvVar("SHELFDESK_ADMIN_PASSWORD"))?;

        let auth = RestAuth::new(http_client(config)?, config);

        let mut login = LoginForm::new(Arc::new(auth.clone()));
        login.set_email(email);
        login.set_password(password);
        login.submit(&LogNavigator).await?;

        let guard = SessionGuard::new(Arc::new(auth.clone()));
        let mounted = guard.mount(LogNavigator).await;
        if !mounted.is_authenticated() {
            return Err(CliError::NoSession);
        }

        let store = ProductStore::new(
            Arc::new(RestTableStore::new(auth)),
            config.products_table.as_str(),
            config.delete_policy,
        );
        store.load_all().await?;

        Ok(Self {
            guard,
            mounted,
            store,
        })
    }

    /// The loaded product cache.
    pub const fn store(&self) -> &ProductStore<RestTableStore> {
        &self.store
    }

    /// Sign out and tear down.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Auth` if the backend refused the sign-out.
    pub async fn close(self) -> Result<(), CliError> {
        self.store.unmount();
        self.guard.sign_out().await?;
        self.mounted.unmount();
        Ok(())
    }
}
