use log::{debug, warn};

use super::client::{Backend, BackendError};

/// Where the page keeps its bearer credential between navigations.
pub trait CredentialStore {
    fn get(&self) -> Option<String>;
    fn set(&mut self, credential: &str);
    fn clear(&mut self);
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Option<String>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.credential.clone()
    }

    fn set(&mut self, credential: &str) {
        self.credential = Some(credential.to_owned());
    }

    fn clear(&mut self) {
        self.credential = None;
    }
}

/// What a protected page should do after the credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Render,
    RedirectToLanding,
    RedirectToSignIn,
}

/// Gate in front of every protected page. Each check revalidates against
/// the backend; nothing is cached between checks.
pub struct SessionGuard<S> {
    backend: Backend,
    store: S,
}

impl<S: CredentialStore> SessionGuard<S> {
    pub fn new(backend: Backend, store: S) -> Self {
        Self { backend, store }
    }

    pub fn store(&mut self) -> &mut S {
        &mut self.store
    }

    /// Validate the stored credential and decide whether the page renders.
    ///
    /// Missing credential: redirect to the landing page without a backend
    /// call. Rejected credential: clear the store and redirect to sign-in.
    /// Transport failure: redirect to sign-in with the credential kept, so
    /// a later navigation can retry.
    pub async fn check(&mut self) -> Gate {
        let Some(credential) = self.store.get() else {
            return Gate::RedirectToLanding;
        };

        match self.backend.check_auth(&credential).await {
            Ok(()) => Gate::Render,
            Err(BackendError::Transport(e)) => {
                warn!("Could not reach the backend to validate the session: {e}");
                Gate::RedirectToSignIn
            }
            Err(e) => {
                debug!("Credential rejected, clearing it: {e}");
                self.store.clear();
                Gate::RedirectToSignIn
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credential_redirects_to_landing_without_a_backend_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/checkauth")
            .expect(0)
            .create_async()
            .await;

        let backend = Backend::unauthenticated(&server.url());
        let mut guard = SessionGuard::new(backend, MemoryCredentialStore::default());

        assert_eq!(guard.check().await, Gate::RedirectToLanding);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_credential_is_cleared_and_redirects_to_sign_in() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/checkauth")
            .match_header("authorization", "Bearer stale")
            .with_status(401)
            .create_async()
            .await;

        let backend = Backend::unauthenticated(&server.url());
        let mut store = MemoryCredentialStore::default();
        store.set("stale");
        let mut guard = SessionGuard::new(backend, store);

        assert_eq!(guard.check().await, Gate::RedirectToSignIn);
        assert!(guard.store().get().is_none());
    }

    #[tokio::test]
    async fn valid_credential_renders() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/checkauth")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .create_async()
            .await;

        let backend = Backend::unauthenticated(&server.url());
        let mut store = MemoryCredentialStore::default();
        store.set("fresh");
        let mut guard = SessionGuard::new(backend, store);

        assert_eq!(guard.check().await, Gate::Render);
        assert_eq!(guard.store().get().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn every_check_revalidates() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/checkauth")
            .with_status(200)
            .expect(2)
            .create_async()
            .await;

        let backend = Backend::unauthenticated(&server.url());
        let mut store = MemoryCredentialStore::default();
        store.set("fresh");
        let mut guard = SessionGuard::new(backend, store);

        assert_eq!(guard.check().await, Gate::Render);
        assert_eq!(guard.check().await, Gate::Render);
        mock.assert_async().await;
    }
}
