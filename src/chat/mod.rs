//! The chat components.
//!
//! [`gate::SessionGate`] picks the view from the authentication state,
//! [`form::CredentialForm`] signs users up or in, and
//! [`feed::LiveFeedController`] mirrors the `messages` collection and issues
//! writes. [`client::ChatClient`] wires the three together.
//!
//! Components never share state directly. Each one owns the channel its
//! subscriptions deliver into and applies those events itself.

pub mod avatar;
pub mod client;
pub mod feed;
pub mod form;
pub mod gate;
pub mod models;

#[cfg(test)]
mod fakes;

use crate::auth::AuthError;
use crate::firestore::FirestoreError;
use std::future::Future;
use thiserror::Error;
use tokio::task::JoinHandle;

pub const MESSAGES_COLLECTION: &str = "messages";
pub const USERS_COLLECTION: &str = "users";

/// Errors surfaced to the user by the credential form.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The identity provider rejected the request. Displays the provider's message.
    #[error("{0}")]
    Auth(#[from] AuthError),
    /// Signed in, but the profile document could not be written.
    #[error("Could not save user profile: {0}")]
    Profile(#[from] FirestoreError),
}

/// Runs `task` on the current runtime, or logs and skips it when there is none.
pub(crate) fn spawn_detached<F>(what: &'static str, task: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn(task)),
        Err(e) => {
            tracing::error!(task = what, error = %e, "no tokio runtime");
            None
        }
    }
}
