//! Event handler type and conversions.
//!
//! Handlers are stored type-erased as [`EventHandler`]: an `Arc`'d closure
//! returning a boxed future. User code rarely builds one by hand; anything
//! implementing [`IntoEventHandler`] can be passed to a registration method:
//!
//! - async functions and closures taking `(BoxedClient, Arc<Message>,
//!   CancellationToken)` and returning `anyhow::Result<()>`
//! - [`answer`] for a fixed text reply
//! - [`answer_one_of`] for a uniformly chosen reply from a fixed set
//!
//! ```rust,ignore
//! use amalgam_core::{BoxedClient, Message, answer};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn echo(client: BoxedClient, message: Arc<Message>, _: CancellationToken) -> anyhow::Result<()> {
//!     client.send_text(message.peer_id, &message.text, rand::random()).await?;
//!     Ok(())
//! }
//!
//! commands.on_text("^echo", echo)?;
//! commands.on_text("^ping$", answer("pong"))?;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::client::BoxedClient;
use crate::error::{RegistrationError, RegistrationResult};
use crate::event::Message;

/// A stored event handler.
pub type EventHandler = Arc<
    dyn Fn(BoxedClient, Arc<Message>, CancellationToken) -> BoxFuture<'static, anyhow::Result<()>>
        + Send
        + Sync,
>;

/// Conversion into an [`EventHandler`], validated at registration time.
///
/// The `M` parameter disambiguates the closure impl from the shorthand
/// impls; it is always inferred.
pub trait IntoEventHandler<M = ()> {
    /// Performs the conversion.
    fn into_event_handler(self) -> RegistrationResult<EventHandler>;
}

/// Marker selecting the closure impl of [`IntoEventHandler`].
pub struct FnMarker(());

impl<F, Fut> IntoEventHandler<FnMarker> for F
where
    F: Fn(BoxedClient, Arc<Message>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn into_event_handler(self) -> RegistrationResult<EventHandler> {
        Ok(Arc::new(move |client, message, token| {
            self(client, message, token).boxed()
        }))
    }
}

/// Prebuilt handlers pass through unchanged.
impl IntoEventHandler for EventHandler {
    fn into_event_handler(self) -> RegistrationResult<EventHandler> {
        Ok(self)
    }
}

// ============================================================================
// Answer shorthands
// ============================================================================

/// Replies to the triggering peer with a fixed text.
///
/// The text is validated once, at registration.
pub fn answer(text: impl Into<String>) -> Answer {
    Answer { text: text.into() }
}

/// Replies to the triggering peer with a uniformly chosen variant.
///
/// The set is validated once, at registration: it must be non-empty and no
/// variant may be blank.
pub fn answer_one_of<I, S>(variants: I) -> OneOf
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    OneOf {
        variants: variants.into_iter().map(Into::into).collect(),
    }
}

/// Fixed-text reply built by [`answer`].
pub struct Answer {
    text: String,
}

impl IntoEventHandler for Answer {
    fn into_event_handler(self) -> RegistrationResult<EventHandler> {
        if self.text.trim().is_empty() {
            return Err(RegistrationError::BlankAnswer);
        }
        let text = Arc::new(self.text);
        Ok(Arc::new(move |client, message, _token| {
            let text = Arc::clone(&text);
            async move {
                client
                    .send_text(message.peer_id, &text, rand::random())
                    .await?;
                Ok(())
            }
            .boxed()
        }))
    }
}

/// Random-pick reply built by [`answer_one_of`].
pub struct OneOf {
    variants: Vec<String>,
}

impl IntoEventHandler for OneOf {
    fn into_event_handler(self) -> RegistrationResult<EventHandler> {
        if self.variants.is_empty() {
            return Err(RegistrationError::EmptyAnswerSet);
        }
        if self.variants.iter().any(|v| v.trim().is_empty()) {
            return Err(RegistrationError::BlankAnswer);
        }
        let variants = Arc::new(self.variants);
        Ok(Arc::new(move |client, message, _token| {
            let variants = Arc::clone(&variants);
            async move {
                let pick = rand::rng().random_range(0..variants.len());
                client
                    .send_text(message.peer_id, &variants[pick], rand::random())
                    .await?;
                Ok(())
            }
            .boxed()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_answers_rejected() {
        assert!(matches!(
            answer("").into_event_handler(),
            Err(RegistrationError::BlankAnswer)
        ));
        assert!(matches!(
            answer("   ").into_event_handler(),
            Err(RegistrationError::BlankAnswer)
        ));
        assert!(answer("pong").into_event_handler().is_ok());
    }

    #[test]
    fn test_answer_sets_validated() {
        assert!(matches!(
            answer_one_of(Vec::<String>::new()).into_event_handler(),
            Err(RegistrationError::EmptyAnswerSet)
        ));
        assert!(matches!(
            answer_one_of(["heads", " "]).into_event_handler(),
            Err(RegistrationError::BlankAnswer)
        ));
        assert!(answer_one_of(["heads", "tails"]).into_event_handler().is_ok());
    }
}
