//! Typed single-consumer channel carrying authorization lifecycle events.
//!
//! Strategies and executors hold a [`NotificationSender`] handed to them at construction;
//! the orchestrator that created the channel owns the matching [`NotificationReceiver`]
//! and applies the events between vendor calls.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
// self
use crate::{_prelude::*, auth::Secret};

/// Token values announced with [`Notification::TokenUpdate`].
#[derive(Clone, Debug, PartialEq)]
pub struct TokenUpdate {
	/// Newly issued access token.
	pub access_token: Secret,
	/// Refresh token in force after the update.
	pub refresh_token: Option<Secret>,
	/// Access-token expiry derived from `expires_in`, when the provider sent one.
	pub access_token_expires_at: Option<OffsetDateTime>,
}

/// Authorization lifecycle event.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
	/// The live API rejected the held credential and no refresh recovered it.
	InvalidAuth,
	/// The strategy obtained new tokens.
	TokenUpdate(TokenUpdate),
	/// The held tokens were revoked.
	TokenDeauthorized,
}
impl Notification {
	/// Returns the wire tag for logs.
	pub const fn tag(&self) -> &'static str {
		match self {
			Self::InvalidAuth => "INVALID_AUTH",
			Self::TokenUpdate(_) => "TOKEN_UPDATE",
			Self::TokenDeauthorized => "TOKEN_DEAUTHORIZED",
		}
	}
}

/// Creates a connected sender/receiver pair.
pub fn channel() -> (NotificationSender, NotificationReceiver) {
	let (tx, rx) = mpsc::unbounded_channel();

	(NotificationSender(Some(tx)), NotificationReceiver(rx))
}

/// Cloneable emitting half of the notification channel.
#[derive(Clone, Debug, Default)]
pub struct NotificationSender(Option<UnboundedSender<Notification>>);
impl NotificationSender {
	/// Returns a sender that drops every event; used by callers with no lifecycle owner.
	pub fn detached() -> Self {
		Self(None)
	}

	/// Emits an event; a dropped receiver is not an error.
	pub fn emit(&self, notification: Notification) {
		tracing::debug!(notification = notification.tag(), "Emitting notification.");

		if let Some(tx) = &self.0
			&& tx.send(notification).is_err()
		{
			tracing::debug!("Notification receiver is gone; event dropped.");
		}
	}
}

/// Consuming half of the notification channel.
#[derive(Debug)]
pub struct NotificationReceiver(UnboundedReceiver<Notification>);
impl NotificationReceiver {
	/// Returns the next queued event without waiting.
	pub fn try_next(&mut self) -> Option<Notification> {
		match self.0.try_recv() {
			Ok(notification) => Some(notification),
			Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
		}
	}

	/// Removes and returns every queued event in emission order.
	pub fn drain(&mut self) -> Vec<Notification> {
		std::iter::from_fn(|| self.try_next()).collect()
	}

	/// Waits for the next event; resolves to `None` once every sender is dropped.
	pub async fn recv(&mut self) -> Option<Notification> {
		self.0.recv().await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_arrive_in_order() {
		let (tx, mut rx) = channel();

		tx.emit(Notification::InvalidAuth);
		tx.clone().emit(Notification::TokenDeauthorized);

		assert_eq!(rx.drain(), vec![Notification::InvalidAuth, Notification::TokenDeauthorized]);
		assert_eq!(rx.try_next(), None);
	}

	#[test]
	fn detached_sender_drops_silently() {
		NotificationSender::detached().emit(Notification::InvalidAuth);

		let (tx, rx) = channel();

		drop(rx);
		tx.emit(Notification::InvalidAuth);
	}
}
