//! Build lifecycle notifications.
//!
//! Subscribers receive a "started" event once per build before any work,
//! and an "ended" event once with the final outcome. Intermediate shader
//! passes that succeed are not announced.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::outcome::BuildOutcome;
use crate::request::BuildRequest;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BuildEvent {
  Started { request: BuildRequest },
  Ended { request: BuildRequest, outcome: BuildOutcome },
}

impl BuildEvent {
  pub fn request(&self) -> &BuildRequest {
    match self {
      Self::Started { request } | Self::Ended { request, .. } => request,
    }
  }
}

/// Multicast channel of [`BuildEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
  sender: broadcast::Sender<BuildEvent>,
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}

impl EventBus {
  pub fn new() -> Self {
    let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<BuildEvent> {
    self.sender.subscribe()
  }

  pub fn build_started(&self, request: &BuildRequest) {
    self.publish(BuildEvent::Started {
      request: request.clone(),
    });
  }

  pub fn build_ended(&self, request: &BuildRequest, outcome: BuildOutcome) {
    self.publish(BuildEvent::Ended {
      request: request.clone(),
      outcome,
    });
  }

  fn publish(&self, event: BuildEvent) {
    // No subscribers is fine.
    if self.sender.send(event).is_err() {
      debug!("build event dropped, no subscribers");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::outcome::BuildError;
  use crate::platform::{Platform, PlatformSettings};
  use crate::request::BuildKind;

  fn request() -> BuildRequest {
    BuildRequest::new(
      BuildKind::Package,
      PlatformSettings::for_platform(Platform::Psp),
      "src",
      "tmp",
      "out",
      "game",
    )
  }

  #[tokio::test]
  async fn every_subscriber_sees_every_event() {
    let bus = EventBus::new();
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();

    bus.build_started(&request());
    bus.build_ended(&request(), Err(BuildError::CookFailed));

    for rx in [&mut first, &mut second] {
      assert!(matches!(rx.recv().await.unwrap(), BuildEvent::Started { .. }));
      match rx.recv().await.unwrap() {
        BuildEvent::Ended { outcome, .. } => assert_eq!(outcome, Err(BuildError::CookFailed)),
        other => panic!("unexpected event {other:?}"),
      }
    }
  }

  #[test]
  fn publishing_without_subscribers_does_not_fail() {
    let bus = EventBus::new();
    bus.build_started(&request());
  }
}
