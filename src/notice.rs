use tokio::sync::mpsc;

/// How prominently a notice should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Info,
  Success,
  Warning,
  Error,
}

/// A user-visible message produced by the sync layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
}

/// Sending half of the notice channel.
///
/// Sends never fail: if the UI has dropped its receiver the notice is simply lost.
#[derive(Debug, Clone)]
pub struct Notifier {
  tx: mpsc::UnboundedSender<Notice>,
}

/// Create a notice channel. The receiver belongs to whatever renders notices.
pub fn channel() -> (Notifier, mpsc::UnboundedReceiver<Notice>) {
  let (tx, rx) = mpsc::unbounded_channel();
  (Notifier { tx }, rx)
}

impl Notifier {
  fn send(&self, level: NoticeLevel, message: impl Into<String>) {
    let _ = self.tx.send(Notice {
      level,
      message: message.into(),
    });
  }

  pub fn info(&self, message: impl Into<String>) {
    self.send(NoticeLevel::Info, message);
  }

  pub fn success(&self, message: impl Into<String>) {
    self.send(NoticeLevel::Success, message);
  }

  pub fn warning(&self, message: impl Into<String>) {
    self.send(NoticeLevel::Warning, message);
  }

  pub fn error(&self, message: impl Into<String>) {
    self.send(NoticeLevel::Error, message);
  }
}

/// Drain everything currently queued.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
  let mut notices = Vec::new();
  while let Ok(notice) = rx.try_recv() {
    notices.push(notice);
  }
  notices
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_notices_arrive_in_order() {
    let (notifier, mut rx) = channel();
    notifier.success("added");
    notifier.error("failed");

    let notices = drain(&mut rx);
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[1].message, "failed");
  }

  #[test]
  fn test_send_after_receiver_dropped_is_silent() {
    let (notifier, rx) = channel();
    drop(rx);
    notifier.info("nobody listening");
  }
}
