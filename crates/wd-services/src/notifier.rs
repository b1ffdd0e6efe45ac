//! Delivery of account tokens to their owners
//!
//! Password reset and email verification tokens never travel back over the
//! API. They are handed to a [`Notifier`], which in a real deployment would
//! send mail.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use wd_core::WdResult;

/// What a notice is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    PasswordReset,
    EmailVerification,
}

/// A token addressed to an account's email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub email: String,
    pub recipient_name: String,
    pub token: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notice: &Notice) -> WdResult<()>;
}

/// Writes notices to the log. Tokens are only logged when `reveal_tokens` is
/// set, which the server does in development.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    reveal_tokens: bool,
}

impl LogNotifier {
    pub fn new(reveal_tokens: bool) -> Self {
        Self { reveal_tokens }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notice: &Notice) -> WdResult<()> {
        if self.reveal_tokens {
            tracing::debug!(
                kind = ?notice.kind,
                email = %notice.email,
                token = %notice.token,
                "Account notice issued"
            );
        } else {
            tracing::info!(kind = ?notice.kind, email = %notice.email, "Account notice issued");
        }
        Ok(())
    }
}

/// Keeps every notice in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().clone()
    }

    /// Most recent token of `kind` sent to `email`
    pub fn last_token(&self, kind: NoticeKind, email: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|n| n.kind == kind && n.email == email)
            .map(|n| n.token.clone())
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn deliver(&self, notice: &Notice) -> WdResult<()> {
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(kind: NoticeKind, token: &str) -> Notice {
        Notice {
            kind,
            email: "jane@example.com".into(),
            recipient_name: "Jane Doe".into(),
            token: token.into(),
        }
    }

    #[tokio::test]
    async fn test_memory_notifier_keeps_latest() {
        let notifier = MemoryNotifier::default();
        notifier.deliver(&notice(NoticeKind::PasswordReset, "first")).await.unwrap();
        notifier.deliver(&notice(NoticeKind::EmailVerification, "verify")).await.unwrap();
        notifier.deliver(&notice(NoticeKind::PasswordReset, "second")).await.unwrap();

        assert_eq!(notifier.sent().len(), 3);
        assert_eq!(
            notifier.last_token(NoticeKind::PasswordReset, "jane@example.com").as_deref(),
            Some("second")
        );
        assert!(notifier
            .last_token(NoticeKind::PasswordReset, "other@example.com")
            .is_none());
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier::new(false)
            .deliver(&notice(NoticeKind::EmailVerification, "t"))
            .await
            .is_ok());
    }
}
