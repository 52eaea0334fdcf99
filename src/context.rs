//! Per-call attachment threaded explicitly through backup and archive calls.

use std::time::{Duration, Instant};

use crate::error::SqlLifecycleError;

/// Scratch state for one call chain: who asked, structured log fields, and an optional deadline.
///
/// Callers create one per request and pass it by `&mut`; collaborators may add fields or read
/// the user id without any type-erased lookup.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    user_id: Option<String>,
    request_id: Option<String>,
    fields: Vec<(String, String)>,
    deadline: Option<Instant>,
}

impl CallContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        self.fields.push(("request_id".into(), request_id.clone()));
        self.request_id = Some(request_id);
        self
    }

    /// Calls that have not started by `deadline` fail with `Cancelled`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    /// # Errors
    /// Returns `ContextValueNotSet("user_id")` when no non-empty user id was recorded.
    pub fn user_id(&self) -> Result<&str, SqlLifecycleError> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(SqlLifecycleError::ContextValueNotSet("user_id"))
    }

    /// # Errors
    /// Returns `ContextValueNotSet("request_id")` when the context was built without one.
    pub fn request_id(&self) -> Result<&str, SqlLifecycleError> {
        self.request_id
            .as_deref()
            .ok_or(SqlLifecycleError::ContextValueNotSet("request_id"))
    }

    /// Append a structured log field. Later fields with the same key do not replace earlier ones.
    pub fn push_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Fields rendered as `k=v k=v`, user id last when set.
    #[must_use]
    pub fn render_fields(&self) -> String {
        let mut parts: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if let Ok(user_id) = self.user_id() {
            parts.push(format!("user_id={user_id}"));
        }
        parts.join(" ")
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// # Errors
    /// Returns `Cancelled(op)` once the deadline has passed.
    pub fn ensure_live(&self, op: &'static str) -> Result<(), SqlLifecycleError> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SqlLifecycleError::Cancelled(op)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn user_id_not_set_is_a_typed_error() {
        let mut ctx = CallContext::new();
        let err = ctx.user_id().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextValueNotSet);

        ctx.set_user_id("");
        assert!(ctx.user_id().is_err());

        ctx.set_user_id("u-42");
        assert_eq!(ctx.user_id().ok(), Some("u-42"));
    }

    #[test]
    fn fields_keep_insertion_order() {
        let mut ctx = CallContext::new().with_request_id("r-1");
        ctx.push_field("path", "/backup");
        ctx.set_user_id("u-1");
        assert_eq!(ctx.render_fields(), "request_id=r-1 path=/backup user_id=u-1");
        assert_eq!(ctx.request_id().ok(), Some("r-1"));
    }

    #[test]
    fn expired_deadline_cancels() {
        let ctx = CallContext::new().with_deadline(Instant::now());
        let err = ctx.ensure_live("backup").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let live = CallContext::new().with_timeout(Duration::from_secs(60));
        assert!(live.ensure_live("backup").is_ok());
    }
}
