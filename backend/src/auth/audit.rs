//! Append-only audit trail of authentication events.
//!
//! Entries are written as JSON lines to a file sink and mirrored to `tracing`.
//! Write failures are logged and never fail the request that produced them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::database::models::User;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    LoginSuccess,
    LoginFailure,
    AccountLocked,
    AccountUnlocked,
    Signup,
    Logout,
    PasswordResetRequest,
    PasswordResetSuccess,
    PasswordResetFailure,
    EmailVerification,
    TokenRefresh,
    SuspiciousActivity,
}

impl AuditEvent {
    fn is_alert(&self) -> bool {
        matches!(
            self,
            AuditEvent::LoginFailure
                | AuditEvent::AccountLocked
                | AuditEvent::PasswordResetFailure
                | AuditEvent::SuspiciousActivity
        )
    }
}

/// Caller details attached to every entry.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Reads the first `X-Forwarded-For` hop (or `X-Real-IP`) and `User-Agent`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip = header_value(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| header_value(headers, "x-real-ip").map(str::to_string));

        Self {
            ip,
            user_agent: header_value(headers, "user-agent").map(str::to_string),
        }
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub message: String,
}

impl AuditEntry {
    pub fn new(event: AuditEvent, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
            user_id: None,
            username: None,
            email: None,
            ip: None,
            user_agent: None,
            message: message.into(),
        }
    }

    pub fn user(mut self, user: &User) -> Self {
        self.user_id = Some(user.id.clone());
        self.username = Some(user.username.clone());
        self.email = Some(user.email.clone());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip = client.ip.clone();
        self.user_agent = client.user_agent.clone();
        self
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<()>;
}

/// JSON-lines file opened in append mode.
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to open audit log {}", path.display()))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// Collects entries in memory for assertions.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: std::sync::Mutex<Vec<AuditEntry>>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.entries().into_iter().map(|e| e.event).collect()
    }
}

#[cfg(test)]
#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("audit buffer poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}

/// Front door used by handlers.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let user = entry.user_id.as_deref().unwrap_or("-");
        let ip = entry.ip.as_deref().unwrap_or("-");
        if entry.event.is_alert() {
            tracing::warn!(event = ?entry.event, user, ip, "{}", entry.message);
        } else {
            tracing::info!(event = ?entry.event, user, ip, "{}", entry.message);
        }

        if let Err(e) = self.sink.append(&entry).await {
            tracing::error!("Failed to write audit entry: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_info_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.9.9.9"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));

        let info = ClientInfo::from_headers(&headers);
        assert_eq!(info.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));

        headers.remove("x-forwarded-for");
        assert_eq!(
            ClientInfo::from_headers(&headers).ip.as_deref(),
            Some("10.9.9.9")
        );
    }

    #[test]
    fn events_serialize_in_screaming_case() {
        let entry = AuditEntry::new(AuditEvent::PasswordResetRequest, "requested")
            .user_id("u1")
            .email("a@x.com");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"], "PASSWORD_RESET_REQUEST");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("ip").is_none());
    }

    #[tokio::test]
    async fn file_sink_appends_json_lines() {
        let path = std::env::temp_dir()
            .join(format!("audit-{}", uuid::Uuid::new_v4()))
            .join("audit.log");

        let logger = AuditLogger::new(Arc::new(FileAuditSink::open(&path).await.unwrap()));
        logger
            .record(AuditEntry::new(AuditEvent::Signup, "first"))
            .await;
        logger
            .record(AuditEntry::new(AuditEvent::Logout, "second"))
            .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let entries: Vec<AuditEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, AuditEvent::Signup);
        assert_eq!(entries[1].message, "second");

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
