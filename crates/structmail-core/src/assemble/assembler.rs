//! Background message assembly with cancellation and authorization.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, Utc};
use sha2::{Digest, Sha256};
use structmail_mime::encoding::encode_rfc2047;
use structmail_mime::{ContentType, Headers, Message, Part, TransferEncoding};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BuildError, ComposedMessageBuilder, MessageFormat};

/// Identifies a build waiting for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuthorizationToken(u64);

impl fmt::Display for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decision of a [`BuildAuthorizer`] for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Build may proceed.
    NotRequired,
    /// The user must approve first; `request_code` identifies the prompt.
    Required {
        /// Caller-defined request code.
        request_code: u32,
    },
    /// The build may never proceed.
    Rejected(String),
}

/// Answer to a pending authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationResult {
    /// Continue the build.
    Granted,
    /// Abandon the build.
    Denied,
}

/// Hook consulted before a message is assembled (e.g. for signing keys).
#[async_trait]
pub trait BuildAuthorizer: Send + Sync {
    /// Decides whether the build needs user approval.
    async fn authorize(&self, builder: &ComposedMessageBuilder) -> Authorization;
}

/// Final state of a build.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The message is ready.
    Success {
        /// The assembled message.
        message: Message,
        /// Whether the builder was marked as draft.
        is_draft: bool,
    },
    /// The build was cancelled or authorization was denied.
    Cancelled,
    /// The build failed.
    Failed(BuildError),
    /// The build is suspended until [`MessageAssembler::resume`] is called.
    PendingAuthorization {
        /// Token to pass to `resume`.
        token: AuthorizationToken,
        /// Request code from the authorizer.
        request_code: u32,
    },
}

/// Handle to a build running on a background task.
#[derive(Debug)]
pub struct BuildHandle {
    task: JoinHandle<BuildOutcome>,
}

impl BuildHandle {
    /// Aborts the build; awaiting the outcome then yields `Cancelled`.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Returns `true` once the build task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the build to finish.
    pub async fn outcome(self) -> BuildOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => BuildOutcome::Cancelled,
            Err(e) => BuildOutcome::Failed(BuildError::Task(e.to_string())),
        }
    }
}

/// Builds kept waiting for authorization; older ones are dropped beyond this.
const MAX_PENDING_BUILDS: usize = 32;

type PendingBuilds = Arc<Mutex<HashMap<AuthorizationToken, ComposedMessageBuilder>>>;

/// Finalizes composed builders into MIME messages.
///
/// Boundaries come from a per-instance counter, so an assembler is meant
/// to be driven by a single owner.
#[derive(Default)]
pub struct MessageAssembler {
    boundary_counter: u64,
    next_token: u64,
    authorizer: Option<Arc<dyn BuildAuthorizer>>,
    pending: PendingBuilds,
}

impl fmt::Debug for MessageAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageAssembler")
            .field("boundary_counter", &self.boundary_counter)
            .field("has_authorizer", &self.authorizer.is_some())
            .finish_non_exhaustive()
    }
}

impl MessageAssembler {
    /// Creates an assembler without authorization hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consults `authorizer` before every build.
    #[must_use]
    pub fn with_authorizer(mut self, authorizer: Arc<dyn BuildAuthorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Returns a fresh multipart boundary.
    pub fn next_boundary(&mut self) -> String {
        let n = self.boundary_counter;
        self.boundary_counter += 1;
        format!("----=_Part_{n}_{}", Utc::now().timestamp_millis())
    }

    /// Starts assembling `builder` on a background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build_async(&mut self, builder: ComposedMessageBuilder) -> BuildHandle {
        let boundary = self.next_boundary();
        let token = AuthorizationToken(self.next_token);
        self.next_token += 1;

        let authorizer = self.authorizer.clone();
        let pending = Arc::clone(&self.pending);

        let task = tokio::spawn(async move {
            if let Some(authorizer) = authorizer {
                match authorizer.authorize(&builder).await {
                    Authorization::NotRequired => {}
                    Authorization::Required { request_code } => {
                        tracing::debug!("Build {} waits for authorization", token);
                        let mut pending = pending.lock().await;
                        if pending.len() >= MAX_PENDING_BUILDS {
                            if let Some(oldest) = pending.keys().min().copied() {
                                tracing::warn!("Dropping build {} never resumed", oldest);
                                pending.remove(&oldest);
                            }
                        }
                        pending.insert(token, builder);
                        return BuildOutcome::PendingAuthorization {
                            token,
                            request_code,
                        };
                    }
                    Authorization::Rejected(reason) => {
                        return BuildOutcome::Failed(BuildError::Authorization(reason));
                    }
                }
            }
            finish(&builder, &boundary)
        });

        BuildHandle { task }
    }

    /// Continues or abandons a build suspended for authorization.
    pub async fn resume(
        &mut self,
        token: AuthorizationToken,
        result: AuthorizationResult,
    ) -> BuildHandle {
        let builder = self.pending.lock().await.remove(&token);
        let boundary = self.next_boundary();

        let task = tokio::spawn(async move {
            match (builder, result) {
                (None, _) => BuildOutcome::Failed(BuildError::UnknownToken(token)),
                (Some(_), AuthorizationResult::Denied) => BuildOutcome::Cancelled,
                (Some(builder), AuthorizationResult::Granted) => finish(&builder, &boundary),
            }
        });

        BuildHandle { task }
    }

    /// Forgets a build waiting for authorization without resuming it.
    ///
    /// Returns `false` if `token` was not pending.
    pub async fn discard(&self, token: AuthorizationToken) -> bool {
        self.pending.lock().await.remove(&token).is_some()
    }

    /// Number of builds waiting for authorization.
    pub async fn pending_builds(&self) -> usize {
        self.pending.lock().await.len()
    }
}

fn finish(builder: &ComposedMessageBuilder, boundary: &str) -> BuildOutcome {
    match assemble_message(builder, boundary) {
        Ok(message) => BuildOutcome::Success {
            message,
            is_draft: builder.is_draft,
        },
        Err(e) => BuildOutcome::Failed(e),
    }
}

/// Formats a `Date` header value (RFC 2822).
///
/// With `hide_timezone` the time is converted to UTC and written with a
/// `+0000` offset.
#[must_use]
pub fn format_date(date: DateTime<FixedOffset>, hide_timezone: bool) -> String {
    if hide_timezone {
        date.with_timezone(&Utc)
            .format("%a, %-d %b %Y %H:%M:%S +0000")
            .to_string()
    } else {
        date.to_rfc2822()
    }
}

/// Assembles a message synchronously using `boundary` for multiparts.
///
/// Produces a single `text/plain` part when there is neither HTML nor an
/// alternate part, and `multipart/alternative` (plain, HTML, alternate)
/// otherwise.
///
/// # Errors
///
/// Returns [`BuildError::MissingIdentity`] if no sender identity is set and
/// [`BuildError::HeaderValue`] if a header value contains CR or LF.
pub fn assemble_message(
    builder: &ComposedMessageBuilder,
    boundary: &str,
) -> Result<Message, BuildError> {
    let identity = builder
        .identity
        .as_ref()
        .ok_or(BuildError::MissingIdentity)?;
    let date = builder
        .sent_date
        .unwrap_or_else(|| Local::now().fixed_offset());

    let mut headers = Headers::new();
    headers.add("Date", format_date(date, builder.hide_timezone));
    headers.add("From", identity.mailbox());
    if !builder.to.is_empty() {
        headers.add("To", builder.to.join(", "));
    }
    if !builder.cc.is_empty() {
        headers.add("Cc", builder.cc.join(", "));
    }
    if !builder.reply_to.is_empty() {
        headers.add("Reply-To", builder.reply_to.join(", "));
    }
    headers.add("Subject", encode_rfc2047(&builder.subject, "utf-8"));
    headers.add(
        "Message-ID",
        message_id(&identity.email, identity.domain(), date, boundary),
    );
    headers.add("MIME-Version", "1.0");
    if let Some((name, _)) = headers.iter().find(|(_, v)| v.contains(['\r', '\n'])) {
        return Err(BuildError::HeaderValue(name.to_string()));
    }

    let plain = Part::text(
        &ContentType::text_plain(),
        TransferEncoding::QuotedPrintable,
        &builder.plain_text,
    );
    let html = match builder.format {
        MessageFormat::Html => builder.html_text.as_deref(),
        MessageFormat::Text => None,
    };

    if html.is_none() && builder.alternate_part.is_none() {
        for (name, value) in plain.headers.iter() {
            headers.add(name, value);
        }
        return Ok(Message::single_part(headers, plain.body));
    }

    headers.add(
        "Content-Type",
        ContentType::multipart_alternative(boundary).to_string(),
    );

    let mut parts = vec![plain];
    if let Some(html) = html {
        parts.push(Part::text(
            &ContentType::text_html(),
            TransferEncoding::QuotedPrintable,
            html,
        ));
    }
    if let Some(alternate) = &builder.alternate_part {
        parts.push(alternate.clone());
    }

    Ok(Message::multipart(headers, parts))
}

fn message_id(
    email: &str,
    domain: Option<&str>,
    date: DateTime<FixedOffset>,
    boundary: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(date.to_rfc3339().as_bytes());
    hasher.update(boundary.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("<{}@{}>", &digest[..24], domain.unwrap_or("localhost"))
}
