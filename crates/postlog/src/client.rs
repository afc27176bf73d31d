//! Postlog client implementation.

use crate::builders::{Call, IdentifyBuilder, TrackBuilder};
use crate::config::{Config, PostlogBuilder};
use crate::queue::{BuildQueue, Completion, CompletionContext};
use crate::session::Session;
use crate::transport::{HttpTransport, Transport};
use crate::types::Properties;
use crate::Error;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, instrument};

static SHARED: OnceLock<Postlog> = OnceLock::new();

/// Postlog analytics client.
///
/// Calls are non-blocking: they are queued, validated and sent in the
/// background, and their outcome is handed to a completion callback (or to
/// the future returned by `send`). Up to `max_concurrent_requests` requests
/// are in flight at once; the rest wait their turn.
///
/// # Example
///
/// ```rust,no_run
/// use postlog::Postlog;
///
/// #[tokio::main]
/// async fn main() -> Result<(), postlog::Error> {
///     let client = Postlog::new()?;
///     client.initialize("tok_xxx");
///
///     client.identify("usr_123", "my-app")
///         .property("plan", "pro")
///         .send()
///         .await?;
///
///     client.track("Signed up", "users", "my-app", "usr_123")
///         .icon("🎉")
///         .tag("source", "landing")
///         .send_with(|result| {
///             if let Err(e) = result {
///                 eprintln!("track failed: {e}");
///             }
///         });
///
///     Ok(())
/// }
/// ```
pub struct Postlog {
    config: Config,
    session: Arc<Session>,
    queue: BuildQueue,
    completions: CompletionContext,
}

impl Postlog {
    /// Create a new builder.
    pub fn builder() -> PostlogBuilder {
        PostlogBuilder::new()
    }

    /// Create a client with default settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self, Error> {
        PostlogBuilder::new().build()
    }

    /// The process-wide client, created with default settings on first use.
    ///
    /// The first call must happen within a tokio runtime that outlives
    /// every use of the shared client.
    pub fn shared() -> Result<&'static Postlog, Error> {
        if let Some(client) = SHARED.get() {
            return Ok(client);
        }
        let client = Postlog::new()?;
        Ok(SHARED.get_or_init(|| client))
    }

    /// Create a new client from config.
    pub(crate) fn from_builder(builder: PostlogBuilder) -> Result<Self, Error> {
        let config = builder.build_config()?;
        let handle = Handle::try_current().map_err(|_| {
            Error::Config("Postlog must be built inside a tokio runtime".into())
        })?;

        let transport: Arc<dyn Transport> = match builder.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let session = Arc::new(Session::new(builder.token, config.debug_logging()));
        let completions = CompletionContext::spawn(&handle);
        let queue = BuildQueue::spawn(
            &handle,
            &config,
            session.clone(),
            transport,
            completions.clone(),
        );

        debug!(api_host = %config.api_host(), "client created");

        Ok(Self {
            config,
            session,
            queue,
            completions,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ============================================
    // SESSION
    // ============================================

    /// Set the token used to authorize every request.
    ///
    /// Replaces any previous token. Calls already being built may still see
    /// the old one. No network I/O happens here.
    #[instrument(skip_all)]
    pub fn initialize(&self, token: impl Into<String>) {
        self.session.set_token(token.into());
        debug!("client initialized");
    }

    /// Like [`initialize`](Self::initialize), then schedule `completion` on
    /// the completion context.
    pub fn initialize_with(
        &self,
        token: impl Into<String>,
        completion: impl FnOnce(Result<(), Error>) + Send + 'static,
    ) {
        self.initialize(token);
        self.completions.deliver(Some(Box::new(completion)), Ok(()));
    }

    /// Whether a token has been set.
    pub fn is_initialized(&self) -> bool {
        self.session.token().is_some()
    }

    /// Enable or disable logging of failed calls.
    pub fn set_debug_logging(&self, enabled: bool) {
        self.session.set_debug_logging(enabled);
    }

    /// Whether failed calls are logged.
    pub fn debug_logging(&self) -> bool {
        self.session.debug_logging()
    }

    // ============================================
    // IDENTIFY
    // ============================================

    /// Identify a user within a project.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use postlog::Postlog;
    /// # async fn example(client: &Postlog) -> Result<(), postlog::Error> {
    /// client.identify("test_user", "test_project")
    ///     .property("username", "tester")
    ///     .property("plan", "free")
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn identify(
        &self,
        user_id: impl Into<String>,
        project: impl Into<String>,
    ) -> SendableIdentify<'_> {
        SendableIdentify {
            builder: IdentifyBuilder::new(user_id, project),
            client: self,
        }
    }

    // ============================================
    // TRACK
    // ============================================

    /// Track an event on a channel.
    ///
    /// Icon and description default to empty, tags to an empty map and the
    /// timestamp to the moment the call is sent.
    pub fn track(
        &self,
        name: impl Into<String>,
        channel: impl Into<String>,
        project: impl Into<String>,
        user_id: impl Into<String>,
    ) -> SendableTrack<'_> {
        SendableTrack {
            builder: TrackBuilder::new(name, channel, project, user_id),
            client: self,
        }
    }

    // ============================================
    // INTERNAL
    // ============================================

    fn submit(&self, call: Call, completion: Option<Completion>) {
        self.queue.submit(call, completion);
    }

    async fn submit_and_wait(&self, call: Call) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.submit(
            call,
            Some(Box::new(move |result: Result<(), Error>| {
                let _ = tx.send(result);
            })),
        );
        rx.await.unwrap_or(Err(Error::Shutdown))
    }
}

impl PostlogBuilder {
    /// Build the Postlog client.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Postlog, Error> {
        Postlog::from_builder(self)
    }
}

// ============================================
// SENDABLE WRAPPERS
// ============================================

/// Sendable identify call.
pub struct SendableIdentify<'a> {
    builder: IdentifyBuilder,
    client: &'a Postlog,
}

impl<'a> SendableIdentify<'a> {
    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builder = self.builder.property(key, value);
        self
    }

    /// Add every entry of a property map.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.builder = self.builder.properties(properties);
        self
    }

    /// Queue the call and invoke `completion` with its outcome.
    pub fn send_with(self, completion: impl FnOnce(Result<(), Error>) + Send + 'static) {
        self.client
            .submit(Call::Identify(self.builder), Some(Box::new(completion)));
    }

    /// Queue the call without observing its outcome.
    pub fn send_and_forget(self) {
        self.client.submit(Call::Identify(self.builder), None);
    }

    /// Queue the call and wait for its outcome.
    pub async fn send(self) -> Result<(), Error> {
        self.client
            .submit_and_wait(Call::Identify(self.builder))
            .await
    }
}

/// Sendable track call.
pub struct SendableTrack<'a> {
    builder: TrackBuilder,
    client: &'a Postlog,
}

impl<'a> SendableTrack<'a> {
    /// Set the icon.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.builder = self.builder.icon(icon);
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.builder = self.builder.description(description);
        self
    }

    /// Add a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builder = self.builder.tag(key, value);
        self
    }

    /// Add every entry of a tag map.
    pub fn tags(mut self, tags: Properties) -> Self {
        self.builder = self.builder.tags(tags);
        self
    }

    /// Set custom timestamp (milliseconds since epoch).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.builder = self.builder.timestamp(ts);
        self
    }

    /// Queue the call and invoke `completion` with its outcome.
    pub fn send_with(self, completion: impl FnOnce(Result<(), Error>) + Send + 'static) {
        self.client
            .submit(Call::Track(self.builder.stamp()), Some(Box::new(completion)));
    }

    /// Queue the call without observing its outcome.
    pub fn send_and_forget(self) {
        self.client.submit(Call::Track(self.builder.stamp()), None);
    }

    /// Queue the call and wait for its outcome.
    pub async fn send(self) -> Result<(), Error> {
        self.client
            .submit_and_wait(Call::Track(self.builder.stamp()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = Postlog::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_initialize_sets_token() {
        let client = Postlog::new().unwrap();
        assert!(!client.is_initialized());

        client.initialize("tok_1");
        assert!(client.is_initialized());
    }

    #[tokio::test]
    async fn test_builder_token_preinitializes() {
        let client = Postlog::builder().token("tok_1").build().unwrap();
        assert!(client.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_with_completes_asynchronously() {
        let client = Postlog::new().unwrap();
        let (tx, rx) = oneshot::channel();

        client.initialize_with("tok_1", move |result| {
            let _ = tx.send(result.is_ok());
        });

        assert!(rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_debug_logging_toggle() {
        let client = Postlog::builder().debug_logging(true).build().unwrap();
        assert!(client.debug_logging());

        client.set_debug_logging(false);
        assert!(!client.debug_logging());
    }

    #[tokio::test]
    async fn test_shared_returns_same_instance() {
        let a = Postlog::shared().unwrap() as *const Postlog;
        let b = Postlog::shared().unwrap() as *const Postlog;
        assert_eq!(a, b);
    }
}
