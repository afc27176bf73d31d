//! Build queue, bounded dispatch pool and completion context.
//!
//! Calls move through three stages, each running on its own task:
//!
//! 1. The build queue handles one call at a time in submission order. It
//!    checks the token, validates properties and encodes the request.
//! 2. The dispatcher hands requests to the transport, never holding more
//!    than `max_concurrent_requests` in flight. Waiting requests are started
//!    in the order they were built.
//! 3. The completion context invokes completions one at a time.

use crate::builders::Call;
use crate::config::Config;
use crate::session::Session;
use crate::transport::{Request, Response, Transport};
use crate::types::Endpoint;
use crate::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Callback invoked once with the outcome of a call.
pub type Completion = Box<dyn FnOnce(Result<(), Error>) + Send + 'static>;

struct Job {
    call: Call,
    completion: Option<Completion>,
}

struct Dispatch {
    endpoint: Endpoint,
    request: Request,
    completion: Option<Completion>,
}

// ============================================
// COMPLETION CONTEXT
// ============================================

/// The single task on which completions run.
#[derive(Clone)]
pub(crate) struct CompletionContext {
    tx: UnboundedSender<(Completion, Result<(), Error>)>,
}

impl CompletionContext {
    pub(crate) fn spawn(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Completion, Result<(), Error>)>();

        handle.spawn(async move {
            while let Some((completion, result)) = rx.recv().await {
                // A panicking completion must not take the context down with it.
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| completion(result)));
                if outcome.is_err() {
                    warn!("completion panicked");
                }
            }
            debug!("completion context closed");
        });

        Self { tx }
    }

    /// Schedule a completion. Never runs it on the caller's stack.
    pub(crate) fn deliver(&self, completion: Option<Completion>, result: Result<(), Error>) {
        let Some(completion) = completion else {
            return;
        };
        if self.tx.send((completion, result)).is_err() {
            debug!("completion context gone, dropping completion");
        }
    }
}

/// Log the outcome, then hand it to the completion context.
fn finish(
    session: &Session,
    completions: &CompletionContext,
    endpoint: Endpoint,
    result: Result<(), Error>,
    completion: Option<Completion>,
) {
    match &result {
        Ok(()) => debug!(endpoint = endpoint.path(), "request succeeded"),
        Err(e) if session.debug_logging() => {
            warn!(endpoint = endpoint.path(), error = %e, "request failed")
        }
        Err(_) => {}
    }
    completions.deliver(completion, result);
}

// ============================================
// BUILD QUEUE
// ============================================

/// Entry point of the pipeline. Dropping it lets every stage drain and stop.
pub(crate) struct BuildQueue {
    tx: UnboundedSender<Job>,
    completions: CompletionContext,
}

impl BuildQueue {
    pub(crate) fn spawn(
        handle: &Handle,
        config: &Config,
        session: Arc<Session>,
        transport: Arc<dyn Transport>,
        completions: CompletionContext,
    ) -> Self {
        let (tx, jobs) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();

        let builder = Builder {
            api_host: config.api_host().to_string(),
            session: session.clone(),
            dispatch: dispatch_tx,
            completions: completions.clone(),
        };
        handle.spawn(builder.run(jobs));

        let pool = DispatchPool {
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests())),
            transport,
            timeout: config.timeout(),
            session,
            completions: completions.clone(),
        };
        handle.spawn(pool.run(dispatch_rx));

        Self { tx, completions }
    }

    /// Append a call to the queue.
    pub(crate) fn submit(&self, call: Call, completion: Option<Completion>) {
        if let Err(SendError(job)) = self.tx.send(Job { call, completion }) {
            self.completions.deliver(job.completion, Err(Error::Shutdown));
        }
    }
}

struct Builder {
    api_host: String,
    session: Arc<Session>,
    dispatch: UnboundedSender<Dispatch>,
    completions: CompletionContext,
}

impl Builder {
    async fn run(self, mut jobs: UnboundedReceiver<Job>) {
        while let Some(job) = jobs.recv().await {
            let endpoint = job.call.endpoint();

            match prepare(&self.api_host, self.session.token(), job.call) {
                Ok(request) => {
                    let dispatch = Dispatch {
                        endpoint,
                        request,
                        completion: job.completion,
                    };
                    if let Err(SendError(dispatch)) = self.dispatch.send(dispatch) {
                        finish(
                            &self.session,
                            &self.completions,
                            endpoint,
                            Err(Error::Shutdown),
                            dispatch.completion,
                        );
                    }
                }
                Err(e) => finish(
                    &self.session,
                    &self.completions,
                    endpoint,
                    Err(e),
                    job.completion,
                ),
            }
        }
        debug!("build queue closed");
    }
}

/// Turn a call into a request, or reject it before any network I/O.
///
/// Checks run in order: token, property validation, URL, serialization.
pub(crate) fn prepare(
    api_host: &str,
    token: Option<String>,
    call: Call,
) -> Result<Request, Error> {
    let token = token.ok_or(Error::NotInitialized)?;
    let payload = call.build()?;

    let url = format!("{}{}", api_host, payload.endpoint().path());
    if let Err(e) = reqwest::Url::parse(&url) {
        return Err(Error::InvalidUrl(format!("{}: {}", url, e)));
    }

    let body = serde_json::to_vec(&payload)?;

    Ok(Request {
        url,
        headers: vec![
            ("Content-Type", "application/json".into()),
            ("Accept", "application/json".into()),
            ("Authorization", format!("Bearer {}", token)),
        ],
        body,
    })
}

// ============================================
// DISPATCH POOL
// ============================================

struct DispatchPool {
    permits: Arc<Semaphore>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    session: Arc<Session>,
    completions: CompletionContext,
}

impl DispatchPool {
    async fn run(self, mut queue: UnboundedReceiver<Dispatch>) {
        while let Some(dispatch) = queue.recv().await {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    finish(
                        &self.session,
                        &self.completions,
                        dispatch.endpoint,
                        Err(Error::Shutdown),
                        dispatch.completion,
                    );
                    continue;
                }
            };

            let transport = self.transport.clone();
            let session = self.session.clone();
            let completions = self.completions.clone();
            let timeout = self.timeout;

            tokio::spawn(async move {
                debug!(endpoint = dispatch.endpoint.path(), "dispatching");
                let result = execute(transport.as_ref(), dispatch.request, timeout).await;
                drop(permit);
                finish(
                    &session,
                    &completions,
                    dispatch.endpoint,
                    result,
                    dispatch.completion,
                );
            });
        }
        debug!("dispatcher closed");
    }
}

/// Send one request and map the outcome.
pub(crate) async fn execute(
    transport: &dyn Transport,
    request: Request,
    timeout: Duration,
) -> Result<(), Error> {
    let response = tokio::time::timeout(timeout, transport.send(request))
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    check_status(response)
}

fn check_status(response: Response) -> Result<(), Error> {
    match response.status {
        200..=299 => Ok(()),
        100..=599 => Err(Error::RequestFailed(response.status)),
        _ => Err(Error::InvalidResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{IdentifyBuilder, TrackBuilder};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    const HOST: &str = "https://api.postlog.app/v1";

    fn identify() -> Call {
        Call::Identify(IdentifyBuilder::new("test_user", "test_project").property("plan", "free"))
    }

    #[test]
    fn test_prepare_without_token() {
        let result = prepare(HOST, None, identify());
        assert!(matches!(result, Err(Error::NotInitialized)));
    }

    #[test]
    fn test_prepare_checks_token_before_properties() {
        let call = Call::Identify(IdentifyBuilder::new("u", "p").property("bad", json!([1])));
        assert!(matches!(prepare(HOST, None, call), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_prepare_invalid_properties() {
        let call = Call::Track(TrackBuilder::new("e", "c", "p", "u").tag("bad", json!({})));
        let result = prepare(HOST, Some("tok".into()), call);
        assert!(matches!(result, Err(Error::InvalidProperties { .. })));
    }

    #[test]
    fn test_prepare_invalid_url() {
        let result = prepare("not a url", Some("tok".into()), identify());
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_prepare_identify_request() {
        let request = prepare(HOST, Some("tok_123".into()), identify()).unwrap();

        assert_eq!(request.url, "https://api.postlog.app/v1/user/identify");
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.header("Authorization"), Some("Bearer tok_123"));

        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(
            body,
            json!({
                "user_id": "test_user",
                "project": "test_project",
                "properties": {"plan": "free"}
            })
        );
    }

    #[test]
    fn test_prepare_track_request() {
        let call = Call::Track(TrackBuilder::new("signup", "users", "acme", "usr_1").stamp());
        let request = prepare(HOST, Some("tok".into()), call).unwrap();

        assert_eq!(request.url, "https://api.postlog.app/v1/log");
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["name"], "signup");
        assert!(body["timestamp"].is_i64());
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(Response::new(200)).is_ok());
        assert!(check_status(Response::new(204)).is_ok());
        assert!(matches!(
            check_status(Response::new(500)),
            Err(Error::RequestFailed(500))
        ));
        assert!(matches!(
            check_status(Response::new(301)),
            Err(Error::RequestFailed(301))
        ));
        assert!(matches!(
            check_status(Response::new(0)),
            Err(Error::InvalidResponse)
        ));
        assert!(matches!(
            check_status(Response::new(1000)),
            Err(Error::InvalidResponse)
        ));
    }

    struct SlowTransport;

    #[async_trait]
    impl Transport for SlowTransport {
        async fn send(&self, _request: Request) -> Result<Response, Error> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Response::new(200))
        }
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let request = prepare(HOST, Some("tok".into()), identify()).unwrap();
        let result = execute(&SlowTransport, request, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_completion_is_never_synchronous() {
        let context = CompletionContext::spawn(&Handle::current());
        let ran = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        let flag = ran.clone();
        context.deliver(
            Some(Box::new(move |result: Result<(), Error>| {
                flag.store(true, Ordering::SeqCst);
                let _ = tx.send(result);
            })),
            Ok(()),
        );

        // Single-threaded test runtime: the context task cannot have run yet.
        assert!(!ran.load(Ordering::SeqCst));
        assert!(rx.await.unwrap().is_ok());
        assert!(ran.load(Ordering::SeqCst));
    }
}
