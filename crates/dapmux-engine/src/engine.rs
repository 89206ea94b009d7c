//! Top-level wiring: creates sessions, serves reverse requests, spawns
//! child sessions and cleans up after adapters that go away.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use dapmux_config::Config;
use dapmux_dap::{
    ClientOptions, DapClient, Event, Request, StartDebuggingRequestArguments, Transport,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::breakpoint::FunctionBreakpointSpec;
use crate::error::EngineError;
use crate::language::{AdapterEndpoint, AdapterProfile, Language};
use crate::registry::SessionRegistry;
use crate::session::{LaunchPlan, Session, SessionOptions, SourceBreakpoints};
use crate::state::ExecutionState;

struct EngineInner {
    config: Config,
    registry: SessionRegistry,
    next_ids: Mutex<HashMap<Language, u64>>,
}

/// Owns every session of one controlling client.
#[derive(Clone)]
pub struct DebugEngine {
    inner: Arc<EngineInner>,
}

impl DebugEngine {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                registry: SessionRegistry::new(),
                next_ids: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.inner.registry
    }

    /// Adapter profile for `language` under this engine's configuration.
    pub fn profile(&self, language: Language) -> AdapterProfile {
        AdapterProfile::from_config(language, &self.inner.config)
    }

    /// A port an adapter server for `language` could listen on.
    pub fn available_port(&self, language: Language) -> Option<u16> {
        self.profile(language).available_port()
    }

    /// Connect to the configured adapter and start a session.
    pub async fn start_session(&self, options: SessionOptions) -> Result<Arc<Session>, EngineError> {
        let profile = self.profile(options.language);
        let transport = connect(&profile.endpoint()).await?;
        self.start_session_with_transport(options, transport).await
    }

    /// Start a session over an already-open adapter connection.
    pub async fn start_session_with_transport(
        &self,
        options: SessionOptions,
        transport: Transport,
    ) -> Result<Arc<Session>, EngineError> {
        let plan = options.plan()?;
        let profile = self.profile(options.language);
        let session = self.open(profile, transport, None);
        self.launch(&session, plan).await?;
        Ok(session)
    }

    /// Open a child session for a `startDebugging` request of `parent_id`.
    ///
    /// The child connects to the parent's adapter endpoint and inherits the
    /// parent's breakpoints.
    pub async fn start_child_session(
        &self,
        parent_id: &str,
        arguments: StartDebuggingRequestArguments,
    ) -> Result<Arc<Session>, EngineError> {
        let parent = self.inner.registry.require(parent_id)?;
        let transport = connect(&parent.profile().endpoint()).await?;
        self.start_child_session_with_transport(parent_id, arguments, transport)
            .await
    }

    /// [`start_child_session`](Self::start_child_session) over an open connection.
    pub async fn start_child_session_with_transport(
        &self,
        parent_id: &str,
        arguments: StartDebuggingRequestArguments,
        transport: Transport,
    ) -> Result<Arc<Session>, EngineError> {
        let parent = self.inner.registry.require(parent_id)?;
        parent.require_live()?;
        let plan = child_plan(&parent, arguments)?;
        let session = self.open(
            parent.profile().clone(),
            transport,
            Some(parent_id.to_string()),
        );
        self.launch(&session, plan).await?;
        tracing::info!(parent_id, child_id = %session.id(), "child session started");
        Ok(session)
    }

    /// Terminate a session and its descendants, deepest first, and
    /// unregister them.
    pub async fn stop_session(&self, id: &str) -> Result<ExecutionState, EngineError> {
        let session = self.inner.registry.require(id)?;
        for child_id in self.inner.registry.descendants(id) {
            if let Some(child) = self.inner.registry.get(&child_id) {
                child.terminate().await;
                child.detach_handlers();
                self.inner.registry.unregister(&child_id);
            }
        }
        let state = session.terminate().await;
        session.detach_handlers();
        self.inner.registry.unregister(id);
        Ok(state)
    }

    /// Stop every registered session.
    pub async fn stop_all(&self) {
        let roots: Vec<String> = self
            .inner
            .registry
            .all()
            .iter()
            .filter(|s| !s.is_child())
            .map(|s| s.id().to_string())
            .collect();
        for id in roots {
            if let Err(e) = self.stop_session(&id).await {
                tracing::debug!(session_id = %id, error = %e, "session already gone");
            }
        }
        // Orphaned children whose parent went first.
        for session in self.inner.registry.all() {
            let id = session.id().to_string();
            if let Err(e) = self.stop_session(&id).await {
                tracing::debug!(session_id = %id, error = %e, "session already gone");
            }
        }
    }

    pub fn session(&self, id: &str) -> Result<Arc<Session>, EngineError> {
        self.inner.registry.require(id)
    }

    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.inner.registry.all()
    }

    pub fn default_session(&self) -> Option<Arc<Session>> {
        self.inner.registry.default_session()
    }

    pub fn set_default_session(&self, id: &str) -> Result<(), EngineError> {
        self.inner.registry.set_default(id)
    }

    fn allocate_id(&self, language: Language) -> String {
        let mut next = self.inner.next_ids.lock();
        let n = next.entry(language).or_insert(0);
        *n += 1;
        format!("{}-{}", language.as_str(), n)
    }

    fn open(
        &self,
        profile: AdapterProfile,
        transport: Transport,
        parent_id: Option<String>,
    ) -> Arc<Session> {
        let id = self.allocate_id(profile.language);
        let options = ClientOptions {
            request_timeout: self.inner.config.session.request_timeout(),
            terminate_timeout: profile.terminate_timeout,
        };
        let client = DapClient::start(transport, options, id.clone());
        Session::new(
            id,
            profile,
            self.inner.config.session.clone(),
            client,
            parent_id,
        )
    }

    /// Register, wire and start `session`. On failure the session is torn
    /// down and unregistered.
    async fn launch(&self, session: &Arc<Session>, plan: LaunchPlan) -> Result<(), EngineError> {
        self.inner.registry.register(session.clone())?;
        self.install_cleanup(session);
        if session.language().spawns_child_sessions() {
            self.serve_reverse_requests(session);
        }

        match session.start(plan).await {
            Ok(state) => {
                tracing::info!(session_id = %session.id(), status = %state.status, "session ready");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id(), error = %e, "session failed to start");
                session.disconnect(true).await;
                session.detach_handlers();
                self.inner.registry.unregister(session.id());
                Err(e)
            }
        }
    }

    /// Unregister the session a grace period after the adapter ends it.
    fn install_cleanup(&self, session: &Arc<Session>) {
        let engine: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let session_id = session.id().to_string();
        let grace = self.inner.config.session.cleanup_grace();
        session.client().events().subscribe(
            "terminated",
            Arc::new(move |_: &Event| {
                let engine = engine.clone();
                let session_id = session_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(grace).await;
                    let Some(inner) = engine.upgrade() else {
                        return;
                    };
                    let Some(session) = inner.registry.unregister(&session_id) else {
                        return;
                    };
                    session.detach_handlers();
                    session
                        .client()
                        .shutdown(session.profile().process_termination_timeout)
                        .await;
                    tracing::info!(session_id = %session_id, "cleaned up terminated session");
                });
            }),
        );
    }

    /// Answer reverse requests; `startDebugging` opens a child session.
    fn serve_reverse_requests(&self, session: &Arc<Session>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Request>();
        session.client().set_reverse_request_sink(tx);

        let engine: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let parent_id = session.id().to_string();
        let client = session.client().clone();
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                if request.command != "startDebugging" {
                    tracing::debug!(parent_id = %parent_id, command = %request.command, "declining reverse request");
                    let declined = client.respond(
                        &request,
                        false,
                        Some(format!("{} is not supported", request.command)),
                        None,
                    );
                    if let Err(e) = declined {
                        tracing::debug!(parent_id = %parent_id, error = %e, "could not answer reverse request");
                    }
                    continue;
                }

                let arguments = request
                    .arguments
                    .clone()
                    .map(serde_json::from_value::<StartDebuggingRequestArguments>);
                let arguments = match arguments {
                    Some(Ok(arguments)) => arguments,
                    Some(Err(e)) => {
                        let _ = client.respond(&request, false, Some(e.to_string()), None);
                        continue;
                    }
                    None => {
                        let _ = client.respond(&request, false, Some("missing arguments".into()), None);
                        continue;
                    }
                };
                if let Err(e) = client.respond(&request, true, None, None) {
                    tracing::warn!(parent_id = %parent_id, error = %e, "could not acknowledge startDebugging");
                    continue;
                }

                let Some(inner) = engine.upgrade() else {
                    break;
                };
                let engine = DebugEngine { inner };
                let parent_id = parent_id.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.start_child_session(&parent_id, arguments).await {
                        tracing::warn!(parent_id = %parent_id, error = %e, "child session failed");
                    }
                });
            }
        });
    }
}

impl std::fmt::Debug for DebugEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugEngine")
            .field("registry", &self.inner.registry)
            .finish()
    }
}

/// Open a transport to `endpoint`.
pub async fn connect(endpoint: &AdapterEndpoint) -> Result<Transport, EngineError> {
    let transport = match endpoint {
        AdapterEndpoint::Tcp { host, port } => Transport::connect_tcp(host, *port).await?,
        AdapterEndpoint::Stdio { command, args } => {
            Transport::spawn_stdio(command, args, None, &HashMap::new())?
        }
    };
    Ok(transport)
}

/// The launch plan of a child: the adapter-supplied configuration plus the
/// parent's breakpoints.
fn child_plan(
    parent: &Session,
    arguments: StartDebuggingRequestArguments,
) -> Result<LaunchPlan, EngineError> {
    if arguments.request != "launch" && arguments.request != "attach" {
        return Err(EngineError::validation(
            "request",
            format!("startDebugging wants {:?}, expected launch or attach", arguments.request),
        ));
    }
    if !arguments.configuration.is_object() {
        return Err(EngineError::validation(
            "configuration",
            "startDebugging configuration is not an object",
        ));
    }

    let store = parent.breakpoints.lock();
    let breakpoints = store
        .files()
        .into_iter()
        .map(|file| SourceBreakpoints {
            specs: store.for_file(&file).iter().map(|bp| bp.spec()).collect(),
            file,
        })
        .collect();
    let function_breakpoints = store
        .functions()
        .iter()
        .map(|f| FunctionBreakpointSpec {
            name: f.name.clone(),
            condition: f.condition.clone(),
            hit_condition: f.hit_condition.clone(),
        })
        .collect();
    Ok(LaunchPlan {
        command: arguments.request,
        arguments: arguments.configuration,
        stop_on_entry: false,
        breakpoints,
        function_breakpoints,
        exception_filters: store.exception_filters().to_vec(),
    })
}
