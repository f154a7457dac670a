use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use rhai::{AST, EvalAltResult, Scope};
use tokio::runtime::Handle;

use super::{RunRequest, RunnerError, ScriptRunner};
use crate::{
    config::RhaiConfig,
    engine::rhai::{
        HostFailure, HostServices, RhaiCompiler, conversions::request_to_dynamic, create_engine,
        set_deadline,
    },
    scripts::ScriptRegistry,
};

/// One run of one script.
#[derive(Debug)]
struct ExecutionContext {
    script: String,
    request: Option<RunRequest>,
    started: Instant,
}

/// Runs scripts from a [`ScriptRegistry`] in the Rhai sandbox.
///
/// Each run builds a fresh engine with the configured limits and the host
/// modules, and evaluates the cached AST on the blocking thread pool.
pub struct RhaiRunner {
    registry: Arc<ScriptRegistry>,
    compiler: Arc<RhaiCompiler>,
    rhai_config: RhaiConfig,
    services: HostServices,
}

impl RhaiRunner {
    /// Creates a runner over `registry` with access to `services`.
    pub fn new(
        registry: Arc<ScriptRegistry>,
        rhai_config: RhaiConfig,
        services: HostServices,
    ) -> Self {
        let compiler = Arc::new(RhaiCompiler::new(&rhai_config));
        Self { registry, compiler, rhai_config, services }
    }

    /// Compiles every loaded script, returning the first failure.
    pub fn precompile(&self) -> Result<(), RunnerError> {
        let mut names: Vec<_> = self.registry.names();
        names.sort();
        for name in names {
            self.compile(&name)?;
        }
        Ok(())
    }

    fn compile(&self, name: &str) -> Result<Arc<AST>, RunnerError> {
        let script =
            self.registry.get(name).ok_or_else(|| RunnerError::NotFound(name.to_string()))?;
        self.compiler.compile(&script.body).map_err(|e| RunnerError::Compile {
            script: name.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ScriptRunner for RhaiRunner {
    #[tracing::instrument(skip(self, request), fields(http = request.is_some()))]
    async fn run_script(&self, name: &str, request: Option<RunRequest>) -> Result<(), RunnerError> {
        let ast = self.compile(name)?;
        let context = ExecutionContext { script: name.to_string(), request, started: Instant::now() };

        let handle = Handle::current();
        let services = self.services.clone();
        let rhai_config = self.rhai_config.clone();
        let result = tokio::task::spawn_blocking(move || {
            execute(&rhai_config, &services, &handle, &ast, &context)
                .inspect(|()| {
                    tracing::debug!(elapsed = ?context.started.elapsed(), "Script finished.")
                })
        })
        .await
        .map_err(|e| RunnerError::Join(e.to_string()))?;

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Script failed.");
        }
        result
    }
}

fn execute(
    rhai_config: &RhaiConfig,
    services: &HostServices,
    handle: &Handle,
    ast: &AST,
    context: &ExecutionContext,
) -> Result<(), RunnerError> {
    let mut engine = create_engine(rhai_config);
    set_deadline(&mut engine, rhai_config.execution_timeout);
    services.register(&mut engine, handle, &context.script);

    let request = request_to_dynamic(context.request.as_ref()).map_err(RunnerError::Runtime)?;
    let mut scope = Scope::new();
    scope.push_dynamic("request", request);

    engine
        .run_ast_with_scope(&mut scope, ast)
        .map_err(|err| classify(*err, &context.script, rhai_config.execution_timeout))
}

/// Maps a sandbox error onto the runner's error taxonomy.
fn classify(err: EvalAltResult, script: &str, timeout: Duration) -> RunnerError {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify(*inner, script, timeout),
        EvalAltResult::ErrorTerminated(..) => {
            RunnerError::Timeout { script: script.to_string(), timeout }
        }
        EvalAltResult::ErrorRuntime(value, _) => match value.clone().try_cast::<HostFailure>() {
            Some(HostFailure { module, message }) => RunnerError::HostModule { module, message },
            None => RunnerError::Runtime(value.to_string()),
        },
        other => RunnerError::Runtime(other.to_string()),
    }
}
