//! Host modules exposed to scripts.
//!
//! | Module | Functions | Failure style |
//! |---|---|---|
//! | `kv` | `put`, `upsert`, `get`, `delete` | `#{ value, error }` |
//! | `upload` | `upload_png(data [, name])` | `#{ value, error }` |
//! | `alert` | `send(channel [, level], text)` | `#{ value, error }` |
//! | `datasource` | `query(name, query [, opts])` | raised [`HostFailure`] |
//! | `log` | `info`, `warn`, `error` | never fails |
//!
//! The host logic lives in plain functions returning [`HostResult`] so it can
//! be tested without a sandbox; the closures registered on each [`Module`]
//! only translate arguments and results.

use std::sync::Arc;

use rhai::{Dynamic, Engine, EvalAltResult, INT, ImmutableString, Map, Module, Position};
use thiserror::Error;
use tokio::runtime::Handle;

use super::conversions::{
    HostResult, dynamic_to_bytes, dynamic_to_optional_string, dynamic_to_string,
    host_result_to_dynamic, query_result_to_dynamic,
};
use crate::{
    datasource::{DatasourceManager, QueryOptions},
    kv::KvStore,
    notification::{AlertLevel, AlertMessage, NotificationService},
    upload::UploadService,
};

type RhaiResult = Result<Dynamic, Box<EvalAltResult>>;

/// A host module failure raised through the sandbox error channel.
///
/// The runner recognizes this value and reports it as a host-module error
/// rather than a script error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{module}: {message}")]
pub struct HostFailure {
    /// Module that failed, e.g. `datasource`.
    pub module: String,
    /// Failure description.
    pub message: String,
}

impl HostFailure {
    /// Makes `module`, `message` and string interpolation available on
    /// caught failures.
    pub fn register_type(engine: &mut Engine) {
        engine
            .register_type_with_name::<HostFailure>("HostFailure")
            .register_get("module", |failure: &mut HostFailure| failure.module.clone())
            .register_get("message", |failure: &mut HostFailure| failure.message.clone())
            .register_fn("to_string", |failure: &mut HostFailure| failure.to_string())
            .register_fn("to_debug", |failure: &mut HostFailure| format!("{failure:?}"));
    }

    fn raise(module: &str, message: impl Into<String>) -> Box<EvalAltResult> {
        let failure = HostFailure { module: module.to_string(), message: message.into() };
        EvalAltResult::ErrorRuntime(Dynamic::from(failure), Position::NONE).into()
    }
}

/// Everything a script can reach from inside the sandbox.
#[derive(Clone, Default)]
pub struct HostServices {
    /// Shared key-value state.
    pub kv: Arc<KvStore>,
    /// Object uploads.
    pub uploads: Arc<UploadService>,
    /// Named datasources.
    pub datasources: Arc<DatasourceManager>,
    /// Named alert channels.
    pub notifications: Arc<NotificationService>,
}

impl HostServices {
    /// Registers every host module on `engine` for one run of `script`.
    /// Async work is driven to completion on `handle`, so the engine must be
    /// evaluated off the async worker threads.
    pub fn register(&self, engine: &mut Engine, handle: &Handle, script: &str) {
        HostFailure::register_type(engine);
        engine.register_static_module("kv", kv_module(Arc::clone(&self.kv)).into());
        engine.register_static_module(
            "upload",
            upload_module(Arc::clone(&self.uploads), handle.clone()).into(),
        );
        engine.register_static_module(
            "datasource",
            datasource_module(Arc::clone(&self.datasources), handle.clone()).into(),
        );
        engine.register_static_module(
            "alert",
            alert_module(Arc::clone(&self.notifications), handle.clone(), script).into(),
        );
        engine.register_static_module("log", log_module(script).into());
    }
}

// kv

/// `kv::put`: fails when the key exists.
pub fn kv_put(store: &KvStore, key: &str, value: &str) -> HostResult<bool> {
    store.put(key, value).map(|()| true).map_err(|e| e.to_string())
}

/// `kv::upsert`: never fails.
pub fn kv_upsert(store: &KvStore, key: &str, value: &str) -> HostResult<bool> {
    store.upsert(key, value);
    Ok(true)
}

/// `kv::get`: fails when the key is absent.
pub fn kv_get(store: &KvStore, key: &str) -> HostResult<String> {
    store.get(key).map_err(|e| e.to_string())
}

/// `kv::delete`: fails when the key is absent.
pub fn kv_delete(store: &KvStore, key: &str) -> HostResult<bool> {
    store.delete(key).map(|()| true).map_err(|e| e.to_string())
}

fn kv_args(key: Dynamic, value: Dynamic) -> HostResult<(String, String)> {
    let key = dynamic_to_string(key, "key").map_err(|e| format!("wrong arguments: {e}"))?;
    let value = dynamic_to_string(value, "value").map_err(|e| format!("wrong arguments: {e}"))?;
    Ok((key, value))
}

fn kv_key(key: Dynamic) -> HostResult<String> {
    dynamic_to_string(key, "key").map_err(|e| format!("wrong arguments: {e}"))
}

fn kv_module(store: Arc<KvStore>) -> Module {
    let mut module = Module::new();

    let kv = Arc::clone(&store);
    module.set_native_fn("put", move |key: Dynamic, value: Dynamic| -> RhaiResult {
        let result = kv_args(key, value).and_then(|(key, value)| kv_put(&kv, &key, &value));
        Ok(host_result_to_dynamic(result))
    });
    let kv = Arc::clone(&store);
    module.set_native_fn("upsert", move |key: Dynamic, value: Dynamic| -> RhaiResult {
        let result = kv_args(key, value).and_then(|(key, value)| kv_upsert(&kv, &key, &value));
        Ok(host_result_to_dynamic(result))
    });
    let kv = Arc::clone(&store);
    module.set_native_fn("get", move |key: Dynamic| -> RhaiResult {
        Ok(host_result_to_dynamic(kv_key(key).and_then(|key| kv_get(&kv, &key))))
    });
    let kv = store;
    module.set_native_fn("delete", move |key: Dynamic| -> RhaiResult {
        Ok(host_result_to_dynamic(kv_key(key).and_then(|key| kv_delete(&kv, &key))))
    });

    module
}

// upload

/// `upload::upload_png`: validates arguments, uploads and returns the URL.
pub fn upload_png(
    service: &UploadService,
    handle: &Handle,
    data: Dynamic,
    name: Dynamic,
) -> HostResult<String> {
    let data = dynamic_to_bytes(data).map_err(|e| format!("wrong arguments: {e}"))?;
    let name = dynamic_to_optional_string(name).map_err(|e| format!("wrong arguments: name {e}"))?;

    handle
        .block_on(service.upload_png(data, name.as_deref()))
        .map_err(|e| format!("error upload object: {e}"))
}

fn upload_module(service: Arc<UploadService>, handle: Handle) -> Module {
    let mut module = Module::new();

    let (uploads, rt) = (Arc::clone(&service), handle.clone());
    module.set_native_fn("upload_png", move |data: Dynamic| -> RhaiResult {
        Ok(host_result_to_dynamic(upload_png(&uploads, &rt, data, Dynamic::UNIT)))
    });
    let (uploads, rt) = (service, handle);
    module.set_native_fn("upload_png", move |data: Dynamic, name: Dynamic| -> RhaiResult {
        Ok(host_result_to_dynamic(upload_png(&uploads, &rt, data, name)))
    });

    module
}

// datasource

/// Reads `#{ start, end, limit }`. Unknown keys are ignored.
pub fn query_options(options: &Map) -> HostResult<QueryOptions> {
    let int = |key: &str| -> HostResult<Option<INT>> {
        match options.get(key) {
            None => Ok(None),
            Some(value) if value.is_unit() => Ok(None),
            Some(value) => value
                .as_int()
                .map(Some)
                .map_err(|type_name| format!("'{key}' must be an integer, got {type_name}")),
        }
    };

    let limit = int("limit")?
        .map(|limit| u32::try_from(limit).map_err(|_| format!("'limit' out of range: {limit}")))
        .transpose()?;

    Ok(QueryOptions { start: int("start")?, end: int("end")?, limit })
}

fn datasource_query(
    manager: &DatasourceManager,
    handle: &Handle,
    name: &str,
    query: &str,
    options: &QueryOptions,
) -> Result<Dynamic, Box<EvalAltResult>> {
    let result = handle
        .block_on(manager.query(name, query, options))
        .map_err(|e| HostFailure::raise("datasource", e.to_string()))?;
    query_result_to_dynamic(&result).map_err(|e| HostFailure::raise("datasource", e))
}

fn datasource_module(manager: Arc<DatasourceManager>, handle: Handle) -> Module {
    let mut module = Module::new();

    let (sources, rt) = (Arc::clone(&manager), handle.clone());
    module.set_native_fn("query", move |name: ImmutableString, query: ImmutableString| -> RhaiResult {
        datasource_query(&sources, &rt, &name, &query, &QueryOptions::default())
    });
    let (sources, rt) = (manager, handle);
    module.set_native_fn(
        "query",
        move |name: ImmutableString, query: ImmutableString, options: Map| -> RhaiResult {
            let options = query_options(&options)
                .map_err(|e| HostFailure::raise("datasource", format!("wrong arguments: {e}")))?;
            datasource_query(&sources, &rt, &name, &query, &options)
        },
    );

    module
}

// alert

/// `alert::send`: delivers an alert, reporting failures as values.
pub fn alert_send(
    service: &NotificationService,
    handle: &Handle,
    script: &str,
    channel: &str,
    level: &str,
    text: &str,
) -> HostResult<bool> {
    let level: AlertLevel = level.parse().map_err(|e| format!("wrong arguments: {e}"))?;
    let message = AlertMessage {
        channel: channel.to_string(),
        level,
        text: text.to_string(),
        script: Some(script.to_string()),
    };

    handle.block_on(service.send(&message)).map(|()| true).map_err(|e| e.to_string())
}

fn alert_module(service: Arc<NotificationService>, handle: Handle, script: &str) -> Module {
    let mut module = Module::new();
    let script: Arc<str> = Arc::from(script);

    let (notifications, rt, name) = (Arc::clone(&service), handle.clone(), Arc::clone(&script));
    module.set_native_fn("send", move |channel: ImmutableString, text: ImmutableString| -> RhaiResult {
        let level = AlertLevel::default().to_string();
        Ok(host_result_to_dynamic(alert_send(&notifications, &rt, &name, &channel, &level, &text)))
    });
    let (notifications, rt, name) = (service, handle, script);
    module.set_native_fn(
        "send",
        move |channel: ImmutableString, level: ImmutableString, text: ImmutableString| -> RhaiResult {
            Ok(host_result_to_dynamic(alert_send(
                &notifications,
                &rt,
                &name,
                &channel,
                &level,
                &text,
            )))
        },
    );

    module
}

// log

fn log_module(script: &str) -> Module {
    let mut module = Module::new();
    let script: Arc<str> = Arc::from(script);

    let name = Arc::clone(&script);
    module.set_native_fn("info", move |message: Dynamic| -> Result<(), Box<EvalAltResult>> {
        tracing::info!(target: "vigil::script", script = %name, "{message}");
        Ok(())
    });
    let name = Arc::clone(&script);
    module.set_native_fn("warn", move |message: Dynamic| -> Result<(), Box<EvalAltResult>> {
        tracing::warn!(target: "vigil::script", script = %name, "{message}");
        Ok(())
    });
    let name = script;
    module.set_native_fn("error", move |message: Dynamic| -> Result<(), Box<EvalAltResult>> {
        tracing::error!(target: "vigil::script", script = %name, "{message}");
        Ok(())
    });

    module
}
