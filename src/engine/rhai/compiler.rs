//! Rhai compiler with a local AST cache.
//!
//! Scripts are compiled once per distinct source text; every run reuses the
//! cached AST with a freshly built engine.

use std::sync::Arc;

use dashmap::DashMap;
use rhai::{AST, Engine};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::create_engine;
use crate::config::RhaiConfig;

/// A type alias for the hash of a Rhai script.
type ScriptHash = [u8; 32];

/// Compiles scripts and caches the resulting ASTs.
#[derive(Debug)]
pub struct RhaiCompiler {
    engine: Engine,
    cache: DashMap<ScriptHash, Arc<AST>>,
}

/// Errors that can occur during Rhai compilation.
#[derive(Debug, Clone, Error)]
pub enum RhaiCompilerError {
    /// Error that occurs during script compilation.
    #[error("Rhai compilation error: {0}")]
    CompilationError(#[from] rhai::ParseError),
}

impl RhaiCompiler {
    /// Creates a new instance of the Rhai compiler.
    pub fn new(rhai_config: &RhaiConfig) -> Self {
        RhaiCompiler { engine: create_engine(rhai_config), cache: DashMap::new() }
    }

    /// A helper function to compute the hash of a script.
    fn hash_script(script: &str) -> ScriptHash {
        let mut hasher = Sha256::new();
        hasher.update(script.as_bytes());
        hasher.finalize().into()
    }

    /// Returns the AST for `script`, compiling it on first use.
    pub fn compile(&self, script: &str) -> Result<Arc<AST>, RhaiCompilerError> {
        let key = Self::hash_script(script);

        if let Some(cached) = self.cache.get(&key) {
            return Ok(Arc::clone(cached.value()));
        }

        let ast = Arc::new(self.engine.compile(script)?);
        self.cache.insert(key, Arc::clone(&ast));
        Ok(ast)
    }

    /// Number of cached ASTs.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}
