use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CallFailure;

#[async_trait]
/// Trait contract for one registered method: resolved arguments in, value
/// or failure out.
pub trait MethodHandler: Send + Sync {
    async fn invoke(&self, args: Vec<Value>) -> anyhow::Result<Value>;
}

/// Name-to-handler registry consulted once per inbound call.
///
/// An unregistered method name yields `UnknownMethod`; handler failures are
/// caught here and never propagate past the connection loop.
#[derive(Clone, Default)]
pub struct MethodDispatcher {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: MethodHandler + 'static>(&mut self, method: &str, handler: H) {
        self.handlers.insert(method.to_string(), Arc::new(handler));
    }

    pub async fn dispatch(&self, method: &str, args: Vec<Value>) -> Result<Value, CallFailure> {
        let Some(handler) = self.handlers.get(method) else {
            return Err(CallFailure::UnknownMethod {
                method: method.to_string(),
            });
        };
        handler
            .invoke(args)
            .await
            .map_err(|error| CallFailure::Handler(error.to_string()))
    }
}
