use anyhow::anyhow;
use async_trait::async_trait;
use piper_session::{MethodDispatcher, MethodHandler};
use serde_json::{json, Value};

pub const METHOD_MAKE_GREETING: &str = "makeGreeting";
pub const METHOD_APPEND_SUFFIX: &str = "appendSuffix";

fn require_string_arg<'a>(args: &'a [Value], index: usize, method: &str) -> anyhow::Result<&'a str> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("{method} expects a string argument at position {index}"))
}

struct MakeGreetingHandler;

#[async_trait]
impl MethodHandler for MakeGreetingHandler {
    async fn invoke(&self, args: Vec<Value>) -> anyhow::Result<Value> {
        let name = require_string_arg(&args, 0, METHOD_MAKE_GREETING)?;
        Ok(json!(format!("Hello, {name}!")))
    }
}

struct AppendSuffixHandler;

#[async_trait]
impl MethodHandler for AppendSuffixHandler {
    async fn invoke(&self, args: Vec<Value>) -> anyhow::Result<Value> {
        let base = require_string_arg(&args, 0, METHOD_APPEND_SUFFIX)?;
        let suffix = require_string_arg(&args, 1, METHOD_APPEND_SUFFIX)?;
        Ok(json!(format!("{base}{suffix}")))
    }
}

/// Dispatcher with the demo methods registered under their wire names.
pub fn demo_method_dispatcher() -> MethodDispatcher {
    let mut dispatcher = MethodDispatcher::new();
    dispatcher.register(METHOD_MAKE_GREETING, MakeGreetingHandler);
    dispatcher.register(METHOD_APPEND_SUFFIX, AppendSuffixHandler);
    dispatcher
}
