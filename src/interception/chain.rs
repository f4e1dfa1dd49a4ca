//! Module `chain`
//!
//! An interception chain is an ordered list of stages in front of a
//! terminal sink. Each stage either answers a call itself or hands it to the
//! rest of the chain through `Next`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::call::{CallEnvelope, CallResult};
use crate::transport::CallSink;

#[async_trait]
pub trait CallStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, call: CallEnvelope, next: Next<'_>) -> CallResult;
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn CallStage>],
    terminal: &'a dyn CallSink,
}

impl<'a> Next<'a> {
    pub async fn run(self, call: CallEnvelope) -> CallResult {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    terminal: self.terminal,
                };
                stage.process(call, next).await
            }
            None => self.terminal.process(call).await,
        }
    }
}

pub struct InterceptionChain {
    stages: Vec<Arc<dyn CallStage>>,
    terminal: Arc<dyn CallSink>,
}

impl InterceptionChain {
    pub fn builder(terminal: Arc<dyn CallSink>) -> ChainBuilder {
        ChainBuilder {
            stages: Vec::new(),
            terminal,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

#[async_trait]
impl CallSink for InterceptionChain {
    async fn process(&self, call: CallEnvelope) -> CallResult {
        let next = Next {
            stages: &self.stages,
            terminal: self.terminal.as_ref(),
        };
        next.run(call).await
    }
}

/// Stages run in the order they are added.
pub struct ChainBuilder {
    stages: Vec<Arc<dyn CallStage>>,
    terminal: Arc<dyn CallSink>,
}

impl ChainBuilder {
    pub fn stage(mut self, stage: Arc<dyn CallStage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> InterceptionChain {
        InterceptionChain {
            stages: self.stages,
            terminal: self.terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::Fault;
    use serde_json::{Value, json};

    struct Tag(&'static str);

    #[async_trait]
    impl CallStage for Tag {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn process(&self, mut call: CallEnvelope, next: Next<'_>) -> CallResult {
            let mut trail = call.payload.as_array().cloned().unwrap_or_default();
            trail.push(json!(self.0));
            call.payload = Value::Array(trail);
            next.run(call).await
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl CallStage for ShortCircuit {
        fn name(&self) -> &'static str {
            "short-circuit"
        }

        async fn process(&self, _call: CallEnvelope, _next: Next<'_>) -> CallResult {
            Err(Fault::service("stopped"))
        }
    }

    struct Echo;

    #[async_trait]
    impl CallSink for Echo {
        async fn process(&self, call: CallEnvelope) -> CallResult {
            Ok(call.payload)
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_before_terminal() {
        let chain = InterceptionChain::builder(Arc::new(Echo))
            .stage(Arc::new(Tag("first")))
            .stage(Arc::new(Tag("second")))
            .build();

        assert_eq!(chain.stage_names(), vec!["first", "second"]);
        let result = chain.process(CallEnvelope::new("echo", json!([]))).await;
        assert_eq!(result, Ok(json!(["first", "second"])));
    }

    #[tokio::test]
    async fn test_stage_can_answer_without_forwarding() {
        let chain = InterceptionChain::builder(Arc::new(Echo))
            .stage(Arc::new(ShortCircuit))
            .stage(Arc::new(Tag("never")))
            .build();

        let result = chain.process(CallEnvelope::new("echo", json!([]))).await;
        assert_eq!(result, Err(Fault::service("stopped")));
    }

    #[tokio::test]
    async fn test_empty_chain_reaches_terminal() {
        let chain = InterceptionChain::builder(Arc::new(Echo)).build();
        let result = chain.process(CallEnvelope::new("echo", json!(1))).await;
        assert_eq!(result, Ok(json!(1)));
    }
}
