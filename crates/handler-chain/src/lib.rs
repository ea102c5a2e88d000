//! Ordered middleware plus handlers for one agent request.
//!
//! `before` runs for every middleware in registration order and may rewrite
//! `request.outbound`; handlers run until one returns `Stop` or `Reply`;
//! `after` runs in reverse order with the final response. When a `before`
//! stops the chain, or a later step fails, `after` still runs (with `Stop`)
//! for every middleware whose `before` already completed.

use agent_core::{AgentRequest, Handler, HandlerResponse, Middleware, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Default)]
pub struct HandlerChain {
    middleware: Vec<Arc<dyn Middleware>>,
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Runs the chain. The request is taken by value because middleware may
    /// rewrite it; the rewritten request is what handlers and `after` see.
    #[instrument(
        skip_all,
        fields(agent_id = %request.message.agent_id, message_id = %request.message.id)
    )]
    pub async fn handle(&self, mut request: AgentRequest) -> Result<HandlerResponse> {
        let mut final_response = HandlerResponse::Continue;

        info!(
            channel = %request.message.channel,
            sender_id = %request.message.sender_id,
            is_internal = request.message.is_internal,
            "step: handler_chain started"
        );

        for (index, mw) in self.middleware.iter().enumerate() {
            let mw_name = std::any::type_name_of_val(mw.as_ref());
            let should_continue = match mw.before(&mut request).await {
                Ok(should_continue) => should_continue,
                Err(e) => {
                    self.unwind(index, &request).await;
                    return Err(e);
                }
            };
            if !should_continue {
                info!(
                    middleware = %mw_name,
                    "step: middleware before returned false, chain stopped"
                );
                self.unwind(index, &request).await;
                return Ok(HandlerResponse::Stop);
            }
            info!(
                middleware = %mw_name,
                outbound_len = request.outbound.len(),
                "step: middleware before done"
            );
        }

        for handler in &self.handlers {
            let handler_name = std::any::type_name_of_val(handler.as_ref());
            let response = match handler.handle(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(handler = %handler_name, error = %e, "Handler failed");
                    self.unwind(self.middleware.len(), &request).await;
                    return Err(e);
                }
            };
            debug!(handler = %handler_name, response = ?response, "Handler processed");

            match response {
                HandlerResponse::Stop | HandlerResponse::Reply(_) => {
                    let reply_len = match &response {
                        HandlerResponse::Reply(s) => Some(s.len()),
                        _ => None,
                    };
                    info!(
                        handler = %handler_name,
                        reply_len = ?reply_len,
                        "step: handler chain stopped by handler"
                    );
                    final_response = response;
                    break;
                }
                HandlerResponse::Continue | HandlerResponse::Ignore => continue,
            }
        }

        for mw in self.middleware.iter().rev() {
            let mw_name = std::any::type_name_of_val(mw.as_ref());
            mw.after(&request, &final_response).await?;
            info!(middleware = %mw_name, "step: middleware after done");
        }

        info!("step: handler_chain finished");

        Ok(final_response)
    }

    /// Runs `after` with `Stop` for the first `entered` middleware, in reverse.
    /// Errors are logged so the original outcome is what the caller sees.
    async fn unwind(&self, entered: usize, request: &AgentRequest) {
        for mw in self.middleware[..entered].iter().rev() {
            let mw_name = std::any::type_name_of_val(mw.as_ref());
            if let Err(e) = mw.after(request, &HandlerResponse::Stop).await {
                warn!(
                    middleware = %mw_name,
                    error = %e,
                    "Middleware after failed during unwind"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{AgentError, Channel, InboundMessage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn create_test_request(content: &str) -> AgentRequest {
        AgentRequest::new(InboundMessage::new(Channel::Discord, "user-1", "main", content))
    }

    struct CountingMiddleware {
        before_count: Arc<AtomicUsize>,
        after_count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Middleware for CountingMiddleware {
        async fn before(&self, _request: &mut AgentRequest) -> Result<bool> {
            self.before_count.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn after(&self, _request: &AgentRequest, _response: &HandlerResponse) -> Result<()> {
            self.after_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingHandler {
        handle_count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _request: &AgentRequest) -> Result<HandlerResponse> {
            self.handle_count.fetch_add(1, Ordering::SeqCst);
            Ok(HandlerResponse::Continue)
        }
    }

    #[tokio::test]
    async fn test_handler_chain_with_middleware() {
        let before_count = Arc::new(AtomicUsize::new(0));
        let after_count = Arc::new(AtomicUsize::new(0));
        let handle_count = Arc::new(AtomicUsize::new(0));

        let chain = HandlerChain::new()
            .add_middleware(Arc::new(CountingMiddleware {
                before_count: before_count.clone(),
                after_count: after_count.clone(),
            }))
            .add_handler(Arc::new(CountingHandler {
                handle_count: handle_count.clone(),
            }));

        let result = chain.handle(create_test_request("test")).await.unwrap();

        assert_eq!(result, HandlerResponse::Continue);
        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(handle_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_middleware_stops_chain() {
        struct BlockingMiddleware;

        #[async_trait::async_trait]
        impl Middleware for BlockingMiddleware {
            async fn before(&self, _request: &mut AgentRequest) -> Result<bool> {
                Ok(false)
            }
        }

        let handle_count = Arc::new(AtomicUsize::new(0));
        let chain = HandlerChain::new()
            .add_middleware(Arc::new(BlockingMiddleware))
            .add_handler(Arc::new(CountingHandler {
                handle_count: handle_count.clone(),
            }));

        let result = chain.handle(create_test_request("test")).await.unwrap();

        assert_eq!(result, HandlerResponse::Stop);
        assert_eq!(handle_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rewritten_outbound_reaches_handler_and_after() {
        struct PrefixMiddleware;

        #[async_trait::async_trait]
        impl Middleware for PrefixMiddleware {
            async fn before(&self, request: &mut AgentRequest) -> Result<bool> {
                request.outbound = format!("[context]\n\n{}", request.outbound);
                Ok(true)
            }
        }

        struct EchoHandler;

        #[async_trait::async_trait]
        impl Handler for EchoHandler {
            async fn handle(&self, request: &AgentRequest) -> Result<HandlerResponse> {
                Ok(HandlerResponse::Reply(request.outbound.clone()))
            }
        }

        let seen = Arc::new(Mutex::new(None));

        struct CaptureMiddleware {
            seen: Arc<Mutex<Option<(String, String)>>>,
        }

        #[async_trait::async_trait]
        impl Middleware for CaptureMiddleware {
            async fn after(
                &self,
                request: &AgentRequest,
                response: &HandlerResponse,
            ) -> Result<()> {
                if let HandlerResponse::Reply(text) = response {
                    *self.seen.lock().unwrap() =
                        Some((request.message.content.clone(), text.clone()));
                }
                Ok(())
            }
        }

        let chain = HandlerChain::new()
            .add_middleware(Arc::new(CaptureMiddleware { seen: seen.clone() }))
            .add_middleware(Arc::new(PrefixMiddleware))
            .add_handler(Arc::new(EchoHandler));

        let result = chain.handle(create_test_request("hello")).await.unwrap();

        assert_eq!(result, HandlerResponse::Reply("[context]\n\nhello".to_string()));
        let (original, reply) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(original, "hello");
        assert_eq!(reply, "[context]\n\nhello");
    }

    #[tokio::test]
    async fn test_ignore_passes_to_next_handler() {
        struct IgnoreHandler;

        #[async_trait::async_trait]
        impl Handler for IgnoreHandler {
            async fn handle(&self, _request: &AgentRequest) -> Result<HandlerResponse> {
                Ok(HandlerResponse::Ignore)
            }
        }

        struct ReplyHandler;

        #[async_trait::async_trait]
        impl Handler for ReplyHandler {
            async fn handle(&self, _request: &AgentRequest) -> Result<HandlerResponse> {
                Ok(HandlerResponse::Reply("model reply".to_string()))
            }
        }

        let handle_count = Arc::new(AtomicUsize::new(0));
        let chain = HandlerChain::new()
            .add_handler(Arc::new(IgnoreHandler))
            .add_handler(Arc::new(ReplyHandler))
            .add_handler(Arc::new(CountingHandler {
                handle_count: handle_count.clone(),
            }));

        let result = chain.handle(create_test_request("hi")).await.unwrap();

        assert_eq!(result, HandlerResponse::Reply("model reply".to_string()));
        assert_eq!(handle_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multiple_middleware_executed_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));

        struct OrderMiddleware {
            name: &'static str,
            order: Arc<Mutex<Vec<String>>>,
        }

        #[async_trait::async_trait]
        impl Middleware for OrderMiddleware {
            async fn before(&self, _request: &mut AgentRequest) -> Result<bool> {
                self.order.lock().unwrap().push(format!("before_{}", self.name));
                Ok(true)
            }

            async fn after(
                &self,
                _request: &AgentRequest,
                _response: &HandlerResponse,
            ) -> Result<()> {
                self.order.lock().unwrap().push(format!("after_{}", self.name));
                Ok(())
            }
        }

        let chain = HandlerChain::new()
            .add_middleware(Arc::new(OrderMiddleware {
                name: "first",
                order: order.clone(),
            }))
            .add_middleware(Arc::new(OrderMiddleware {
                name: "second",
                order: order.clone(),
            }));

        chain.handle(create_test_request("test")).await.unwrap();

        let executed = order.lock().unwrap();
        assert_eq!(
            *executed,
            vec!["before_first", "before_second", "after_second", "after_first"]
        );
    }

    #[tokio::test]
    async fn test_handler_error_still_runs_after() {
        struct FailingHandler;

        #[async_trait::async_trait]
        impl Handler for FailingHandler {
            async fn handle(&self, _request: &AgentRequest) -> Result<HandlerResponse> {
                Err(AgentError::Model("upstream timeout".to_string()))
            }
        }

        let before_count = Arc::new(AtomicUsize::new(0));
        let after_count = Arc::new(AtomicUsize::new(0));
        let chain = HandlerChain::new()
            .add_middleware(Arc::new(CountingMiddleware {
                before_count: before_count.clone(),
                after_count: after_count.clone(),
            }))
            .add_handler(Arc::new(FailingHandler));

        let result = chain.handle(create_test_request("test")).await;

        assert!(matches!(result, Err(AgentError::Model(_))));
        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_in_later_before_unwinds_earlier_middleware() {
        struct BlockingMiddleware;

        #[async_trait::async_trait]
        impl Middleware for BlockingMiddleware {
            async fn before(&self, _request: &mut AgentRequest) -> Result<bool> {
                Ok(false)
            }

            async fn after(
                &self,
                _request: &AgentRequest,
                _response: &HandlerResponse,
            ) -> Result<()> {
                panic!("after must not run for the middleware that stopped the chain");
            }
        }

        let before_count = Arc::new(AtomicUsize::new(0));
        let after_count = Arc::new(AtomicUsize::new(0));
        let chain = HandlerChain::new()
            .add_middleware(Arc::new(CountingMiddleware {
                before_count: before_count.clone(),
                after_count: after_count.clone(),
            }))
            .add_middleware(Arc::new(BlockingMiddleware));

        let result = chain.handle(create_test_request("test")).await.unwrap();

        assert_eq!(result, HandlerResponse::Stop);
        assert_eq!(before_count.load(Ordering::SeqCst), 1);
        assert_eq!(after_count.load(Ordering::SeqCst), 1);
    }
}
