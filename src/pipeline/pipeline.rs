//! Middleware pipeline and its continuation.

use std::fmt;

use crate::context::RequestContext;
use crate::error::Result;
use crate::http::response::Response;
use crate::pipeline::{Handler, Middleware};

/// Ordered middleware with an optional terminal handler.
///
/// Stages run in the order they were piped. The fallback runs only when
/// every stage continued the chain.
#[derive(Default)]
pub struct MiddlewarePipeline<'a> {
    stages: Vec<Box<dyn Middleware + 'a>>,
    fallback: Option<Box<dyn Handler + 'a>>,
}

impl<'a> MiddlewarePipeline<'a> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            fallback: None,
        }
    }

    /// Append a stage.
    pub fn pipe(&mut self, middleware: impl Middleware + 'a) -> &mut Self {
        self.stages.push(Box::new(middleware));
        self
    }

    /// Append an already boxed stage.
    pub fn pipe_boxed(&mut self, middleware: Box<dyn Middleware + 'a>) -> &mut Self {
        self.stages.push(middleware);
        self
    }

    /// Set the terminal handler, replacing any previous one.
    pub fn set_fallback(&mut self, handler: impl Handler + 'a) -> &mut Self {
        self.fallback = Some(Box::new(handler));
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run the chain from the first stage.
    ///
    /// Errors from any stage or the fallback are returned as they are.
    pub fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        self.process_from(request, response, 0)
    }

    fn process_from(
        &self,
        request: &mut RequestContext,
        response: &mut Response,
        index: usize,
    ) -> Result<()> {
        match self.stages.get(index) {
            Some(stage) => {
                let next = Next {
                    pipeline: self,
                    index: index + 1,
                };
                stage.process(request, response, next)
            }
            None => match &self.fallback {
                Some(fallback) => fallback.handle(request, response),
                None => Ok(()),
            },
        }
    }
}

impl Handler for MiddlewarePipeline<'_> {
    fn handle(&self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        MiddlewarePipeline::handle(self, request, response)
    }
}

impl fmt::Debug for MiddlewarePipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("stages", &self.stages.len())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

/// The rest of the chain, handed to one middleware stage.
///
/// `run` consumes the continuation: it can move the chain forward exactly
/// one step, once. It cannot be cloned or rewound.
pub struct Next<'p> {
    pipeline: &'p MiddlewarePipeline<'p>,
    index: usize,
}

impl Next<'_> {
    /// Continue with the next stage, or the fallback after the last one.
    pub fn run(self, request: &mut RequestContext, response: &mut Response) -> Result<()> {
        self.pipeline.process_from(request, response, self.index)
    }

    /// Stages still ahead of this continuation.
    pub fn remaining(&self) -> usize {
        self.pipeline.stages.len().saturating_sub(self.index)
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}
