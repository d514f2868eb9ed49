use tracing::debug;

use crate::mutation::{Mutation, MutationError, MutationRecord};

use super::traits::{Handled, HandlerError, MutationHandler};

/// Outcome of [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler applied the record.
    Handled {
        /// Name of the handler.
        handler: &'static str,
    },
    /// No handler knows the code.
    Unknown,
}

/// Ordered chain of handlers; the first that accepts a code wins.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<Box<dyn MutationHandler>>,
}

impl Dispatcher {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the chain.
    pub fn with_handler(mut self, handler: impl MutationHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Decodes `record` and runs it through the chain.
    pub fn dispatch(&mut self, record: &MutationRecord) -> Result<Dispatch, HandlerError> {
        let mutation = match Mutation::decode(record) {
            Ok(mutation) => mutation,
            Err(MutationError::UnknownCode(_)) => return Ok(Dispatch::Unknown),
            Err(err) => return Err(err.into()),
        };

        for handler in &mut self.handlers {
            if handler.handle(record, &mutation)? == Handled::Done {
                debug!(mutation_id = record.id, handler = handler.name(), "handled");
                return Ok(Dispatch::Handled {
                    handler: handler.name(),
                });
            }
        }
        Ok(Dispatch::Unknown)
    }
}
