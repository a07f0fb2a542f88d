use crate::actions::Action;
use crate::dispatcher::Dispatcher;
use crate::middleware::Middleware;
use crate::reducers::app_reducer::reduce;
use crate::state::AppState;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

/// Store - holds application state and manages the Redux loop
///
/// The only writer of [`AppState`]. Actions run through the middleware chain
/// and then the reducer; actions dispatched meanwhile are queued and handled
/// in order afterwards.
pub struct Store {
    state: AppState,
    middleware: Vec<Box<dyn Middleware>>,
    dispatcher: Dispatcher,
    action_rx: Receiver<Action>,
}

impl Store {
    pub fn new(initial_state: AppState) -> Self {
        let (action_tx, action_rx) = mpsc::channel();
        Self {
            state: initial_state,
            middleware: Vec::new(),
            dispatcher: Dispatcher::new(action_tx),
            action_rx,
        }
    }

    /// Add middleware to the store
    pub fn add_middleware(&mut self, middleware: Box<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Get the current state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Process an action and everything queued while doing so
    pub fn dispatch(&mut self, action: Action) {
        self.process(action);

        while let Ok(action) = self.action_rx.try_recv() {
            self.process(action);
        }
    }

    /// Wait up to `timeout` for an action from a background task
    ///
    /// Returns true if an action was processed.
    pub fn wait_for_action(&mut self, timeout: Duration) -> bool {
        match self.action_rx.recv_timeout(timeout) {
            Ok(action) => {
                self.dispatch(action);
                true
            }
            Err(_) => false,
        }
    }

    fn process(&mut self, action: Action) {
        // Pass through middleware chain
        for middleware in &mut self.middleware {
            if !middleware.handle(&action, &self.state, &self.dispatcher) {
                return;
            }
        }

        // Events are for middleware only
        if !matches!(action, Action::Event(_)) {
            self.state = reduce(self.state.clone(), &action);
        }
    }
}
