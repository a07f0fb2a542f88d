//! Repository Middleware
//!
//! Handles repository side effects against the active session's PDS:
//! - Loading the collection list once a session is ready
//! - Fetching record pages of the active collection
//! - Deleting marked records in batches
//!
//! Only one page fetch or delete runs at a time; requests arriving while one
//! is in flight are dropped. Marks are frozen while a delete runs, since a
//! partial failure is applied to the marked records.

use crate::actions::{Action, Event, GlobalAction, RecordsAction, SelectionAction};
use crate::deleter::{delete_directives, delete_in_batches};
use crate::dispatcher::Dispatcher;
use crate::domain_models::Notice;
use crate::middleware::{ActiveSession, Connection, Middleware};
use crate::pager::fetch_page;
use crate::state::AppState;
use tokio::runtime::Handle;

/// Repository middleware - collections, pages and deletes
pub struct RepositoryMiddleware {
    runtime: Handle,
    active: ActiveSession,
}

impl RepositoryMiddleware {
    pub fn new(runtime: Handle, active: ActiveSession) -> Self {
        Self { runtime, active }
    }

    fn connection(&self, dispatcher: &Dispatcher) -> Option<Connection> {
        let connection = self.active.get();
        if connection.is_none() {
            dispatcher.dispatch(notice(Notice::error("Not signed in")));
        }
        connection
    }

    fn load_collections(&self, dispatcher: &Dispatcher) -> bool {
        let Some(connection) = self.connection(dispatcher) else {
            return false;
        };
        let dispatcher = dispatcher.clone();

        self.runtime.spawn(async move {
            match connection.client.describe_repo(&connection.did).await {
                Ok(description) => {
                    log::info!(
                        "RepositoryMiddleware: {} collections in {}",
                        description.collections.len(),
                        connection.did
                    );
                    dispatcher.dispatch(Action::Records(RecordsAction::CollectionsLoaded(
                        description.collections,
                    )));
                }
                Err(e) => {
                    log::error!("Failed to describe repository: {:#}", e);
                    dispatcher.dispatch(notice(Notice::error(format!(
                        "Failed to load collections: {:#}, retry with `collections`",
                        e
                    ))));
                }
            }
        });
        true
    }

    fn fetch_next_page(&self, state: &AppState, dispatcher: &Dispatcher) -> bool {
        let repo = &state.repo;
        if repo.is_busy() {
            log::debug!("RepositoryMiddleware: fetch ignored, operation in flight");
            return false;
        }
        let Some(collection) = repo.collection.clone() else {
            dispatcher.dispatch(notice(Notice::error(
                "No collection selected, pick one with `use <collection>`",
            )));
            return false;
        };
        if !repo.has_more() && !repo.records.is_empty() {
            dispatcher.dispatch(notice(Notice::success("All records loaded")));
            return false;
        }
        let Some(connection) = self.connection(dispatcher) else {
            return false;
        };

        let cursor = repo.cursor.clone();
        let dispatcher = dispatcher.clone();
        self.runtime.spawn(async move {
            let result = fetch_page(
                connection.client.as_ref(),
                &connection.did,
                &collection,
                cursor.as_deref(),
            )
            .await;

            let action = match result {
                Ok(page) => RecordsAction::PageLoaded {
                    collection,
                    records: page.records,
                    cursor: page.cursor,
                },
                Err(e) => {
                    log::error!("Failed to list {}: {:#}", collection, e);
                    RecordsAction::LoadFailed {
                        message: format!("{:#}", e),
                    }
                }
            };
            dispatcher.dispatch(Action::Records(action));
        });
        true
    }

    fn delete_marked(&self, state: &AppState, dispatcher: &Dispatcher) -> bool {
        let repo = &state.repo;
        if repo.is_busy() {
            dispatcher.dispatch(notice(Notice::error(
                "Wait for the current operation to finish",
            )));
            return false;
        }
        let Some(collection) = repo.collection.as_deref() else {
            dispatcher.dispatch(notice(Notice::error("No collection selected")));
            return false;
        };
        let Some(connection) = self.connection(dispatcher) else {
            return false;
        };

        // Snapshot of the marks at the time of the request
        let writes = delete_directives(collection, &repo.records);
        let total = writes.len();
        log::info!("RepositoryMiddleware: deleting {} records of {}", total, collection);

        let dispatcher = dispatcher.clone();
        self.runtime.spawn(async move {
            let action = match delete_in_batches(connection.client.as_ref(), &connection.did, &writes)
                .await
            {
                Ok(count) => RecordsAction::Deleted { count },
                Err(e) => RecordsAction::DeleteFailed {
                    deleted: e.deleted,
                    total,
                    message: format!("{:#}", e.source),
                },
            };
            dispatcher.dispatch(Action::Records(action));
        });
        true
    }
}

fn notice(notice: Notice) -> Action {
    Action::Global(GlobalAction::SetNotice(notice))
}

impl Middleware for RepositoryMiddleware {
    fn handle(&mut self, action: &Action, state: &AppState, dispatcher: &Dispatcher) -> bool {
        match action {
            Action::Event(Event::SessionReady { did }) => {
                log::info!("RepositoryMiddleware: session ready for {}", did);
                dispatcher.dispatch(Action::Records(RecordsAction::LoadCollections));
                true
            }

            Action::Records(RecordsAction::LoadCollections) => self.load_collections(dispatcher),

            Action::Records(RecordsAction::SelectCollection(collection)) => {
                if state.repo.is_busy() {
                    dispatcher.dispatch(notice(Notice::error(
                        "Wait for the current operation to finish",
                    )));
                    return false;
                }
                if !state.repo.collections.is_empty()
                    && !state.repo.collections.contains(collection)
                {
                    dispatcher.dispatch(notice(Notice::error(format!(
                        "Unknown collection '{}'",
                        collection
                    ))));
                    return false;
                }
                // Reducer switches the collection first, then the page loads
                dispatcher.dispatch(Action::Records(RecordsAction::FetchPage));
                true
            }

            Action::Records(RecordsAction::FetchPage) => self.fetch_next_page(state, dispatcher),

            Action::Records(RecordsAction::DeleteMarked) => self.delete_marked(state, dispatcher),

            Action::Selection(selection) if state.repo.deleting => {
                if matches!(selection, SelectionAction::ShowSelectedOnly(_)) {
                    return true;
                }
                dispatcher.dispatch(notice(Notice::error(
                    "Wait for the current operation to finish",
                )));
                false
            }

            _ => true,
        }
    }
}
