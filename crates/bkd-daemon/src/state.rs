//! Shared runtime state for bkd-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Every collaborator is
//! injected behind a trait object with explicit lifecycle — the store is
//! opened at startup, never reached through module globals.

use std::sync::Arc;

use bkd_db::{MemStore, ReservationStore};
use bkd_notify::{ConsoleMailer, DocumentRenderer, EmailSender, TextRenderer};

/// Static build metadata included in the health response.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReservationStore>,
    pub mailer: Arc<dyn EmailSender>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        mailer: Arc<dyn EmailSender>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            store,
            mailer,
            renderer,
            build: BuildInfo {
                service: "bkd-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }

    /// Fully in-memory state: memory store, console mailer, text renderer.
    ///
    /// Used by dev mode (`store: memory`) and by the scenario tests, which
    /// also get handles to the concrete store and mailer for seeding and
    /// transcript assertions.
    pub fn in_memory() -> (Arc<AppState>, Arc<MemStore>, Arc<ConsoleMailer>) {
        let store = Arc::new(MemStore::new());
        let mailer = Arc::new(ConsoleMailer::new());
        let store_dyn: Arc<dyn ReservationStore> = store.clone();
        let mailer_dyn: Arc<dyn EmailSender> = mailer.clone();
        let state = Arc::new(AppState::new(
            store_dyn,
            mailer_dyn,
            Arc::new(TextRenderer::new()),
        ));
        (state, store, mailer)
    }
}
