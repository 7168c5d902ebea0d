pub mod commands;
pub mod config;
pub mod console;
pub mod cooldown;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod loader;
pub mod notify;
pub mod reconcile;
pub mod registry;
pub mod remote;
pub mod shape;

use std::sync::Arc;

use crate::cooldown::CooldownStore;
use crate::loader::DefinitionSource;
use crate::notify::{Notifier, NotifierHandle};
use crate::reconcile::Reconciler;
use crate::registry::{Registry, SharedRegistry};

/// State shared by the gateway handler, the console and every handler.
pub struct Data {
    pub config: config::Config,
    pub registry: SharedRegistry,
    pub cooldowns: CooldownStore,
    pub handlers: commands::HandlerTable,
    pub reconciler: Reconciler,
    pub notifier: Arc<NotifierHandle>,
}

impl Data {
    pub fn new(config: config::Config, source: Arc<dyn DefinitionSource>) -> Self {
        let registry = Registry::shared();
        let notifier = Arc::new(NotifierHandle::default());
        let reconciler = Reconciler::new(
            source,
            registry.clone(),
            notifier.clone() as Arc<dyn Notifier>,
        );
        Self {
            config,
            registry,
            cooldowns: CooldownStore::new(),
            handlers: commands::HandlerTable::builtin(),
            reconciler,
            notifier,
        }
    }
}
