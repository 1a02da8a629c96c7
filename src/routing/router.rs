//! Database routers
//!
//! A router tells the host ORM which alias should serve an operation. Every
//! hook may answer `None` to defer to the next router in the chain, and
//! [`RouterChain`] supplies the framework default when nobody answers.

use crate::routing::aliases;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Routing hints passed by the ORM alongside a model (e.g. `instance`)
pub type Hints = Map<String, Value>;

/// Minimal view of a data-model entity as seen by routers
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    fn app_label(&self) -> &str {
        ""
    }

    /// Alias this record was loaded from, if it is a persisted instance
    fn db(&self) -> Option<&str> {
        None
    }
}

/// The routing extension point of the host framework
pub trait DatabaseRouter: Send + Sync {
    fn db_for_read(&self, _model: &dyn Model, _hints: &Hints) -> Option<String> {
        None
    }

    fn db_for_write(&self, _model: &dyn Model, _hints: &Hints) -> Option<String> {
        None
    }

    /// May a relation be created between two records
    fn allow_relation(&self, _a: &dyn Model, _b: &dyn Model) -> Option<bool> {
        None
    }

    /// Legacy synchronous table creation
    fn allow_syncdb(&self, _db: &str, _model: &dyn Model) -> Option<bool> {
        None
    }

    fn allow_migrate(
        &self,
        _db: &str,
        _app_label: &str,
        _model_name: Option<&str>,
        _hints: &Hints,
    ) -> Option<bool> {
        None
    }
}

/// Routes every read and write to the aliases selected by the innermost
/// active override of the calling context. Model and hints are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicDbRouter;

impl DynamicDbRouter {
    pub fn new() -> Self {
        Self
    }
}

impl DatabaseRouter for DynamicDbRouter {
    fn db_for_read(&self, _model: &dyn Model, _hints: &Hints) -> Option<String> {
        Some(aliases::current_read())
    }

    fn db_for_write(&self, _model: &dyn Model, _hints: &Hints) -> Option<String> {
        Some(aliases::current_write())
    }

    fn allow_relation(&self, _a: &dyn Model, _b: &dyn Model) -> Option<bool> {
        Some(true)
    }

    fn allow_syncdb(&self, _db: &str, _model: &dyn Model) -> Option<bool> {
        None
    }

    fn allow_migrate(
        &self,
        _db: &str,
        _app_label: &str,
        _model_name: Option<&str>,
        _hints: &Hints,
    ) -> Option<bool> {
        None
    }
}

/// Ordered list of routers consulted by the ORM; the first answer wins
#[derive(Clone, Default)]
pub struct RouterChain {
    routers: Vec<Arc<dyn DatabaseRouter>>,
}

impl RouterChain {
    pub fn new() -> Self {
        Self {
            routers: Vec::new(),
        }
    }

    /// Chain holding only a [`DynamicDbRouter`]
    pub fn dynamic() -> Self {
        Self::new().with(DynamicDbRouter)
    }

    pub fn with<R: DatabaseRouter + 'static>(mut self, router: R) -> Self {
        self.routers.push(Arc::new(router));
        self
    }

    pub fn push(&mut self, router: Arc<dyn DatabaseRouter>) {
        self.routers.push(router);
    }

    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    pub fn db_for_read(&self, model: &dyn Model, hints: &Hints) -> String {
        self.routers
            .iter()
            .find_map(|r| r.db_for_read(model, hints))
            .unwrap_or_else(|| Self::fallback_alias(hints))
    }

    pub fn db_for_write(&self, model: &dyn Model, hints: &Hints) -> String {
        self.routers
            .iter()
            .find_map(|r| r.db_for_write(model, hints))
            .unwrap_or_else(|| Self::fallback_alias(hints))
    }

    /// Without an opinion, records may only be related within one database
    pub fn allow_relation(&self, a: &dyn Model, b: &dyn Model) -> bool {
        self.routers
            .iter()
            .find_map(|r| r.allow_relation(a, b))
            .unwrap_or_else(|| a.db() == b.db())
    }

    pub fn allow_syncdb(&self, db: &str, model: &dyn Model) -> bool {
        self.routers
            .iter()
            .find_map(|r| r.allow_syncdb(db, model))
            .unwrap_or(true)
    }

    pub fn allow_migrate(
        &self,
        db: &str,
        app_label: &str,
        model_name: Option<&str>,
        hints: &Hints,
    ) -> bool {
        self.routers
            .iter()
            .find_map(|r| r.allow_migrate(db, app_label, model_name, hints))
            .unwrap_or(true)
    }

    // An `instance` hint carrying a `db` pins the operation to that alias
    fn fallback_alias(hints: &Hints) -> String {
        hints
            .get("instance")
            .and_then(|instance| instance.get("db"))
            .and_then(Value::as_str)
            .unwrap_or_else(|| aliases::default_alias())
            .to_string()
    }
}

impl std::fmt::Debug for RouterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterChain")
            .field("routers", &self.routers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::aliases::{scoped, AliasSnapshot};
    use serde_json::json;

    struct Invoice {
        db: Option<&'static str>,
    }

    impl Model for Invoice {
        fn name(&self) -> &str {
            "invoice"
        }

        fn app_label(&self) -> &str {
            "billing"
        }

        fn db(&self) -> Option<&str> {
            self.db
        }
    }

    struct ArchiveRouter;

    impl DatabaseRouter for ArchiveRouter {
        fn db_for_read(&self, model: &dyn Model, _hints: &Hints) -> Option<String> {
            (model.app_label() == "archive").then(|| "archive".to_string())
        }

        fn allow_migrate(
            &self,
            db: &str,
            _app_label: &str,
            _model_name: Option<&str>,
            _hints: &Hints,
        ) -> Option<bool> {
            (db == "archive").then_some(false)
        }
    }

    #[tokio::test]
    async fn test_dynamic_router_follows_aliases() {
        let router = DynamicDbRouter::new();
        let model = Invoice { db: None };
        let hints = Hints::new();

        let (read, write) = scoped(AliasSnapshot::new("replica", "primary"), async {
            (
                router.db_for_read(&model, &hints),
                router.db_for_write(&model, &hints),
            )
        })
        .await;

        assert_eq!(read.as_deref(), Some("replica"));
        assert_eq!(write.as_deref(), Some("primary"));
    }

    #[test]
    fn test_dynamic_router_permissive_hooks() {
        let router = DynamicDbRouter;
        let a = Invoice { db: Some("default") };
        let b = Invoice { db: Some("replica") };

        assert_eq!(router.allow_relation(&a, &b), Some(true));
        assert_eq!(router.allow_syncdb("replica", &a), None);
        assert_eq!(router.allow_migrate("replica", "billing", None, &Hints::new()), None);
    }

    #[test]
    fn test_empty_chain_fallbacks() {
        let chain = RouterChain::new();
        let a = Invoice { db: Some("default") };
        let b = Invoice { db: Some("replica") };

        assert!(!chain.allow_relation(&a, &b));
        assert!(chain.allow_relation(&a, &Invoice { db: Some("default") }));
        assert!(chain.allow_migrate("replica", "billing", None, &Hints::new()));
        assert!(chain.allow_syncdb("replica", &a));
    }

    #[test]
    fn test_instance_hint_pins_fallback() {
        let chain = RouterChain::new();
        let hints = json!({ "instance": { "db": "replica" } });
        let hints = hints.as_object().unwrap();

        assert_eq!(chain.db_for_read(&Invoice { db: None }, hints), "replica");
        assert_eq!(
            chain.db_for_write(&Invoice { db: None }, &Hints::new()),
            aliases::default_alias()
        );
    }

    #[test]
    fn test_first_opinion_wins() {
        let chain = RouterChain::new().with(ArchiveRouter).with(DynamicDbRouter);
        assert_eq!(chain.len(), 2);

        assert!(!chain.allow_migrate("archive", "billing", None, &Hints::new()));
        assert!(chain.allow_migrate("default", "billing", None, &Hints::new()));
        assert_eq!(
            chain.db_for_read(&Invoice { db: None }, &Hints::new()),
            aliases::current_read()
        );
    }
}
