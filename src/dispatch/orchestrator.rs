//! Dispatch orchestrator.
//!
//! Per message event: build the index if the registry changed, pre-check,
//! resolve, validate filters, bind and run the handler; then run every pure
//! filter handler. Notice and request events go to their event handlers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::notify::{LogSink, Notification, NotificationKind, NotificationSink};
use super::plugin::{LoadedPlugins, Plugin, PluginContextProvider, PluginRegistrar};
use crate::cache::{CacheConfig, TypedCache};
use crate::command::{CommandRegistry, CommandSpec, Handler, Invocation, PluginContext, tokenize};
use crate::config::DispatchConfig;
use crate::error::{BuildError, PluginError, RegistryError};
use crate::event::SharedEvent;
use crate::filters::{EventHandler, FilterHandler, FilterRegistry, validate_filters};
use crate::trigger::{ArgumentBinder, BindResult, CommandResolver, MatchResult, MessagePreprocessor, ResolverState};

/// A built index together with the preprocessor matching its prefixes.
#[derive(Debug)]
struct CommandIndex {
    resolver: CommandResolver,
    preprocessor: MessagePreprocessor,
}

/// Last build outcome, tagged with the registry generation it came from.
enum IndexSlot {
    Invalidated,
    Ready { generation: u64, index: Arc<CommandIndex> },
    Failed { generation: u64, error: BuildError },
}

/// Owns the command registry, the filter registry and the resolver index.
pub struct CommandDispatcher {
    config: DispatchConfig,
    registry: Arc<CommandRegistry>,
    filters: FilterRegistry,
    binder: ArgumentBinder,
    index: RwLock<IndexSlot>,
    build_lock: Mutex<()>,
    sink: Arc<dyn NotificationSink>,
    loaded: Arc<LoadedPlugins>,
    contexts: Arc<dyn PluginContextProvider>,
    context_memo: TypedCache<String, Option<PluginContext>>,
}

impl CommandDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let loaded = Arc::new(LoadedPlugins::default());
        Self {
            binder: ArgumentBinder::new(config.case_sensitive),
            config,
            registry: Arc::new(CommandRegistry::new()),
            filters: FilterRegistry::new(),
            index: RwLock::new(IndexSlot::Invalidated),
            build_lock: Mutex::new(()),
            sink: Arc::new(LogSink),
            contexts: Arc::clone(&loaded) as Arc<dyn PluginContextProvider>,
            loaded,
            context_memo: TypedCache::new("plugin_contexts", CacheConfig::plugin_contexts()),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the default provider, which serves [`Plugin::context`] of
    /// plugins loaded through [`Self::load_plugin`].
    #[must_use]
    pub fn with_context_provider(mut self, provider: Arc<dyn PluginContextProvider>) -> Self {
        self.contexts = provider;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn register_command(&self, spec: CommandSpec) -> Result<Arc<CommandSpec>, RegistryError> {
        self.registry.register(spec)
    }

    pub fn register_filter(&self, handler: FilterHandler) -> u64 {
        self.filters.register_filter(handler)
    }

    pub fn register_event_handler(&self, handler: EventHandler) -> u64 {
        self.filters.register_event(handler)
    }

    // =========================================================================
    // Plugin lifecycle
    // =========================================================================

    /// Register a plugin and build the index.
    ///
    /// Loading a plugin that is already loaded replaces its registrations.
    /// On any registration or build error the plugin is rolled back
    /// completely.
    pub fn load_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().to_string();

        self.registry.revoke_plugin(&name);
        self.filters.revoke_plugin(&name);

        let registrar = PluginRegistrar::new(self, name.clone());
        if let Err(e) = plugin.register(&registrar) {
            warn!("Plugin '{}' failed to register: {}", name, e);
            self.unload_plugin(&name);
            return Err(e);
        }

        self.loaded.insert(plugin);
        self.on_plugin_loaded(&name);

        if let Err(e) = self.prepare() {
            warn!("Plugin '{}' rolled back: {}", name, e);
            self.unload_plugin(&name);
            return Err(e.into());
        }

        info!(
            "Loaded plugin '{}' ({} commands)",
            name,
            self.registry.commands_of(&name).len()
        );
        Ok(())
    }

    /// Unload a plugin. Returns whether it was loaded through
    /// [`Self::load_plugin`].
    pub fn unload_plugin(&self, name: &str) -> bool {
        let was_loaded = self.loaded.remove(name);
        self.on_plugin_unloaded(name);
        was_loaded
    }

    pub fn loaded_plugins(&self) -> Vec<String> {
        self.loaded.names()
    }

    pub fn on_plugin_loaded(&self, name: &str) {
        debug!("Plugin '{}' loaded, invalidating index", name);
        self.invalidate_index();
        self.context_memo.invalidate_all();
    }

    /// Revoke everything `name` registered.
    pub fn on_plugin_unloaded(&self, name: &str) {
        let commands = self.registry.revoke_plugin(name);
        let handlers = self.filters.revoke_plugin(name);
        self.invalidate_index();
        self.context_memo.invalidate_all();
        info!(
            "Plugin '{}' unloaded ({} commands, {} handlers revoked)",
            name, commands, handlers
        );
    }

    /// Drop the built index and memoized plugin contexts.
    pub fn clear_caches(&self) {
        self.invalidate_index();
        self.context_memo.invalidate_all();
    }

    // =========================================================================
    // Index
    // =========================================================================

    /// Build the index now instead of on the next message.
    pub fn prepare(&self) -> Result<(), BuildError> {
        self.current_index().map(|_| ())
    }

    /// State of the last build.
    pub fn index_state(&self) -> ResolverState {
        match &*self.index.read() {
            IndexSlot::Invalidated => ResolverState::Empty,
            IndexSlot::Ready { index, .. } => index.resolver.state(),
            IndexSlot::Failed { .. } => ResolverState::Error,
        }
    }

    fn invalidate_index(&self) {
        *self.index.write() = IndexSlot::Invalidated;
    }

    /// Index for the current registry generation, building it if needed.
    ///
    /// A failed build is remembered for its generation, so the same error
    /// comes back on every call until the registry changes.
    fn current_index(&self) -> Result<Arc<CommandIndex>, BuildError> {
        if let Some(index) = self.cached_index(self.registry.generation())? {
            return Ok(index);
        }

        let _guard = self.build_lock.lock();
        if let Some(index) = self.cached_index(self.registry.generation())? {
            return Ok(index);
        }

        let snapshot = self.registry.snapshot();
        let mut resolver = CommandResolver::new(snapshot.prefixes.iter().cloned(), self.config.case_sensitive);

        match resolver.build_index(&snapshot.commands, &snapshot.aliases) {
            Ok(()) => {
                let index = Arc::new(CommandIndex {
                    preprocessor: MessagePreprocessor::new(
                        snapshot.prefixes,
                        self.config.require_prefix,
                        self.config.case_sensitive,
                    ),
                    resolver,
                });
                *self.index.write() = IndexSlot::Ready {
                    generation: snapshot.generation,
                    index: Arc::clone(&index),
                };
                Ok(index)
            }
            Err(error) => {
                *self.index.write() = IndexSlot::Failed {
                    generation: snapshot.generation,
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }

    fn cached_index(&self, generation: u64) -> Result<Option<Arc<CommandIndex>>, BuildError> {
        match &*self.index.read() {
            IndexSlot::Ready { generation: built, index } if *built == generation => Ok(Some(Arc::clone(index))),
            IndexSlot::Failed { generation: built, error } if *built == generation => Err(error.clone()),
            _ => Ok(None),
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Route an event by post type.
    ///
    /// Returns whether any command or event handler was invoked.
    pub async fn handle_event(&self, event: SharedEvent) -> Result<bool, BuildError> {
        let post_type = event.post_type();
        if post_type.is_message() {
            return self.handle_message_event(event).await;
        }

        let mut invoked = false;
        for handler in self.filters.event_handlers(post_type) {
            if !validate_filters(&handler.meta(), &handler.filters, event.as_ref()) {
                continue;
            }
            let invocation = self.invocation(&event, BindResult::default(), None, &handler.owning_plugin);
            self.execute(&handler.handler, invocation, &handler.name, &event).await;
            invoked = true;
        }
        Ok(invoked)
    }

    /// Resolve and run at most one command, then every pure filter handler.
    ///
    /// Returns `Ok(true)` if a command handler was invoked. Only index
    /// build errors are returned; bind and handler failures go to the
    /// notification sink.
    pub async fn handle_message_event(&self, event: SharedEvent) -> Result<bool, BuildError> {
        let index = self.current_index()?;

        let invoked = match self.resolve(&index, &event) {
            Some(matched) => self.run_command(matched, &event).await,
            None => false,
        };

        self.run_filter_handlers(&event).await;
        Ok(invoked)
    }

    fn resolve(&self, index: &CommandIndex, event: &SharedEvent) -> Option<MatchResult> {
        let pre = index.preprocessor.precheck(event.as_ref())?;

        let first_word = pre.command_text.split_whitespace().next()?;
        if !index.resolver.may_match(first_word) {
            return None;
        }

        let tokens = tokenize(&pre.command_text);
        let (prefix, matched) = index.resolver.resolve_from_tokens(&tokens);
        let matched = matched?;

        if !matched.command.accepts_prefix(&prefix, self.config.case_sensitive) {
            debug!(
                "Command '{}' does not accept prefix '{}'",
                matched.command.name(),
                prefix
            );
            return None;
        }

        Some(matched)
    }

    async fn run_command(&self, matched: MatchResult, event: &SharedEvent) -> bool {
        let spec = &matched.command;
        let name = spec.name();

        if !validate_filters(&spec.meta(), &spec.filters, event.as_ref()) {
            return false;
        }

        let args = match self.binder.bind(spec, event.as_ref(), matched.path_len, &spec.prefixes) {
            Ok(args) => args,
            Err(e) => {
                debug!("Bind failed for '{}': {}", name, e);
                self.sink.publish(Notification::new(
                    NotificationKind::BindFailed,
                    Arc::clone(event),
                    e.to_string(),
                    Some(name),
                ));
                return false;
            }
        };

        info!(
            command = %name,
            chat_id = event.chat_id(),
            sender_id = event.sender_id(),
            via_alias = matched.via_alias,
            blocking = !spec.handler.is_async(),
            "Dispatching command"
        );

        let invocation = self.invocation(event, args, Some(name.clone()), &spec.owning_plugin);
        self.execute(&spec.handler, invocation, &name, event).await;
        true
    }

    async fn run_filter_handlers(&self, event: &SharedEvent) {
        for handler in self.filters.filter_handlers() {
            if !validate_filters(&handler.meta(), &handler.filters, event.as_ref()) {
                continue;
            }
            let invocation = self.invocation(event, BindResult::default(), None, &handler.owning_plugin);
            self.execute(&handler.handler, invocation, &handler.name, event).await;
        }
    }

    fn invocation(&self, event: &SharedEvent, args: BindResult, command: Option<String>, plugin: &str) -> Invocation {
        Invocation {
            event: Arc::clone(event),
            args,
            command,
            plugin: self.plugin_context(plugin),
        }
    }

    fn plugin_context(&self, plugin: &str) -> Option<PluginContext> {
        if plugin.is_empty() {
            return None;
        }
        self.context_memo
            .get_or_insert_with(plugin.to_string(), || self.contexts.context(plugin))
    }

    /// Run a handler; failures are logged and published, never returned.
    async fn execute(&self, handler: &Handler, invocation: Invocation, name: &str, event: &SharedEvent) {
        if let Err(message) = run_handler(handler.clone(), invocation).await {
            warn!(handler = name, chat_id = event.chat_id(), "Handler failed: {}", message);
            self.sink.publish(Notification::new(
                NotificationKind::ExecutionFailed,
                Arc::clone(event),
                message,
                Some(name.to_string()),
            ));
        }
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("filters", &self.filters.len())
            .field("index_state", &self.index_state())
            .finish()
    }
}

/// Sync handlers go to the blocking pool; async ones are awaited here.
async fn run_handler(handler: Handler, invocation: Invocation) -> Result<(), String> {
    match handler {
        Handler::Sync(f) => match tokio::task::spawn_blocking(move || f(invocation)).await {
            Ok(result) => result.map_err(|e| format!("{e:#}")),
            Err(e) if e.is_panic() => Err(format!("handler panicked: {}", panic_message(e.into_panic()))),
            Err(e) => Err(format!("handler task failed: {e}")),
        },
        Handler::Async(f) => match AssertUnwindSafe(async move { f(invocation).await }).catch_unwind().await {
            Ok(result) => result.map_err(|e| format!("{e:#}")),
            Err(payload) => Err(format!("handler panicked: {}", panic_message(payload))),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::command::{ParamSpec, ParamType, Value};
    use crate::dispatch::ChannelSink;
    use crate::event::{PostType, Role};
    use crate::filters::Filter;
    use crate::testing::TestEvent;

    type Setup = dyn Fn(&PluginRegistrar<'_>) -> Result<(), PluginError> + Send + Sync;

    struct TestPlugin {
        name: &'static str,
        setup: Box<Setup>,
        context: Option<PluginContext>,
    }

    impl TestPlugin {
        fn new<F>(name: &'static str, setup: F) -> Arc<Self>
        where
            F: Fn(&PluginRegistrar<'_>) -> Result<(), PluginError> + Send + Sync + 'static,
        {
            Self::with_context(name, None, setup)
        }

        fn with_context<F>(name: &'static str, context: Option<PluginContext>, setup: F) -> Arc<Self>
        where
            F: Fn(&PluginRegistrar<'_>) -> Result<(), PluginError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                name,
                setup: Box::new(setup),
                context,
            })
        }
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError> {
            (self.setup)(registrar)
        }

        fn context(&self) -> Option<PluginContext> {
            self.context.clone()
        }
    }

    fn dispatcher() -> (CommandDispatcher, UnboundedReceiver<Notification>) {
        let (sink, rx) = ChannelSink::new();
        (CommandDispatcher::new(DispatchConfig::default()).with_sink(Arc::new(sink)), rx)
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting(hits: &Arc<AtomicUsize>) -> Handler {
        let hits = Arc::clone(hits);
        Handler::from_fn(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn ban_plugin(banned: Arc<Mutex<Vec<i64>>>) -> Arc<TestPlugin> {
        TestPlugin::new("admin", move |r| {
            let banned = Arc::clone(&banned);
            r.command(
                CommandSpec::new(
                    "ban",
                    Handler::from_async(move |inv: Invocation| {
                        let banned = Arc::clone(&banned);
                        async move {
                            let user_id = inv.arg(0).and_then(Value::as_int).unwrap_or_default();
                            banned.lock().push(user_id);
                            inv.reply(format!("banned {user_id}")).await
                        }
                    }),
                )
                .param(ParamSpec::required("user_id", ParamType::Int))
                .filter(Filter::group_only())
                .filter(Filter::admin_only()),
            )
        })
    }

    #[tokio::test]
    async fn test_admin_ban_scenario() {
        let (dispatcher, mut rx) = dispatcher();
        let banned = Arc::new(Mutex::new(Vec::new()));
        dispatcher.load_plugin(ban_plugin(Arc::clone(&banned))).unwrap();

        let admin = Arc::new(TestEvent::group("/ban 12345").with_role(Role::Admin));
        assert!(dispatcher.handle_message_event(admin.clone()).await.unwrap());
        assert_eq!(*banned.lock(), vec![12345]);
        assert_eq!(admin.replies(), vec!["banned 12345"]);

        let member = Arc::new(TestEvent::group("/ban 12345"));
        assert!(!dispatcher.handle_message_event(member.clone()).await.unwrap());
        let private = Arc::new(TestEvent::private("/ban 12345").with_role(Role::Admin));
        assert!(!dispatcher.handle_message_event(private).await.unwrap());
        assert_eq!(banned.lock().len(), 1);
        assert!(member.replies().is_empty());
        assert!(rx.try_recv().is_err());

        let bad = Arc::new(TestEvent::group("/ban abc").with_role(Role::Admin));
        assert!(!dispatcher.handle_message_event(bad).await.unwrap());
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.kind, NotificationKind::BindFailed);
        assert_eq!(notification.command_name.as_deref(), Some("ban"));
        assert!(notification.message.contains("user_id"));
        assert_eq!(banned.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unload_revokes_everything() {
        let (dispatcher, _rx) = dispatcher();
        let hits = counter();
        let filter_hits = counter();

        let (h, f) = (Arc::clone(&hits), Arc::clone(&filter_hits));
        dispatcher
            .load_plugin(TestPlugin::new("fun", move |r| {
                r.command(CommandSpec::new("ping", counting(&h)))?;
                r.filter(FilterHandler::new("watch", counting(&f)));
                r.event(EventHandler::new("greet", PostType::Notice, counting(&f)));
                Ok(())
            }))
            .unwrap();
        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/ping"))).await.unwrap());

        assert!(dispatcher.unload_plugin("fun"));
        assert!(!dispatcher.unload_plugin("fun"));
        assert!(dispatcher.registry().is_empty());
        assert!(dispatcher.filters().is_empty());
        assert!(dispatcher.loaded_plugins().is_empty());

        assert!(!dispatcher.handle_message_event(Arc::new(TestEvent::private("/ping"))).await.unwrap());
        let notice = Arc::new(TestEvent::group("").with_post_type(PostType::Notice));
        assert!(!dispatcher.handle_event(notice).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(filter_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let (dispatcher, _rx) = dispatcher();
        let hits = counter();
        let filter_hits = counter();

        let (h, f) = (Arc::clone(&hits), Arc::clone(&filter_hits));
        let plugin = TestPlugin::new("core", move |r| {
            r.command(CommandSpec::new("user info", counting(&h)).alias("whois"))?;
            r.command(CommandSpec::new("user list", counting(&h)))?;
            r.filter(FilterHandler::new("watch", counting(&f)));
            Ok(())
        });

        dispatcher.load_plugin(plugin.clone()).unwrap();
        dispatcher.load_plugin(plugin).unwrap();

        assert_eq!(dispatcher.registry().len(), 2);
        assert_eq!(dispatcher.registry().all_aliases().len(), 1);
        assert_eq!(dispatcher.filters().len(), 1);
        assert_eq!(dispatcher.loaded_plugins(), vec!["core"]);

        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("!whois"))).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(filter_hits.load(Ordering::SeqCst), 1);
    }

    /// `(prefix, command, path_len)` for each input against the current index.
    fn outcomes(dispatcher: &CommandDispatcher, inputs: &[&str]) -> Vec<Option<(String, String, usize)>> {
        let index = dispatcher.current_index().unwrap();
        inputs
            .iter()
            .map(|text| {
                let event: SharedEvent = Arc::new(TestEvent::private(text));
                let matched = dispatcher.resolve(&index, &event)?;
                let (prefix, _) = index.resolver.resolve_from_tokens(&tokenize(text));
                Some((prefix, matched.command.name(), matched.path_len))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unload_then_reload_resolves_identically() {
        let (dispatcher, _rx) = dispatcher();
        let hits = counter();
        let h = Arc::clone(&hits);
        let plugin = TestPlugin::new("users", move |r| {
            r.command(CommandSpec::new("user", counting(&h)))?;
            r.command(CommandSpec::new("user info", counting(&h)).alias("whois"))?;
            r.command(CommandSpec::new("user list", counting(&h)).prefixes(["/"]))
        });
        let inputs = ["/user info bob", "!USER info", "!whois bob", "/user list", "!user list", "/user", "/nothing", "user info"];

        dispatcher.load_plugin(plugin.clone()).unwrap();
        let before = outcomes(&dispatcher, &inputs);
        assert_eq!(
            before,
            vec![
                Some(("/".to_string(), "user info".to_string(), 2)),
                Some(("!".to_string(), "user info".to_string(), 2)),
                Some(("!".to_string(), "user info".to_string(), 1)),
                Some(("/".to_string(), "user list".to_string(), 2)),
                None,
                Some(("/".to_string(), "user".to_string(), 1)),
                None,
                None,
            ]
        );

        assert!(dispatcher.unload_plugin("users"));
        assert!(outcomes(&dispatcher, &inputs).iter().all(Option::is_none));
        assert!(!dispatcher.handle_message_event(Arc::new(TestEvent::private("/user info"))).await.unwrap());

        dispatcher.load_plugin(plugin).unwrap();
        assert_eq!(outcomes(&dispatcher, &inputs), before);
        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/user info"))).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefix_conflict_blocks_dispatch_until_fixed() {
        let (dispatcher, _rx) = dispatcher();
        let hits = counter();
        dispatcher
            .register_command(CommandSpec::new("a", counting(&hits)).prefixes(["!"]).owned_by("one"))
            .unwrap();
        dispatcher
            .register_command(CommandSpec::new("b", counting(&hits)).prefixes(["!!"]).owned_by("two"))
            .unwrap();

        let expected = BuildError::PrefixConflict {
            shorter: "!".into(),
            longer: "!!".into(),
        };
        for _ in 0..2 {
            let err = dispatcher
                .handle_message_event(Arc::new(TestEvent::private("!a")))
                .await
                .unwrap_err();
            assert_eq!(err, expected);
            assert_eq!(dispatcher.index_state(), ResolverState::Error);
        }

        dispatcher.on_plugin_unloaded("two");
        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("!a"))).await.unwrap());
        assert_eq!(dispatcher.index_state(), ResolverState::Built);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_plugin_rolls_back_on_conflicts() {
        let (dispatcher, _rx) = dispatcher();
        let hits = counter();

        let h = Arc::clone(&hits);
        dispatcher
            .load_plugin(TestPlugin::new("one", move |r| {
                r.command(CommandSpec::new("a", counting(&h)).prefixes(["!"]))
            }))
            .unwrap();

        let h = Arc::clone(&hits);
        let err = dispatcher
            .load_plugin(TestPlugin::new("two", move |r| {
                r.filter(FilterHandler::new("noise", counting(&h)));
                r.command(CommandSpec::new("b", counting(&h)).prefixes(["!!"]))
            }))
            .unwrap_err();
        assert!(matches!(err, PluginError::Build(BuildError::PrefixConflict { .. })));

        let h = Arc::clone(&hits);
        let err = dispatcher
            .load_plugin(TestPlugin::new("three", move |r| r.command(CommandSpec::new("a", counting(&h)))))
            .unwrap_err();
        assert!(matches!(err, PluginError::Registry(RegistryError::DuplicatePath { .. })));

        assert_eq!(dispatcher.loaded_plugins(), vec!["one"]);
        assert!(dispatcher.filters().is_empty());
        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("!a"))).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_longest_path_and_prefix_rules() {
        let (dispatcher, _rx) = dispatcher();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for path in ["user", "user info"] {
            let seen = Arc::clone(&seen);
            dispatcher
                .register_command(
                    CommandSpec::new(
                        path,
                        Handler::from_fn(move |inv| {
                            seen.lock().push((inv.command.clone().unwrap_or_default(), inv.args.clone()));
                            Ok(())
                        }),
                    )
                    .param(ParamSpec::optional("rest", ParamType::Rest))
                    .owned_by("core"),
                )
                .unwrap();
        }
        let seen_echo = Arc::clone(&seen);
        dispatcher
            .register_command(
                CommandSpec::new(
                    "echo",
                    Handler::from_fn(move |inv| {
                        seen_echo.lock().push(("echo".into(), inv.args.clone()));
                        Ok(())
                    }),
                )
                .prefixes([""])
                .param(ParamSpec::optional("rest", ParamType::Rest))
                .owned_by("core"),
            )
            .unwrap();

        let run = |text: &str| dispatcher.handle_message_event(Arc::new(TestEvent::private(text)));
        assert!(run("/USER Info bob").await.unwrap());
        assert!(run("!user bob").await.unwrap());
        assert!(!run("/echo hi").await.unwrap());
        assert!(run("echo hi there").await.unwrap());
        assert!(!run("user bob").await.unwrap());
        assert!(!run("/nothing").await.unwrap());

        let seen = seen.lock();
        let names: Vec<&str> = seen.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["user info", "user", "echo"]);
        assert_eq!(seen[0].1.positional, vec![Value::Str("bob".into())]);
        assert_eq!(seen[2].1.positional, vec![Value::Str("hi there".into())]);
    }

    #[tokio::test]
    async fn test_registry_change_rebuilds_index() {
        let (dispatcher, _rx) = dispatcher();
        let hits = counter();
        assert_eq!(dispatcher.index_state(), ResolverState::Empty);

        dispatcher.prepare().unwrap();
        assert_eq!(dispatcher.index_state(), ResolverState::Built);
        assert!(!dispatcher.handle_message_event(Arc::new(TestEvent::private("/late"))).await.unwrap());

        dispatcher
            .register_command(CommandSpec::new("late", counting(&hits)).owned_by("x"))
            .unwrap();
        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/late"))).await.unwrap());

        dispatcher.clear_caches();
        assert_eq!(dispatcher.index_state(), ResolverState::Empty);
        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/late"))).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    async fn backend_down(_: Invocation) -> anyhow::Result<()> {
        anyhow::bail!("backend down")
    }

    async fn explode(_: Invocation) -> anyhow::Result<()> {
        panic!("async kaboom")
    }

    #[tokio::test]
    async fn test_handler_error_is_reported() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher
            .register_command(
                CommandSpec::new("fail", Handler::from_async(backend_down)).owned_by("x"),
            )
            .unwrap();

        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/fail"))).await.unwrap());
        let notification = rx.recv().await.unwrap();
        assert_eq!(notification.kind, NotificationKind::ExecutionFailed);
        assert_eq!(notification.message, "backend down");
    }

    #[tokio::test]
    async fn test_panics_are_contained() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher
            .register_command(
                CommandSpec::new("boom", Handler::from_async(explode)).owned_by("x"),
            )
            .unwrap();
        dispatcher
            .register_command(CommandSpec::new("crash", Handler::from_fn(|_| panic!("sync kaboom"))).owned_by("x"))
            .unwrap();

        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/boom"))).await.unwrap());
        assert_eq!(rx.recv().await.unwrap().message, "handler panicked: async kaboom");

        assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/crash"))).await.unwrap());
        assert_eq!(rx.recv().await.unwrap().message, "handler panicked: sync kaboom");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sync_handler_replies_from_blocking_pool() {
        let (dispatcher, mut rx) = dispatcher();
        dispatcher
            .register_command(
                CommandSpec::new("ping", Handler::from_fn(|inv| inv.reply_blocking("pong"))).owned_by("core"),
            )
            .unwrap();

        let event = Arc::new(TestEvent::private("/ping"));
        assert!(dispatcher.handle_message_event(event.clone()).await.unwrap());
        assert_eq!(event.replies(), vec!["pong"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pure_filters_run_for_every_message() {
        let (dispatcher, _rx) = dispatcher();
        let all = counter();
        let groups = counter();
        dispatcher.register_filter(FilterHandler::new("all", counting(&all)).owned_by("stats"));
        dispatcher.register_filter(
            FilterHandler::new("groups", counting(&groups))
                .filter(Filter::group_only())
                .owned_by("stats"),
        );

        for event in [
            TestEvent::private("hello"),
            TestEvent::group("/unknown"),
            TestEvent::group("").with_segments(vec![crate::event::Segment::Other("photo".into())]),
        ] {
            assert!(!dispatcher.handle_message_event(Arc::new(event)).await.unwrap());
        }

        assert_eq!(all.load(Ordering::SeqCst), 3);
        assert_eq!(groups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_event_handlers_by_post_type() {
        let (dispatcher, _rx) = dispatcher();
        let notices = counter();
        dispatcher.register_event_handler(EventHandler::new("welcome", PostType::Notice, counting(&notices)));
        dispatcher.register_event_handler(
            EventHandler::new("group_welcome", PostType::Notice, counting(&notices)).filter(Filter::group_only()),
        );

        let notice = Arc::new(TestEvent::private("").with_post_type(PostType::Notice));
        assert!(dispatcher.handle_event(notice).await.unwrap());
        assert_eq!(notices.load(Ordering::SeqCst), 1);

        let request = Arc::new(TestEvent::group("").with_post_type(PostType::Request));
        assert!(!dispatcher.handle_event(request).await.unwrap());

        let sent = Arc::new(TestEvent::private("/x").with_post_type(PostType::MessageSent));
        assert!(!dispatcher.handle_event(sent).await.unwrap());
    }

    #[tokio::test]
    async fn test_plugin_context_reaches_handlers() {
        struct Stats {
            calls: AtomicUsize,
        }

        let (dispatcher, _rx) = dispatcher();
        let context: PluginContext = Arc::new(Stats {
            calls: AtomicUsize::new(0),
        });
        let plugin = TestPlugin::with_context("stats", Some(Arc::clone(&context)), |r| {
            r.command(CommandSpec::new(
                "count",
                Handler::from_fn(|inv| {
                    let stats = inv
                        .plugin_state::<Stats>()
                        .ok_or_else(|| anyhow::anyhow!("missing stats context"))?;
                    stats.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            ))
        });
        dispatcher.load_plugin(plugin).unwrap();

        for _ in 0..2 {
            assert!(dispatcher.handle_message_event(Arc::new(TestEvent::private("/count"))).await.unwrap());
        }
        let stats = context.downcast_ref::<Stats>().unwrap();
        assert_eq!(stats.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_during_registration() {
        let dispatcher = Arc::new(CommandDispatcher::new(DispatchConfig::default()));
        let hits = counter();
        dispatcher
            .register_command(CommandSpec::new("ping", counting(&hits)).owned_by("core"))
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let dispatcher = Arc::clone(&dispatcher);
            let hits = Arc::clone(&hits);
            tasks.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    dispatcher
                        .register_command(CommandSpec::new(&format!("cmd{i}"), counting(&hits)).owned_by("extra"))
                        .unwrap();
                }
                dispatcher.handle_message_event(Arc::new(TestEvent::private("/ping"))).await
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }
        assert_eq!(hits.load(Ordering::SeqCst), 16);
        assert_eq!(dispatcher.registry().len(), 5);
    }
}
