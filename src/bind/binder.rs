use std::any::type_name;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::context::Bindable;
use super::de::{Binding, PropertyDeserializer};
use super::error::{BindError, BindFailure};
use super::handler::{BindHandler, DefaultBindHandler};
use super::validation::{Errors, Validate, ValidationErrors};
use crate::config::{ConfigurationProperty, PropertyName, PropertySources};

/// Binds the properties under a name to a typed value.
///
/// Any type implementing [`Deserialize`](serde::Deserialize) can be bound. Struct fields are
/// looked up by relaxed name, so a field `list_value` binds from
/// `listValue`, `list-value` or `LIST_VALUE`. Sequences bind from indexed
/// properties (`hosts[0]`, `hosts[1]`) or a comma-separated value. Every
/// node is offered to the configured [`BindHandler`] first.
///
/// ## Example
///
/// ```
/// use dragon_bind::{Binder, Config};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Server {
///     host: String,
///     port: u16,
/// }
///
/// let sources = Config::builder()
///     .with_map("defaults", [("server.host", "localhost"), ("server.port", "8080")])
///     .build()?;
///
/// let server: Server = Binder::new(sources).bind("server")?.unwrap();
/// assert_eq!(server.port, 8080);
/// # Ok::<(), dragon_bind::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Binder {
    sources: PropertySources,
    handler: Arc<dyn BindHandler>,
}

impl Binder {
    pub fn new(sources: PropertySources) -> Self {
        Self {
            sources,
            handler: Arc::new(DefaultBindHandler),
        }
    }

    /// Replaces the handler consulted at every node.
    pub fn with_handler(mut self, handler: Arc<dyn BindHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn sources(&self) -> &PropertySources {
        &self.sources
    }

    /// Binds the properties under `name`.
    ///
    /// Returns `Ok(None)` when nothing exists under the name or the handler
    /// vetoed the root.
    pub fn bind<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, BindError> {
        let name = parse_name::<T>(name)?;
        self.bind_root::<T>(&name, &Bindable::root::<T>())
            .map(|(value, _)| value)
    }

    /// Binds the properties under `name`, falling back to `existing`.
    ///
    /// `existing` is returned only when nothing was bound. Once any property
    /// exists under the name the value is bound afresh, and fields without a
    /// property take their serde defaults rather than the fields of
    /// `existing`.
    pub fn bind_or<T: DeserializeOwned>(&self, name: &str, existing: T) -> Result<T, BindError> {
        let name = parse_name::<T>(name)?;
        let (value, _) = self.bind_root::<T>(&name, &Bindable::root_with_existing::<T>())?;
        Ok(value.unwrap_or(existing))
    }

    /// Binds the properties under `name`, falling back to `T::default()`.
    pub fn bind_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, BindError> {
        self.bind_or(name, T::default())
    }

    /// Binds like [`bind_or_default`](Self::bind_or_default), then validates
    /// the result.
    ///
    /// Validation errors are reported as [`BindFailure::Validation`], together
    /// with the properties that were bound so their origins can be shown.
    pub fn bind_validated<T>(&self, name: &str) -> Result<T, BindError>
    where
        T: DeserializeOwned + Default + Validate,
    {
        let name = parse_name::<T>(name)?;
        let (value, bound) = self.bind_root::<T>(&name, &Bindable::root_with_existing::<T>())?;
        let value = value.unwrap_or_default();

        let mut errors = Errors::new();
        value.validate(&mut errors);
        if errors.has_errors() {
            debug!(name = %name, errors = errors.len(), "bound value failed validation");
            return Err(BindError::new(
                name.clone(),
                type_name::<T>(),
                None,
                ValidationErrors::new(name, errors.into_vec(), bound),
            ));
        }
        Ok(value)
    }

    fn bind_root<T: DeserializeOwned>(
        &self,
        name: &PropertyName,
        target: &Bindable,
    ) -> Result<(Option<T>, Vec<ConfigurationProperty>), BindError> {
        let root_type = type_name::<T>();
        debug!(name = %name, target = root_type, "binding");

        let mut binding = Binding::new(self.handler.as_ref(), &self.sources, root_type);
        if !binding.start(name, target) {
            return Ok((None, binding.into_bound()));
        }

        let value = if binding.sources().contains(name) {
            binding.descend(name.clone(), target, |binding, name| {
                T::deserialize(PropertyDeserializer::new(binding, name.clone())).map(Some)
            })
        } else {
            binding
                .complete(name, target, false)
                .map(|()| None)
                .map_err(|error| binding.fail(name, target, error))
        };
        let value = value.map_err(|error| error.with_target(root_type))?;

        debug!(name = %name, bound = value.is_some(), "binding complete");
        Ok((value, binding.into_bound()))
    }
}

fn parse_name<T>(name: &str) -> Result<PropertyName, BindError> {
    PropertyName::of(name).map_err(|error| {
        BindError::new(
            PropertyName::empty(),
            type_name::<T>(),
            None,
            BindFailure::Message(error.to_string()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::context::BindContext;
    use crate::bind::handler::{
        IgnoreNestedPropertiesBindHandler, NoUnboundElementsBindHandler, TracingBindHandler,
    };
    use crate::config::{CommandLineSource, Config, EnvSource};
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn binder(pairs: &[(&str, &str)]) -> Binder {
        let sources = Config::builder()
            .with_map("test", pairs.iter().copied())
            .build()
            .unwrap();
        Binder::new(sources)
    }

    #[derive(Debug, Default)]
    struct RecordingHandler {
        veto: Option<&'static str>,
        events: Mutex<Vec<String>>,
        successes: Mutex<Vec<String>>,
    }

    impl RecordingHandler {
        fn vetoing(name: &'static str) -> Self {
            Self {
                veto: Some(name),
                ..Self::default()
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn successes(&self) -> Vec<String> {
            self.successes.lock().unwrap().clone()
        }

        fn record(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl BindHandler for RecordingHandler {
        fn on_start(&self, name: &PropertyName, _: &Bindable, context: &BindContext<'_>) -> bool {
            self.record(format!("start {name} @{}", context.depth()));
            self.veto != Some(name.to_string().as_str())
        }

        fn on_success(&self, name: &PropertyName, _: &Bindable, _: &BindContext<'_>) {
            self.successes.lock().unwrap().push(name.to_string());
        }

        fn on_finish(
            &self,
            name: &PropertyName,
            _: &Bindable,
            context: &BindContext<'_>,
        ) -> Result<(), BindError> {
            self.record(format!("finish {name} @{}", context.depth()));
            Ok(())
        }

        fn on_failure(
            &self,
            name: &PropertyName,
            _: &Bindable,
            context: &BindContext<'_>,
            error: BindError,
        ) -> BindError {
            self.record(format!("failure {name} @{}", context.depth()));
            error
        }
    }

    #[derive(Debug)]
    struct VetoHandler(&'static str);

    impl BindHandler for VetoHandler {
        fn on_start(&self, name: &PropertyName, _: &Bindable, _: &BindContext<'_>) -> bool {
            name.to_string() != self.0
        }
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Nested {
        value: Option<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct App {
        name: String,
        #[serde(default)]
        nested: Nested,
        #[serde(default)]
        list: Vec<String>,
    }

    #[test]
    fn test_bind_struct_with_relaxed_names() {
        #[derive(Debug, Deserialize)]
        struct Server {
            host_name: String,
            port: u16,
            secure: bool,
        }

        let binder = binder(&[
            ("server.hostName", "example.com"),
            ("server.PORT", "8443"),
            ("server.secure", "yes"),
        ]);
        let server: Server = binder.bind("server").unwrap().unwrap();
        assert_eq!(server.host_name, "example.com");
        assert_eq!(server.port, 8443);
        assert!(server.secure);
    }

    #[test]
    fn test_bind_returns_none_when_nothing_exists() {
        let binder = binder(&[("other.value", "1")]);
        let app: Option<App> = binder.bind("app").unwrap();
        assert!(app.is_none());
        assert_eq!(binder.bind_or("missing", 7u32).unwrap(), 7);
        assert_eq!(binder.bind_or_default::<Vec<String>>("missing").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_bind_or_uses_existing_only_when_nothing_is_bound() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Pool {
            #[serde(default)]
            size: u32,
            #[serde(default)]
            name: String,
        }

        let existing = || Pool {
            size: 8,
            name: "main".into(),
        };
        let binder = binder(&[("pool.size", "4")]);
        assert_eq!(
            binder.bind_or("pool", existing()).unwrap(),
            Pool {
                size: 4,
                name: String::new(),
            }
        );
        assert_eq!(binder.bind_or("other", existing()).unwrap(), existing());
    }

    #[test]
    fn test_handler_sees_every_node_with_its_depth() {
        let handler = Arc::new(RecordingHandler::default());
        let binder = binder(&[
            ("app.name", "demo"),
            ("app.nested.value", "x"),
            ("app.list[0]", "a"),
        ])
        .with_handler(handler.clone());

        let app: App = binder.bind("app").unwrap().unwrap();
        assert_eq!(app.list, ["a"]);
        assert_eq!(
            handler.events(),
            [
                "start app @0",
                "start app.name @1",
                "finish app.name @1",
                "start app.nested @1",
                "start app.nested.value @2",
                "finish app.nested.value @2",
                "finish app.nested @1",
                "start app.list @1",
                "start app.list[0] @2",
                "finish app.list[0] @2",
                "finish app.list @1",
                "finish app @0",
            ]
        );
    }

    #[test]
    fn test_depth_is_restored_after_failure() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Ports {
            inner: Inner,
        }
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Inner {
            port: u16,
        }

        let handler = Arc::new(RecordingHandler::default());
        let binder = binder(&[("ports.inner.port", "http")]).with_handler(handler.clone());
        assert!(binder.bind::<Ports>("ports").is_err());
        assert_eq!(
            handler.events(),
            [
                "start ports @0",
                "start ports.inner @1",
                "start ports.inner.port @2",
                "failure ports.inner.port @2",
                "failure ports.inner @1",
                "failure ports @0",
            ]
        );
    }

    #[test]
    fn test_root_veto_binds_nothing() {
        let binder = binder(&[("app.name", "demo")]).with_handler(Arc::new(VetoHandler("app")));
        assert!(binder.bind::<App>("app").unwrap().is_none());
    }

    #[test]
    fn test_ignore_nested_properties_skips_grandchildren() {
        let binder = binder(&[("app.name", "demo"), ("app.nested.value", "x")])
            .with_handler(Arc::new(IgnoreNestedPropertiesBindHandler::new()));
        let app: App = binder.bind("app").unwrap().unwrap();
        assert_eq!(app.name, "demo");
        assert_eq!(app.nested, Nested::default());
    }

    #[test]
    fn test_vetoed_node_skips_its_descendants() {
        let recorder = Arc::new(RecordingHandler::vetoing("app.nested"));
        let binder = binder(&[("app.name", "demo"), ("app.nested.value", "x")])
            .with_handler(Arc::new(TracingBindHandler::with_parent(recorder.clone())));

        let app: App = binder.bind("app").unwrap().unwrap();
        assert_eq!(app.nested, Nested::default());
        assert_eq!(
            recorder.events(),
            [
                "start app @0",
                "start app.name @1",
                "finish app.name @1",
                "start app.nested @1",
                "finish app @0",
            ]
        );
        assert_eq!(recorder.successes(), ["app.name", "app"]);
    }

    #[test]
    fn test_vetoed_field_falls_back_to_missing_field_rules() {
        let binder = binder(&[("app.name", "demo"), ("app.nested.value", "x")])
            .with_handler(Arc::new(VetoHandler("app.name")));
        let error = binder.bind::<App>("app").unwrap_err();
        assert_eq!(error.cause().to_string(), "missing field `name`");
        assert_eq!(error.name().to_string(), "app");
    }

    #[test]
    fn test_bind_list_from_indexed_and_delimited_values() {
        let binder = binder(&[
            ("app.hosts[0]", "a"),
            ("app.hosts[1]", "b"),
            ("app.tags", "x, y ,z"),
            ("app.empty", ""),
        ]);
        assert_eq!(binder.bind::<Vec<String>>("app.hosts").unwrap().unwrap(), ["a", "b"]);
        assert_eq!(binder.bind::<Vec<String>>("app.tags").unwrap().unwrap(), ["x", "y", "z"]);
        assert!(binder.bind::<Vec<String>>("app.empty").unwrap().unwrap().is_empty());
        assert_eq!(binder.bind::<Vec<u8>>("app.tags").unwrap_err().name().to_string(), "app.tags");
    }

    #[test]
    fn test_list_binds_from_highest_precedence_source() {
        let sources = Config::builder()
            .with_map("file", [("app.hosts[0]", "a"), ("app.hosts[1]", "b")])
            .with_args(["--app.hosts=x,y,z"])
            .build()
            .unwrap();
        let hosts: Vec<String> = Binder::new(sources).bind("app.hosts").unwrap().unwrap();
        assert_eq!(hosts, ["x", "y", "z"]);

        let sources = Config::builder()
            .with_map("file", [("app.hosts", "x,y")])
            .with_map("override", [("app.hosts[0]", "a")])
            .build()
            .unwrap();
        let hosts: Vec<String> = Binder::new(sources).bind("app.hosts").unwrap().unwrap();
        assert_eq!(hosts, ["a"]);
    }

    #[test]
    fn test_indexed_list_is_not_merged_across_sources() {
        let sources = Config::builder()
            .with_map(
                "file",
                [("app.hosts[0]", "a"), ("app.hosts[1]", "b"), ("app.hosts[2]", "c")],
            )
            .with_map("override", [("app.hosts[0]", "only")])
            .build()
            .unwrap();
        let hosts: Vec<String> = Binder::new(sources).bind("app.hosts").unwrap().unwrap();
        assert_eq!(hosts, ["only"]);
    }

    #[test]
    fn test_gap_in_list_leaves_elements_unbound() {
        let binder = binder(&[
            ("test.foo.listValue[0]", "hello"),
            ("test.foo.listValue[2]", "world"),
        ]);
        let error = binder.bind::<Vec<String>>("test.foo.list-value").unwrap_err();
        let BindFailure::UnboundElements(unbound) = error.cause() else {
            panic!("expected unbound elements, got {:?}", error.cause());
        };
        assert_eq!(unbound.properties().len(), 1);
        assert_eq!(unbound.properties()[0].origin.key(), "test.foo.listValue[2]");
        assert_eq!(
            unbound.to_string(),
            "The elements [test.foo.listvalue[2]] were left unbound."
        );
    }

    #[test]
    fn test_bind_map_and_nested_structs() {
        #[derive(Debug, Deserialize)]
        struct Endpoint {
            url: String,
        }

        let binder = binder(&[
            ("app.labels.env", "prod"),
            ("app.labels.tier", "web"),
            ("app.endpoints.primary.url", "http://a"),
            ("app.endpoints.backup.url", "http://b"),
        ]);
        let labels: BTreeMap<String, String> = binder.bind("app.labels").unwrap().unwrap();
        assert_eq!(labels["env"], "prod");
        assert_eq!(labels["tier"], "web");

        let endpoints: BTreeMap<String, Endpoint> = binder.bind("app.endpoints").unwrap().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints["backup"].url, "http://b");
    }

    #[test]
    fn test_bind_options_and_enums() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "kebab-case")]
        enum Mode {
            ReadOnly,
            ReadWrite,
        }

        #[derive(Debug, Deserialize)]
        struct Settings {
            mode: Mode,
            timeout: Option<u64>,
            retries: Option<u32>,
        }

        let binder = binder(&[("settings.mode", "READ_ONLY"), ("settings.timeout", "30")]);
        let settings: Settings = binder.bind("settings").unwrap().unwrap();
        assert_eq!(settings.mode, Mode::ReadOnly);
        assert_eq!(settings.timeout, Some(30));
        assert_eq!(settings.retries, None);

        let binder = self::binder(&[("settings.mode", "write-only")]);
        let error = binder.bind::<Settings>("settings").unwrap_err();
        assert!(matches!(error.cause(), BindFailure::Conversion(_)));
        assert_eq!(error.name().to_string(), "settings.mode");
    }

    #[test]
    fn test_conversion_error_carries_property() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Server {
            port: u16,
        }

        let binder = binder(&[("server.port", "http")]);
        let error = binder.bind::<Server>("server").unwrap_err();
        assert_eq!(error.name().to_string(), "server.port");
        assert_eq!(error.target(), "u16");
        assert_eq!(error.property().unwrap().value, "http");
        let BindFailure::Conversion(conversion) = error.cause() else {
            panic!("expected a conversion error, got {:?}", error.cause());
        };
        assert_eq!(conversion.value, "http");
        assert_eq!(conversion.target, "u16");
    }

    #[test]
    fn test_placeholders_resolve_at_bind_time() {
        let binder = binder(&[
            ("app.host", "localhost"),
            ("app.port", "8080"),
            ("app.url", "http://${app.host}:${app.port}/${app.path:api}"),
            ("app.broken", "${BAR}"),
        ]);
        assert_eq!(
            binder.bind::<String>("app.url").unwrap().unwrap(),
            "http://localhost:8080/api"
        );
        let error = binder.bind::<String>("app.broken").unwrap_err();
        assert!(matches!(error.cause(), BindFailure::Placeholder(_)));
        assert_eq!(error.property().unwrap().value, "${BAR}");
    }

    #[test]
    fn test_no_unbound_elements_handler_rejects_leftovers() {
        let binder = binder(&[("app.name", "demo"), ("app.colour", "blue")])
            .with_handler(Arc::new(NoUnboundElementsBindHandler::new()));
        let error = binder.bind::<App>("app").unwrap_err();
        let BindFailure::UnboundElements(unbound) = error.cause() else {
            panic!("expected unbound elements, got {:?}", error.cause());
        };
        assert_eq!(unbound.to_string(), "The elements [app.colour] were left unbound.");
    }

    #[test]
    fn test_bind_validated_collects_bound_properties() {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Limits {
            max: u32,
        }

        impl Validate for Limits {
            fn validate(&self, errors: &mut Errors) {
                if self.max < 5 {
                    errors.reject_value("max", self.max, "at least five");
                }
            }
        }

        let binder = binder(&[("limits.max", "4")]);
        let error = binder.bind_validated::<Limits>("limits").unwrap_err();
        let BindFailure::Validation(validation) = error.cause() else {
            panic!("expected validation errors, got {:?}", error.cause());
        };
        assert_eq!(validation.errors().len(), 1);
        assert_eq!(validation.bound_properties()[0].value, "4");

        let binder = self::binder(&[("limits.max", "10")]);
        assert_eq!(binder.bind_validated::<Limits>("limits").unwrap().max, 10);
    }

    #[test]
    fn test_invalid_root_name_is_a_bind_error() {
        let error = binder(&[]).bind::<String>("app..name").unwrap_err();
        assert!(matches!(error.cause(), BindFailure::Message(_)));
    }

    #[test]
    fn test_bind_from_environment_and_arguments() {
        #[derive(Debug, Deserialize)]
        struct Database {
            host: String,
            pool_size: u32,
            replicas: Vec<String>,
        }

        let sources = Config::builder()
            .with_source(EnvSource::new("MYAPP", "__").with_vars([
                ("MYAPP__DATABASE__HOST", "db.internal"),
                ("MYAPP__DATABASE__POOL_SIZE", "5"),
                ("MYAPP__DATABASE__REPLICAS__0", "r1"),
                ("MYAPP__DATABASE__REPLICAS__1", "r2"),
            ]))
            .with_source(CommandLineSource::new(["--database.pool-size=20"]))
            .build()
            .unwrap();

        let database: Database = Binder::new(sources).bind("database").unwrap().unwrap();
        assert_eq!(database.host, "db.internal");
        assert_eq!(database.pool_size, 20);
        assert_eq!(database.replicas, ["r1", "r2"]);
    }

    #[test]
    fn test_bind_from_toml_file() {
        use std::io::Write;

        #[derive(Debug, Deserialize)]
        struct Route {
            path: String,
        }

        #[derive(Debug, Deserialize)]
        struct Server {
            hosts: Vec<String>,
            routes: Vec<Route>,
            debug: bool,
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [server]
            hosts = ["a", "b"]
            debug = true

            [[server.routes]]
            path = "/api"

            [[server.routes]]
            path = "/admin"
            "#
        )
        .unwrap();

        let sources = Config::builder().with_file(file.path(), true).build().unwrap();
        let server: Server = Binder::new(sources).bind("server").unwrap().unwrap();
        assert_eq!(server.hosts, ["a", "b"]);
        assert_eq!(server.routes.len(), 2);
        assert_eq!(server.routes[1].path, "/admin");
        assert!(server.debug);
    }
}
