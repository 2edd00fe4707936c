//! Primitives for working with typed and untyped configuration data.
#![deny(missing_docs)]

use std::{borrow::Cow, collections::HashSet, sync::Arc};

use figment::{
    error::Kind,
    providers::{Env, Serialized},
    Figment, Provider,
};
use plume_error::GenericError;
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};
use tracing::debug;

mod provider;
use self::provider::ResolvedProvider;

/// A configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// Environment variable prefix was empty.
    #[snafu(display("Environment variable prefix must not be empty."))]
    EmptyPrefix,

    /// Requested field was missing from the configuration.
    #[snafu(display("Missing field '{}' in configuration. {}", field, help_text))]
    MissingField {
        /// Help text describing how to set the missing field.
        ///
        /// Includes the environment variable form of the key when environment variables were loaded.
        help_text: String,

        /// Name of the missing field.
        field: Cow<'static, str>,
    },

    /// Requested field's value was not of the expected data type.
    #[snafu(display(
        "Expected value for field '{}' to be '{}', got '{}' instead.",
        field,
        expected_ty,
        actual_ty
    ))]
    InvalidFieldType {
        /// Period-separated path to the invalid field.
        field: String,

        /// Expected data type.
        expected_ty: String,

        /// Actual data type.
        actual_ty: String,
    },

    /// Generic configuration error.
    #[snafu(display("Failed to query configuration."))]
    Generic {
        /// Error source.
        source: GenericError,
    },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        match e.kind {
            Kind::InvalidType(actual_ty, expected_ty) => Self::InvalidFieldType {
                field: e.path.join("."),
                expected_ty,
                actual_ty: actual_ty.to_string(),
            },
            _ => Self::Generic { source: e.into() },
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum LookupSource {
    /// The configuration key is looked up in a form suitable for environment variables.
    Environment { prefix: String },
}

impl LookupSource {
    fn transform_key(&self, key: &str) -> String {
        match self {
            // The prefix is already uppercased with a trailing underscore.
            LookupSource::Environment { prefix } => format!("{}{}", prefix, key.replace('.', "_").to_uppercase()),
        }
    }
}

struct BoxedProvider(Box<dyn Provider + Send + Sync>);

impl Provider for BoxedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// A configuration loader that can pull from various sources.
///
/// This loader wraps `figment` to expose a small API for loading configuration data from various sources and then
/// querying it. Sources added later take precedence over sources added earlier. Either a typed value can be extracted
/// ([`into_typed`][Self::into_typed]), or the raw configuration can be queried by key
/// ([`into_generic`][Self::into_generic]).
///
/// # Supported sources
///
/// - YAML file
/// - JSON file
/// - environment variables (must be prefixed; see [`from_environment`][Self::from_environment])
#[derive(Default)]
pub struct ConfigurationLoader {
    lookup_sources: HashSet<LookupSource>,
    providers: Vec<BoxedProvider>,
}

impl ConfigurationLoader {
    /// Loads the given YAML configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid YAML, an error will be returned.
    pub fn from_yaml<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let resolved_provider = ResolvedProvider::from_yaml(&path)
            .map_err(GenericError::from)
            .context(Generic)?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Attempts to load the given YAML configuration file, ignoring any errors.
    ///
    /// Errors include the file not existing, not being readable, and not being valid YAML.
    pub fn try_from_yaml<P>(mut self, path: P) -> Self
    where
        P: AsRef<std::path::Path>,
    {
        match ResolvedProvider::from_yaml(&path) {
            Ok(resolved_provider) => self.providers.push(BoxedProvider(Box::new(resolved_provider))),
            Err(e) => {
                debug!(
                    error = %e,
                    file_path = %path.as_ref().to_string_lossy(),
                    "Unable to read YAML configuration file. Ignoring."
                );
            }
        }
        self
    }

    /// Loads the given JSON configuration file.
    ///
    /// # Errors
    ///
    /// If the file could not be read, or if the file is not valid JSON, an error will be returned.
    pub fn from_json<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<std::path::Path>,
    {
        let resolved_provider = ResolvedProvider::from_json(&path)
            .map_err(GenericError::from)
            .context(Generic)?;
        self.providers.push(BoxedProvider(Box::new(resolved_provider)));
        Ok(self)
    }

    /// Loads configuration from environment variables.
    ///
    /// The prefix given will have an underscore appended to it if it does not already end with one. For example, with a
    /// prefix of `plume`, any environment variable starting with `PLUME_` would be matched. The prefix is
    /// case-insensitive.
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the environment could not be read, an error will be returned.
    pub fn from_environment(mut self, prefix: &'static str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let prefix = if prefix.ends_with('_') {
            prefix.to_uppercase()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        // `Env` is not `Send + Sync`, so we snapshot its values into a serialized provider.
        let values = Env::prefixed(&prefix).data()?;
        if let Some(default_dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(BoxedProvider(Box::new(Serialized::defaults(default_dict.clone()))));
            self.lookup_sources.insert(LookupSource::Environment { prefix });
        }
        Ok(self)
    }

    fn build_figment(providers: &[BoxedProvider]) -> Figment {
        providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider))
    }

    /// Consumes the configuration loader, deserializing it as `T`.
    ///
    /// # Errors
    ///
    /// If the configuration could not be deserialized into `T`, an error will be returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        Self::build_figment(&self.providers)
            .extract()
            .map_err(|e| from_figment_error(&self.lookup_sources, e))
    }

    /// Consumes the configuration loader and wraps it in a generic wrapper.
    pub fn into_generic(self) -> GenericConfiguration {
        GenericConfiguration {
            inner: Arc::new(Inner {
                figment: Self::build_figment(&self.providers),
                lookup_sources: self.lookup_sources,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    lookup_sources: HashSet<LookupSource>,
}

/// A generic configuration object.
///
/// This represents the merged configuration derived from [`ConfigurationLoader`] in its raw form. Values can be
/// queried by key, and can be extracted either as typed values or in their raw form.
///
/// Keys must be in the form of `a.b.c`, where periods (`.`) indicate a nested value. Querying `export.interval_secs`
/// against this YAML:
///
/// ```yaml
/// export:
///   interval_secs: 30
/// ```
///
/// returns `30`, and so does querying it when only `PLUME_EXPORT_INTERVAL_SECS=30` is set in the environment.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn get<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        // Environment variables arrive flattened, with `_` in place of `.`, and take precedence over nested values.
        if key.contains('.') {
            match self.inner.figment.extract_inner(&key.replace('.', "_")) {
                Ok(value) => return Ok(value),
                Err(e) if !matches!(e.kind, Kind::MissingField(_)) => return Err(e.into()),
                Err(_) => {}
            }
        }

        self.inner
            .figment
            .extract_inner(key)
            .map_err(|e| from_figment_error(&self.inner.lookup_sources, e))
    }

    /// Gets a configuration value by key.
    ///
    /// # Errors
    ///
    /// If the key does not exist in the configuration, or if the value could not be deserialized into `T`, an error
    /// variant will be returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.get(key)
    }

    /// Gets a configuration value by key, or the default value if the key does not exist or could not be deserialized.
    ///
    /// This swallows any errors and should be used sparingly.
    pub fn get_typed_or_default<'a, T>(&self, key: &str) -> T
    where
        T: Default + Deserialize<'a>,
    {
        self.get(key).unwrap_or_default()
    }

    /// Gets a configuration value by key, if it exists.
    ///
    /// # Errors
    ///
    /// If the value exists but could not be deserialized into `T`, an error will be returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Attempts to deserialize the entire configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the value could not be deserialized into `T`, an error will be returned.
    pub fn as_typed<'a, T>(&self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.inner
            .figment
            .extract()
            .map_err(|e| from_figment_error(&self.inner.lookup_sources, e))
    }
}

fn from_figment_error(lookup_sources: &HashSet<LookupSource>, e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let mut valid_keys = lookup_sources
                .iter()
                .map(|source| source.transform_key(&field))
                .collect::<Vec<_>>();
            valid_keys.insert(0, field.to_string());

            let help_text = format!("Try setting `{}`.", valid_keys.join("` or `"));

            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual_ty, expected_ty) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty,
            actual_ty: actual_ty.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use serde::Deserialize;

    use super::*;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn nested_key_lookup() {
        let file = yaml_file("export:\n  interval_secs: 30\n  timeout_secs: 5\n");
        let config = ConfigurationLoader::default().from_yaml(file.path()).unwrap().into_generic();

        assert_eq!(config.get_typed::<u64>("export.interval_secs").unwrap(), 30);
        assert_eq!(config.try_get_typed::<u64>("export.timeout_secs").unwrap(), Some(5));
        assert_eq!(config.try_get_typed::<u64>("export.missing").unwrap(), None);
        assert_eq!(config.get_typed_or_default::<u64>("export.missing"), 0);
    }

    #[test]
    fn invalid_field_type() {
        let file = yaml_file("export:\n  interval_secs: soon\n");
        let config = ConfigurationLoader::default().from_yaml(file.path()).unwrap().into_generic();

        let err = config.get_typed::<u64>("export.interval_secs").unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidFieldType { .. }), "got {:?}", err);
    }

    #[test]
    fn missing_field_help_mentions_environment_variable() {
        std::env::set_var("PLUMECFGTEST_UNRELATED", "1");
        let config = ConfigurationLoader::default()
            .from_environment("plumecfgtest")
            .unwrap()
            .into_generic();

        match config.get_typed::<String>("source.path").unwrap_err() {
            ConfigurationError::MissingField { help_text, .. } => {
                assert!(help_text.contains("PLUMECFGTEST_SOURCE_PATH"), "help text: {}", help_text);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn environment_overrides_file() {
        std::env::set_var("PLUMECFGOVR_EXPORT_INTERVAL_SECS", "15");
        let file = yaml_file("export:\n  interval_secs: 30\n  timeout_secs: 5\n");
        let config = ConfigurationLoader::default()
            .from_yaml(file.path())
            .unwrap()
            .from_environment("PLUMECFGOVR_")
            .unwrap()
            .into_generic();

        assert_eq!(config.get_typed::<u64>("export.interval_secs").unwrap(), 15);
        assert_eq!(config.get_typed::<u64>("export.timeout_secs").unwrap(), 5);
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let result = ConfigurationLoader::default().from_environment("");
        assert!(matches!(result, Err(ConfigurationError::EmptyPrefix)));
    }

    #[test]
    fn into_typed_extracts_whole_document() {
        #[derive(Deserialize)]
        struct Doc {
            name: String,
            #[serde(default)]
            enabled: bool,
        }

        let file = yaml_file("name: primary\n");
        let doc: Doc = ConfigurationLoader::default()
            .from_yaml(file.path())
            .unwrap()
            .into_typed()
            .unwrap();
        assert_eq!(doc.name, "primary");
        assert!(!doc.enabled);
    }

    #[test]
    fn as_typed_reads_merged_configuration() {
        #[derive(Deserialize)]
        struct Export {
            interval_secs: u64,
        }

        #[derive(Deserialize)]
        struct Doc {
            export: Export,
        }

        let file = yaml_file("export:\n  interval_secs: 45\n");
        let config = ConfigurationLoader::default().from_yaml(file.path()).unwrap().into_generic();
        let doc: Doc = config.as_typed().unwrap();
        assert_eq!(doc.export.interval_secs, 45);
    }

    #[test]
    fn missing_file_is_an_error_unless_optional() {
        assert!(ConfigurationLoader::default().from_yaml("/nonexistent/plume.yaml").is_err());

        let config = ConfigurationLoader::default()
            .try_from_yaml("/nonexistent/plume.yaml")
            .into_generic();
        assert_eq!(config.try_get_typed::<u64>("export.interval_secs").unwrap(), None);
    }
}
