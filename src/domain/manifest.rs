//! package.json model and the `ng-update` metadata block
//!
//! The metadata block is vendor data published by packages, so its shape is
//! not trusted: every field is parsed on its own, and a malformed field is
//! replaced by its empty value plus a [`MetadataDiagnostic`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key of the vendor metadata block inside package.json
pub const UPDATE_METADATA_KEY: &str = "ng-update";

/// Per-peer metadata (`peerDependenciesMeta`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PeerDependencyMeta {
    #[serde(default)]
    pub optional: bool,
}

/// The subset of package.json used for planning
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, deserialize_with = "string_map")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "string_map")]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies_meta: BTreeMap<String, PeerDependencyMeta>,
    /// Registry deprecation notice (string) or flag
    #[serde(default)]
    pub deprecated: Option<Value>,
    /// Raw vendor metadata block
    #[serde(rename = "ng-update", default)]
    pub update_block: Option<Value>,
}

/// Dependency maps tolerate non-string values by dropping them
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.as_str().map(|v| (name, v.to_string())))
        .collect())
}

impl PackageManifest {
    /// Parse package.json content
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Build from an already parsed JSON value
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Whether the registry flagged this version as deprecated
    pub fn is_deprecated(&self) -> bool {
        match &self.deprecated {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Whether a peer is marked optional in `peerDependenciesMeta`
    pub fn is_optional_peer(&self, peer: &str) -> bool {
        self.peer_dependencies_meta
            .get(peer)
            .map(|meta| meta.optional)
            .unwrap_or(false)
    }

    /// All declared dependencies: `dependencies`, `devDependencies`,
    /// `peerDependencies`, `optionalDependencies`. The first section that
    /// declares a name wins.
    pub fn all_dependencies(&self) -> BTreeMap<String, String> {
        let mut all = BTreeMap::new();
        for section in [
            &self.dependencies,
            &self.dev_dependencies,
            &self.peer_dependencies,
            &self.optional_dependencies,
        ] {
            for (name, range) in section {
                all.entry(name.clone()).or_insert_with(|| range.clone());
            }
        }
        all
    }

    /// Parse the vendor metadata block
    pub fn update_metadata(&self) -> ParsedMetadata {
        UpdateMetadata::parse(self)
    }
}

/// Typed view of the `ng-update` block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMetadata {
    /// Packages versioned together with this one
    pub package_group: BTreeMap<String, String>,
    /// Umbrella name of the group (defaults to the first group member)
    pub package_group_name: Option<String>,
    /// Ranges this version requires of other packages
    pub requirements: BTreeMap<String, String>,
    /// Path of the migrations collection, relative to the package
    pub migrations: Option<String>,
}

/// A metadata field that was ignored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDiagnostic {
    pub package: String,
    pub field: &'static str,
    pub reason: String,
}

/// Metadata plus the diagnostics produced while parsing it
#[derive(Debug, Clone, Default)]
pub struct ParsedMetadata {
    pub metadata: UpdateMetadata,
    pub diagnostics: Vec<MetadataDiagnostic>,
}

impl ParsedMetadata {
    /// Emit the diagnostics as warnings
    pub fn log_diagnostics(&self) {
        for diag in &self.diagnostics {
            tracing::warn!(
                "{} metadata of package {} is malformed ({}). Ignoring.",
                diag.field,
                diag.package,
                diag.reason
            );
        }
    }
}

/// Outcome of parsing one metadata field
enum Field<T> {
    Absent,
    Parsed(T),
    Ignored(String),
}

impl UpdateMetadata {
    /// Parse the block of a manifest field by field
    pub fn parse(manifest: &PackageManifest) -> ParsedMetadata {
        let mut parsed = ParsedMetadata::default();

        let block = match &manifest.update_block {
            Some(Value::Object(block)) => block,
            Some(Value::Null) | None => return parsed,
            Some(_) => {
                parsed.diagnostics.push(MetadataDiagnostic {
                    package: manifest.name.clone(),
                    field: UPDATE_METADATA_KEY,
                    reason: "expected an object".to_string(),
                });
                return parsed;
            }
        };

        let mut record = |field: &'static str, reason: String| {
            parsed.diagnostics.push(MetadataDiagnostic {
                package: manifest.name.clone(),
                field,
                reason,
            });
        };

        let mut metadata = UpdateMetadata::default();

        match parse_package_group(block.get("packageGroup"), &manifest.version) {
            Field::Parsed((first, group)) => {
                metadata.package_group_name = first;
                metadata.package_group = group;
            }
            Field::Ignored(reason) => record("packageGroup", reason),
            Field::Absent => {}
        }

        match block.get("packageGroupName") {
            Some(Value::String(name)) => metadata.package_group_name = Some(name.clone()),
            Some(_) => record("packageGroupName", "expected a string".to_string()),
            None => {}
        }

        match parse_string_map(block.get("requirements")) {
            Field::Parsed(requirements) => metadata.requirements = requirements,
            Field::Ignored(reason) => record("requirements", reason),
            Field::Absent => {}
        }

        match block.get("migrations") {
            Some(Value::String(path)) => metadata.migrations = Some(path.clone()),
            Some(_) => record("migrations", "expected a string".to_string()),
            None => {}
        }

        parsed.metadata = metadata;
        parsed
    }

    /// Name used to key per-group rules: the group name, else the package name
    pub fn group_name_or<'a>(&'a self, name: &'a str) -> &'a str {
        self.package_group_name.as_deref().unwrap_or(name)
    }
}

/// `packageGroup` is either a list of names (all at this version) or a map.
///
/// The first member as declared is returned alongside; it names the group
/// unless `packageGroupName` says otherwise.
fn parse_package_group(
    value: Option<&Value>,
    version: &str,
) -> Field<(Option<String>, BTreeMap<String, String>)> {
    match value {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::Array(items)) => {
            let names: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
            match names {
                Some(names) => Field::Parsed((
                    names.first().map(|name| name.to_string()),
                    names
                        .into_iter()
                        .map(|name| (name.to_string(), version.to_string()))
                        .collect(),
                )),
                None => Field::Ignored("array entries must be strings".to_string()),
            }
        }
        other => match parse_string_map(other) {
            Field::Parsed(group) => {
                let first = other
                    .and_then(Value::as_object)
                    .and_then(|map| map.keys().next().cloned());
                Field::Parsed((first, group))
            }
            Field::Ignored(reason) => Field::Ignored(reason),
            Field::Absent => Field::Absent,
        },
    }
}

fn parse_string_map(value: Option<&Value>) -> Field<BTreeMap<String, String>> {
    match value {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::Object(map)) => {
            let mut out = BTreeMap::new();
            for (key, value) in map {
                match value.as_str() {
                    Some(s) => {
                        out.insert(key.clone(), s.to_string());
                    }
                    None => return Field::Ignored(format!("value of '{key}' is not a string")),
                }
            }
            Field::Parsed(out)
        }
        Some(_) => Field::Ignored("expected an object of strings".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> PackageManifest {
        PackageManifest::from_json(json).unwrap()
    }

    #[test]
    fn test_all_dependencies_union() {
        let m = manifest(
            r#"{
                "dependencies": { "@angular/core": "^12.0.0" },
                "devDependencies": { "typescript": "~4.3.5", "@angular/core": "12.2.0" },
                "peerDependencies": { "rxjs": "^6.5.3" },
                "optionalDependencies": { "fsevents": "*" }
            }"#,
        );
        let all = m.all_dependencies();
        assert_eq!(all.len(), 4);
        assert_eq!(all["@angular/core"], "^12.0.0");
        assert_eq!(all["fsevents"], "*");
    }

    #[test]
    fn test_non_string_dependency_values_dropped() {
        let m = manifest(r#"{ "dependencies": { "a": "1.0.0", "b": { "version": "1" } } }"#);
        assert_eq!(m.dependencies.len(), 1);
    }

    #[test]
    fn test_deprecated_and_optional_peer() {
        let m = manifest(
            r#"{
                "deprecated": "use something else",
                "peerDependencies": { "zone.js": "~0.11.4" },
                "peerDependenciesMeta": { "zone.js": { "optional": true } }
            }"#,
        );
        assert!(m.is_deprecated());
        assert!(m.is_optional_peer("zone.js"));
        assert!(!m.is_optional_peer("rxjs"));
    }

    #[test]
    fn test_metadata_array_group() {
        let m = manifest(
            r#"{
                "name": "@angular/core",
                "version": "13.0.0",
                "ng-update": {
                    "packageGroup": ["@angular/core", "@angular/common"],
                    "migrations": "./schematics/migrations.json"
                }
            }"#,
        );
        let parsed = m.update_metadata();
        assert!(parsed.diagnostics.is_empty());
        let meta = parsed.metadata;
        assert_eq!(meta.package_group["@angular/common"], "13.0.0");
        assert_eq!(meta.package_group_name.as_deref(), Some("@angular/core"));
        assert_eq!(meta.migrations.as_deref(), Some("./schematics/migrations.json"));
    }

    #[test]
    fn test_metadata_group_name_follows_declaration_order() {
        let m = manifest(
            r#"{
                "name": "@angular/core",
                "version": "13.0.1",
                "ng-update": {
                    "packageGroup": ["@angular/core", "@angular/common", "@angular/animations"]
                }
            }"#,
        );
        let meta = m.update_metadata().metadata;
        assert_eq!(meta.package_group_name.as_deref(), Some("@angular/core"));

        let m = manifest(
            r#"{
                "name": "@angular/router",
                "version": "13.0.1",
                "ng-update": {
                    "packageGroup": { "@angular/router": "13.0.1", "@angular/animations": "13.0.1" }
                }
            }"#,
        );
        let meta = m.update_metadata().metadata;
        assert_eq!(meta.package_group_name.as_deref(), Some("@angular/router"));
        assert_eq!(meta.package_group.len(), 2);
    }

    #[test]
    fn test_metadata_map_group_and_explicit_name() {
        let m = manifest(
            r#"{
                "name": "@angular/core",
                "version": "13.0.0",
                "ng-update": {
                    "packageGroup": { "@angular/core": "13.0.0", "@angular/router": "13.0.0" },
                    "packageGroupName": "@angular/core",
                    "requirements": { "typescript": "~4.4.0" }
                }
            }"#,
        );
        let meta = m.update_metadata().metadata;
        assert_eq!(meta.package_group.len(), 2);
        assert_eq!(meta.package_group_name.as_deref(), Some("@angular/core"));
        assert_eq!(meta.requirements["typescript"], "~4.4.0");
        assert_eq!(meta.group_name_or("x"), "@angular/core");
    }

    #[test]
    fn test_metadata_malformed_fields_ignored_individually() {
        let m = manifest(
            r#"{
                "name": "broken",
                "version": "1.0.0",
                "ng-update": {
                    "packageGroup": [1, 2],
                    "requirements": "typescript",
                    "migrations": "./migrations.json"
                }
            }"#,
        );
        let parsed = m.update_metadata();
        assert_eq!(parsed.diagnostics.len(), 2);
        assert_eq!(parsed.diagnostics[0].field, "packageGroup");
        assert_eq!(parsed.diagnostics[1].field, "requirements");
        assert!(parsed.metadata.package_group.is_empty());
        assert_eq!(parsed.metadata.migrations.as_deref(), Some("./migrations.json"));
    }

    #[test]
    fn test_metadata_absent() {
        let parsed = manifest(r#"{ "name": "plain" }"#).update_metadata();
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.metadata, UpdateMetadata::default());
    }
}
