//! In-place rewriting of dependency entries in package.json
//!
//! Only the value of `"name": "<range>"` inside a dependency section is
//! touched; key order, whitespace and every other field are preserved.

use super::{read_workspace_manifest, MANIFEST_FILE};
use crate::domain::{UpdatePlan, VersionSpec};
use crate::error::ManifestError;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Sections rewritten by an update, in manifest order
const DEPENDENCY_SECTIONS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Rewrite the declared range of `package` in every section that declares it
pub fn update_dependency(
    content: &str,
    package: &str,
    new_version: &str,
) -> Result<String, ManifestError> {
    let entry_re = Regex::new(&format!(r#"("{}"\s*:\s*)"([^"]*)""#, regex::escape(package)))
        .map_err(|e| update_failed(package, format!("invalid pattern: {e}")))?;

    let mut result = content.to_string();
    let mut updated = false;

    for section in DEPENDENCY_SECTIONS {
        let Some((start, end)) = section_bounds(&result, section) else {
            continue;
        };

        let body = &result[start..end];
        let Some(caps) = entry_re.captures(body) else {
            continue;
        };
        let (Some(whole), Some(key), Some(old)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };

        let spec = VersionSpec::parse(old.as_str());
        let replacement = format!(r#"{}"{}""#, key.as_str(), spec.format_updated(new_version));
        debug!(
            "{section}: {package} {} -> {}",
            old.as_str(),
            spec.format_updated(new_version)
        );

        let absolute = start + whole.start()..start + whole.end();
        result.replace_range(absolute, &replacement);
        updated = true;
    }

    if !updated {
        return Err(update_failed(
            package,
            "package is not declared in any dependency section".to_string(),
        ));
    }
    Ok(result)
}

/// Apply a plan to the workspace manifest on disk
pub fn apply_plan(root: &Path, plan: &UpdatePlan) -> Result<usize, ManifestError> {
    let (_, mut content) = read_workspace_manifest(root)?;
    let path = root.join(MANIFEST_FILE);

    let mut applied = 0;
    for entry in plan.entries() {
        content = update_dependency(&content, &entry.name, &entry.target.to_string()).map_err(
            |e| match e {
                ManifestError::UpdateFailed {
                    package, message, ..
                } => ManifestError::UpdateFailed {
                    path: path.clone(),
                    package,
                    message,
                },
                other => other,
            },
        )?;
        applied += 1;
    }

    if applied > 0 {
        fs::write(&path, &content).map_err(|e| ManifestError::write_error(&path, e))?;
        info!("Updated {} in {}", applied, path.display());
    }
    Ok(applied)
}

fn update_failed(package: &str, message: String) -> ManifestError {
    ManifestError::UpdateFailed {
        path: MANIFEST_FILE.into(),
        package: package.to_string(),
        message,
    }
}

/// Byte range of the object body of `"section": { ... }`, braces excluded
fn section_bounds(content: &str, section: &str) -> Option<(usize, usize)> {
    let header = Regex::new(&format!(r#""{}"\s*:\s*\{{"#, regex::escape(section))).ok()?;
    let open = header.find(content)?.end();

    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[open..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + offset));
                }
            }
            _ => {}
        }
    }
    None
}
