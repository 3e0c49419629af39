use std::path::{Path, PathBuf};
use std::{env, fs};

use probescript::{json_to_value, ObjectValue, Value};
use serde::Deserialize;

/// The fields of `project.json` the driver itself cares about. The full
/// document still travels on the context as project metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProjectManifest {
    pub name: Option<String>,
    pub main: Option<String>,
}

/// Walks up from the target (at most 10 levels) looking for `project.json`,
/// then recursively indexes the project directory: every `.prb`/`.probe`
/// file whose first line is `module <name>` (optional trailing `;`) maps
/// that module name to its path.
///
/// Returns the module map, the parsed project metadata (an empty object
/// outside a project), and the typed manifest.
pub fn index_modules(target: &Path) -> (Vec<(String, PathBuf)>, Value, ProjectManifest) {
    let mut current = if target.is_dir() {
        target.to_path_buf()
    } else {
        let parent = target.parent().unwrap_or_else(|| Path::new(""));
        env::current_dir().map_or_else(|_| parent.to_path_buf(), |cwd| cwd.join(parent))
    };

    let mut project_file = None;
    for _ in 0..10 {
        let candidate = current.join("project.json");
        if candidate.exists() {
            project_file = Some(candidate);
            break;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let Some(project_file) = project_file else {
        return (Vec::new(), Value::Object(ObjectValue::new()), ProjectManifest::default());
    };

    let mut modules = Vec::new();
    let root = project_file.parent().unwrap_or_else(|| Path::new("."));
    collect_modules(root, &mut modules);

    let document = fs::read_to_string(&project_file)
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok());
    let manifest = document
        .clone()
        .and_then(|json| serde_json::from_value::<ProjectManifest>(json).ok())
        .unwrap_or_default();
    let project = document.map_or_else(|| Value::Object(ObjectValue::new()), |json| json_to_value(&json));

    (modules, project, manifest)
}

fn collect_modules(dir: &Path, modules: &mut Vec<(String, PathBuf)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if path.is_dir() {
            collect_modules(&path, modules);
            continue;
        }
        let is_probe_file = path
            .extension()
            .is_some_and(|ext| ext == "prb" || ext == "probe");
        if !is_probe_file {
            continue;
        }
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let first_line = content.lines().next().unwrap_or("");
        if let Some(rest) = first_line.strip_prefix("module") {
            let name = rest.trim().trim_end_matches(';').trim();
            if !name.is_empty() {
                modules.push((name.to_string(), path));
            }
        }
    }
}
