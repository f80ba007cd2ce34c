// Build script - reads config.yaml at compile time and generates defaults
// This allows changing defaults during development without editing source code

use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Tell Cargo to rerun if config.yaml changes
    println!("cargo:rerun-if-changed=src/config.yaml");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("compiled_config.rs");

    // Try to read config.yaml from src/, fall back to hardcoded defaults if not found
    let config = if Path::new("src/config.yaml").exists() {
        let content = fs::read_to_string("src/config.yaml")
            .expect("Failed to read src/config.yaml");
        parse_config(&content)
    } else {
        CompiledConfig::default()
    };

    let generated = format!(
        r#"// Auto-generated from config.yaml at compile time
// Do not edit - modify config.yaml and rebuild instead

pub const POLL_INTERVAL_SECS: u64 = {poll_interval_secs};
pub const CONTINUE_ON_ERROR: bool = {continue_on_error};
pub const DRY_RUN: bool = {dry_run};
pub const ACCOUNT_POLICY: &str = "{account_policy}";

pub const SYSTEM_FIELDS: &[&str] = &[
{system_fields}
];

// (field, pattern) pairs
pub const GLOBAL_EXCLUDES: &[(&str, &str)] = &[
{excludes}
];
"#,
        poll_interval_secs = config.poll_interval_secs,
        continue_on_error = config.continue_on_error,
        dry_run = config.dry_run,
        account_policy = config.account_policy,
        system_fields = config.system_fields
            .iter()
            .map(|f| format!("    {:?},", f))
            .collect::<Vec<_>>()
            .join("\n"),
        excludes = config.global_excludes
            .iter()
            .map(|(field, pattern)| format!("    ({:?}, {:?}),", field, pattern))
            .collect::<Vec<_>>()
            .join("\n"),
    );

    fs::write(&dest_path, generated).expect("Failed to write compiled config");
}

struct CompiledConfig {
    poll_interval_secs: u64,
    continue_on_error: bool,
    dry_run: bool,
    account_policy: String,
    system_fields: Vec<String>,
    global_excludes: Vec<(String, String)>,
}

impl Default for CompiledConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            continue_on_error: true,
            dry_run: false,
            account_policy: "none".to_string(),
            system_fields: vec![
                "Id".to_string(),
                "LastModifiedDate".to_string(),
                "CreatedDate".to_string(),
                "SystemModstamp".to_string(),
            ],
            global_excludes: vec![("MailingCountry".to_string(), "argentina".to_string())],
        }
    }
}

#[derive(PartialEq)]
enum Section {
    None,
    Defaults,
    SystemFields,
    Excludes,
}

fn parse_config(content: &str) -> CompiledConfig {
    let mut config = CompiledConfig::default();

    // Simple YAML parsing (avoiding external dependencies in build script)
    let mut section = Section::None;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("defaults:") {
            section = Section::Defaults;
            continue;
        } else if trimmed.starts_with("system_fields:") {
            section = Section::SystemFields;
            config.system_fields.clear(); // Start fresh when we see the section
            continue;
        } else if trimmed.starts_with("global_excludes:") {
            section = Section::Excludes;
            config.global_excludes.clear();
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        // List sections end at the first non-list line
        if let Some(item) = trimmed.strip_prefix("- ") {
            let item = strip_comment(item).trim_matches('"');
            match section {
                Section::SystemFields => config.system_fields.push(item.to_string()),
                Section::Excludes => {
                    if let Some((field, pattern)) = item.split_once('=') {
                        config.global_excludes
                            .push((field.trim().to_string(), pattern.trim().to_string()));
                    }
                }
                _ => {}
            }
            continue;
        }

        if section == Section::Defaults {
            if let Some((key, value)) = parse_kv(trimmed) {
                match key {
                    "poll_interval_secs" => {
                        config.poll_interval_secs = value.parse().unwrap_or(60)
                    }
                    "continue_on_error" => config.continue_on_error = parse_bool(value),
                    "dry_run" => config.dry_run = parse_bool(value),
                    "account_policy" => config.account_policy = value.to_string(),
                    _ => {}
                }
            }
        }
    }

    config
}

fn parse_kv(line: &str) -> Option<(&str, &str)> {
    let colon_pos = line.find(':')?;
    let key = line[..colon_pos].trim();
    let value = strip_comment(&line[colon_pos + 1..]);

    // Skip if value is empty (section header)
    if value.is_empty() {
        return None;
    }

    Some((key, value.trim_matches('"')))
}

fn strip_comment(value: &str) -> &str {
    match value.find(" #") {
        Some(pos) => value[..pos].trim(),
        None => value.trim(),
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "yes" | "1")
}
