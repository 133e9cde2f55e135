//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{ApplyOptions, Context};
use crate::audit::{persist, unix_millis, write_audit};
use crate::prompt;
use crate::settings::Backend;
use hivepatch_core::{
    Access, ApplyEngine, Config, HiveStore, HivepatchError, JournalEntry, OpenKey, RegistryStore,
    decode, dispatch, primitives::MAX_DOCUMENT_SIZE, validate,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Canonicalize an input file and check it against `max_size`.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, HivepatchError> {
    let canonical = path.canonicalize().map_err(|e| {
        HivepatchError::Decode(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    let metadata = std::fs::metadata(&canonical).map_err(|e| {
        HivepatchError::Decode(format!("Cannot stat '{}': {}", path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(HivepatchError::Decode(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > max_size {
        return Err(HivepatchError::Decode(format!(
            "'{}' is {} bytes, more than the {} bytes allowed",
            path.display(),
            metadata.len(),
            max_size
        )));
    }

    Ok(canonical)
}

/// Canonicalize a directory that must already exist.
fn validate_output_dir(dir: &Path) -> Result<PathBuf, HivepatchError> {
    let canonical = dir.canonicalize().map_err(|e| {
        HivepatchError::Persist(format!("Invalid output directory '{}': {}", dir.display(), e))
    })?;
    if !canonical.is_dir() {
        return Err(HivepatchError::Persist(format!(
            "'{}' is not a directory",
            dir.display()
        )));
    }
    Ok(canonical)
}

/// An output file path whose directory exists. The file itself may not.
fn validate_output_path(path: &Path) -> Result<PathBuf, HivepatchError> {
    let filename = path
        .file_name()
        .ok_or_else(|| HivepatchError::Persist("Output path has no filename".to_string()))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(validate_output_dir(parent)?.join(filename))
}

/// Load and decode a document from disk.
pub fn load_config(path: &Path) -> Result<(PathBuf, Config), HivepatchError> {
    let path = validate_input_file(path, MAX_DOCUMENT_SIZE as u64)?;

    let bytes = std::fs::read(&path).map_err(|e| {
        HivepatchError::Decode(format!("Cannot read '{}': {}", path.display(), e))
    })?;
    let config = decode(&bytes)?;

    for (index, key) in config.fallback_keys() {
        tracing::warn!(
            "Key #{} '{}': scope {} is not recognised, defaulting to HKEY_LOCAL_MACHINE",
            index,
            key.path,
            key.scope
        );
    }

    Ok((path, config))
}

// =============================================================================
// STORE SELECTION
// =============================================================================

/// Open the store selected by the context.
pub fn open_store(ctx: &Context) -> Result<Box<dyn RegistryStore>, HivepatchError> {
    match ctx.backend {
        Backend::Hive => Ok(Box::new(HiveStore::open(&ctx.hive)?)),
        Backend::Windows => open_windows_registry(),
    }
}

#[cfg(windows)]
fn open_windows_registry() -> Result<Box<dyn RegistryStore>, HivepatchError> {
    Ok(Box::new(hivepatch_core::WindowsRegistry::new()))
}

#[cfg(not(windows))]
fn open_windows_registry() -> Result<Box<dyn RegistryStore>, HivepatchError> {
    Err(HivepatchError::Settings(
        "The windows backend is only available on Windows; use --backend hive".to_string(),
    ))
}

// =============================================================================
// APPLY COMMAND
// =============================================================================

/// Apply a document and write its audit file.
///
/// Returns the path of the audit file. On an apply error the partially
/// captured config is written as a `.partial.save` audit file before the
/// error is returned.
pub fn cmd_apply<R: BufRead, W: Write>(
    ctx: &Context,
    opts: &ApplyOptions,
    input: &mut R,
    output: &mut W,
) -> Result<PathBuf, HivepatchError> {
    let (config_path, mut config) = load_config(&opts.config)?;
    let audit_dir = opts
        .audit_dir
        .as_deref()
        .map(validate_output_dir)
        .transpose()?;

    if opts.confirm {
        let question = format!(
            "WARNING: Changing registry values can break your computer.\n \
             Config file: {}\n \
             {} properties across {} keys will be written via the {} backend.\n \
             Are you sure you want to proceed?",
            config_path.display(),
            config.property_count(),
            config.len(),
            ctx.backend
        );
        if !prompt::confirm(input, output, &question)? {
            return Err(HivepatchError::Aborted(
                "Changes were not confirmed; nothing was written".to_string(),
            ));
        }
    }

    let mut store = open_store(ctx)?;
    let mut engine = ApplyEngine::new(store.as_mut());
    let result = engine.apply(&mut config);
    let journal = engine.into_journal();
    log_journal(&journal);

    let stamp = unix_millis();
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            match write_audit(&config, &config_path, audit_dir.as_deref(), stamp, true) {
                Ok(partial) => tracing::error!(
                    "Apply stopped after {} writes; captured values saved to {}",
                    journal.len(),
                    partial.display()
                ),
                Err(persist_err) => tracing::error!(
                    "Apply stopped after {} writes; partial audit could not be saved: {}",
                    journal.len(),
                    persist_err
                ),
            }
            return Err(e);
        }
    };

    let audit = write_audit(&config, &config_path, audit_dir.as_deref(), stamp, false)?;
    tracing::info!("Audit file written to {}", audit.display());

    if opts.save_prev {
        persist(&config, &config_path)?;
        tracing::info!("Input document updated with previous values");
    }

    if ctx.json_mode {
        let output = serde_json::json!({
            "config": config_path.to_string_lossy(),
            "backend": ctx.backend.to_string(),
            "keys": report.keys,
            "properties": report.properties,
            "audit_file": audit.to_string_lossy(),
            "input_updated": opts.save_prev,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        if ctx.verbose {
            for entry in &journal {
                println!(
                    "  {}\\{} {} ({}): {} -> {}",
                    entry.scope.handle(),
                    entry.path,
                    entry.name,
                    entry.kind,
                    entry.prior,
                    entry.new
                );
            }
        }
        println!(
            "Finished! Wrote {} properties across {} keys.",
            report.properties, report.keys
        );
        println!("Audit file: {}", audit.display());
    }

    Ok(audit)
}

fn log_journal(journal: &[JournalEntry]) {
    for entry in journal {
        tracing::info!(
            "Set {}\\{} {} ({}): {} -> {}",
            entry.scope.handle(),
            entry.path,
            entry.name,
            entry.kind,
            entry.prior,
            entry.new
        );
    }
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Dry run: read every targeted value and report it next to the desired one.
pub fn cmd_validate(ctx: &Context, config_path: &Path) -> Result<(), HivepatchError> {
    let (_, mut config) = load_config(config_path)?;
    let mut store = open_store(ctx)?;
    let report = validate(store.as_mut(), &mut config)?;

    if ctx.json_mode {
        let bytes = hivepatch_core::encode(&config)?;
        println!("{}", String::from_utf8_lossy(&bytes));
        return Ok(());
    }

    println!("Validation passed");
    println!("=================");
    for key in &config.keys {
        println!("{}\\{}", key.handle(), key.path);
        for property in &key.properties {
            let current = property
                .prev_value
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!(
                "  {} ({}): current {}, desired {}",
                property.name, property.kind, current, property.value
            );
        }
    }
    println!();
    println!(
        "{} properties across {} keys are readable.",
        report.properties, report.keys
    );

    Ok(())
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Create every key of a document in the hive file and write its values.
///
/// Nothing is captured; this prepares a hive to apply against.
pub fn cmd_seed(ctx: &Context, config_path: &Path) -> Result<(), HivepatchError> {
    if ctx.backend != Backend::Hive {
        return Err(HivepatchError::Settings(
            "seed only works with the hive backend".to_string(),
        ));
    }

    let (_, config) = load_config(config_path)?;
    let mut store = HiveStore::open(&ctx.hive)?;
    let mut written = 0usize;

    for key in &config.keys {
        let scope = key.handle();
        store.create_key(scope, &key.path)?;

        let mut open = OpenKey::open(&mut store, scope, &key.path, Access::ReadWrite).map_err(
            |source| HivepatchError::Open {
                scope,
                path: key.path.clone(),
                source,
            },
        )?;
        let token = open.token();

        for property in &key.properties {
            (dispatch(property.kind).write)(
                open.store_mut(),
                token,
                &property.name,
                &property.value,
            )
            .map_err(|source| HivepatchError::Write {
                path: key.path.clone(),
                name: property.name.clone(),
                kind: property.kind,
                attempted: property.value.clone(),
                source,
            })?;
            written += 1;
        }
    }

    let total = store.value_count()?;
    tracing::info!(
        "Seeded {} values across {} keys into {} ({} values stored)",
        written,
        config.len(),
        ctx.hive.display(),
        total
    );

    if ctx.json_mode {
        let output = serde_json::json!({
            "hive": ctx.hive.to_string_lossy(),
            "keys": config.len(),
            "values": written,
            "hive_values": total,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!(
            "Seeded {} values across {} keys into {} ({} values stored)",
            written,
            config.len(),
            ctx.hive.display(),
            total
        );
    }

    Ok(())
}

// =============================================================================
// ROLLBACK-PLAN COMMAND
// =============================================================================

/// Write the document that restores the values captured in an audit file.
pub fn cmd_rollback_plan(
    ctx: &Context,
    input: &Path,
    output: &Path,
) -> Result<(), HivepatchError> {
    let (_, audit) = load_config(input)?;
    let output = validate_output_path(output)?;

    let plan = audit.rollback_plan();
    if plan.is_empty() {
        tracing::warn!(
            "{} has no captured previous values; the rollback plan is empty",
            input.display()
        );
    }
    persist(&plan, &output)?;

    if ctx.json_mode {
        let summary = serde_json::json!({
            "input": input.to_string_lossy(),
            "output": output.to_string_lossy(),
            "keys": plan.len(),
            "properties": plan.property_count(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_default()
        );
    } else {
        println!(
            "Rollback plan with {} properties across {} keys written to {}",
            plan.property_count(),
            plan.len(),
            output.display()
        );
    }

    Ok(())
}
