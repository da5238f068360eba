//! Resolution of templated and entity-referencing card values
//!
//! Card fields may be plain literals, `{{ states('sensor.x') }}` style
//! templates, or bare entity ids. The engine only ever sees the resolved
//! strings.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::state::{CardConfig, HostSnapshot};

/// Asynchronous value resolution against one host snapshot.
/// `None` means the value could not be resolved right now.
pub trait ValueResolver: Send + Sync + std::fmt::Debug {
    fn resolve<'a>(&'a self, raw: &'a str, host: &'a HostSnapshot) -> BoxFuture<'a, Option<String>>;
}

/// Resolves templates and entity references from the snapshot itself
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotResolver;

impl ValueResolver for SnapshotResolver {
    fn resolve<'a>(&'a self, raw: &'a str, host: &'a HostSnapshot) -> BoxFuture<'a, Option<String>> {
        async move { resolve_in_snapshot(raw, host) }.boxed()
    }
}

/// Copy of `config` with its date and timer fields resolved.
///
/// `timer_entity` is only resolved when it is a template; a bare id there
/// names the timer itself, not a value to look up.
pub async fn resolve_config(
    resolver: &dyn ValueResolver,
    config: &CardConfig,
    host: &HostSnapshot,
) -> CardConfig {
    let mut resolved = config.clone();

    if let Some(raw) = config.target_date() {
        resolved.target_date = resolver.resolve(raw, host).await;
        if resolved.target_date.is_none() {
            debug!("target_date '{}' did not resolve", raw);
        }
    }
    if let Some(raw) = config.creation_date() {
        resolved.creation_date = resolver.resolve(raw, host).await;
    }
    if let Some(raw) = config.timer_entity() {
        if is_template(raw) {
            resolved.timer_entity = resolver.resolve(raw, host).await;
        }
    }

    resolved
}

pub fn is_template(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.starts_with("{{") && trimmed.ends_with("}}")
}

fn resolve_in_snapshot(raw: &str, host: &HostSnapshot) -> Option<String> {
    let trimmed = raw.trim();

    if is_template(trimmed) {
        let expr = trimmed[2..trimmed.len() - 2].trim();
        return render_template(expr, host);
    }

    if looks_like_entity_id(trimmed) {
        if let Some(entity) = host.get(trimmed) {
            if entity.is_unavailable() {
                debug!("{} is unavailable", trimmed);
                return None;
            }
            return Some(entity.state.clone());
        }
    }

    Some(raw.to_string())
}

fn render_template(expr: &str, host: &HostSnapshot) -> Option<String> {
    if let Some(args) = call_args(expr, "states") {
        let [entity_id] = args.as_slice() else {
            warn!("states() expects one argument: {}", expr);
            return None;
        };
        return host
            .get(entity_id)
            .filter(|entity| !entity.is_unavailable())
            .map(|entity| entity.state.clone());
    }

    if let Some(args) = call_args(expr, "state_attr") {
        let [entity_id, attribute] = args.as_slice() else {
            warn!("state_attr() expects two arguments: {}", expr);
            return None;
        };
        return host
            .get(entity_id)
            .and_then(|entity| entity.attribute(attribute))
            .and_then(|value| match value {
                Value::Null => None,
                Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            });
    }

    warn!("Unsupported template expression: {}", expr);
    None
}

/// Quoted arguments of `name('a', 'b')`
fn call_args(expr: &str, name: &str) -> Option<Vec<String>> {
    let inner = expr.strip_prefix(name)?.trim_start().strip_prefix('(')?.strip_suffix(')')?;
    Some(
        inner
            .split(',')
            .map(|arg| arg.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .filter(|arg| !arg.is_empty())
            .collect(),
    )
}

fn looks_like_entity_id(value: &str) -> bool {
    match value.split_once('.') {
        Some((domain, object_id)) => {
            let valid = |part: &str| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            };
            valid(domain) && valid(object_id) && !domain.starts_with(|c: char| c.is_ascii_digit())
        }
        None => false,
    }
}
