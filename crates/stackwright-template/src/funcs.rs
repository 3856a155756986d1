//! Functions available to document authors.
//!
//! Every function here is registered on the render environment under the
//! name listed in [`register`]. Functions that take structured arguments
//! receive them as template values and convert through `serde_json`.

use std::collections::BTreeMap;

use minijinja::{Environment, Error, ErrorKind, Value};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;

use crate::workload::{
    MountPoint, Topic, TopicSubscription, WorkloadOpts, LB_WEB_SERVICE_TYPE,
    PRIVATE_SUBNETS_PLACEMENT,
};

/// Register the full function set on `env`.
pub fn register(env: &mut Environment<'_>) {
    env.add_function("to_snake_case", to_snake_case);
    env.add_function("logical_id_safe", strip_non_alphanumeric);
    env.add_function("fmt_slice", fmt_slice);
    env.add_function("quote_slice", quote_slice);
    env.add_function("random_uuid", random_uuid);
    env.add_function("json_mount_points", |v: Value| {
        let mount_points: Option<Vec<MountPoint>> = from_value(&v)?;
        Ok::<_, Error>(mount_point_json(&mount_points.unwrap_or_default()))
    });
    env.add_function("json_sns_topics", |v: Value| {
        let topics: Option<Vec<Topic>> = from_value(&v)?;
        Ok::<_, Error>(sns_topics_json(&topics.unwrap_or_default()))
    });
    env.add_function("json_queue_uris", |v: Value| {
        let subscriptions: Option<Vec<TopicSubscription>> = from_value(&v)?;
        Ok::<_, Error>(queue_uris_json(&subscriptions.unwrap_or_default()))
    });
    env.add_function("env_controller_params", |v: Value| {
        Ok::<_, Error>(env_controller_parameters(&from_value::<WorkloadOpts>(&v)?))
    });
    env.add_function("has_secrets", |v: Value| {
        Ok::<_, Error>(has_secrets(&from_value::<WorkloadOpts>(&v)?))
    });
    env.add_function("word_series", word_series);
    env.add_function("plural_word", plural_word);
    env.add_function("contains", contains);
}

fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    let json = if value.is_undefined() || value.is_none() {
        serde_json::Value::Null
    } else {
        serde_json::to_value(value).map_err(invalid_arg)?
    };
    serde_json::from_value(json).map_err(invalid_arg)
}

fn invalid_arg(e: serde_json::Error) -> Error {
    Error::new(ErrorKind::InvalidOperation, e.to_string())
}

/// `fooBar` becomes `FOO_BAR`.
pub fn to_snake_case(s: &str) -> String {
    let mut name = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() && i != 0 {
            name.push('_');
        }
        name.extend(c.to_uppercase());
    }
    name
}

/// Drop every character that is not an ASCII letter or digit, leaving a
/// string usable as a logical resource id.
pub fn strip_non_alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// `["a", "b"]` becomes `[a, b]`.
pub fn fmt_slice(elems: Vec<String>) -> String {
    format!("[{}]", elems.join(", "))
}

pub fn quote_slice(elems: Vec<String>) -> Vec<String> {
    elems
        .into_iter()
        .map(|e| serde_json::Value::String(e).to_string())
        .collect()
}

/// A v4 UUID from the OS entropy source.
pub fn random_uuid() -> Result<String, Error> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("generate random uuid: {}", e),
        )
    })?;
    Ok(uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string())
}

/// Source volume to container paths, skipping mount points without a path.
pub fn mount_point_json(mount_points: &[MountPoint]) -> String {
    let mut volumes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for mp in mount_points {
        let path = mp.container_path.as_deref().unwrap_or_default();
        if path.is_empty() {
            continue;
        }
        volumes
            .entry(mp.source_volume.clone().unwrap_or_default())
            .or_default()
            .push(path.to_string());
    }
    serde_json::to_string(&volumes).unwrap_or_else(|_| "{}".to_string())
}

/// Topic name to topic ARN. Unnamed topics are left out; no topics at all
/// renders as an empty string.
pub fn sns_topics_json(topics: &[Topic]) -> String {
    if topics.is_empty() {
        return String::new();
    }
    let arns: BTreeMap<&str, String> = topics
        .iter()
        .filter_map(|t| t.name.as_deref().map(|name| (name, t.arn())))
        .collect();
    serde_json::to_string(&arns).unwrap_or_else(|_| "{}".to_string())
}

/// Per-subscription queue logical id to a `Fn::Sub` reference of its URL.
/// Subscriptions missing a name, a service or a queue are left out.
pub fn queue_uris_json(subscriptions: &[TopicSubscription]) -> String {
    if subscriptions.is_empty() {
        return String::new();
    }
    let mut uris = BTreeMap::new();
    for sub in subscriptions {
        let (Some(name), Some(service), Some(_)) = (&sub.name, &sub.service, &sub.queue) else {
            continue;
        };
        let svc = strip_non_alphanumeric(service);
        let topic = title(&strip_non_alphanumeric(name));
        uris.insert(
            format!("{}{}EventsQueue", svc, topic),
            format!("${{{}{}URL}}", svc, topic),
        );
    }
    serde_json::to_string(&uris).unwrap_or_else(|_| "{}".to_string())
}

fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Conditional parameter names the environment controller must declare for
/// this workload. The order is fixed: load balancer names, then networking,
/// then storage.
pub fn env_controller_parameters(opts: &WorkloadOpts) -> Vec<String> {
    let mut parameters = Vec::new();
    if opts.workload_type == LB_WEB_SERVICE_TYPE {
        parameters.push("ALBWorkloads".to_string());
        parameters.push("Aliases".to_string());
    }
    if opts.network.subnets_type == PRIVATE_SUBNETS_PLACEMENT {
        parameters.push("NATWorkloads".to_string());
    }
    if opts
        .storage
        .as_ref()
        .is_some_and(|s| s.requires_efs_creation())
    {
        parameters.push("EFSWorkloads".to_string());
    }
    parameters
}

/// True if the workload binds secrets directly or its nested stack exports
/// secret outputs.
pub fn has_secrets(opts: &WorkloadOpts) -> bool {
    if !opts.secrets.is_empty() {
        return true;
    }
    opts.nested_stack
        .as_ref()
        .is_some_and(|n| !n.secret_outputs.is_empty())
}

/// `["a", "b", "c"]` with `and` becomes `a, b and c`.
pub fn word_series(words: Vec<String>, conjunction: &str) -> String {
    match words.len() {
        0 => String::new(),
        1 => words[0].clone(),
        n => format!(
            "{} {} {}",
            words[..n - 1].join(", "),
            conjunction,
            words[n - 1]
        ),
    }
}

/// Singular form for a quantity of one, otherwise `plural` or a guessed
/// English plural when `plural` is empty.
pub fn plural_word(quantity: i64, singular: &str, plural: Option<&str>) -> String {
    if quantity == 1 {
        return singular.to_string();
    }
    match plural {
        Some(p) if !p.is_empty() => p.to_string(),
        _ => guess_plural(singular),
    }
}

fn guess_plural(word: &str) -> String {
    const SIBILANT_ENDINGS: [&str; 5] = ["s", "x", "z", "ch", "sh"];
    if SIBILANT_ENDINGS.iter().any(|e| word.ends_with(e)) {
        return format!("{}es", word);
    }
    let mut chars = word.chars().rev();
    if let (Some('y'), Some(prev)) = (chars.next(), chars.next()) {
        if !"aeiou".contains(prev) {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    format!("{}s", word)
}

pub fn contains(list: Vec<String>, s: &str) -> bool {
    list.iter().any(|item| item == s)
}
