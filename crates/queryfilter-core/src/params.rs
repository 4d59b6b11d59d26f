//! URL search params in bracket notation (`a[b]=c`, `list[0]=x&list[1]=y`).
//!
//! Decoding is best effort and never fails: whatever the input, some map comes
//! back. Encoding writes the same notation, so a map of string leaves survives
//! `parse(stringify(..))` unchanged.

use crate::config::QsOptions;
use crate::errors::{ParamsError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};
use url::form_urlencoded;

/// Decoded query string. Leaves are strings; a leaf merged into a map shows up
/// as a `true` flag keyed by the leaf's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchParams(Map<String, Value>);

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    pub fn from_typed<T: Serialize + ?Sized>(params: &T) -> Result<Self> {
        match serde_json::to_value(params).map_err(ParamsError::Serialize)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ParamsError::NotAMap(kind(&other))),
        }
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(Value::Object(self.0)).map_err(ParamsError::Decode)
    }

    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.0 {
            encode_value(key.clone(), value, &mut pairs);
        }
        pairs.join("&")
    }
}

impl From<Map<String, Value>> for SearchParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromStr for SearchParams {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(parse_search_params(s))
    }
}

impl fmt::Display for SearchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

pub fn parse_search_params(raw: &str) -> SearchParams {
    parse_search_params_with(raw, &QsOptions::default())
}

pub fn parse_search_params_with(raw: &str, opts: &QsOptions) -> SearchParams {
    let query = raw.strip_prefix('?').unwrap_or(raw);

    // Repeated raw keys collapse into one list before any bracket handling.
    let mut values: Vec<(String, Node)> = Vec::new();
    // Empty segments count toward the parameter limit.
    let mut segments = query.split('&');
    for segment in segments.by_ref().take(opts.parameter_limit) {
        let Some((key, value)) = form_urlencoded::parse(segment.as_bytes()).next() else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let leaf = Node::Leaf(value.into_owned());
        match values.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => combine(existing, leaf),
            None => values.push((key.into_owned(), leaf)),
        }
    }
    if segments.next().is_some() {
        debug!(limit = opts.parameter_limit, "query string truncated at parameter limit");
    }

    let mut root = Node::Map(Vec::new());
    for (key, value) in values {
        let segments = split_key(&key, opts);
        if segments.is_empty() {
            continue;
        }
        root = merge(root, build(&segments, value));
    }

    match root.into_value() {
        Value::Object(map) => SearchParams(map),
        _ => SearchParams::default(),
    }
}

pub fn stringify_search_params<T: Serialize + ?Sized>(params: &T) -> Result<String> {
    Ok(SearchParams::from_typed(params)?.to_query_string())
}

fn encode_value(prefix: String, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => out.push(encode_pair(&prefix, "")),
        Value::Bool(b) => out.push(encode_pair(&prefix, &b.to_string())),
        Value::Number(n) => out.push(encode_pair(&prefix, &n.to_string())),
        Value::String(s) => out.push(encode_pair(&prefix, s)),
        Value::Array(items) => {
            if items.is_empty() {
                trace!(key = %prefix, "skipping empty array");
            }
            for (i, item) in items.iter().enumerate() {
                encode_value(format!("{prefix}[{i}]"), item, out);
            }
        }
        Value::Object(map) => {
            if map.is_empty() {
                trace!(key = %prefix, "skipping empty map");
            }
            for (k, v) in map {
                encode_value(format!("{prefix}[{k}]"), v, out);
            }
        }
    }
}

fn encode_pair(key: &str, value: &str) -> String {
    let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
    let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{key}={value}")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Push,
}

/// Splits `a[b][0][]` into `Key(a) Key(b) Index(0) Push`. Bracket groups past
/// `opts.depth` are kept together as one literal key.
fn split_key(key: &str, opts: &QsOptions) -> Vec<Segment> {
    if opts.depth == 0 {
        return vec![Segment::Key(key.to_string())];
    }
    let mut segments = Vec::new();
    let mut group = next_group(key, 0);
    let parent = match group {
        Some((start, _)) => &key[..start],
        None => key,
    };
    if !parent.is_empty() {
        segments.push(Segment::Key(parent.to_string()));
    }

    let mut nested = 0;
    while let Some((start, end)) = group {
        if nested == opts.depth {
            trace!(key, depth = opts.depth, "key nested past depth limit");
            segments.push(Segment::Key(key[start..].to_string()));
            break;
        }
        segments.push(classify(&key[start + 1..end], opts));
        nested += 1;
        group = next_group(key, end + 1);
    }
    segments
}

/// Next `[...]` group at or after `from` with no bracket inside it.
fn next_group(key: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = key.as_bytes();
    let mut open = None;
    for (i, b) in bytes.iter().enumerate().skip(from) {
        match b {
            b'[' => open = Some(i),
            b']' => {
                if let Some(start) = open {
                    return Some((start, i));
                }
            }
            _ => {}
        }
    }
    None
}

fn classify(inner: &str, opts: &QsOptions) -> Segment {
    if inner.is_empty() {
        return Segment::Push;
    }
    match inner.parse::<usize>() {
        Ok(index) if index.to_string() == inner && index <= opts.array_limit => {
            Segment::Index(index)
        }
        Ok(index) if index.to_string() == inner => {
            trace!(index, limit = opts.array_limit, "index above array limit, read as map key");
            Segment::Key(inner.to_string())
        }
        _ => Segment::Key(inner.to_string()),
    }
}

/// Decoded value while merging. List positions stay sparse until `into_value`
/// compacts them, so a large index costs one entry.
#[derive(Debug, Clone)]
enum Node {
    Leaf(String),
    Flag,
    List(BTreeMap<usize, Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    fn is_container(&self) -> bool {
        matches!(self, Node::List(_) | Node::Map(_))
    }

    fn list(items: impl IntoIterator<Item = Node>) -> Node {
        Node::List(items.into_iter().enumerate().collect())
    }

    fn into_value(self) -> Value {
        match self {
            Node::Leaf(s) => Value::String(s),
            Node::Flag => Value::Bool(true),
            Node::List(items) => {
                Value::Array(items.into_values().map(Node::into_value).collect())
            }
            Node::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect(),
            ),
        }
    }
}

/// Appends after the highest position. Positions are renumbered from zero
/// when the highest one is already `usize::MAX`.
fn push(items: &mut BTreeMap<usize, Node>, node: Node) {
    let next = match items.keys().next_back() {
        None => 0,
        Some(&last) => match last.checked_add(1) {
            Some(next) => next,
            None => {
                renumber(items);
                items.len()
            }
        },
    };
    items.insert(next, node);
}

fn renumber(items: &mut BTreeMap<usize, Node>) {
    *items = std::mem::take(items).into_values().enumerate().collect();
}

fn combine(existing: &mut Node, value: Node) {
    match existing {
        Node::List(items) => push(items, value),
        other => {
            let first = std::mem::replace(other, Node::Flag);
            *other = Node::list([first, value]);
        }
    }
}

fn build(segments: &[Segment], leaf: Node) -> Node {
    segments.iter().rev().fold(leaf, |node, segment| match segment {
        Segment::Push => match node {
            list @ Node::List(_) => list,
            other => Node::list([other]),
        },
        Segment::Index(i) => Node::List(BTreeMap::from([(*i, node)])),
        Segment::Key(k) => Node::Map(vec![(k.clone(), node)]),
    })
}

fn merge(target: Node, source: Node) -> Node {
    match (target, source) {
        (Node::List(mut items), source @ (Node::Leaf(_) | Node::Flag)) => {
            push(&mut items, source);
            Node::List(items)
        }
        (Node::Map(mut entries), Node::Leaf(s)) => {
            set_entry(&mut entries, s, Node::Flag);
            Node::Map(entries)
        }
        (target @ Node::Map(_), Node::Flag) => target,
        (target @ (Node::Leaf(_) | Node::Flag), Node::List(mut items)) => {
            // the leaf takes position 0 and the list shifts up by one
            if items.contains_key(&usize::MAX) {
                renumber(&mut items);
            }
            let mut out = BTreeMap::from([(0, target)]);
            out.extend(items.into_iter().map(|(i, node)| (i + 1, node)));
            Node::List(out)
        }
        (target @ (Node::Leaf(_) | Node::Flag), source) => Node::list([target, source]),
        (Node::List(mut items), Node::List(source)) => {
            for (i, item) in source {
                match items.remove(&i) {
                    Some(existing) if existing.is_container() && item.is_container() => {
                        items.insert(i, merge(existing, item));
                    }
                    Some(existing) => {
                        items.insert(i, existing);
                        push(&mut items, item);
                    }
                    None => {
                        items.insert(i, item);
                    }
                }
            }
            Node::List(items)
        }
        (Node::List(items), source @ Node::Map(_)) => merge(list_to_map(items), source),
        (Node::Map(mut entries), Node::List(source)) => {
            for (i, item) in source {
                merge_entry(&mut entries, i.to_string(), item);
            }
            Node::Map(entries)
        }
        (Node::Map(mut entries), Node::Map(source)) => {
            for (k, v) in source {
                merge_entry(&mut entries, k, v);
            }
            Node::Map(entries)
        }
    }
}

fn list_to_map(items: BTreeMap<usize, Node>) -> Node {
    Node::Map(
        items
            .into_iter()
            .map(|(i, node)| (i.to_string(), node))
            .collect(),
    )
}

fn merge_entry(entries: &mut Vec<(String, Node)>, key: String, value: Node) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => {
            let current = std::mem::replace(existing, Node::Flag);
            *existing = merge(current, value);
        }
        None => entries.push((key, value)),
    }
}

fn set_entry(entries: &mut Vec<(String, Node)>, key: String, value: Node) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, existing)) => *existing = value,
        None => entries.push((key, value)),
    }
}
