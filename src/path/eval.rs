use super::Step;
use log::trace;
use serde_json::Value;

/// The result of evaluating a path, borrowing from the queried tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'a> {
    /// The path led nowhere. Distinct from a JSON `null` found in the tree.
    Missing,
    /// A single value.
    One(&'a Value),
    /// A contiguous run of sequence members produced by a splitting step.
    Slice(&'a [Value]),
    /// Candidates gathered by a splitting step.
    Many(Vec<&'a Value>),
}

impl<'a> Node<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Node::Missing)
    }

    /// True for the candidate sets that make later steps apply member by member.
    pub fn is_split(&self) -> bool {
        matches!(self, Node::Slice(_) | Node::Many(_))
    }

    /// Every value this node holds.
    pub fn values(&self) -> Vec<&'a Value> {
        match self {
            Node::Missing => Vec::new(),
            Node::One(value) => vec![*value],
            Node::Slice(items) => items.iter().collect(),
            Node::Many(items) => items.clone(),
        }
    }

    /// Copies the result out of the tree. `Missing` becomes `null`.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Missing => Value::Null,
            Node::One(value) => (*value).clone(),
            Node::Slice(items) => Value::Array(items.to_vec()),
            Node::Many(items) => Value::Array(items.iter().map(|v| (*v).clone()).collect()),
        }
    }
}

/// Runs `steps` left to right against `root`.
///
/// Once a splitting step has produced a candidate set, each later step is applied to
/// every candidate, misses are dropped and candidate sets coming back are flattened.
pub fn evaluate<'a>(steps: &[Step], root: &'a Value) -> Node<'a> {
    let mut current = Node::One(root);
    for step in steps {
        current = match current {
            Node::Missing => return Node::Missing,
            Node::One(subject) => apply(step, subject),
            split => {
                let mut gathered = Vec::new();
                for subject in split.values() {
                    gathered.extend(apply(step, subject).values());
                }
                Node::Many(gathered)
            }
        };
    }
    current
}

fn apply<'a>(step: &Step, subject: &'a Value) -> Node<'a> {
    let result = match (step, subject) {
        (Step::Property(name), Value::Object(members)) => {
            members.get(name).map_or(Node::Missing, Node::One)
        }
        (Step::Index(index), Value::Array(items)) => index_of(items, *index),
        (Step::Slice { from, to, step }, Value::Array(items)) => slice_of(items, *from, *to, *step),
        // Null members are left out of a mapping wildcard.
        (Step::Wildcard, Value::Object(members)) => {
            Node::Many(members.values().filter(|v| !v.is_null()).collect())
        }
        (Step::Wildcard, Value::Array(items)) => Node::Slice(items.as_slice()),
        (Step::Wildcard, other) => Node::One(other),
        (Step::Recursive(name), _) => {
            let mut found = Vec::new();
            descend(subject, name, &mut found);
            if found.is_empty() {
                Node::Missing
            } else {
                Node::Many(found)
            }
        }
        _ => Node::Missing,
    };
    if result.is_missing() {
        trace!("path step `{step}` found nothing");
    }
    result
}

fn index_of(items: &[Value], index: i64) -> Node<'_> {
    match normalize(index, items.len()) {
        Some(index) if index < items.len() => Node::One(&items[index]),
        _ => Node::Missing,
    }
}

fn slice_of(items: &[Value], from: Option<i64>, to: Option<i64>, step: Option<i64>) -> Node<'_> {
    let len = items.len();
    let step = step.unwrap_or(1);
    if step <= 0 {
        return Node::Slice(&[]);
    }
    let from = from.map_or(0, |bound| clamp(bound, len));
    let to = to.map_or(len, |bound| clamp(bound, len));
    if from >= to {
        return Node::Slice(&[]);
    }
    let range = &items[from..to];
    if step == 1 {
        return Node::Slice(range);
    }
    let stride = usize::try_from(step).unwrap_or(usize::MAX);
    Node::Many(range.iter().step_by(stride).collect())
}

/// Resolves a negative position against `len`. `None` when it lands before the start.
fn normalize(position: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let position = if position < 0 {
        position.saturating_add(len)
    } else {
        position
    };
    usize::try_from(position).ok()
}

fn clamp(bound: i64, len: usize) -> usize {
    normalize(bound, len).map_or(0, |bound| bound.min(len))
}

fn descend<'a>(value: &'a Value, name: &str, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(members) => {
            if let Some(hit) = members.get(name) {
                found.push(hit);
            }
            for member in members.values() {
                descend(member, name, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                descend(item, name, found);
            }
        }
        _ => {}
    }
}
