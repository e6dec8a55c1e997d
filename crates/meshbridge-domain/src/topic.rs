use crate::types::TopicPrefixes;

/// Classification of an incoming topic, in fixed priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicClass {
    Kpi,
    Status,
    Raw,
}

/// Classify a topic by literal string-prefix test: KPI wins over status,
/// everything else is raw.
///
/// Matching is a raw string-prefix test, not hierarchical segment matching:
/// a topic such as `mesh/kpix/a` still matches a KPI prefix of `mesh/kpi`.
pub fn classify_topic(prefixes: &TopicPrefixes, topic: &str) -> TopicClass {
    if topic.starts_with(&prefixes.kpi) {
        TopicClass::Kpi
    } else if topic.starts_with(&prefixes.status) {
        TopicClass::Status
    } else {
        TopicClass::Raw
    }
}

/// Extract the device id: the final `/`-separated segment of the topic.
///
/// A topic with no `/` yields the whole topic; a trailing `/` yields an
/// empty id. The id is never validated against any registry.
pub fn device_id_from_topic(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}
