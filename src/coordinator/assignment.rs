//! Range assignment of partitions to group members.

use std::collections::HashMap;

use crate::types::{SessionId, TopicPartition};

/// Split each topic's partitions evenly across the members subscribed to it.
///
/// Members are processed in ascending session-id order and partitions in
/// index order, so the result is fully determined by the inputs. When the
/// count does not divide evenly, the remainder goes to the lowest ids: with
/// P partitions over K members, every member holds either `P / K` or
/// `P / K + 1` partitions.
pub(crate) fn assign_ranges(
    subscriptions: &[(SessionId, Vec<String>)],
    partition_counts: &HashMap<String, i32>,
) -> HashMap<TopicPartition, SessionId> {
    let mut assignments = HashMap::new();

    for (topic, &count) in partition_counts {
        let mut subscribers: Vec<&SessionId> = subscriptions
            .iter()
            .filter(|(_, topics)| topics.iter().any(|t| t == topic))
            .map(|(session, _)| session)
            .collect();
        subscribers.sort();
        if subscribers.is_empty() {
            continue;
        }

        let partitions = count as usize;
        let base = partitions / subscribers.len();
        let remainder = partitions % subscribers.len();

        let mut next = 0usize;
        for (rank, session) in subscribers.iter().enumerate() {
            let take = base + usize::from(rank < remainder);
            for partition in next..next + take {
                assignments.insert(
                    TopicPartition::new(topic.clone(), partition as i32),
                    (*session).clone(),
                );
            }
            next += take;
        }
    }

    assignments
}
