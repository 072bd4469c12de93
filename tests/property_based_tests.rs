mod common;

use common::*;
use proptest::prelude::*;

use serde_json::Value;

use entity_graph_workers::constants::{edge_labels, properties};
use entity_graph_workers::graph::{EdgeKey, Properties};
use entity_graph_workers::EntityGraph;

#[derive(Debug, Clone)]
enum Mutation {
    AddHost(u8),
    RemoveHost(u8),
    Connect(u8, u8),
    Disconnect(u8, u8),
    /// `None` clears the state property
    SetState(u8, Option<&'static str>),
}

fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        3 => (0u8..6).prop_map(Mutation::AddHost),
        1 => (0u8..6).prop_map(Mutation::RemoveHost),
        2 => (0u8..6, 0u8..6).prop_map(|(a, b)| Mutation::Connect(a, b)),
        1 => (0u8..6, 0u8..6).prop_map(|(a, b)| Mutation::Disconnect(a, b)),
        2 => (0u8..6, prop::option::of(prop::sample::select(vec!["up", "down"])))
            .prop_map(|(n, state)| Mutation::SetState(n, state)),
    ]
}

fn host_id(n: u8) -> String {
    format!("host-{n}")
}

/// Apply to the authoritative graph; rejected mutations emit no change
fn apply(graph: &mut EntityGraph, mutation: &Mutation) {
    match mutation {
        Mutation::AddHost(n) => graph.add_vertex(host(&host_id(*n))),
        Mutation::RemoveHost(n) => {
            let _ = graph.remove_vertex(&host_id(*n));
        }
        Mutation::Connect(a, b) => {
            let _ = graph.add_edge(contains(&host_id(*a), &host_id(*b)));
        }
        Mutation::Disconnect(a, b) => {
            let _ = graph.remove_edge(&EdgeKey {
                source_id: host_id(*a),
                target_id: host_id(*b),
                label: edge_labels::CONTAINS.to_string(),
            });
        }
        Mutation::SetState(n, state) => {
            let mut update = Properties::new();
            update.insert(
                properties::STATE.to_string(),
                state.map_or(Value::Null, Value::from),
            );
            let _ = graph.update_vertex(&host_id(*n), update);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: every replica converges to the authoritative graph
    #[test]
    fn replicas_converge_to_authoritative_graph(
        mutations in prop::collection::vec(mutation_strategy(), 1..40),
        evaluator_workers in 1usize..4,
        api_workers in 0usize..3,
    ) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let cluster = TestCluster::start(evaluator_workers, api_workers).await;
            let (mut authoritative, feed) = EntityGraph::with_change_feed("authoritative");
            for mutation in &mutations {
                apply(&mut authoritative, mutation);
            }
            let expected = detached_copy(&authoritative);
            drop(authoritative);

            cluster.manager.follow_graph_changes(feed).await;

            let statuses = cluster.statuses().await;
            assert_eq!(statuses.len(), evaluator_workers + api_workers);
            for status in &statuses {
                assert_eq!(status.tasks_failed, 0, "{}", status.description());
            }
            assert_replicas_match(&statuses, &expected);
            cluster.shutdown().await;
        });
    }
}
