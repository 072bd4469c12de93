//! Worker manager integration tests.
//!
//! Every test runs real worker threads over in-memory storage. Plain API
//! queues are never joined, so API replicas are observed through
//! `collect_status`, which queues behind every task submitted before it.

mod common;

use common::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use entity_graph_workers::api::{ApiRequest, ApiResponse};
use entity_graph_workers::constants::{events, properties};
use entity_graph_workers::graph::Properties;
use entity_graph_workers::storage::{MemoryStorage, TemplateStatus};
use entity_graph_workers::worker::{ReplicaApplier, WorkerKind};
use entity_graph_workers::{EntityGraph, GraphWorkersError};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_graph_updates_reach_every_replica() {
    let cluster = TestCluster::start(2, 1).await;

    cluster
        .manager
        .submit_graph_update(None, Some(host("B").into()), true)
        .await
        .unwrap();
    cluster
        .manager
        .submit_graph_update(None, Some(host("A").into()), true)
        .await
        .unwrap();
    cluster
        .manager
        .submit_graph_update(None, Some(contains("A", "B").into()), false)
        .await
        .unwrap();

    let mut expected = EntityGraph::new("expected");
    expected.add_vertex(host("A"));
    expected.add_vertex(host("B"));
    expected.add_edge(contains("A", "B")).unwrap();

    let statuses = cluster.statuses().await;
    assert_eq!(statuses.len(), 3);
    assert_replicas_match(&statuses, &expected);
    assert!(statuses.iter().all(|status| status.tasks_failed == 0));

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_updates_are_applied_in_submission_order() {
    let cluster = TestCluster::start(2, 1).await;

    for state in ["up", "degraded", "down"] {
        cluster
            .manager
            .submit_graph_update(
                None,
                Some(host("h1").with_property(properties::STATE, state).into()),
                true,
            )
            .await
            .unwrap();
    }
    cluster
        .manager
        .submit_graph_update(None, Some(host("h2").into()), true)
        .await
        .unwrap();
    cluster
        .manager
        .submit_graph_update(None, Some(contains("h1", "h2").into()), false)
        .await
        .unwrap();

    let mut expected = EntityGraph::new("expected");
    expected.add_vertex(host("h1").with_property(properties::STATE, "down"));
    expected.add_vertex(host("h2"));
    expected.add_edge(contains("h1", "h2")).unwrap();

    // Barrier for the API worker's plain queue
    let statuses = cluster.statuses().await;
    assert!(statuses.iter().all(|status| status.tasks_failed == 0));
    assert_replicas_match(&statuses, &expected);

    let client = cluster.manager.api_client().expect("API pool is running");
    let response = client
        .call(ApiRequest::ShowResource {
            vertex_id: "h1".to_string(),
        })
        .await
        .unwrap();
    match response {
        ApiResponse::Resource(vertex) => {
            assert_eq!(vertex.get_str(properties::STATE), Some("down"));
        }
        other => panic!("unexpected response {other:?}"),
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_update_does_not_stop_the_worker() {
    let cluster = TestCluster::start(2, 1).await;

    // Delete an edge no replica ever had
    cluster
        .manager
        .submit_graph_update(Some(contains("A", "B").into()), None, false)
        .await
        .unwrap();
    cluster
        .manager
        .submit_graph_update(None, Some(host("A").into()), true)
        .await
        .unwrap();

    let mut expected = EntityGraph::new("expected");
    expected.add_vertex(host("A"));

    let statuses = cluster.statuses().await;
    assert_eq!(statuses.len(), 3);
    for status in &statuses {
        assert_eq!(status.tasks_failed, 1, "{}", status.description());
        // wait_for_worker_start plus the vertex add
        assert_eq!(status.tasks_processed, 2, "{}", status.description());
    }
    assert_replicas_match(&statuses, &expected);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pools_are_created_only_once() {
    let mut cluster = TestCluster::start(2, 3).await;

    let err = cluster.manager.add_api_workers(3).unwrap_err();
    assert!(matches!(err, GraphWorkersError::InvalidState(_)));
    let err = cluster.manager.add_evaluator_workers(2).unwrap_err();
    assert!(matches!(err, GraphWorkersError::InvalidState(_)));

    assert_eq!(cluster.manager.api_workers(), 3);
    assert_eq!(cluster.manager.evaluator_workers(), 2);

    let statuses = cluster.statuses().await;
    let api = statuses
        .iter()
        .filter(|status| status.worker_kind == WorkerKind::Api)
        .count();
    assert_eq!(api, 3);
    assert_eq!(statuses.len(), 5);

    cluster.shutdown().await;
}

#[test]
fn test_zero_evaluator_workers_is_rejected() {
    let mut cluster = TestCluster::new(0, 0);
    let err = cluster.manager.add_evaluator_workers(0).unwrap_err();
    assert!(matches!(err, GraphWorkersError::Configuration(_)));
    assert_eq!(cluster.manager.evaluator_workers(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_follow_graph_changes_mirrors_authoritative_graph() {
    let cluster = TestCluster::start(3, 2).await;
    let (mut authoritative, feed) = EntityGraph::with_change_feed("authoritative");

    authoritative.add_vertex(host("h1"));
    authoritative.add_vertex(host("h2"));
    authoritative.add_vertex(alarm("a1"));
    authoritative.add_edge(contains("h1", "h2")).unwrap();
    let mut changed = Properties::new();
    changed.insert(properties::STATE.to_string(), json!("down"));
    authoritative.update_vertex("h2", changed).unwrap();
    authoritative.remove_vertex("a1").unwrap();

    let expected = detached_copy(&authoritative);
    drop(authoritative);

    let forwarded = cluster.manager.follow_graph_changes(feed).await;
    assert_eq!(forwarded, 6);

    assert_replicas_match(&cluster.statuses().await, &expected);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_db_graph_loads_snapshot_and_replays_events() {
    let backend = Arc::new(MemoryStorage::new());
    let mut cluster = TestCluster::with_backend(backend, 2, 1);

    let mut persisted = EntityGraph::new("persisted");
    persisted.add_vertex(host("h1"));
    persisted.add_vertex(host("h2"));
    persisted.add_edge(contains("h1", "h2")).unwrap();

    let events = &cluster.storage.events;
    let included = events
        .append_event(true, None, Some(host("h2").into()))
        .await
        .unwrap();
    cluster
        .storage
        .snapshots
        .save_snapshot(included, persisted.to_snapshot().unwrap())
        .await
        .unwrap();
    events
        .append_event(true, None, Some(host("h3").into()))
        .await
        .unwrap();

    cluster.start_pools().await;
    for status in cluster.statuses().await {
        assert!(!status.ready);
    }

    cluster.manager.submit_read_db_graph().await.unwrap();

    let mut expected = detached_copy(&persisted);
    expected.add_vertex(host("h3"));

    let statuses = cluster.statuses().await;
    assert!(statuses.iter().all(|status| status.ready));
    assert_replicas_match(&statuses, &expected);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_authoritative_graph_and_replicas_start_from_the_same_state() {
    let mut cluster = TestCluster::new(2, 1);

    let mut persisted = EntityGraph::new("persisted");
    persisted.add_vertex(host("h1"));
    let events = &cluster.storage.events;
    let included = events
        .append_event(true, None, Some(host("h1").into()))
        .await
        .unwrap();
    cluster
        .storage
        .snapshots
        .save_snapshot(included, persisted.to_snapshot().unwrap())
        .await
        .unwrap();
    events
        .append_event(true, None, Some(host("h2").into()))
        .await
        .unwrap();

    cluster.start_pools().await;
    let (mut authoritative, feed) = ReplicaApplier::new(cluster.storage.clone())
        .load_authoritative_graph("authoritative")
        .await
        .unwrap();
    cluster.manager.submit_read_db_graph().await.unwrap();
    assert_eq!(authoritative.num_vertices(), 2);
    assert_replicas_match(&cluster.statuses().await, &authoritative);

    // Later mutations still converge
    authoritative.add_edge(contains("h1", "h2")).unwrap();
    let expected = detached_copy(&authoritative);
    drop(authoritative);
    assert_eq!(cluster.manager.follow_graph_changes(feed).await, 1);
    assert_replicas_match(&cluster.statuses().await, &expected);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_standard_shards_fire_each_scenario_once() {
    let mut cluster = TestCluster::new(2, 0);
    for name in ["tpl_a", "tpl_b", "tpl_c"] {
        cluster
            .storage
            .templates
            .upsert(host_down_template(name, TemplateStatus::Active))
            .await
            .unwrap();
    }
    cluster.start_pools().await;
    let mut notifications = cluster.subscribe();

    cluster.manager.submit_enable_evaluations().await.unwrap();
    cluster
        .manager
        .submit_graph_update(None, Some(down_host("h1").into()), true)
        .await
        .unwrap();

    let fired: Vec<String> = drain(&mut notifications)
        .into_iter()
        .filter(|notification| notification.event_type == events::ACTION_DO)
        .map(|notification| notification.payload["scenario_id"].as_str().unwrap().to_string())
        .collect();
    let unique: HashSet<&String> = fired.iter().collect();
    assert_eq!(fired.len(), 3);
    assert_eq!(unique.len(), 3);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_evaluations_runs_a_full_pass() {
    let mut cluster = TestCluster::new(1, 1);
    cluster
        .storage
        .templates
        .upsert(host_down_template("host_down", TemplateStatus::Active))
        .await
        .unwrap();
    cluster.start_pools().await;
    let mut notifications = cluster.subscribe();

    cluster
        .manager
        .submit_graph_update(None, Some(down_host("h1").into()), true)
        .await
        .unwrap();
    assert!(drain(&mut notifications).is_empty());

    cluster.manager.submit_start_evaluations().await.unwrap();
    let fired = drain(&mut notifications);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].payload["target_id"], "h1");

    let evaluator = cluster
        .statuses()
        .await
        .into_iter()
        .find(|status| status.worker_kind == WorkerKind::Evaluator)
        .unwrap();
    assert!(evaluator.evaluation_enabled);

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_api_reads_observe_whole_updates() {
    let cluster = TestCluster::start(1, 2).await;
    let client = cluster.manager.api_client().unwrap();

    let reader = {
        let client = client.clone();
        tokio::spawn(async move {
            let mut observed = Vec::new();
            for _ in 0..50 {
                if let Ok(ApiResponse::Topology(content)) = client.call(ApiRequest::GetTopology).await {
                    observed.push(content);
                }
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    for i in 0..20 {
        let id = format!("h{i}");
        cluster
            .manager
            .submit_graph_update(None, Some(host(&id).into()), true)
            .await
            .unwrap();
        if i > 0 {
            let previous = format!("h{}", i - 1);
            cluster
                .manager
                .submit_graph_update(None, Some(contains(&previous, &id).into()), false)
                .await
                .unwrap();
        }
    }

    for content in reader.await.unwrap() {
        let ids: HashSet<&str> = content.vertices.iter().map(|v| v.vertex_id.as_str()).collect();
        for edge in &content.edges {
            assert!(ids.contains(edge.source_id.as_str()));
            assert!(ids.contains(edge.target_id.as_str()));
        }
    }

    cluster.statuses().await;
    match client.call(ApiRequest::GetTopology).await.unwrap() {
        ApiResponse::Topology(content) => {
            assert_eq!(content.vertices.len(), 20);
            assert_eq!(content.edges.len(), 19);
        }
        other => panic!("unexpected response {other:?}"),
    }

    cluster.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_stops_every_worker() {
    let mut cluster = TestCluster::start(2, 2).await;

    cluster.manager.shutdown(SHUTDOWN_GRACE).await.unwrap();

    assert!(cluster.manager.api_client().is_none());
    let statuses = cluster.manager.collect_status(STATUS_TIMEOUT).await.unwrap();
    assert!(statuses.is_empty());

    let err = cluster
        .manager
        .submit_graph_update(None, Some(host("late").into()), true)
        .await
        .unwrap_err();
    assert!(matches!(err, GraphWorkersError::Worker(_)));
}
