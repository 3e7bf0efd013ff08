//! Processor behaviour on individual deliveries: lifecycle, idempotent
//! redelivery, defect handling and failure isolation.


use std::sync::atomic::Ordering;
use std::sync::Arc;

use knight_path::board::Position;
use knight_path::error::KnightError;
use knight_path::job::{Request, RequestStatus};
use knight_path::processor::{Outcome, Processor};
use knight_path::service::JobService;
use knight_path::store::{JobStore, MemoryJobStore};
use test_harness::{test_processor_config, FaultyStore};

fn request(start: &str, end: &str) -> Request {
    Request::new(Position::parse(start).unwrap(), Position::parse(end).unwrap())
}

fn processor(store: Arc<dyn JobStore>) -> Arc<Processor> {
    Arc::new(Processor::new(store, test_processor_config()))
}

#[tokio::test]
async fn test_pending_request_is_completed() {
    let store = Arc::new(MemoryJobStore::new());
    let service = JobService::new(store.clone());
    let id = service.submit("A1", "B3").await.unwrap();

    let pending = store.get_request(&id).await.unwrap().unwrap();
    assert_eq!(pending.status, RequestStatus::Pending);

    let outcome = processor(store.clone()).process_request(&pending).await;
    assert_eq!(outcome, Outcome::Completed { moves: 1 });

    let done = store.get_request(&id).await.unwrap().unwrap();
    assert_eq!(done.status, RequestStatus::Completed);
    assert!(done.updated_at >= pending.updated_at);
    assert_eq!(done.created_at, pending.created_at);

    let result = service.get_result(&id).await.unwrap().unwrap();
    let path: Vec<String> = result.shortest_path.iter().map(|p| p.to_string()).collect();
    assert_eq!(path, vec!["A1", "B3"]);
    assert_eq!(result.number_of_moves, 1);
    assert_eq!(result.request_id, id);
    assert_eq!(result.id, id);
}

#[tokio::test]
async fn test_reprocessing_completed_request_is_noop() {
    let store = Arc::new(MemoryJobStore::new());
    let req = request("A1", "H8");
    store.create_request(req.clone()).await.unwrap();

    let processor = processor(store.clone());
    assert!(matches!(
        processor.process_request(&req).await,
        Outcome::Completed { moves: 6 }
    ));

    let completed = store.get_request(&req.id).await.unwrap().unwrap();
    let result = store.get_result_by_request_id(&req.id).await.unwrap().unwrap();
    let changes = store.read_changes(0, 100).await.unwrap().len();

    // Redelivery of the completed copy and of the stale pending copy.
    assert_eq!(
        processor.process_request(&completed).await,
        Outcome::AlreadyCompleted
    );
    assert_eq!(processor.process_request(&req).await, Outcome::AlreadyCompleted);

    let after = store.get_request(&req.id).await.unwrap().unwrap();
    assert_eq!(after.updated_at, completed.updated_at);
    assert_eq!(after.status, RequestStatus::Completed);
    assert_eq!(
        store.get_result_by_request_id(&req.id).await.unwrap().unwrap(),
        result
    );
    assert_eq!(store.read_changes(0, 100).await.unwrap().len(), changes);
}

#[tokio::test]
async fn test_corrupted_request_is_left_pending() {
    let store = Arc::new(MemoryJobStore::new());
    let mut req = request("A1", "B3");
    req.end_position = "Z9".to_string();
    store.create_request(req.clone()).await.unwrap();

    let outcome = processor(store.clone()).process_request(&req).await;
    assert!(matches!(
        outcome,
        Outcome::Defect(KnightError::ProcessingDefect { .. })
    ));

    let stored = store.get_request(&req.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(store.get_result_by_request_id(&req.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_request_is_a_defect() {
    let store = Arc::new(MemoryJobStore::new());
    let req = request("A1", "B3");

    let outcome = processor(store).process_request(&req).await;
    assert!(matches!(
        outcome,
        Outcome::Defect(KnightError::RequestNotFound(_))
    ));
}

#[tokio::test]
async fn test_status_update_failure_is_retried_safely() {
    let store = FaultyStore::new();
    let req = request("A1", "H8");
    store.create_request(req.clone()).await.unwrap();
    store.fail_next_replaces(1);

    let processor = processor(store.clone());
    let first = processor.process_request(&req).await;
    assert!(matches!(
        first,
        Outcome::Failed(KnightError::StorageUnavailable(_))
    ));

    // Result written, request still pending: the redelivery finishes the job.
    let stored = store.get_request(&req.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Pending);
    let early = store.get_result_by_request_id(&req.id).await.unwrap().unwrap();

    assert_eq!(
        processor.process_request(&req).await,
        Outcome::Completed { moves: 6 }
    );
    let late = store.get_result_by_request_id(&req.id).await.unwrap().unwrap();
    assert_eq!(early, late);
    assert_eq!(store.inner.result_count().await, 1);
    assert!(store.get_request(&req.id).await.unwrap().unwrap().is_completed());
}

#[tokio::test]
async fn test_result_write_failure_leaves_request_pending() {
    let store = FaultyStore::new();
    let req = request("B1", "C3");
    store.create_request(req.clone()).await.unwrap();
    store.fail_next_upserts(1);

    let outcome = processor(store.clone()).process_request(&req).await;
    assert!(matches!(outcome, Outcome::Failed(_)));
    assert!(!store.get_request(&req.id).await.unwrap().unwrap().is_completed());
    assert!(store.get_result_by_request_id(&req.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let store = Arc::new(MemoryJobStore::new());
    let good_a = request("A1", "B3");
    let good_b = request("C2", "E3");
    let mut bad = request("A1", "B3");
    bad.start_position = "a1".to_string();
    for req in [&good_a, &bad, &good_b] {
        store.create_request(req.clone()).await.unwrap();
    }

    let report = processor(store.clone())
        .process_batch(vec![good_a.clone(), bad.clone(), good_b.clone()])
        .await;

    assert_eq!(report.completed, 2);
    assert_eq!(report.defects, 1);
    assert!(!report.should_retry());
    assert!(store.get_request(&good_a.id).await.unwrap().unwrap().is_completed());
    assert!(store.get_request(&good_b.id).await.unwrap().unwrap().is_completed());
    assert!(!store.get_request(&bad.id).await.unwrap().unwrap().is_completed());
}

#[tokio::test]
async fn test_batch_with_storage_failure_requests_retry() {
    let store = FaultyStore::new();
    let a = request("A1", "B3");
    let b = request("D4", "E6");
    store.create_request(a.clone()).await.unwrap();
    store.create_request(b.clone()).await.unwrap();
    store.fail_next_upserts(1);

    let report = processor(store.clone()).process_batch(vec![a, b]).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 1);
    assert!(report.should_retry());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_concurrent_delivery_is_harmless() {
    let store = FaultyStore::new();
    let req = request("A1", "H8");
    store.create_request(req.clone()).await.unwrap();

    let report = processor(store.clone())
        .process_batch(vec![req.clone(); 12])
        .await;

    assert_eq!(report.total(), 12);
    assert!(report.completed >= 1);
    assert_eq!(report.completed + report.skipped, 12);
    assert_eq!(report.failed, 0);
    assert!(store.upsert_calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(store.inner.result_count().await, 1);

    let stored = store.get_request(&req.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
    let result = store.get_result_by_request_id(&req.id).await.unwrap().unwrap();
    assert_eq!(result.number_of_moves, 6);

    // Exactly one completion reached the store: created + completed.
    let changes = store.read_changes(0, 100).await.unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[1].request.updated_at, stored.updated_at);
    assert_eq!(store.latest_sequence(), 2);

    // Late duplicates leave the completion timestamp alone.
    let report = processor(store.clone())
        .process_batch(vec![req.clone(); 4])
        .await;
    assert_eq!(report.skipped, 4);
    let after = store.get_request(&req.id).await.unwrap().unwrap();
    assert_eq!(after.updated_at, stored.updated_at);
    assert_eq!(store.read_changes(0, 100).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_stale_completion_does_not_touch_completed_request() {
    let store = Arc::new(MemoryJobStore::new());
    let req = request("A1", "H8");
    store.create_request(req.clone()).await.unwrap();

    let processor = processor(store.clone());
    assert_eq!(
        processor.process_request(&req).await,
        Outcome::Completed { moves: 6 }
    );
    let first = store.get_request(&req.id).await.unwrap().unwrap();

    // A concurrent delivery that passed the pending check before the first
    // completion landed writes its own completion afterwards.
    let mut late = req.clone();
    late.complete(chrono::Utc::now() + chrono::Duration::seconds(1));
    store.replace_request(late).await.unwrap();

    let stored = store.get_request(&req.id).await.unwrap().unwrap();
    assert_eq!(stored.updated_at, first.updated_at);
    assert_eq!(store.read_changes(0, 100).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_path_not_found_is_not_retried() {
    let err = KnightError::PathNotFound {
        start: "A1".to_string(),
        end: "H8".to_string(),
    };
    assert!(matches!(Outcome::from_error(err), Outcome::Defect(_)));
}

#[tokio::test]
async fn test_many_requests_processed_concurrently() {
    let store = Arc::new(MemoryJobStore::new());
    let service = JobService::new(store.clone());
    let squares: Vec<String> = Position::all().map(|p| p.to_string()).collect();

    let mut requests = Vec::new();
    for end in &squares {
        let id = service.submit("D4", end).await.unwrap();
        requests.push(store.get_request(&id).await.unwrap().unwrap());
    }

    let report = processor(store.clone()).process_batch(requests.clone()).await;
    assert_eq!(report.completed, 64);

    for req in requests {
        let result = service.get_result(&req.id).await.unwrap().unwrap();
        assert_eq!(result.shortest_path.first().unwrap().to_string(), "D4");
        assert_eq!(
            result.shortest_path.last().unwrap().to_string(),
            req.end_position
        );
    }
}
