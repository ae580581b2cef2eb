//! Concurrent mutation of a single pull request.
//!
//! Many reassignments, a merge and a rebalance race on the same pull
//! request. Whatever interleaving wins, the stored state must satisfy the
//! reviewer invariants and every successful call must have seen a
//! consistent snapshot.

use review_assigner_lib::db::{self, pull_requests, teams};
use review_assigner_lib::logging::MemoryLogger;
use review_assigner_lib::models::{NewPullRequest, PullRequestStatus, TeamMember};
use review_assigner_lib::services::AssignmentService;
use std::collections::HashSet;
use tempfile::tempdir;

fn members(count: usize) -> Vec<TeamMember> {
    (0..count)
        .map(|i| TeamMember {
            user_id: format!("u{}", i),
            username: format!("User {}", i),
            is_active: true,
        })
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_reassign_keeps_invariants() {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("concurrent.db")).await.unwrap();
    teams::create_with_members(&pool, "T", &members(6)).await.unwrap();

    let service = AssignmentService::new(pool.clone(), MemoryLogger::new());
    let created = service
        .create_pull_request(NewPullRequest::new("p1", "Contended", "u0"))
        .await
        .unwrap();
    assert_eq!(created.assigned_reviewers.len(), 2);

    // Every task tries to swap out each non-author user; most hit NOT_ASSIGNED.
    let mut handles = Vec::new();
    for _ in 0..4 {
        for i in 1..6 {
            let service = service.clone();
            let old = format!("u{}", i);
            handles.push(tokio::spawn(async move { service.reassign("p1", &old).await }));
        }
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                succeeded += 1;
                let reviewers = &outcome.pull_request.assigned_reviewers;
                assert_eq!(reviewers.len(), 2);
                assert!(reviewers.contains(&outcome.new_reviewer_id));
            }
            Err(e) => assert!(
                matches!(e.code(), "NOT_ASSIGNED" | "NO_CANDIDATE"),
                "unexpected error {}",
                e
            ),
        }
    }
    assert!(succeeded > 0);

    let stored = service.get_pull_request("p1").await.unwrap();
    assert_eq!(stored.assigned_reviewers.len(), 2);
    assert!(!stored.has_reviewer("u0"));
    let unique: HashSet<_> = stored.assigned_reviewers.iter().collect();
    assert_eq!(unique.len(), 2);
    assert!(!stored.need_more_reviewers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_merge_races_with_reassign() {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("concurrent.db")).await.unwrap();
    teams::create_with_members(&pool, "T", &members(5)).await.unwrap();

    let service = AssignmentService::new(pool.clone(), MemoryLogger::new());
    let created = service
        .create_pull_request(NewPullRequest::new("p1", "Contended", "u0"))
        .await
        .unwrap();
    let target = created.assigned_reviewers[0].clone();

    let merge = {
        let service = service.clone();
        tokio::spawn(async move { service.merge("p1").await })
    };
    let reassign = {
        let service = service.clone();
        tokio::spawn(async move { service.reassign("p1", &target).await })
    };

    let merged = merge.await.unwrap().unwrap();
    let reassigned = reassign.await.unwrap();

    let stored = service.get_pull_request("p1").await.unwrap();
    assert!(!stored.is_open());
    assert_eq!(stored.status, PullRequestStatus::Merged);
    assert_eq!(stored.assigned_reviewers, merged.assigned_reviewers);

    match reassigned {
        // Reassign committed first: the merge froze its result.
        Ok(outcome) => assert!(merged.has_reviewer(&outcome.new_reviewer_id)),
        // Merge committed first.
        Err(e) => assert_eq!(e.code(), "PR_MERGED"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebalance_races_with_reassign() {
    let dir = tempdir().unwrap();
    let pool = db::initialize(&dir.path().join("concurrent.db")).await.unwrap();
    teams::create_with_members(&pool, "T", &members(5)).await.unwrap();

    let service = AssignmentService::new(pool.clone(), MemoryLogger::new());
    let created = service
        .create_pull_request(NewPullRequest::new("p1", "Contended", "u0"))
        .await
        .unwrap();
    let leaving = created.assigned_reviewers[0].clone();
    let other = created.assigned_reviewers[1].clone();

    db::users::set_is_active(&pool, &leaving, false).await.unwrap();

    let strip = {
        let pool = pool.clone();
        let leaving = leaving.clone();
        tokio::spawn(async move { pull_requests::reassign_from_all_prs(&pool, &leaving).await })
    };
    let swap = {
        let service = service.clone();
        tokio::spawn(async move { service.reassign("p1", &other).await })
    };

    strip.await.unwrap().unwrap();
    let _ = swap.await.unwrap();

    let stored = service.get_pull_request("p1").await.unwrap();
    assert!(!stored.has_reviewer(&leaving));
    assert!(!stored.has_reviewer("u0"));
    assert!(stored.assigned_reviewers.len() <= 2);
    let unique: HashSet<_> = stored.assigned_reviewers.iter().collect();
    assert_eq!(unique.len(), stored.assigned_reviewers.len());
    assert!(stored.is_open());
    assert_eq!(stored.need_more_reviewers, stored.assigned_reviewers.len() < 2);
}
