use super::*;
use chrono::{Duration, Utc};
use media_sync_models::MediaIds;

fn movie(imdb: &str, title: &str, year: u32) -> MediaRecord {
    MediaRecord::movie(title, Some(year)).with_ids(MediaIds::new().with_imdb(imdb))
}

fn remote_movie(trakt: u64, imdb: &str, title: &str, year: u32) -> MediaRecord {
    MediaRecord::movie(title, Some(year)).with_ids(MediaIds::new().with_trakt(trakt).with_imdb(imdb))
}

fn episode(show: u64, season: u32, number: u32) -> MediaRecord {
    MediaRecord::episode("Lost", Some(2004), season, number).with_ids(MediaIds::new().with_trakt(show))
}

fn policy() -> DiffPolicy {
    DiffPolicy::default()
}

/// Apply a plan the way a successful run would: local pulls onto the local
/// set, pushes and removals onto the remote set.
fn apply(plan: &SyncPlan, local: &mut Vec<MediaRecord>, remote: &mut Vec<MediaRecord>) {
    for desired in &plan.to_pull_local {
        if let Some(record) = local.iter_mut().find(|r| r.local_id == desired.local_id) {
            record.watched = desired.watched;
            record.plays = desired.plays;
            record.collected = desired.collected;
            record.rating = desired.rating;
            if !desired.watched {
                record.progress = None;
            }
        }
    }
    for removed in &plan.to_remove_remote {
        remote.retain(|r| !crate::id_matching::matches(removed, r));
    }
    for pushed in &plan.to_push_remote {
        remote.retain(|r| !crate::id_matching::matches(pushed, r));
        let mut record = pushed.clone();
        record.local_id = None;
        record.plays = record.plays.max(1);
        record.unseen = false;
        remote.push(record);
    }
}

#[test]
fn test_shawshank_is_pushed() {
    let local = vec![movie("tt0111161", "Shawshank", 1994).with_local_id(1).with_plays(1)];
    let plan = compute_facet_diff(Facet::Watched, &local, &[], &policy());
    assert_eq!(plan.to_push_remote.len(), 1);
    assert_eq!(plan.to_push_remote[0].ids.secondary(), Some("tt0111161"));
    assert!(plan.to_pull_local.is_empty());
    assert!(plan.to_remove_remote.is_empty());
}

#[test]
fn test_diff_is_idempotent_on_converged_sets() {
    let local = vec![
        movie("tt0111161", "Shawshank", 1994).with_local_id(1).with_plays(2),
        movie("tt0113277", "Heat", 1995).with_local_id(2),
    ];
    let remote = vec![remote_movie(1, "tt0111161", "The Shawshank Redemption", 1994).with_plays(2)];
    let plan = compute_facet_diff(Facet::Watched, &local, &remote, &policy());
    assert!(plan.is_empty());
    let again = compute_facet_diff(Facet::Watched, &local, &remote, &policy());
    assert_eq!(plan, again);
}

#[test]
fn test_watched_converges_after_apply() {
    let mut local = vec![
        movie("tt0111161", "Shawshank", 1994).with_local_id(1).with_plays(1),
        movie("tt0113277", "Heat", 1995).with_local_id(2),
        movie("tt0120057", "Ronin", 1998).with_local_id(3),
    ];
    let mut unseen = remote_movie(3, "tt0120057", "Ronin", 1998);
    unseen.unseen = true;
    local[2].watched = true;
    let mut remote = vec![remote_movie(2, "tt0113277", "Heat", 1995).with_plays(1), unseen];

    let plan = compute_facet_diff(Facet::Watched, &local, &remote, &policy());
    assert_eq!(plan.to_push_remote.len(), 1);
    assert_eq!(plan.to_pull_local.len(), 2);

    apply(&plan, &mut local, &mut remote);
    let after = compute_facet_diff(Facet::Watched, &local, &remote, &policy());
    assert!(after.is_empty(), "expected converged plan, got {:?}", after);
}

#[test]
fn test_unseen_dominates_local_watched() {
    let local = vec![movie("tt0113277", "Heat", 1995).with_local_id(7).with_plays(3)];
    let mut remote = remote_movie(2, "tt0113277", "Heat", 1995);
    remote.unseen = true;

    let plan = compute_facet_diff(Facet::Watched, &local, &[remote], &policy());
    assert!(plan.to_push_remote.is_empty());
    assert_eq!(plan.to_pull_local.len(), 1);
    assert_eq!(plan.to_pull_local[0].local_id, Some(7));
    assert!(!plan.to_pull_local[0].watched);
    // Pulled record learns the remote primary ID
    assert_eq!(plan.to_pull_local[0].ids.primary(), Some(2));
}

#[test]
fn test_remote_only_items_are_not_pulled() {
    let remote = vec![remote_movie(2, "tt0113277", "Heat", 1995).with_plays(1)];
    let plan = compute_facet_diff(Facet::Watched, &[], &remote, &policy());
    assert!(plan.is_empty());
}

#[test]
fn test_progress_threshold_counts_as_watched() {
    let mut record = movie("tt0113277", "Heat", 1995).with_local_id(1);
    record.progress = Some(85.0);
    let plan = compute_facet_diff(Facet::Watched, &[record.clone()], &[], &policy());
    assert_eq!(plan.to_push_remote.len(), 1);

    record.progress = Some(50.0);
    let plan = compute_facet_diff(Facet::Watched, &[record], &[], &policy());
    assert!(plan.is_empty());
}

#[test]
fn test_malformed_local_id_matches_by_title() {
    let local = vec![movie("tt01111", "The Shawshank Redemption", 1994).with_local_id(1).with_plays(1)];
    let remote = vec![remote_movie(1, "tt0111161", "The Shawshank Redemption", 1994).with_plays(1)];
    let plan = compute_facet_diff(Facet::Watched, &local, &remote, &policy());
    assert!(plan.is_empty());
}

#[test]
fn test_placeholder_episodes_are_filtered() {
    let remote = vec![episode(100, 1, 0).collected()];
    let local = vec![episode(100, 1, 0).with_local_id(1)];
    let plan = compute_facet_diff(Facet::Collection, &local, &remote, &DiffPolicy {
        keep_library_clean: true,
        ..policy()
    });
    assert!(plan.to_push_remote.is_empty());
    assert!(plan.to_pull_local.is_empty());
    assert!(plan.to_remove_remote.is_empty());
    assert_eq!(plan.skipped, 2);
}

#[test]
fn test_unidentifiable_local_record_is_skipped() {
    let local = vec![MediaRecord::movie("", None).with_local_id(1).with_plays(1)];
    let plan = compute_facet_diff(Facet::Watched, &local, &[], &policy());
    assert!(plan.is_empty());
    assert_eq!(plan.skipped, 1);
}

#[test]
fn test_collection_push_and_pull() {
    let local = vec![
        movie("tt0113277", "Heat", 1995).with_local_id(1).collected(),
        movie("tt0120057", "Ronin", 1998).with_local_id(2),
    ];
    let remote = vec![remote_movie(3, "tt0120057", "Ronin", 1998).collected()];
    let plan = compute_facet_diff(Facet::Collection, &local, &remote, &policy());
    assert_eq!(plan.to_push_remote.len(), 1);
    assert_eq!(plan.to_push_remote[0].title, "Heat");
    assert_eq!(plan.to_pull_local.len(), 1);
    assert_eq!(plan.to_pull_local[0].local_id, Some(2));
    assert!(plan.to_pull_local[0].collected);
}

#[test]
fn test_cleanup_requires_flag_and_single_source() {
    let local = vec![movie("tt0113277", "Heat", 1995).with_local_id(1).collected()];
    let remote = vec![
        remote_movie(2, "tt0113277", "Heat", 1995).collected(),
        remote_movie(3, "tt0120057", "Ronin", 1998).collected(),
    ];

    let plan = compute_facet_diff(Facet::Collection, &local, &remote, &policy());
    assert!(plan.to_remove_remote.is_empty());

    let clean = DiffPolicy {
        keep_library_clean: true,
        ..policy()
    };
    let plan = compute_facet_diff(Facet::Collection, &local, &remote, &clean);
    assert_eq!(plan.to_remove_remote.len(), 1);
    assert_eq!(plan.to_remove_remote[0].title, "Ronin");

    let multi_source = DiffPolicy {
        active_sources: 2,
        ..clean
    };
    let plan = compute_facet_diff(Facet::Collection, &local, &remote, &multi_source);
    assert!(plan.to_remove_remote.is_empty());
}

#[test]
fn test_ratings_newer_side_wins() {
    let now = Utc::now();
    let local_newer = movie("tt0113277", "Heat", 1995).with_local_id(1).with_rating(9, Some(now));
    let remote_older = remote_movie(2, "tt0113277", "Heat", 1995).with_rating(6, Some(now - Duration::days(3)));
    let plan = compute_facet_diff(Facet::Ratings, &[local_newer], &[remote_older.clone()], &policy());
    assert_eq!(plan.to_push_remote.len(), 1);
    assert_eq!(plan.to_push_remote[0].rating, Some(9));

    let local_older = movie("tt0113277", "Heat", 1995)
        .with_local_id(1)
        .with_rating(9, Some(now - Duration::days(10)));
    let plan = compute_facet_diff(Facet::Ratings, &[local_older], &[remote_older], &policy());
    assert!(plan.to_push_remote.is_empty());
    assert_eq!(plan.to_pull_local.len(), 1);
    assert_eq!(plan.to_pull_local[0].rating, Some(6));
}

#[test]
fn test_ratings_missing_timestamp_trusts_remote() {
    let local = movie("tt0113277", "Heat", 1995).with_local_id(1).with_rating(9, None);
    let remote = remote_movie(2, "tt0113277", "Heat", 1995).with_rating(7, Some(Utc::now()));
    let plan = compute_facet_diff(Facet::Ratings, &[local], &[remote], &policy());
    assert_eq!(plan.to_pull_local.len(), 1);
    assert_eq!(plan.to_pull_local[0].rating, Some(7));
}

#[test]
fn test_remote_rating_fills_unrated_local() {
    let local = movie("tt0113277", "Heat", 1995).with_local_id(4);
    let remote = remote_movie(2, "tt0113277", "Heat", 1995).with_rating(8, None);
    let plan = compute_facet_diff(Facet::Ratings, &[local], &[remote], &policy());
    assert_eq!(plan.to_pull_local.len(), 1);
    assert_eq!(plan.to_pull_local[0].local_id, Some(4));
    assert!(plan.to_push_remote.is_empty());
}

#[test]
fn test_watchlist_removes_watched_items_only_when_enabled() {
    let local = vec![
        movie("tt0113277", "Heat", 1995).with_local_id(1).with_plays(1),
        movie("tt0120057", "Ronin", 1998).with_local_id(2),
    ];
    let remote = vec![
        remote_movie(2, "tt0113277", "Heat", 1995),
        remote_movie(3, "tt0120057", "Ronin", 1998),
    ];
    assert!(compute_facet_diff(Facet::Watchlist, &local, &remote, &policy()).is_empty());

    let enabled = DiffPolicy {
        remove_watched_from_watchlist: true,
        ..policy()
    };
    let plan = compute_facet_diff(Facet::Watchlist, &local, &remote, &enabled);
    assert_eq!(plan.to_remove_remote.len(), 1);
    assert_eq!(plan.to_remove_remote[0].title, "Heat");
    assert!(plan.to_push_remote.is_empty());
}

#[test]
fn test_duplicate_local_files_push_once() {
    let local = vec![
        movie("tt0113277", "Heat", 1995).with_local_id(1).collected(),
        movie("tt0113277", "Heat", 1995).with_local_id(2).collected(),
    ];
    let plan = compute_facet_diff(Facet::Collection, &local, &[], &policy());
    assert_eq!(plan.to_push_remote.len(), 1);
}

#[test]
fn test_duplicate_local_files_each_receive_pulls() {
    let mut local = vec![
        movie("tt0113277", "Heat", 1995).with_local_id(1),
        movie("tt0113277", "Heat", 1995).with_local_id(2),
    ];
    let mut remote = vec![remote_movie(2, "tt0113277", "Heat", 1995).with_plays(1)];

    let plan = compute_facet_diff(Facet::Watched, &local, &remote, &policy());
    let mut pulled: Vec<_> = plan.to_pull_local.iter().map(|r| r.local_id).collect();
    pulled.sort();
    assert_eq!(pulled, vec![Some(1), Some(2)]);
    assert!(plan.to_pull_local.iter().all(|r| r.watched));

    apply(&plan, &mut local, &mut remote);
    assert!(compute_facet_diff(Facet::Watched, &local, &remote, &policy()).is_empty());

    let local = vec![
        movie("tt0113277", "Heat", 1995).with_local_id(1).collected(),
        movie("tt0113277", "Heat", 1995).with_local_id(2),
    ];
    let remote = vec![remote_movie(2, "tt0113277", "Heat", 1995).collected()];
    let plan = compute_facet_diff(Facet::Collection, &local, &remote, &policy());
    assert_eq!(plan.to_pull_local.len(), 1);
    assert_eq!(plan.to_pull_local[0].local_id, Some(2));
    assert!(plan.to_remove_remote.is_empty());
}

#[test]
fn test_group_by_show_and_season() {
    let records = vec![
        episode(100, 2, 1),
        episode(100, 1, 3),
        episode(100, 1, 1),
        episode(200, 1, 1),
        movie("tt0113277", "Heat", 1995),
    ];
    let groups = group_by_show(&records);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].ids.primary(), Some(100));
    assert_eq!(groups[0].episode_count(), 3);
    let first_season: Vec<_> = groups[0].seasons[&1].iter().map(|e| e.episode).collect();
    assert_eq!(first_season, vec![Some(1), Some(3)]);
    assert_eq!(groups[0].seasons.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_build_batches() {
    let mut records: Vec<MediaRecord> = (0..5)
        .map(|i| MediaRecord::movie(format!("Movie {}", i), Some(2000)))
        .collect();
    records.push(episode(100, 1, 1));
    records.push(episode(100, 1, 2));
    records.push(episode(200, 1, 1));

    let batches = build_batches(&records, 2);
    assert_eq!(batches.len(), 5);
    assert!(matches!(&batches[0], SyncBatch::Items(items) if items.len() == 2));
    assert!(matches!(&batches[2], SyncBatch::Items(items) if items.len() == 1));
    assert!(matches!(&batches[3], SyncBatch::Show(group) if group.episode_count() == 2));
}

#[test]
fn test_show_records_stay_out_of_watched() {
    let show = MediaRecord::show("Lost", Some(2004))
        .with_ids(MediaIds::new().with_trakt(100))
        .with_local_id(1)
        .collected();
    let plan = compute_facet_diff(Facet::Collection, &[show.clone()], &[], &policy());
    assert!(plan.is_empty());
    let plan = compute_facet_diff(Facet::Ratings, &[show.with_rating(8, None)], &[], &policy());
    assert_eq!(plan.to_push_remote.len(), 1);
}
