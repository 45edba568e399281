// Identity matching between local and remote records

use media_sync_models::MediaRecord;

/// Lowercase and strip everything that is not a letter or digit, so
/// "Marvel's Agents of S.H.I.E.L.D." and "marvels agents of shield" compare equal.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn same_episode(a: &MediaRecord, b: &MediaRecord) -> bool {
    if !a.is_episode_level() && !b.is_episode_level() {
        return true;
    }
    a.is_episode_level() == b.is_episode_level() && a.season == b.season && a.episode == b.episode
}

/// Decide whether `local` and `remote` denote the same item.
///
/// The first identifier present on both sides decides, lower-priority ones are
/// not consulted: primary ID, then secondary ID, then normalized title with
/// year (when both years are known). Episode numbers must agree at every level.
/// Malformed identifiers count as absent.
pub fn matches(local: &MediaRecord, remote: &MediaRecord) -> bool {
    if local.kind.library() != remote.kind.library() {
        return false;
    }

    if let (Some(a), Some(b)) = (local.ids.primary(), remote.ids.primary()) {
        return a == b && same_episode(local, remote);
    }

    if let (Some(a), Some(b)) = (local.ids.secondary(), remote.ids.secondary()) {
        return a == b && same_episode(local, remote);
    }

    let local_title = normalize_title(&local.title);
    if local_title.is_empty() || local_title != normalize_title(&remote.title) {
        return false;
    }
    if let (Some(a), Some(b)) = (local.year, remote.year) {
        if a != b {
            return false;
        }
    }
    same_episode(local, remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_sync_models::MediaIds;

    fn movie(title: &str, year: u32, ids: MediaIds) -> MediaRecord {
        MediaRecord::movie(title, Some(year)).with_ids(ids)
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("The Shawshank Redemption"), "theshawshankredemption");
        assert_eq!(normalize_title("Marvel's Agents of S.H.I.E.L.D."), "marvelsagentsofshield");
        assert_eq!(normalize_title("  "), "");
    }

    #[test]
    fn test_primary_id_ignores_title() {
        let local = movie("Die Verurteilten", 1994, MediaIds::new().with_trakt(234));
        let remote = movie("The Shawshank Redemption", 1995, MediaIds::new().with_trakt(234));
        assert!(matches(&local, &remote));
    }

    #[test]
    fn test_primary_id_mismatch_is_final() {
        // Same title and secondary ID, but the primary IDs disagree
        let local = movie("Heat", 1995, MediaIds::new().with_trakt(1).with_imdb("tt0113277"));
        let remote = movie("Heat", 1995, MediaIds::new().with_trakt(2).with_imdb("tt0113277"));
        assert!(!matches(&local, &remote));
    }

    #[test]
    fn test_secondary_id_when_primary_missing_on_one_side() {
        let local = movie("Heat", 1995, MediaIds::new().with_imdb("tt0113277"));
        let remote = movie("Heat (Director's Cut)", 1995, MediaIds::new().with_trakt(9).with_imdb("tt0113277"));
        assert!(matches(&local, &remote));

        let other = movie("Heat", 1995, MediaIds::new().with_trakt(9).with_imdb("tt9999999"));
        assert!(!matches(&local, &other));
    }

    #[test]
    fn test_malformed_secondary_falls_back_to_title() {
        let local = movie("The Shawshank Redemption", 1994, MediaIds::new().with_imdb("tt01111"));
        let remote = movie("the shawshank redemption!", 1994, MediaIds::new().with_imdb("tt0111161"));
        assert!(matches(&local, &remote));

        let wrong_year = movie("The Shawshank Redemption", 2004, MediaIds::new().with_imdb("tt0111161"));
        assert!(!matches(&local, &wrong_year));
    }

    #[test]
    fn test_title_match_with_one_year_missing() {
        let local = MediaRecord::movie("Ronin", None);
        let remote = movie("Ronin", 1998, MediaIds::new());
        assert!(matches(&local, &remote));
    }

    #[test]
    fn test_episode_numbers_must_agree() {
        let ids = MediaIds::new().with_trakt(100);
        let local = MediaRecord::episode("Lost", Some(2004), 1, 2).with_ids(ids.clone());
        let same = MediaRecord::episode("LOST", Some(2004), 1, 2).with_ids(ids.clone());
        let next = MediaRecord::episode("Lost", Some(2004), 1, 3).with_ids(ids.clone());
        let show = MediaRecord::show("Lost", Some(2004)).with_ids(ids);
        assert!(matches(&local, &same));
        assert!(!matches(&local, &next));
        assert!(!matches(&local, &show));
    }

    #[test]
    fn test_movie_never_matches_show() {
        let local = MediaRecord::movie("Fargo", Some(1996));
        let remote = MediaRecord::show("Fargo", Some(1996));
        assert!(!matches(&local, &remote));
    }
}
