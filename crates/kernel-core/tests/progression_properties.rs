use chrono::Utc;
use contracts::{Account, Progress, Role};
use kernel_core::catalog::default_grades;
use kernel_core::progression::is_at_ceiling;
use kernel_core::{analytics, apply_xp, default_catalogs, economy, evaluate};
use proptest::prelude::*;

fn student() -> Account {
    Account::new("s1", "s.one", "S One", Role::Student, "hash", Utc::now())
}

fn rank(progress: &Progress) -> (usize, u32, u64) {
    (progress.grade_index, progress.level, progress.xp)
}

/// Any resting position on the default ladder below the ceiling pin.
fn resting_progress() -> impl Strategy<Value = Progress> {
    let grades = default_grades();
    (0..grades.len()).prop_flat_map(move |grade_index| {
        let grade = &grades[grade_index];
        (1..=grade.levels_to_complete, 0..grade.xp_per_level).prop_map(move |(level, xp)| {
            Progress {
                xp,
                level,
                grade_index,
            }
        })
    })
}

#[test]
fn ladder_ceiling_pins_level_and_xp() {
    let grades = default_grades();
    let outcome = apply_xp(Progress::default(), u64::MAX / 2, &grades);
    let last = grades.last().expect("ladder has grades");
    assert_eq!(outcome.progress.grade_index, grades.len() - 1);
    assert_eq!(outcome.progress.level, last.levels_to_complete);
    assert_eq!(outcome.progress.xp, last.xp_per_level);

    let again = apply_xp(outcome.progress, 5_000, &grades);
    assert_eq!(again.progress, outcome.progress);
    assert!(again.events.is_empty());
}

#[test]
fn crossing_a_grade_reports_the_promotion() {
    let grades = default_grades();
    let outcome = apply_xp(Progress::default(), 1_000, &grades);
    assert_eq!(outcome.progress.grade_index, 1);
    assert_eq!(outcome.progress.level, 1);
    assert!(outcome.events.iter().any(|event| matches!(
        event,
        kernel_core::ProgressEvent::Promotion { grade_index: 1, .. }
    )));
}

proptest! {
    #[test]
    fn xp_never_moves_progress_backwards(
        start in resting_progress(),
        delta in 0_u64..80_000,
    ) {
        let grades = default_grades();
        let after = apply_xp(start, delta, &grades).progress;
        prop_assert!(after.grade_index >= start.grade_index);
        prop_assert!(rank(&after) >= rank(&start));
    }

    #[test]
    fn xp_is_additive(
        start in resting_progress(),
        first in 0_u64..60_000,
        second in 0_u64..60_000,
    ) {
        let grades = default_grades();
        let stepped = apply_xp(apply_xp(start, first, &grades).progress, second, &grades);
        let direct = apply_xp(start, first + second, &grades);
        prop_assert_eq!(stepped.progress, direct.progress);
    }

    #[test]
    fn progress_stays_inside_its_grade(
        start in resting_progress(),
        delta in 0_u64..200_000,
    ) {
        let grades = default_grades();
        let progress = apply_xp(start, delta, &grades).progress;
        let grade = &grades[progress.grade_index];
        prop_assert!(progress.level >= 1);
        prop_assert!(progress.level <= grade.levels_to_complete);
        if progress.xp >= grade.xp_per_level {
            prop_assert!(is_at_ceiling(&progress, &grades));
            prop_assert_eq!(progress.xp, grade.xp_per_level);
        } else {
            prop_assert!(progress.xp < grade.xp_per_level);
        }
    }

    #[test]
    fn evaluation_reaches_a_fixed_point(
        xp in 0_u64..20_000,
        chapters in 0_usize..7,
        wins in 0_u32..12,
        streak in 0_u32..10,
    ) {
        let catalogs = default_catalogs();
        let mut account = student();
        account.progress = apply_xp(account.progress, xp, &catalogs.grades).progress;
        account.consulted_chapters = catalogs
            .chapters
            .iter()
            .take(chapters)
            .map(|chapter| chapter.id.clone())
            .collect();
        account.duels.wins = wins;
        account.streak = streak;

        evaluate(&mut account, &catalogs);
        let snapshot = account.clone();
        let second = evaluate(&mut account, &catalogs);
        prop_assert!(second.is_empty());
        prop_assert_eq!(account, snapshot);
    }

    #[test]
    fn purchase_never_overdraws(coins in 0_u64..1_000, item_index in 0_usize..14) {
        let catalogs = default_catalogs();
        let item = &catalogs.shop_items[item_index % catalogs.shop_items.len()];
        let mut account = student();
        account.coins = coins;

        match economy::purchase(&mut account, item) {
            Ok(()) => {
                prop_assert_eq!(account.coins, coins - item.price);
                prop_assert!(account.owned_items.contains(&item.id));
            }
            Err(_) => {
                prop_assert_eq!(account.coins, coins);
                prop_assert!(account.owned_items.is_empty());
            }
        }
    }

    #[test]
    fn weak_questions_are_ranked_and_bounded(
        history in proptest::collection::vec((0_usize..5, any::<bool>()), 0..40),
        limit in 0_usize..8,
        unseen_weight in 0.0_f64..1.0,
    ) {
        let catalogs = default_catalogs();
        let ids = catalogs
            .questions()
            .map(|(_, question)| question.id.clone())
            .collect::<Vec<_>>();
        let mut account = student();
        for (index, correct) in history {
            analytics::record_answer(&mut account, &ids[index % ids.len()], correct);
        }

        let ranked = analytics::rank_weak_questions(&account, catalogs.questions(), limit, unseen_weight);
        prop_assert!(ranked.len() <= limit);
        prop_assert!(ranked.iter().all(|entry| entry.error_rate > 0.0));

        let seen = ranked.iter().take_while(|entry| entry.seen).collect::<Vec<_>>();
        prop_assert!(ranked.iter().skip(seen.len()).all(|entry| !entry.seen));
        prop_assert!(seen.windows(2).all(|pair| pair[0].error_rate >= pair[1].error_rate));

        let mut unique = ranked.iter().map(|entry| entry.question_id.as_str()).collect::<Vec<_>>();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(unique.len(), ranked.len());
    }
}
