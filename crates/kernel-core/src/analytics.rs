//! Per-question answer history and the read-only projections built from it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use contracts::{
    Account, Catalogs, ChapterMastery, EngineSettings, Quiz, QuizQuestion, ReviewQuiz,
    WeakQuestion, REVIEW_QUIZ_ID,
};

const REVIEW_CHAPTER_ID: &str = "review";
const REVIEW_TITLE: &str = "Quiz de Révision Personnalisé";

pub fn record_answer(account: &mut Account, question_id: &str, correct: bool) {
    let stats = account
        .quiz_performance
        .entry(question_id.to_string())
        .or_default();
    if correct {
        stats.correct += 1;
    } else {
        stats.incorrect += 1;
    }
}

/// Ranks questions by historical error rate, highest first, and keeps the top
/// `limit`. Questions never answered carry `unseen_weight` as a placeholder rate
/// and rank after every question with a recorded miss. Questions with a zero
/// rate are never returned. Ties keep catalog order.
pub fn rank_weak_questions<'a, I>(
    account: &Account,
    questions: I,
    limit: usize,
    unseen_weight: f64,
) -> Vec<WeakQuestion>
where
    I: IntoIterator<Item = (&'a str, &'a QuizQuestion)>,
{
    let mut seen_ids = BTreeSet::new();
    let mut seen = Vec::new();
    let mut unseen = Vec::new();

    for (chapter_id, question) in questions {
        if !seen_ids.insert(question.id.as_str()) {
            continue;
        }
        let stats = account.quiz_performance.get(&question.id);
        match stats.and_then(|stats| stats.error_rate()) {
            Some(rate) if rate > 0.0 => seen.push(WeakQuestion {
                question_id: question.id.clone(),
                chapter_id: chapter_id.to_string(),
                error_rate: rate,
                seen: true,
            }),
            Some(_) => {}
            None if unseen_weight > 0.0 => unseen.push(WeakQuestion {
                question_id: question.id.clone(),
                chapter_id: chapter_id.to_string(),
                error_rate: unseen_weight,
                seen: false,
            }),
            None => {}
        }
    }

    seen.sort_by(|a, b| {
        b.error_rate
            .partial_cmp(&a.error_rate)
            .unwrap_or(Ordering::Equal)
    });
    seen.into_iter().chain(unseen).take(limit).collect()
}

/// Correct-answer percentage per chapter, weakest first. Chapters without any
/// recorded answer are left out.
pub fn chapter_mastery(account: &Account, catalogs: &Catalogs) -> Vec<ChapterMastery> {
    let mut totals: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for (chapter_id, question) in catalogs.questions() {
        if let Some(stats) = account.quiz_performance.get(&question.id) {
            let entry = totals.entry(chapter_id).or_default();
            entry.0 += stats.correct;
            entry.1 += stats.attempts();
        }
    }

    let mut mastery = catalogs
        .chapters
        .iter()
        .filter_map(|chapter| {
            let (correct, attempts) = totals.get(chapter.id.as_str()).copied()?;
            if attempts == 0 {
                return None;
            }
            let percent = (f64::from(correct) * 100.0 / f64::from(attempts)).round() as u32;
            Some(ChapterMastery {
                chapter_id: chapter.id.clone(),
                title: chapter.title.clone(),
                correct,
                attempts,
                mastery_percent: percent,
            })
        })
        .collect::<Vec<_>>();
    mastery.sort_by_key(|entry| entry.mastery_percent);
    mastery
}

/// Builds the personalised review quiz, or reports how far short the history is.
pub fn build_review_quiz(
    account: &Account,
    catalogs: &Catalogs,
    settings: &EngineSettings,
) -> ReviewQuiz {
    let weak = rank_weak_questions(
        account,
        catalogs.questions(),
        settings.review_quiz_size,
        settings.unseen_question_weight,
    );
    if weak.len() < settings.review_quiz_min_questions {
        return ReviewQuiz::NeedsMoreData {
            available: weak.len(),
            required: settings.review_quiz_min_questions,
        };
    }

    let by_id = catalogs
        .questions()
        .map(|(_, question)| (question.id.as_str(), question))
        .collect::<BTreeMap<_, _>>();
    let questions = weak
        .iter()
        .filter_map(|entry| by_id.get(entry.question_id.as_str()).map(|q| (*q).clone()))
        .collect();

    ReviewQuiz::Ready {
        quiz: Quiz {
            id: REVIEW_QUIZ_ID.to_string(),
            chapter_id: REVIEW_CHAPTER_ID.to_string(),
            title: REVIEW_TITLE.to_string(),
            questions,
        },
        weak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalogs;
    use chrono::Utc;
    use contracts::Role;

    fn student() -> Account {
        Account::new("s1", "s.one", "S One", Role::Student, "h", Utc::now())
    }

    #[test]
    fn three_misses_one_hit_ranks_at_three_quarters() {
        let catalogs = default_catalogs();
        let mut account = student();
        for _ in 0..3 {
            record_answer(&mut account, "q1_2", false);
        }
        record_answer(&mut account, "q1_2", true);

        let ranked = rank_weak_questions(&account, catalogs.questions(), 1, 0.5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].question_id, "q1_2");
        assert!((ranked[0].error_rate - 0.75).abs() < f64::EPSILON);
        assert!(ranked[0].seen);
    }

    #[test]
    fn unseen_questions_fill_remaining_slots() {
        let catalogs = default_catalogs();
        let mut account = student();
        record_answer(&mut account, "q2_1", false);
        record_answer(&mut account, "q2_1", true);
        record_answer(&mut account, "q1_1", true);

        let ranked = rank_weak_questions(&account, catalogs.questions(), 10, 0.5);
        let ids = ranked
            .iter()
            .map(|entry| entry.question_id.as_str())
            .collect::<Vec<_>>();
        // q1_1 has a zero rate and is dropped; unseen ones follow in catalog order.
        assert_eq!(ids, vec!["q2_1", "q1_2", "q1_3", "q2_2"]);
        assert!(ranked[1..].iter().all(|entry| !entry.seen));
    }

    #[test]
    fn ranking_does_not_touch_history() {
        let catalogs = default_catalogs();
        let mut account = student();
        record_answer(&mut account, "q1_1", false);
        let before = account.quiz_performance.clone();
        rank_weak_questions(&account, catalogs.questions(), 3, 0.0);
        assert_eq!(account.quiz_performance, before);
    }

    #[test]
    fn mastery_skips_chapters_without_answers() {
        let catalogs = default_catalogs();
        let mut account = student();
        record_answer(&mut account, "q1_1", true);
        record_answer(&mut account, "q1_2", false);
        record_answer(&mut account, "q1_3", true);
        record_answer(&mut account, "q2_1", false);

        let mastery = chapter_mastery(&account, &catalogs);
        assert_eq!(mastery.len(), 2);
        assert_eq!(mastery[0].chapter_id, "chap2");
        assert_eq!(mastery[0].mastery_percent, 0);
        assert_eq!(mastery[1].mastery_percent, 67);
    }

    #[test]
    fn review_quiz_needs_enough_weak_questions() {
        let catalogs = default_catalogs();
        let mut settings = EngineSettings::default();
        settings.unseen_question_weight = 0.0;
        let mut account = student();
        record_answer(&mut account, "q1_1", false);

        assert_eq!(
            build_review_quiz(&account, &catalogs, &settings),
            ReviewQuiz::NeedsMoreData {
                available: 1,
                required: 5
            }
        );

        settings.unseen_question_weight = 0.5;
        match build_review_quiz(&account, &catalogs, &settings) {
            ReviewQuiz::Ready { quiz, weak } => {
                assert_eq!(quiz.id, REVIEW_QUIZ_ID);
                assert_eq!(quiz.questions.len(), 5);
                assert_eq!(weak[0].question_id, "q1_1");
            }
            other => panic!("expected a ready quiz, got {other:?}"),
        }
    }
}
